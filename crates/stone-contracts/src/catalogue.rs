use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Finish {
    Polished,
    Unpolished,
}

impl fmt::Display for Finish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Polished => "Polished",
            Self::Unpolished => "Unpolished",
        })
    }
}

impl FromStr for Finish {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "polished" => Ok(Self::Polished),
            "unpolished" => Ok(Self::Unpolished),
            _ => Err(format!("Unknown finish '{raw}'.")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueProduct {
    pub id: String,
    pub name: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<Finish>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl CatalogueProduct {
    pub fn new(name: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            id: format!("prod_{}", chrono::Utc::now().timestamp_millis()),
            name: name.into(),
            image_url: image_url.into(),
            color: None,
            finish: None,
            width: None,
            height: None,
        }
    }

    /// `"{w}mm x {h}mm"`, with `N/A` for a missing side; `None` when neither is set.
    pub fn dimensions_label(&self) -> Option<String> {
        if self.width.is_none() && self.height.is_none() {
            return None;
        }
        let side = |value: Option<f64>| {
            value
                .map(format_mm)
                .unwrap_or_else(|| "N/A".to_string())
        };
        Some(format!("{}mm x {}mm", side(self.width), side(self.height)))
    }

    pub fn detail_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(color) = self.color.as_deref().filter(|value| !value.trim().is_empty()) {
            lines.push(format!("Color: {color}"));
        }
        if let Some(finish) = self.finish {
            lines.push(format!("Finish: {finish}"));
        }
        if let Some(dimensions) = self.dimensions_label() {
            lines.push(format!("Dimensions: {dimensions}"));
        }
        lines
    }
}

fn format_mm(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_lines_skip_missing_values() {
        let mut product = CatalogueProduct::new("Statuario", "statuario.png");
        assert!(product.detail_lines().is_empty());

        product.color = Some("White".to_string());
        product.finish = Some(Finish::Polished);
        product.width = Some(600.0);
        assert_eq!(
            product.detail_lines(),
            vec![
                "Color: White".to_string(),
                "Finish: Polished".to_string(),
                "Dimensions: 600mm x N/Amm".to_string(),
            ]
        );
    }

    #[test]
    fn dimensions_keep_fractional_millimetres() {
        let mut product = CatalogueProduct::new("Slate", "slate.png");
        product.width = Some(300.5);
        product.height = Some(600.0);
        assert_eq!(product.dimensions_label().as_deref(), Some("300.5mm x 600mm"));
    }

    #[test]
    fn finish_parses_case_insensitively() {
        assert_eq!("UNPOLISHED".parse::<Finish>(), Ok(Finish::Unpolished));
        assert!("matte".parse::<Finish>().is_err());
    }
}
