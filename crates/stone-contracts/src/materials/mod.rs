mod defaults;
mod filter;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use defaults::{category_structure, default_materials};
pub use filter::{browse, MaterialFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialCategory {
    Marble,
    Granite,
    Tiles,
}

impl MaterialCategory {
    pub const ALL: [MaterialCategory; 3] = [Self::Marble, Self::Granite, Self::Tiles];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Marble => "Marble",
            Self::Granite => "Granite",
            Self::Tiles => "Tiles",
        }
    }

    /// Multi-material patterns are only offered for tiles.
    pub fn supports_combination(&self) -> bool {
        matches!(self, Self::Tiles)
    }
}

impl fmt::Display for MaterialCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaterialCategory {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().to_ascii_lowercase() == normalized)
            .ok_or_else(|| format!("Unknown material category '{raw}'."))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomType {
    Bedroom,
    Kitchen,
    #[serde(rename = "Living Room")]
    LivingRoom,
    Bathroom,
    #[serde(rename = "Guest Room")]
    GuestRoom,
    Office,
}

impl RoomType {
    /// Display order of the room picker.
    pub const ALL: [RoomType; 6] = [
        Self::LivingRoom,
        Self::Bedroom,
        Self::Kitchen,
        Self::Bathroom,
        Self::Office,
        Self::GuestRoom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bedroom => "Bedroom",
            Self::Kitchen => "Kitchen",
            Self::LivingRoom => "Living Room",
            Self::Bathroom => "Bathroom",
            Self::GuestRoom => "Guest Room",
            Self::Office => "Office",
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|room| room.as_str().replace(' ', "").to_ascii_lowercase() == normalized)
            .ok_or_else(|| format!("Unknown room type '{raw}'."))
    }
}

/// A reusable texture/style descriptor used to redesign a floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: String,
    pub name: String,
    pub prompt: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<MaterialCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default)]
    pub saved_designs: Vec<String>,
}

/// User-editable fields of a material, as captured by the upload form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialDraft {
    pub name: String,
    pub prompt: String,
    pub image_url: String,
    pub category: Option<MaterialCategory>,
    pub sub_category: Option<String>,
    pub price: Option<f64>,
    pub height: Option<f64>,
    pub width: Option<f64>,
}

impl Material {
    /// Mints a new user material with a `user_<millis>` id.
    pub fn new_user(draft: MaterialDraft) -> Self {
        let id = format!("user_{}", chrono::Utc::now().timestamp_millis());
        Self::from_draft(id, draft, Vec::new())
    }

    /// Applies an edit, keeping the id and the saved designs.
    pub fn edited(&self, draft: MaterialDraft) -> Self {
        Self::from_draft(self.id.clone(), draft, self.saved_designs.clone())
    }

    pub fn is_user_material(&self) -> bool {
        self.id.starts_with("user_")
    }

    fn from_draft(id: String, draft: MaterialDraft, saved_designs: Vec<String>) -> Self {
        let prompt = if draft.prompt.trim().is_empty() {
            format!("{} flooring", draft.name.trim())
        } else {
            draft.prompt.trim().to_string()
        };
        Self {
            id,
            name: draft.name.trim().to_string(),
            prompt,
            image_url: draft.image_url,
            category: draft.category,
            sub_category: draft.sub_category.filter(|value| !value.trim().is_empty()),
            price: draft.price,
            height: draft.height,
            width: draft.width,
            saved_designs,
        }
    }
}
