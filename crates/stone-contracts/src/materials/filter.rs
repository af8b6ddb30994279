use indexmap::IndexMap;

use super::{Material, MaterialCategory};

/// Category / sub-category narrowing of the material grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialFilter {
    pub category: Option<MaterialCategory>,
    pub sub_category: Option<String>,
}

impl Default for MaterialFilter {
    fn default() -> Self {
        Self {
            category: Some(MaterialCategory::Marble),
            sub_category: None,
        }
    }
}

impl MaterialFilter {
    pub fn all() -> Self {
        Self {
            category: None,
            sub_category: None,
        }
    }

    /// Switching category always clears the sub-category.
    pub fn set_category(&mut self, category: Option<MaterialCategory>) {
        self.category = category;
        self.sub_category = None;
    }

    /// Picking the active sub-category again clears it.
    pub fn toggle_sub_category(&mut self, sub_category: &str) {
        if self.sub_category.as_deref() == Some(sub_category) {
            self.sub_category = None;
        } else {
            self.sub_category = Some(sub_category.to_string());
        }
    }

    pub fn matches(&self, material: &Material) -> bool {
        if let Some(category) = self.category {
            if material.category != Some(category) {
                return false;
            }
        }
        if let Some(sub_category) = self.sub_category.as_deref() {
            if material.sub_category.as_deref() != Some(sub_category) {
                return false;
            }
        }
        true
    }
}

/// User materials first, then the room's built-ins, filtered and de-duplicated by id.
///
/// A duplicated id keeps the position of its first occurrence and the value of its last.
pub fn browse(user: &[Material], room_defaults: &[Material], filter: &MaterialFilter) -> Vec<Material> {
    let mut unique: IndexMap<&str, &Material> = IndexMap::new();
    for material in user.iter().chain(room_defaults.iter()) {
        if filter.matches(material) {
            unique.insert(material.id.as_str(), material);
        }
    }
    unique.into_values().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(id: &str, category: MaterialCategory, sub: &str) -> Material {
        Material {
            id: id.to_string(),
            name: id.to_uppercase(),
            prompt: format!("{id} flooring"),
            image_url: format!("{id}.png"),
            category: Some(category),
            sub_category: Some(sub.to_string()),
            price: None,
            height: None,
            width: None,
            saved_designs: Vec::new(),
        }
    }

    #[test]
    fn browse_lists_user_materials_before_defaults() {
        let user = vec![material("user_1", MaterialCategory::Marble, "Onyx Series")];
        let defaults = vec![
            material("lr-im", MaterialCategory::Marble, "Italian Marble"),
            material("lr-bgg", MaterialCategory::Granite, "Black Galaxy"),
        ];
        let ids: Vec<String> = browse(&user, &defaults, &MaterialFilter::default())
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["user_1", "lr-im"]);
    }

    #[test]
    fn browse_applies_sub_category_and_dedupes() {
        let mut shadow = material("lr-im", MaterialCategory::Marble, "Italian Marble");
        shadow.name = "Shadowed".to_string();
        let user = vec![material("lr-im", MaterialCategory::Marble, "Italian Marble")];
        let defaults = vec![
            shadow,
            material("lr-gm", MaterialCategory::Marble, "Indian Marble"),
        ];
        let mut filter = MaterialFilter::default();
        filter.toggle_sub_category("Italian Marble");

        let found = browse(&user, &defaults, &filter);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "lr-im");
        assert_eq!(found[0].name, "Shadowed");
    }

    #[test]
    fn filter_toggles_and_resets_sub_category() {
        let mut filter = MaterialFilter::default();
        filter.toggle_sub_category("Onyx Series");
        assert_eq!(filter.sub_category.as_deref(), Some("Onyx Series"));
        filter.toggle_sub_category("Onyx Series");
        assert_eq!(filter.sub_category, None);

        filter.toggle_sub_category("Onyx Series");
        filter.set_category(Some(MaterialCategory::Tiles));
        assert_eq!(filter.category, Some(MaterialCategory::Tiles));
        assert_eq!(filter.sub_category, None);
    }

    #[test]
    fn unfiltered_browse_keeps_everything() {
        let defaults = vec![
            material("a", MaterialCategory::Marble, "Italian Marble"),
            material("b", MaterialCategory::Tiles, "Floor Tiles"),
        ];
        assert_eq!(browse(&[], &defaults, &MaterialFilter::all()).len(), 2);
    }
}
