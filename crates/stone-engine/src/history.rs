use crate::codec::ImagePayload;

pub const ORIGINAL_ID: &str = "original";
pub const ORIGINAL_DESCRIPTION: &str = "Original Photo";

/// Position of an entry in a [`DesignHistory`]. Stable for the session
/// because entries are only ever appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HistoryIndex(usize);

impl HistoryIndex {
    pub const ORIGINAL: HistoryIndex = HistoryIndex(0);

    pub fn get(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryItem {
    pub id: String,
    pub image: ImagePayload,
    pub thumbnail: ImagePayload,
    pub timestamp_ms: i64,
    pub description: String,
}

impl HistoryItem {
    fn new(id: String, image: ImagePayload, description: String) -> Self {
        Self {
            id,
            thumbnail: image.clone(),
            image,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            description,
        }
    }

    pub fn is_original(&self) -> bool {
        self.id == ORIGINAL_ID
    }
}

/// Append-only log of every image the session has produced.
#[derive(Debug, Clone)]
pub struct DesignHistory {
    entries: Vec<HistoryItem>,
}

impl DesignHistory {
    pub fn new(original: ImagePayload) -> Self {
        Self {
            entries: vec![HistoryItem::new(
                ORIGINAL_ID.to_string(),
                original,
                ORIGINAL_DESCRIPTION.to_string(),
            )],
        }
    }

    pub fn push(&mut self, image: ImagePayload, description: impl Into<String>) -> HistoryIndex {
        let id = uuid::Uuid::new_v4().to_string();
        self.entries
            .push(HistoryItem::new(id, image, description.into()));
        HistoryIndex(self.entries.len() - 1)
    }

    pub fn get(&self, index: HistoryIndex) -> Option<&HistoryItem> {
        self.entries.get(index.0)
    }

    /// Parses a user-supplied position (as shown by `entries()` enumeration).
    pub fn index(&self, position: usize) -> Option<HistoryIndex> {
        (position < self.entries.len()).then_some(HistoryIndex(position))
    }

    pub fn original(&self) -> &HistoryItem {
        &self.entries[0]
    }

    pub fn latest(&self) -> HistoryIndex {
        HistoryIndex(self.entries.len() - 1)
    }

    pub fn entries(&self) -> &[HistoryItem] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; the original entry is never removed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(tag: u8) -> ImagePayload {
        ImagePayload::new("image/png", vec![tag])
    }

    #[test]
    fn starts_with_the_original_photo() {
        let history = DesignHistory::new(img(1));
        assert_eq!(history.len(), 1);
        let original = history.original();
        assert!(original.is_original());
        assert_eq!(original.description, "Original Photo");
        assert_eq!(original.thumbnail, original.image);
        assert_eq!(history.latest(), HistoryIndex::ORIGINAL);
    }

    #[test]
    fn push_appends_with_fresh_ids() {
        let mut history = DesignHistory::new(img(1));
        let first = history.push(img(2), "Applied Italian Marble");
        let second = history.push(img(3), "Pattern with 2 materials");
        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 2);

        let entries = history.entries();
        assert_eq!(entries[1].description, "Applied Italian Marble");
        assert_ne!(entries[1].id, entries[2].id);
        assert!(!entries[2].is_original());
        assert!(entries[1].timestamp_ms <= entries[2].timestamp_ms);
        assert_eq!(history.get(second).map(|item| item.image.clone()), Some(img(3)));
    }

    #[test]
    fn index_rejects_out_of_range_positions() {
        let mut history = DesignHistory::new(img(1));
        history.push(img(2), "AI Edit: brighter");
        assert_eq!(history.index(1).map(HistoryIndex::get), Some(1));
        assert_eq!(history.index(2), None);
    }
}
