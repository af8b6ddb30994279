use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::Context;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::catalogue::CatalogueProduct;
use crate::events::{emit_best_effort, payload, EventWriter};
use crate::materials::Material;

/// A value persisted in a keyed collection.
pub trait Record: Serialize + DeserializeOwned + Clone {
    const COLLECTION: &'static str;

    fn record_id(&self) -> &str;
}

impl Record for Material {
    const COLLECTION: &'static str = "materials";

    fn record_id(&self) -> &str {
        &self.id
    }
}

impl Record for CatalogueProduct {
    const COLLECTION: &'static str = "catalogue";

    fn record_id(&self) -> &str {
        &self.id
    }
}

/// Key-value collection stored as one JSON object keyed by record id.
///
/// `put` is an upsert that keeps the key's original position. Every write
/// re-reads the file first so separate handles do not drop each other's keys.
/// There is no transaction spanning several records.
#[derive(Debug, Clone)]
pub struct CollectionStore<T> {
    path: PathBuf,
    _record: PhantomData<T>,
}

impl<T: Record> CollectionStore<T> {
    pub fn open(data_dir: &Path) -> Self {
        Self::at(data_dir.join(format!("{}.json", T::COLLECTION)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in insertion order. A missing file is an empty collection.
    /// Rows that no longer decode are left out; see [`CollectionStore::scan`].
    pub fn get_all(&self) -> anyhow::Result<Vec<T>> {
        Ok(self.scan()?.records)
    }

    /// Decodes every row, keeping the ones that fail next to the good ones.
    pub fn scan(&self) -> anyhow::Result<Scan<T>> {
        let mut scan = Scan {
            records: Vec::new(),
            unreadable: Vec::new(),
        };
        for (id, row) in self.read_rows()? {
            match serde_json::from_value::<T>(row) {
                Ok(record) => scan.records.push(record),
                Err(err) => scan.unreadable.push((id, err.to_string())),
            }
        }
        Ok(scan)
    }

    pub fn put(&self, record: &T) -> anyhow::Result<()> {
        let mut rows = self.read_rows()?;
        let value = serde_json::to_value(record)
            .with_context(|| format!("failed to encode {} record", T::COLLECTION))?;
        rows.insert(record.record_id().to_string(), value);
        self.write_rows(&rows)
    }

    pub fn delete(&self, id: &str) -> anyhow::Result<()> {
        let mut rows = self.read_rows()?;
        if rows.shift_remove(id).is_none() {
            return Ok(());
        }
        self.write_rows(&rows)
    }

    fn read_rows(&self) -> anyhow::Result<IndexMap<String, Value>> {
        if !self.path.exists() {
            return Ok(IndexMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(IndexMap::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a {} collection", self.path.display(), T::COLLECTION))
    }

    fn write_rows(&self, rows: &IndexMap<String, Value>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(rows)?)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// Result of [`CollectionStore::scan`].
#[derive(Debug)]
pub struct Scan<T> {
    pub records: Vec<T>,
    /// Keys whose rows failed to decode, with the decode error.
    pub unreadable: Vec<(String, String)>,
}

/// In-memory view of a collection, newest first, written through to its store.
///
/// Mutations are optimistic: memory changes first and stays changed when the
/// write fails. The failure is logged and returned to the caller.
#[derive(Debug, Clone)]
pub struct RecordLibrary<T> {
    items: Vec<T>,
    store: CollectionStore<T>,
    events: Option<EventWriter>,
}

pub type StockLibrary = RecordLibrary<Material>;

impl<T: Record> RecordLibrary<T> {
    /// Loads the collection; an unreadable store yields an empty library and
    /// an undecodable row is skipped. Both are logged as `store_read_failed`.
    pub fn load(store: CollectionStore<T>, events: Option<EventWriter>) -> Self {
        let items = match store.scan() {
            Ok(Scan {
                mut records,
                unreadable,
            }) => {
                for (id, error) in unreadable {
                    emit_best_effort(
                        events.as_ref(),
                        "store_read_failed",
                        payload(&[
                            ("collection", json!(T::COLLECTION)),
                            ("id", json!(id)),
                            ("error", json!(error)),
                        ]),
                    );
                }
                records.reverse();
                records
            }
            Err(err) => {
                emit_best_effort(
                    events.as_ref(),
                    "store_read_failed",
                    payload(&[
                        ("collection", json!(T::COLLECTION)),
                        ("error", json!(format!("{err:#}"))),
                    ]),
                );
                Vec::new()
            }
        };
        Self {
            items,
            store,
            events,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.record_id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replaces a record in place, or inserts a new one at the front.
    pub fn upsert(&mut self, record: T) -> anyhow::Result<()> {
        match self
            .items
            .iter()
            .position(|item| item.record_id() == record.record_id())
        {
            Some(index) => self.items[index] = record.clone(),
            None => self.items.insert(0, record.clone()),
        }
        let result = self.store.put(&record);
        self.log_write(result, "put", record.record_id())
    }

    pub fn remove(&mut self, id: &str) -> anyhow::Result<Option<T>> {
        let removed = self
            .items
            .iter()
            .position(|item| item.record_id() == id)
            .map(|index| self.items.remove(index));
        let result = self.store.delete(id);
        self.log_write(result, "delete", id)?;
        Ok(removed)
    }

    /// Applies `edit` to the record with `id` and writes it back.
    pub fn update(&mut self, id: &str, edit: impl FnOnce(&mut T)) -> anyhow::Result<Option<T>> {
        let Some(item) = self.items.iter_mut().find(|item| item.record_id() == id) else {
            return Ok(None);
        };
        edit(item);
        let updated = item.clone();
        let result = self.store.put(&updated);
        self.log_write(result, "put", id)?;
        Ok(Some(updated))
    }

    fn log_write(&self, result: anyhow::Result<()>, op: &str, id: &str) -> anyhow::Result<()> {
        if let Err(err) = &result {
            emit_best_effort(
                self.events.as_ref(),
                "store_write_failed",
                payload(&[
                    ("collection", json!(T::COLLECTION)),
                    ("op", json!(op)),
                    ("id", json!(id)),
                    ("error", json!(format!("{err:#}"))),
                ]),
            );
        }
        result
    }
}

impl RecordLibrary<Material> {
    pub fn append_saved_design(
        &mut self,
        material_id: &str,
        design: String,
    ) -> anyhow::Result<Option<Material>> {
        self.update(material_id, |material| material.saved_designs.push(design))
    }

    pub fn remove_saved_design(
        &mut self,
        material_id: &str,
        design: &str,
    ) -> anyhow::Result<Option<Material>> {
        self.update(material_id, |material| {
            material.saved_designs.retain(|existing| existing != design)
        })
    }
}

/// Catalogue products plus the export selection.
#[derive(Debug, Clone)]
pub struct CatalogueLibrary {
    products: RecordLibrary<CatalogueProduct>,
    selected: Vec<String>,
}

impl CatalogueLibrary {
    pub fn load(store: CollectionStore<CatalogueProduct>, events: Option<EventWriter>) -> Self {
        Self {
            products: RecordLibrary::load(store, events),
            selected: Vec::new(),
        }
    }

    pub fn products(&self) -> &[CatalogueProduct] {
        self.products.items()
    }

    pub fn get(&self, id: &str) -> Option<&CatalogueProduct> {
        self.products.get(id)
    }

    pub fn upsert(&mut self, product: CatalogueProduct) -> anyhow::Result<()> {
        self.products.upsert(product)
    }

    pub fn remove(&mut self, id: &str) -> anyhow::Result<Option<CatalogueProduct>> {
        self.selected.retain(|selected| selected != id);
        self.products.remove(id)
    }

    pub fn toggle_selected(&mut self, id: &str) {
        if let Some(index) = self.selected.iter().position(|selected| selected == id) {
            self.selected.remove(index);
        } else if self.products.contains(id) {
            self.selected.push(id.to_string());
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self
            .products
            .items()
            .iter()
            .map(|product| product.id.clone())
            .collect();
    }

    /// Adds `id` to the selection unless it is already there or unknown.
    pub fn select(&mut self, id: &str) -> bool {
        if self.is_selected(id) {
            return true;
        }
        if !self.products.contains(id) {
            return false;
        }
        self.selected.push(id.to_string());
        true
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|selected| selected == id)
    }

    /// Selected products in list order.
    pub fn selected_products(&self) -> Vec<CatalogueProduct> {
        self.products
            .items()
            .iter()
            .filter(|product| self.is_selected(&product.id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::materials::{MaterialCategory, MaterialDraft};

    fn material(id: &str) -> Material {
        let mut material = Material::new_user(MaterialDraft {
            name: id.to_string(),
            image_url: format!("{id}.png"),
            category: Some(MaterialCategory::Tiles),
            ..MaterialDraft::default()
        });
        material.id = id.to_string();
        material
    }

    #[test]
    fn store_put_is_upsert_in_insertion_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = CollectionStore::<Material>::open(temp.path());
        store.put(&material("a"))?;
        store.put(&material("b"))?;
        let mut renamed = material("a");
        renamed.name = "renamed".to_string();
        store.put(&renamed)?;

        let rows = store.get_all()?;
        assert_eq!(
            rows.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(rows[0].name, "renamed");
        assert!(store.path().ends_with("materials.json"));
        Ok(())
    }

    #[test]
    fn store_delete_keeps_remaining_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = CollectionStore::<Material>::open(temp.path());
        for id in ["a", "b", "c"] {
            store.put(&material(id))?;
        }
        store.delete("a")?;
        store.delete("missing")?;
        let ids: Vec<String> = store.get_all()?.into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
        Ok(())
    }

    #[test]
    fn store_handles_merge_writes() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let first = CollectionStore::<Material>::open(temp.path());
        let second = CollectionStore::<Material>::open(temp.path());
        first.put(&material("a"))?;
        second.put(&material("b"))?;
        first.put(&material("c"))?;
        assert_eq!(first.get_all()?.len(), 3);
        Ok(())
    }

    #[test]
    fn library_load_falls_back_to_empty_and_logs() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = CollectionStore::<Material>::open(temp.path());
        std::fs::write(store.path(), "not json")?;
        let events_path = temp.path().join("events.jsonl");
        let events = EventWriter::new(&events_path, "test");

        let library = StockLibrary::load(store, Some(events));
        assert!(library.is_empty());

        let raw = std::fs::read_to_string(&events_path)?;
        let row: Value = serde_json::from_str(raw.lines().next().unwrap_or("{}"))?;
        assert_eq!(row["type"], "store_read_failed");
        assert_eq!(row["collection"], "materials");
        Ok(())
    }

    #[test]
    fn undecodable_rows_are_skipped_and_logged() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = CollectionStore::<Material>::open(temp.path());
        store.put(&material("good"))?;
        let mut rows: serde_json::Map<String, Value> =
            serde_json::from_str(&std::fs::read_to_string(store.path())?)?;
        rows.insert("broken".to_string(), json!({ "id": 7 }));
        std::fs::write(store.path(), serde_json::to_string(&rows)?)?;
        let events_path = temp.path().join("events.jsonl");

        let library = StockLibrary::load(store, Some(EventWriter::new(&events_path, "test")));
        let ids: Vec<&str> = library.items().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["good"]);

        let raw = std::fs::read_to_string(&events_path)?;
        let row: Value = serde_json::from_str(raw.lines().next().unwrap_or("{}"))?;
        assert_eq!(row["type"], "store_read_failed");
        assert_eq!(row["id"], "broken");
        Ok(())
    }

    #[test]
    fn library_lists_newest_first_and_upserts_in_place() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = CollectionStore::<Material>::open(temp.path());
        store.put(&material("old"))?;
        store.put(&material("new"))?;

        let mut library = StockLibrary::load(store, None);
        assert_eq!(library.items()[0].id, "new");

        library.upsert(material("newest"))?;
        let mut edited = material("old");
        edited.name = "edited".to_string();
        library.upsert(edited)?;

        let ids: Vec<&str> = library.items().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["newest", "new", "old"]);
        assert_eq!(library.get("old").map(|m| m.name.as_str()), Some("edited"));
        Ok(())
    }

    #[test]
    fn failed_write_keeps_optimistic_update() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        // A directory where the collection file should be makes every write fail.
        let blocked = temp.path().join("materials.json");
        std::fs::create_dir_all(&blocked)?;
        let events_path = temp.path().join("events.jsonl");
        let mut library = StockLibrary::load(
            CollectionStore::at(&blocked),
            Some(EventWriter::new(&events_path, "test")),
        );

        assert!(library.upsert(material("a")).is_err());
        assert!(library.contains("a"));

        let raw = std::fs::read_to_string(&events_path)?;
        assert!(raw.contains("store_write_failed"));
        Ok(())
    }

    #[test]
    fn saved_designs_append_and_remove() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = CollectionStore::<Material>::open(temp.path());
        let mut library = StockLibrary::load(store.clone(), None);
        library.upsert(material("a"))?;

        library.append_saved_design("a", "design-1".to_string())?;
        library.append_saved_design("a", "design-2".to_string())?;
        library.remove_saved_design("a", "design-1")?;
        assert!(library.append_saved_design("missing", "x".to_string())?.is_none());

        let persisted = store.get_all()?;
        assert_eq!(persisted[0].saved_designs, vec!["design-2".to_string()]);
        Ok(())
    }

    #[test]
    fn catalogue_selection_follows_list_order_and_deletes() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut catalogue = CatalogueLibrary::load(CollectionStore::open(temp.path()), None);
        for id in ["p1", "p2", "p3"] {
            let mut product = CatalogueProduct::new(id, format!("{id}.png"));
            product.id = id.to_string();
            catalogue.upsert(product)?;
        }
        catalogue.toggle_selected("p1");
        catalogue.toggle_selected("p3");
        catalogue.toggle_selected("unknown");

        let ids: Vec<String> = catalogue
            .selected_products()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p3", "p1"]);

        assert!(catalogue.select("p1"));
        assert!(!catalogue.select("unknown"));
        assert_eq!(catalogue.selected_products().len(), 2);

        catalogue.remove("p3")?;
        assert!(!catalogue.is_selected("p3"));
        catalogue.toggle_selected("p1");
        assert!(catalogue.selected_products().is_empty());
        Ok(())
    }
}
