//! Index, alias and template lifecycle over a durable [`MetaKv`].
//!
//! Each entity class lives under its own key namespace, one JSON document per
//! key, and is mirrored by an in-memory cache guarded by its own
//! [`RwLock`]. Writes go to the durable store first and reach the cache only
//! once the store accepted them, with the class write lock held across both
//! steps so the cache never disagrees with the store about ordering.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashMap;
use log::{debug, info};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, SundialError};
use crate::meta::kv::MetaKv;
use crate::meta::types::{Alias, Index, IndexTemplate};

/// Key namespace of index definitions.
pub const INDEX_PATH: &str = "/_index/";
/// Key namespace of aliases.
pub const ALIAS_PATH: &str = "/_alias/";
/// Key namespace of index templates.
pub const INDEX_TEMPLATE_PATH: &str = "/_index_template/";

/// A persisted entity class.
trait Entity: Serialize + DeserializeOwned + Clone {
    const PATH: &'static str;

    fn name(&self) -> &str;

    fn set_name(&mut self, name: String);
}

impl Entity for Index {
    const PATH: &'static str = INDEX_PATH;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl Entity for Alias {
    const PATH: &'static str = ALIAS_PATH;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl Entity for IndexTemplate {
    const PATH: &'static str = INDEX_TEMPLATE_PATH;

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

type Cache<T> = RwLock<AHashMap<String, T>>;

/// Metadata store for indices, aliases and index templates.
///
/// Constructed with [`MetadataStore::open`], which loads every entity class
/// from the injected key-value store and fails if any load fails. After
/// [`MetadataStore::close`] every operation returns
/// [`SundialError::StoreClosed`].
#[derive(Debug)]
pub struct MetadataStore {
    kv: Arc<dyn MetaKv>,
    indexes: Cache<Index>,
    aliases: Cache<Alias>,
    templates: Cache<IndexTemplate>,
    closed: AtomicBool,
}

impl MetadataStore {
    /// Open the store over `kv` and load all three caches.
    pub fn open(kv: Arc<dyn MetaKv>) -> Result<Self> {
        let store = MetadataStore {
            kv,
            indexes: RwLock::new(AHashMap::new()),
            aliases: RwLock::new(AHashMap::new()),
            templates: RwLock::new(AHashMap::new()),
            closed: AtomicBool::new(false),
        };

        let indexes = store.load_indexes()?;
        let aliases = store.load_aliases()?;
        let templates = store.load_index_templates()?;
        info!(
            "metadata store opened: {indexes} indexes, {aliases} aliases, {templates} templates"
        );

        Ok(store)
    }

    /// Close the store and the underlying key-value handle. Idempotent.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.kv.sync()?;
        self.kv.close()?;
        info!("metadata store closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(SundialError::StoreClosed)
        } else {
            Ok(())
        }
    }

    // Indexes

    /// Create or replace an index.
    ///
    /// The highest-priority matching template fills in settings and mappings
    /// the definition leaves out. The merged definition is validated before
    /// anything is written; the stored form is returned.
    pub fn create_index(&self, mut index: Index) -> Result<Index> {
        self.check_open()?;
        if let Some(template) = self.matching_template(&index.name) {
            debug!(
                "applying template '{}' to index '{}'",
                template.name, index.name
            );
            index.apply_template(&template);
        }
        index.validate_and_normalize()?;

        self.put_entity(&self.indexes, index.clone())?;
        info!("created index '{}'", index.name);
        Ok(index)
    }

    pub fn get_index(&self, name: &str) -> Result<Option<Index>> {
        self.get_entity(&self.indexes, name)
    }

    /// Delete an index. Returns whether it existed.
    pub fn delete_index(&self, name: &str) -> Result<bool> {
        let existed = self.delete_entity(&self.indexes, name)?;
        if existed {
            info!("deleted index '{name}'");
        }
        Ok(existed)
    }

    /// All indexes ordered by name.
    pub fn list_indexes(&self) -> Result<Vec<Index>> {
        self.list_entities(&self.indexes)
    }

    /// Rebuild the index cache from the durable store. Returns the count.
    pub fn load_indexes(&self) -> Result<usize> {
        self.load_entities(&self.indexes)
    }

    // Aliases

    /// Create or replace an alias.
    pub fn create_alias(&self, alias: Alias) -> Result<()> {
        self.check_open()?;
        alias.validate()?;
        let name = alias.name.clone();
        self.put_entity(&self.aliases, alias)?;
        info!("created alias '{name}'");
        Ok(())
    }

    pub fn get_alias(&self, name: &str) -> Result<Option<Alias>> {
        self.get_entity(&self.aliases, name)
    }

    pub fn delete_alias(&self, name: &str) -> Result<bool> {
        self.delete_entity(&self.aliases, name)
    }

    pub fn list_aliases(&self) -> Result<Vec<Alias>> {
        self.list_entities(&self.aliases)
    }

    pub fn load_aliases(&self) -> Result<usize> {
        self.load_entities(&self.aliases)
    }

    /// Add `index` to `alias`, creating the alias if needed.
    pub fn add_index_to_alias(&self, alias: &str, index: &str) -> Result<Alias> {
        self.check_open()?;
        let mut cache = self.aliases.write();
        let mut updated = self
            .current_alias(&cache, alias)?
            .unwrap_or_else(|| Alias::new(alias, std::iter::empty::<String>()));
        updated.indexes.insert(index.to_string());
        updated.validate()?;

        self.kv
            .set(&key(ALIAS_PATH, alias), &serde_json::to_vec(&updated)?)?;
        cache.insert(alias.to_string(), updated.clone());
        debug!("added '{index}' to alias '{alias}'");
        Ok(updated)
    }

    /// Remove `index` from `alias`. An alias left without members is deleted.
    ///
    /// Returns whether `index` was a member.
    pub fn remove_index_from_alias(&self, alias: &str, index: &str) -> Result<bool> {
        self.check_open()?;
        let mut cache = self.aliases.write();
        let Some(mut updated) = self.current_alias(&cache, alias)? else {
            return Ok(false);
        };
        if !updated.indexes.remove(index) {
            return Ok(false);
        }

        let alias_key = key(ALIAS_PATH, alias);
        if updated.indexes.is_empty() {
            self.kv.delete(&alias_key)?;
            cache.remove(alias);
        } else {
            self.kv.set(&alias_key, &serde_json::to_vec(&updated)?)?;
            cache.insert(alias.to_string(), updated);
        }
        debug!("removed '{index}' from alias '{alias}'");
        Ok(true)
    }

    /// Resolve an index or alias name to the indexes it designates.
    ///
    /// An index name resolves to that index. An alias resolves to those of
    /// its members that exist. `Ok(None)` means neither is known.
    pub fn resolve(&self, name: &str) -> Result<Option<Vec<Index>>> {
        if let Some(index) = self.get_index(name)? {
            return Ok(Some(vec![index]));
        }
        let Some(alias) = self.get_alias(name)? else {
            return Ok(None);
        };

        let mut indexes = Vec::with_capacity(alias.indexes.len());
        for member in &alias.indexes {
            if let Some(index) = self.get_index(member)? {
                indexes.push(index);
            }
        }
        Ok(Some(indexes))
    }

    // Index templates

    /// Create or replace an index template.
    pub fn create_index_template(&self, mut template: IndexTemplate) -> Result<IndexTemplate> {
        self.check_open()?;
        template.validate_and_normalize()?;
        self.put_entity(&self.templates, template.clone())?;
        info!("created index template '{}'", template.name);
        Ok(template)
    }

    pub fn get_index_template(&self, name: &str) -> Result<Option<IndexTemplate>> {
        self.get_entity(&self.templates, name)
    }

    pub fn delete_index_template(&self, name: &str) -> Result<bool> {
        self.delete_entity(&self.templates, name)
    }

    pub fn list_index_templates(&self) -> Result<Vec<IndexTemplate>> {
        self.list_entities(&self.templates)
    }

    pub fn load_index_templates(&self) -> Result<usize> {
        self.load_entities(&self.templates)
    }

    /// The template that applies to a new index called `index_name`.
    ///
    /// Highest priority wins; equal priorities go to the smallest name.
    pub fn matching_template(&self, index_name: &str) -> Option<IndexTemplate> {
        self.templates
            .read()
            .values()
            .filter(|template| template.matches(index_name))
            .min_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then_with(|| a.name.cmp(&b.name))
            })
            .cloned()
    }

    // Shared entity plumbing

    fn put_entity<T: Entity>(&self, cache: &Cache<T>, entity: T) -> Result<()> {
        let name = entity.name().to_string();
        let value = serde_json::to_vec(&entity)?;

        let mut cache = cache.write();
        self.kv.set(&key(T::PATH, &name), &value)?;
        cache.insert(name, entity);
        Ok(())
    }

    /// Serve from the cache, falling back to a read-through on a miss.
    ///
    /// The fallback never populates the cache, so a lookup cannot resurrect
    /// an entity deleted concurrently.
    fn get_entity<T: Entity>(&self, cache: &Cache<T>, name: &str) -> Result<Option<T>> {
        self.check_open()?;
        let cache = cache.read();
        if let Some(entity) = cache.get(name) {
            return Ok(Some(entity.clone()));
        }

        self.read_stored(name)
    }

    /// Read an entity straight from the key-value store.
    fn read_stored<T: Entity>(&self, name: &str) -> Result<Option<T>> {
        match self.kv.get(&key(T::PATH, name))? {
            Some(bytes) => {
                let mut entity: T = serde_json::from_slice(&bytes)?;
                entity.set_name(name.to_string());
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    /// Cached alias, falling back to the key-value store on a miss.
    fn current_alias(
        &self,
        cache: &AHashMap<String, Alias>,
        name: &str,
    ) -> Result<Option<Alias>> {
        match cache.get(name) {
            Some(alias) => Ok(Some(alias.clone())),
            None => self.read_stored(name),
        }
    }

    fn delete_entity<T: Entity>(&self, cache: &Cache<T>, name: &str) -> Result<bool> {
        self.check_open()?;
        let mut cache = cache.write();
        let stored = self.kv.delete(&key(T::PATH, name))?;
        let cached = cache.remove(name).is_some();
        Ok(stored || cached)
    }

    fn list_entities<T: Entity>(&self, cache: &Cache<T>) -> Result<Vec<T>> {
        self.check_open()?;
        let mut entities: Vec<T> = cache.read().values().cloned().collect();
        entities.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(entities)
    }

    fn load_entities<T: Entity>(&self, cache: &Cache<T>) -> Result<usize> {
        self.check_open()?;
        let mut cache = cache.write();

        let mut loaded = AHashMap::new();
        for (stored_key, bytes) in self.kv.scan_prefix(T::PATH)? {
            let Some(name) = stored_key.strip_prefix(T::PATH) else {
                continue;
            };
            let mut entity: T = serde_json::from_slice(&bytes).map_err(|e| {
                SundialError::corrupted(format!("unreadable metadata at {stored_key}: {e}"))
            })?;
            entity.set_name(name.to_string());
            loaded.insert(name.to_string(), entity);
        }

        let count = loaded.len();
        *cache = loaded;
        debug!("loaded {count} entries from {}", T::PATH);
        Ok(count)
    }
}

fn key(path: &str, name: &str) -> String {
    format!("{path}{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::kv::MemoryMetaKv;
    use crate::meta::types::{IndexSettings, Mappings, Property};

    fn open_store() -> (Arc<MemoryMetaKv>, MetadataStore) {
        let kv = Arc::new(MemoryMetaKv::new());
        let store = MetadataStore::open(kv.clone()).unwrap();
        (kv, store)
    }

    #[test]
    fn test_alias_membership_reads_through_on_cache_miss() {
        let (kv, store) = open_store();
        kv.set("/_alias/current", br#"{"indexes": ["logs-1"]}"#).unwrap();

        let alias = store.add_index_to_alias("current", "logs-2").unwrap();
        let members: Vec<&str> = alias.indexes.iter().map(String::as_str).collect();
        assert_eq!(members, vec!["logs-1", "logs-2"]);

        kv.set("/_alias/stale", br#"{"indexes": ["a", "b"]}"#).unwrap();
        assert!(store.remove_index_from_alias("stale", "a").unwrap());
        let stale = store.get_alias("stale").unwrap().unwrap();
        assert!(stale.indexes.contains("b"));
        assert!(!stale.indexes.contains("a"));
    }

    #[test]
    fn test_create_get_delete_index() {
        let (kv, store) = open_store();
        store
            .create_index(Index::new("people").with_property("name", "Keyword"))
            .unwrap();

        let index = store.get_index("people").unwrap().unwrap();
        assert_eq!(index.mappings.properties["name"].field_type, "keyword");
        assert!(kv.get("/_index/people").unwrap().is_some());

        assert!(store.delete_index("people").unwrap());
        assert!(!store.delete_index("people").unwrap());
        assert!(store.get_index("people").unwrap().is_none());
    }

    #[test]
    fn test_invalid_index_leaves_store_untouched() {
        let (kv, store) = open_store();
        let err = store
            .create_index(Index::new("people").with_property("age", "int"))
            .unwrap_err();
        assert!(matches!(err, SundialError::Schema(_)));
        assert!(kv.is_empty());
        assert!(store.list_indexes().unwrap().is_empty());
    }

    #[test]
    fn test_get_reads_through_on_cache_miss() {
        let (kv, store) = open_store();
        kv.set(
            "/_index/external",
            br#"{"mappings":{"properties":{"f":{"type":"text"}}}}"#,
        )
        .unwrap();

        let index = store.get_index("external").unwrap().unwrap();
        assert_eq!(index.name, "external");
        // Not cached, so it does not show up in listings until a reload.
        assert!(store.list_indexes().unwrap().is_empty());
        assert_eq!(store.load_indexes().unwrap(), 1);
        assert_eq!(store.list_indexes().unwrap().len(), 1);
    }

    #[test]
    fn test_template_priority_and_ties() {
        let (_kv, store) = open_store();

        let mut low = IndexTemplate::new("b-low", ["logs-*"]);
        low.priority = 1;
        low.template.settings = Some(IndexSettings::new(2, 0));
        low.template.mappings = Some(Mappings {
            properties: [("message".to_string(), Property::new("text"))].into(),
        });
        store.create_index_template(low).unwrap();

        let mut high = IndexTemplate::new("z-high", ["logs-*"]);
        high.priority = 5;
        high.template.settings = Some(IndexSettings::new(3, 1));
        high.template.mappings = Some(Mappings {
            properties: [("host".to_string(), Property::new("KEYWORD"))].into(),
        });
        store.create_index_template(high.clone()).unwrap();

        let mut tied = high.clone();
        tied.name = "a-tied".to_string();
        tied.template.settings = Some(IndexSettings::new(7, 0));
        store.create_index_template(tied).unwrap();

        assert_eq!(store.matching_template("logs-1").unwrap().name, "a-tied");
        assert!(store.matching_template("metrics").is_none());

        // Template supplies the whole mapping.
        let created = store.create_index(Index::new("logs-1")).unwrap();
        assert_eq!(created.settings(), IndexSettings::new(7, 0));
        assert_eq!(created.mappings.properties["host"].field_type, "keyword");
    }

    #[test]
    fn test_alias_membership_and_resolve() {
        let (_kv, store) = open_store();
        store
            .create_index(Index::new("logs-1").with_property("m", "text"))
            .unwrap();
        store
            .create_index(Index::new("logs-2").with_property("m", "text"))
            .unwrap();

        store.add_index_to_alias("logs", "logs-1").unwrap();
        store.add_index_to_alias("logs", "logs-2").unwrap();
        store.add_index_to_alias("logs", "logs-3").unwrap();

        let resolved = store.resolve("logs").unwrap().unwrap();
        let names: Vec<&str> = resolved.iter().map(|index| index.name.as_str()).collect();
        assert_eq!(names, vec!["logs-1", "logs-2"]);
        assert_eq!(store.resolve("logs-1").unwrap().unwrap().len(), 1);
        assert!(store.resolve("unknown").unwrap().is_none());

        assert!(store.remove_index_from_alias("logs", "logs-3").unwrap());
        assert!(!store.remove_index_from_alias("logs", "logs-3").unwrap());
        store.remove_index_from_alias("logs", "logs-1").unwrap();
        store.remove_index_from_alias("logs", "logs-2").unwrap();
        assert!(store.get_alias("logs").unwrap().is_none());
    }

    #[test]
    fn test_reopen_loads_all_classes() {
        let kv = Arc::new(MemoryMetaKv::new());
        {
            let store = MetadataStore::open(kv.clone()).unwrap();
            store
                .create_index(Index::new("a").with_property("f", "long"))
                .unwrap();
            store.create_alias(Alias::new("al", ["a"])).unwrap();
            store
                .create_index_template(IndexTemplate::new("t", ["x-*"]))
                .unwrap();
        }

        let store = MetadataStore::open(kv).unwrap();
        assert_eq!(store.list_indexes().unwrap()[0].name, "a");
        assert_eq!(store.list_aliases().unwrap()[0].name, "al");
        assert_eq!(store.list_index_templates().unwrap()[0].name, "t");
    }

    #[test]
    fn test_open_fails_on_unreadable_entry() {
        let kv = Arc::new(MemoryMetaKv::new());
        kv.set("/_alias/broken", b"not json").unwrap();
        let err = MetadataStore::open(kv).unwrap_err();
        assert!(matches!(err, SundialError::Corrupted(_)));
    }

    #[test]
    fn test_closed_store() {
        let (_kv, store) = open_store();
        store.close().unwrap();
        store.close().unwrap();
        assert!(matches!(
            store.get_index("a"),
            Err(SundialError::StoreClosed)
        ));
        assert!(matches!(
            store.create_index(Index::new("a").with_property("f", "text")),
            Err(SundialError::StoreClosed)
        ));
    }
}
