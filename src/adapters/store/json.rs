//! JSON-file State Store
//!
//! One JSON document per consumer id under a data directory. Writes go
//! through a temp file followed by a rename so a crash mid-write leaves the
//! previous state intact rather than a truncated file.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::ports::store::{StateStore, StoreError};

pub struct JsonStateStore {
    data_dir: PathBuf,
}

impl JsonStateStore {
    /// Open (and create if needed) the data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|e| StoreError::Write {
            consumer: data_dir.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, consumer: &str) -> PathBuf {
        self.data_dir.join(format!("{consumer}.json"))
    }

    fn read_value<T>(&self, consumer: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        let path = self.path_for(consumer);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| StoreError::Read {
            consumer: consumer.to_string(),
            reason: e.to_string(),
        })?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Corrupted {
                consumer: consumer.to_string(),
                reason: e.to_string(),
            })
    }

    fn write_value<T>(&self, consumer: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize,
    {
        let path = self.path_for(consumer);
        let tmp = self.data_dir.join(format!("{consumer}.json.tmp"));

        let content =
            serde_json::to_string_pretty(value).map_err(|e| StoreError::Write {
                consumer: consumer.to_string(),
                reason: e.to_string(),
            })?;

        fs::write(&tmp, content).map_err(|e| StoreError::Write {
            consumer: consumer.to_string(),
            reason: e.to_string(),
        })?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::Write {
            consumer: consumer.to_string(),
            reason: e.to_string(),
        })?;

        debug!("state written: {}", path.display());
        Ok(())
    }
}

impl StateStore for JsonStateStore {
    fn load_set(&self, consumer: &str) -> Result<HashSet<String>, StoreError> {
        let addresses: Option<Vec<String>> = self.read_value(consumer)?;
        Ok(addresses.unwrap_or_default().into_iter().collect())
    }

    fn save_set(&self, consumer: &str, addresses: &HashSet<String>) -> Result<(), StoreError> {
        // Sorted on disk so diffs and test fixtures stay stable.
        let mut sorted: Vec<&String> = addresses.iter().collect();
        sorted.sort();
        self.write_value(consumer, &sorted)
    }

    fn insert_into_set(&self, consumer: &str, address: &str) -> Result<(), StoreError> {
        let mut set = self.load_set(consumer)?;
        if set.insert(address.to_string()) {
            self.save_set(consumer, &set)?;
        }
        Ok(())
    }

    fn load_map(&self, consumer: &str) -> Result<HashMap<String, i64>, StoreError> {
        let entries: Option<BTreeMap<String, i64>> = self.read_value(consumer)?;
        Ok(entries.unwrap_or_default().into_iter().collect())
    }

    fn upsert_map(&self, consumer: &str, entries: &HashMap<String, i64>) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut stored: BTreeMap<String, i64> =
            self.load_map(consumer)?.into_iter().collect();

        let mut changed = false;
        for (address, ts) in entries {
            match stored.get(address) {
                None => {
                    stored.insert(address.clone(), *ts);
                    changed = true;
                }
                Some(0) if *ts > 0 => {
                    stored.insert(address.clone(), *ts);
                    changed = true;
                }
                Some(_) => {}
            }
        }

        if changed {
            self.write_value(consumer, &stored)?;
        }
        Ok(())
    }

    fn delete_where_older(&self, consumer: &str, cutoff_ms: i64) -> Result<usize, StoreError> {
        let mut stored: BTreeMap<String, i64> =
            self.load_map(consumer)?.into_iter().collect();
        let before = stored.len();
        stored.retain(|_, ts| *ts == 0 || *ts > cutoff_ms);
        let removed = before - stored.len();
        if removed > 0 {
            self.write_value(consumer, &stored)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, JsonStateStore) {
        let dir = tempdir().unwrap();
        let store = JsonStateStore::new(dir.path()).unwrap();
        (dir, store)
    }

    fn set(addrs: &[&str]) -> HashSet<String> {
        addrs.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_missing_consumer_is_empty() {
        let (_dir, store) = store();
        assert!(store.load_set("seen-f2").unwrap().is_empty());
        assert!(store.load_map("known").unwrap().is_empty());
    }

    #[test]
    fn test_set_round_trip_replaces() {
        let (_dir, store) = store();

        store.save_set("seen-f2", &set(&["a", "b"])).unwrap();
        assert_eq!(store.load_set("seen-f2").unwrap(), set(&["a", "b"]));

        // Replace semantics: the old membership is gone.
        store.save_set("seen-f2", &set(&["c"])).unwrap();
        assert_eq!(store.load_set("seen-f2").unwrap(), set(&["c"]));
    }

    #[test]
    fn test_insert_into_set_is_idempotent() {
        let (_dir, store) = store();

        store.insert_into_set("graduated", "mintA").unwrap();
        store.insert_into_set("graduated", "mintA").unwrap();
        store.insert_into_set("graduated", "mintB").unwrap();

        assert_eq!(store.load_set("graduated").unwrap(), set(&["mintA", "mintB"]));
    }

    #[test]
    fn test_upsert_map_zero_to_nonzero_only() {
        let (_dir, store) = store();

        let mut entries = HashMap::new();
        entries.insert("a".to_string(), 0i64);
        entries.insert("b".to_string(), 500i64);
        store.upsert_map("known", &entries).unwrap();

        // "a" learns its timestamp; "b" keeps the original.
        let mut update = HashMap::new();
        update.insert("a".to_string(), 100i64);
        update.insert("b".to_string(), 999i64);
        store.upsert_map("known", &update).unwrap();

        let map = store.load_map("known").unwrap();
        assert_eq!(map["a"], 100);
        assert_eq!(map["b"], 500);

        // Downgrade to 0 is ignored.
        let mut downgrade = HashMap::new();
        downgrade.insert("a".to_string(), 0i64);
        store.upsert_map("known", &downgrade).unwrap();
        assert_eq!(store.load_map("known").unwrap()["a"], 100);
    }

    #[test]
    fn test_delete_where_older_keeps_unknown_timestamps() {
        let (_dir, store) = store();

        let mut entries = HashMap::new();
        entries.insert("old".to_string(), 10i64);
        entries.insert("edge".to_string(), 50i64);
        entries.insert("fresh".to_string(), 100i64);
        entries.insert("unknown".to_string(), 0i64);
        store.upsert_map("known", &entries).unwrap();

        let removed = store.delete_where_older("known", 50).unwrap();
        assert_eq!(removed, 2);

        let map = store.load_map("known").unwrap();
        assert!(!map.contains_key("old"));
        assert!(!map.contains_key("edge"));
        assert!(map.contains_key("fresh"));
        assert!(map.contains_key("unknown"));

        // Second pass removes nothing.
        assert_eq!(store.delete_where_older("known", 50).unwrap(), 0);
    }

    #[test]
    fn test_corrupted_file_reports_corruption() {
        let (dir, store) = store();
        fs::write(dir.path().join("known.json"), "{ not json").unwrap();

        let err = store.load_map("known").unwrap_err();
        assert!(matches!(err, StoreError::Corrupted { .. }));
        assert!(err.to_string().contains("known"));
    }

    #[test]
    fn test_empty_file_is_empty_state() {
        let (dir, store) = store();
        fs::write(dir.path().join("seen-f2.json"), "  \n").unwrap();
        assert!(store.load_set("seen-f2").unwrap().is_empty());
    }

    #[test]
    fn test_no_tmp_files_left_behind() {
        let (dir, store) = store();
        store.save_set("seen-f2", &set(&["a"])).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = JsonStateStore::new(dir.path()).unwrap();
            store.save_set("currently-f2", &set(&["a", "b"])).unwrap();
        }
        let reopened = JsonStateStore::new(dir.path()).unwrap();
        assert_eq!(reopened.load_set("currently-f2").unwrap(), set(&["a", "b"]));
    }
}
