use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access configuration file: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed configuration file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No config entry with id {0}")]
    EntryNotFound(String),

    #[error("A device with unique id {0} is already configured")]
    AlreadyConfigured(String),
}

/// One configured device, as created by the setup wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub title: String,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl ConfigEntry {
    /// Entry data overlaid with the options set after setup.
    pub fn merged(&self) -> Map<String, Value> {
        let mut merged = self.data.clone();
        merged.extend(self.options.clone());
        merged
    }

    pub fn read_string(&self, key: &str, default: &str) -> String {
        match self.merged().get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => default.to_string(),
            Some(other) => other.to_string(),
        }
    }

    pub fn read_float(&self, key: &str, default: f64) -> f64 {
        value_as_f64(self.merged().get(key)).unwrap_or(default)
    }

    pub fn read_u16(&self, key: &str, default: u16) -> u16 {
        self.merged()
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u16::try_from(v).ok())
            .unwrap_or(default)
    }
}

/// Numbers may be stored as JSON numbers or as the strings the first
/// setup form produced.
pub fn value_as_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    entries: BTreeMap<String, ConfigEntry>,
}

/// Config entries persisted as a JSON file.
#[derive(Debug, Default)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    file: StoreFile,
}

impl ConfigStore {
    /// Opens the store at `path`; a missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        let file = match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No configuration at {}, starting empty", path.display());
                StoreFile::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            file,
        })
    }

    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        // the store file is only ever replaced whole
        let tmp = temp_path(path);
        let content = serde_json::to_string_pretty(&self.file)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        debug!("Configuration saved to {}", path.display());
        Ok(())
    }

    pub fn add_entry(
        &mut self,
        title: &str,
        unique_id: Option<String>,
        data: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Result<&ConfigEntry, StoreError> {
        if let Some(uid) = &unique_id {
            if self.entry_by_unique_id(uid).is_some() {
                return Err(StoreError::AlreadyConfigured(uid.clone()));
            }
        }

        self.file.next_id += 1;
        let entry_id = format!("entry_{}", self.file.next_id);
        info!("Adding config entry {} ({})", entry_id, title);

        let entry = ConfigEntry {
            entry_id: entry_id.clone(),
            title: title.to_string(),
            unique_id,
            data,
            options,
        };

        Ok(self.file.entries.entry(entry_id).or_insert(entry))
    }

    pub fn entry(&self, entry_id: &str) -> Option<&ConfigEntry> {
        self.file.entries.get(entry_id)
    }

    pub fn entry_by_unique_id(&self, unique_id: &str) -> Option<&ConfigEntry> {
        self.file
            .entries
            .values()
            .find(|e| e.unique_id.as_deref() == Some(unique_id))
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.file.entries.values()
    }

    pub fn update_data(
        &mut self,
        entry_id: &str,
        data: Map<String, Value>,
    ) -> Result<(), StoreError> {
        self.entry_mut(entry_id)?.data = data;
        Ok(())
    }

    pub fn update_options(
        &mut self,
        entry_id: &str,
        options: Map<String, Value>,
    ) -> Result<(), StoreError> {
        self.entry_mut(entry_id)?.options = options;
        Ok(())
    }

    fn entry_mut(&mut self, entry_id: &str) -> Result<&mut ConfigEntry, StoreError> {
        self.file
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| StoreError::EntryNotFound(entry_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_add_and_lookup() {
        let mut store = ConfigStore::in_memory();
        let id = store
            .add_entry(
                "Van tanks",
                Some("aa:bb:cc:dd:ee:ff".to_string()),
                object(json!({"host": "192.168.0.38"})),
                Map::new(),
            )
            .unwrap()
            .entry_id
            .clone();

        assert_eq!(id, "entry_1");
        assert_eq!(store.entry(&id).unwrap().title, "Van tanks");
        assert_eq!(
            store.entry_by_unique_id("aa:bb:cc:dd:ee:ff").unwrap().entry_id,
            id
        );
        assert!(matches!(
            store.add_entry(
                "Again",
                Some("aa:bb:cc:dd:ee:ff".to_string()),
                Map::new(),
                Map::new()
            ),
            Err(StoreError::AlreadyConfigured(_))
        ));
    }

    #[test]
    fn test_options_override_data() {
        let entry = ConfigEntry {
            entry_id: "entry_1".to_string(),
            title: "Van".to_string(),
            unique_id: None,
            data: object(json!({"unit": "%", "calibration": "[]", "port": 6053})),
            options: object(json!({"calibration": "[[0,1],[2,20]]"})),
        };

        assert_eq!(entry.read_string("unit", "Custom"), "%");
        assert_eq!(entry.read_string("calibration", "[]"), "[[0,1],[2,20]]");
        assert_eq!(entry.read_string("missing", "Custom"), "Custom");
        assert_eq!(entry.read_u16("port", 0), 6053);
        assert_eq!(entry.read_float("port", 0.0), 6053.0);
    }

    #[test]
    fn test_value_as_f64() {
        assert_eq!(value_as_f64(Some(&json!(190))), Some(190.0));
        assert_eq!(value_as_f64(Some(&json!("12.5"))), Some(12.5));
        assert_eq!(value_as_f64(Some(&json!("abc"))), None);
        assert_eq!(value_as_f64(None), None);
    }

    #[test]
    fn test_failed_save_keeps_previous_store() {
        let path = std::env::temp_dir().join(format!(
            "smartvanio-keep-{}.json",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);

        let mut store = ConfigStore::open(&path).unwrap();
        store
            .add_entry("Van tanks", None, object(json!({"host": "10.0.0.2"})), Map::new())
            .unwrap();
        store.save().unwrap();
        let saved = fs::read_to_string(&path).unwrap();

        // a directory in the way of the temp file makes the next write fail
        fs::create_dir_all(temp_path(&path)).unwrap();
        store.add_entry("Roof", None, Map::new(), Map::new()).unwrap();
        assert!(matches!(store.save(), Err(StoreError::Io(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), saved);

        fs::remove_dir(temp_path(&path)).unwrap();
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_update_unknown_entry() {
        let mut store = ConfigStore::in_memory();
        assert!(matches!(
            store.update_options("entry_9", Map::new()),
            Err(StoreError::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_save_and_reopen() {
        let path = std::env::temp_dir().join(format!(
            "smartvanio-store-{}.json",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);

        let mut store = ConfigStore::open(&path).unwrap();
        assert_eq!(store.entries().count(), 0);
        store
            .add_entry("Inclinometer", None, object(json!({"name": "Level"})), Map::new())
            .unwrap();
        store.save().unwrap();
        assert!(!temp_path(&path).exists());

        let reopened = ConfigStore::open(&path).unwrap();
        let entry = reopened.entry("entry_1").unwrap();
        assert_eq!(entry.read_string("name", ""), "Level");
        fs::remove_file(&path).unwrap();
    }
}
