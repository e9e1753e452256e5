use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::DEFAULT_LOCAL_DATA_PATH;
use crate::error::{GameError, Result};

/// A ship's desired destination plus free-form bookkeeping for bot authors.
/// `None` on an axis means nothing is pending on it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShipTarget {
    pub ship_id: String,
    pub target_x: Option<i32>,
    pub target_y: Option<i32>,
    pub metadata: BTreeMap<String, Value>,
}

impl ShipTarget {
    pub fn new(ship_id: &str) -> Self {
        Self {
            ship_id: ship_id.to_string(),
            ..Self::default()
        }
    }

    pub fn has_target(&self) -> bool {
        self.target_x.is_some() || self.target_y.is_some()
    }

    pub fn set(&mut self, x: i32, y: i32) {
        self.target_x = Some(x);
        self.target_y = Some(y);
    }

    pub fn clear(&mut self) {
        self.target_x = None;
        self.target_y = None;
    }

    pub fn to_record(&self) -> TargetRecord {
        TargetRecord {
            id: self.ship_id.clone(),
            target_x: self.target_x,
            target_y: self.target_y,
            metadata: self.metadata.clone(),
        }
    }

    pub fn from_record(record: TargetRecord) -> Self {
        Self {
            ship_id: record.id,
            target_x: record.target_x,
            target_y: record.target_y,
            metadata: record.metadata,
        }
    }
}

/// On-disk form of a [`ShipTarget`]. Files written before metadata existed
/// simply lack the field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: String,
    pub target_x: Option<i32>,
    pub target_y: Option<i32>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// Where the flat `ship_id -> record` document lives between sessions.
pub trait TargetStorage {
    /// `Ok(None)` when nothing has been written yet.
    fn read(&self) -> std::io::Result<Option<String>>;
    fn write(&self, text: &str) -> std::io::Result<()>;
}

#[derive(Clone, Debug)]
pub struct JsonFileStorage {
    file_path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

impl Default for JsonFileStorage {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_DATA_PATH)
    }
}

impl TargetStorage for JsonFileStorage {
    fn read(&self) -> std::io::Result<Option<String>> {
        match fs::read_to_string(&self.file_path) {
            Ok(text) => Ok(Some(text)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn write(&self, text: &str) -> std::io::Result<()> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.file_path, text)
    }
}

/// Keeps the document in memory. Clones share the same contents.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    contents: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn with_contents(text: &str) -> Self {
        Self {
            contents: Arc::new(Mutex::new(Some(text.to_string()))),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl TargetStorage for MemoryStorage {
    fn read(&self) -> std::io::Result<Option<String>> {
        Ok(self.contents())
    }

    fn write(&self, text: &str) -> std::io::Result<()> {
        let mut guard = self
            .contents
            .lock()
            .map_err(|_| std::io::Error::other("memory storage lock poisoned"))?;
        *guard = Some(text.to_string());
        Ok(())
    }
}

pub struct TargetStore {
    storage: Box<dyn TargetStorage>,
    targets: BTreeMap<String, ShipTarget>,
}

impl TargetStore {
    /// Opens the store and loads whatever the storage already holds.
    pub fn open(storage: impl TargetStorage + 'static) -> Self {
        let mut store = Self {
            storage: Box::new(storage),
            targets: BTreeMap::new(),
        };
        store.load();
        store
    }

    pub fn at_path(file_path: impl Into<PathBuf>) -> Self {
        Self::open(JsonFileStorage::new(file_path))
    }

    pub fn in_memory() -> Self {
        Self::open(MemoryStorage::default())
    }

    /// Replaces the in-memory map with the stored one. Anything unreadable
    /// leaves the store empty instead of failing. Returns how many records
    /// were loaded.
    pub fn load(&mut self) -> usize {
        self.targets = match self.storage.read() {
            Ok(Some(text)) => decode_targets(&text).unwrap_or_default(),
            Ok(None) | Err(_) => BTreeMap::new(),
        };
        self.targets.len()
    }

    /// Writes every record, overwriting what was stored before.
    pub fn flush(&self) -> Result<()> {
        let records: BTreeMap<&str, TargetRecord> = self
            .targets
            .iter()
            .map(|(id, target)| (id.as_str(), target.to_record()))
            .collect();
        let text = serde_json::to_string(&records)?;
        self.storage.write(&text)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShipTarget> {
        self.targets.values()
    }

    pub fn get(&self, ship_id: &str) -> Option<&ShipTarget> {
        self.targets.get(ship_id)
    }

    pub fn get_mut(&mut self, ship_id: &str) -> Option<&mut ShipTarget> {
        self.targets.get_mut(ship_id)
    }

    pub fn get_or_create(&mut self, ship_id: &str) -> &mut ShipTarget {
        self.targets
            .entry(ship_id.to_string())
            .or_insert_with(|| ShipTarget::new(ship_id))
    }

    /// Overwrites both axes; nothing from the previous target survives.
    pub fn set_target(&mut self, ship_id: &str, x: i32, y: i32) {
        self.get_or_create(ship_id).set(x, y);
    }

    pub fn clear_target(&mut self, ship_id: &str) {
        if let Some(target) = self.targets.get_mut(ship_id) {
            target.clear();
        }
    }

    pub fn set_attribute<T: Serialize + ?Sized>(
        &mut self,
        ship_id: &str,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let encoded = serde_json::to_value(value).map_err(|source| GameError::NotSerializable {
            key: key.to_string(),
            source,
        })?;
        self.get_or_create(ship_id)
            .metadata
            .insert(key.to_string(), encoded);
        Ok(())
    }

    pub fn get_attribute<T: DeserializeOwned>(&self, ship_id: &str, key: &str) -> Result<T> {
        let value = self
            .targets
            .get(ship_id)
            .and_then(|target| target.metadata.get(key))
            .ok_or_else(|| GameError::AttributeMissing {
                ship_id: ship_id.to_string(),
                key: key.to_string(),
            })?;
        decode_attribute(ship_id, key, value)
    }

    pub fn get_attribute_or<T: DeserializeOwned>(
        &self,
        ship_id: &str,
        key: &str,
        default: T,
    ) -> Result<T> {
        match self
            .targets
            .get(ship_id)
            .and_then(|target| target.metadata.get(key))
        {
            Some(value) => decode_attribute(ship_id, key, value),
            None => Ok(default),
        }
    }

    pub fn remove_attribute(&mut self, ship_id: &str, key: &str) -> Option<Value> {
        self.targets.get_mut(ship_id)?.metadata.remove(key)
    }
}

impl std::fmt::Debug for TargetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetStore")
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

fn decode_attribute<T: DeserializeOwned>(ship_id: &str, key: &str, value: &Value) -> Result<T> {
    T::deserialize(value).map_err(|source| GameError::AttributeType {
        ship_id: ship_id.to_string(),
        key: key.to_string(),
        source,
    })
}

fn decode_targets(text: &str) -> Option<BTreeMap<String, ShipTarget>> {
    let records: BTreeMap<String, TargetRecord> = serde_json::from_str(text).ok()?;
    Some(
        records
            .into_iter()
            .map(|(ship_id, record)| (ship_id, ShipTarget::from_record(record)))
            .collect(),
    )
}
