//! 信标注册表
//!
//! 定位服务只依赖 [`BeaconRepository`] 接口；提供内存实现（测试、嵌入）
//! 与 JSON 文件实现（`beacon-config.json`，原子写入）。
//! 写操作为按 (major, minor) 的 upsert / delete，后写者生效。

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::algorithms::{
    Beacon, BeaconKey, PathLossModel, DEFAULT_MEASURED_POWER, DEFAULT_PATH_LOSS_EXPONENT,
};
use crate::error::RegistryError;

fn default_measured_power() -> f64 {
    DEFAULT_MEASURED_POWER
}

fn default_path_loss_exponent() -> f64 {
    DEFAULT_PATH_LOSS_EXPONENT
}

/// 注册表文档（持久化格式）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeaconDocument {
    /// 期望的 iBeacon UUID（小写）
    #[serde(default)]
    pub uuid: Option<String>,
    /// "major:minor" -> 信标
    #[serde(default)]
    pub beacons: BTreeMap<BeaconKey, Beacon>,
    #[serde(default = "default_path_loss_exponent")]
    pub path_loss_exponent: f64,
    #[serde(default = "default_measured_power")]
    pub measured_power: f64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BeaconDocument {
    pub fn model(&self) -> PathLossModel {
        PathLossModel::log_distance(self.measured_power, self.path_loss_exponent)
    }

    /// 加载时检查：条目键与信标自身的 (major, minor) 一致，模型常量有效
    fn check(&self) -> Result<(), RegistryError> {
        self.model().validate().map_err(RegistryError::InvalidModel)?;
        for (key, beacon) in &self.beacons {
            if *key != beacon.key() {
                return Err(RegistryError::KeyMismatch {
                    key: *key,
                    found: beacon.key(),
                });
            }
        }
        Ok(())
    }
}

impl Default for BeaconDocument {
    fn default() -> Self {
        BeaconDocument {
            uuid: None,
            beacons: BTreeMap::new(),
            path_loss_exponent: DEFAULT_PATH_LOSS_EXPONENT,
            measured_power: DEFAULT_MEASURED_POWER,
            updated_at: None,
        }
    }
}

/// 信标注册表接口
pub trait BeaconRepository: Send + Sync {
    /// 一致性快照（信标与模型常量来自同一次读取）
    fn snapshot(&self) -> Result<BeaconDocument, RegistryError>;

    fn get(&self, key: BeaconKey) -> Result<Option<Beacon>, RegistryError>;

    /// 按 (major, minor) 插入或覆盖
    fn upsert(&self, beacon: Beacon) -> Result<(), RegistryError>;

    /// 删除信标，返回是否存在过
    fn delete(&self, key: BeaconKey) -> Result<bool, RegistryError>;

    fn set_uuid(&self, uuid: Option<String>) -> Result<(), RegistryError>;

    fn set_model(&self, model: PathLossModel) -> Result<(), RegistryError>;

    /// 所有信标，按 (major, minor) 排序
    fn all(&self) -> Result<Vec<Beacon>, RegistryError> {
        Ok(self.snapshot()?.beacons.into_values().collect())
    }

    fn model(&self) -> Result<PathLossModel, RegistryError> {
        Ok(self.snapshot()?.model())
    }
}

fn read_lock(
    lock: &RwLock<BeaconDocument>,
) -> Result<RwLockReadGuard<'_, BeaconDocument>, RegistryError> {
    lock.read().map_err(|_| RegistryError::Poisoned)
}

fn write_lock(
    lock: &RwLock<BeaconDocument>,
) -> Result<RwLockWriteGuard<'_, BeaconDocument>, RegistryError> {
    lock.write().map_err(|_| RegistryError::Poisoned)
}

// ============================================================================
// 内存实现
// ============================================================================

/// 内存注册表
#[derive(Debug, Default)]
pub struct InMemoryBeaconRepository {
    doc: RwLock<BeaconDocument>,
}

impl InMemoryBeaconRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(doc: BeaconDocument) -> Result<Self, RegistryError> {
        doc.check()?;
        Ok(InMemoryBeaconRepository {
            doc: RwLock::new(doc),
        })
    }

    /// 从信标向量创建
    pub fn from_beacons(beacons: impl IntoIterator<Item = Beacon>) -> Self {
        let mut doc = BeaconDocument::default();
        for beacon in beacons {
            doc.beacons.insert(beacon.key(), beacon);
        }
        InMemoryBeaconRepository {
            doc: RwLock::new(doc),
        }
    }
}

impl BeaconRepository for InMemoryBeaconRepository {
    fn snapshot(&self) -> Result<BeaconDocument, RegistryError> {
        Ok(read_lock(&self.doc)?.clone())
    }

    fn get(&self, key: BeaconKey) -> Result<Option<Beacon>, RegistryError> {
        Ok(read_lock(&self.doc)?.beacons.get(&key).cloned())
    }

    fn upsert(&self, beacon: Beacon) -> Result<(), RegistryError> {
        let mut doc = write_lock(&self.doc)?;
        doc.beacons.insert(beacon.key(), beacon);
        doc.updated_at = Some(Utc::now());
        Ok(())
    }

    fn delete(&self, key: BeaconKey) -> Result<bool, RegistryError> {
        let mut doc = write_lock(&self.doc)?;
        let existed = doc.beacons.remove(&key).is_some();
        if existed {
            doc.updated_at = Some(Utc::now());
        }
        Ok(existed)
    }

    fn set_uuid(&self, uuid: Option<String>) -> Result<(), RegistryError> {
        let mut doc = write_lock(&self.doc)?;
        doc.uuid = uuid;
        doc.updated_at = Some(Utc::now());
        Ok(())
    }

    fn set_model(&self, model: PathLossModel) -> Result<(), RegistryError> {
        let mut doc = write_lock(&self.doc)?;
        doc.measured_power = model.measured_power;
        doc.path_loss_exponent = model.path_loss_exponent;
        doc.updated_at = Some(Utc::now());
        Ok(())
    }
}

// ============================================================================
// JSON 文件实现
// ============================================================================

/// 以 JSON 文件持久化的注册表
///
/// 启动时读取一次文件；每次写操作先写入临时文件再原子替换，
/// 落盘成功后才更新内存中的文档。
#[derive(Debug)]
pub struct JsonFileBeaconRepository {
    path: PathBuf,
    doc: RwLock<BeaconDocument>,
}

impl JsonFileBeaconRepository {
    /// 打开注册表文件，文件不存在时从空文档开始
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let doc = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let doc: BeaconDocument = serde_json::from_str(&raw)?;
            doc.check()?;
            debug!(path = %path.display(), beacons = doc.beacons.len(), "loaded beacon registry");
            doc
        } else {
            debug!(path = %path.display(), "beacon registry not found, starting empty");
            BeaconDocument::default()
        };
        Ok(JsonFileBeaconRepository {
            path,
            doc: RwLock::new(doc),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 在文档副本上执行修改并落盘，成功后替换内存文档
    fn mutate<T>(&self, op: impl FnOnce(&mut BeaconDocument) -> T) -> Result<T, RegistryError> {
        let mut guard = write_lock(&self.doc)?;
        let mut next = guard.clone();
        let out = op(&mut next);
        next.updated_at = Some(Utc::now());
        save_document(&self.path, &next)?;
        *guard = next;
        Ok(out)
    }
}

fn save_document(path: &Path, doc: &BeaconDocument) -> Result<(), RegistryError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let temp_file = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(&temp_file);
        serde_json::to_writer_pretty(&mut writer, doc)?;
        writer.flush()?;
    }
    temp_file.persist(path).map_err(|e| RegistryError::Io(e.error))?;
    Ok(())
}

impl BeaconRepository for JsonFileBeaconRepository {
    fn snapshot(&self) -> Result<BeaconDocument, RegistryError> {
        Ok(read_lock(&self.doc)?.clone())
    }

    fn get(&self, key: BeaconKey) -> Result<Option<Beacon>, RegistryError> {
        Ok(read_lock(&self.doc)?.beacons.get(&key).cloned())
    }

    fn upsert(&self, beacon: Beacon) -> Result<(), RegistryError> {
        let key = beacon.key();
        self.mutate(|doc| {
            doc.beacons.insert(key, beacon);
        })?;
        info!(beacon = %key, path = %self.path.display(), "beacon registry saved");
        Ok(())
    }

    fn delete(&self, key: BeaconKey) -> Result<bool, RegistryError> {
        if read_lock(&self.doc)?.beacons.get(&key).is_none() {
            return Ok(false);
        }
        self.mutate(|doc| doc.beacons.remove(&key).is_some())
    }

    fn set_uuid(&self, uuid: Option<String>) -> Result<(), RegistryError> {
        self.mutate(|doc| doc.uuid = uuid)
    }

    fn set_model(&self, model: PathLossModel) -> Result<(), RegistryError> {
        self.mutate(|doc| {
            doc.measured_power = model.measured_power;
            doc.path_loss_exponent = model.path_loss_exponent;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_upsert_overwrites() {
        let repo = InMemoryBeaconRepository::new();
        repo.upsert(Beacon::new(1, 1, "old", 0.0, 0.0)).unwrap();
        repo.upsert(Beacon::new(1, 1, "new", 5.0, 5.0)).unwrap();

        let all = repo.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "new");
    }

    #[test]
    fn test_in_memory_delete_absent_is_noop() {
        let repo = InMemoryBeaconRepository::new();
        assert!(!repo.delete(BeaconKey::new(9, 9)).unwrap());
        repo.upsert(Beacon::new(9, 9, "b", 0.0, 0.0)).unwrap();
        assert!(repo.delete(BeaconKey::new(9, 9)).unwrap());
        assert!(repo.get(BeaconKey::new(9, 9)).unwrap().is_none());
    }

    #[test]
    fn test_document_json_keys() {
        let mut doc = BeaconDocument::default();
        let beacon = Beacon::new(3, 4, "door", 1.0, 2.0);
        doc.beacons.insert(beacon.key(), beacon);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["beacons"]["3:4"]["floor_x"], 1.0);
        assert_eq!(json["measured_power"], -59.0);

        let back: BeaconDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_document_defaults() {
        let doc: BeaconDocument = serde_json::from_str("{}").unwrap();
        assert_eq!(doc.model(), PathLossModel::default());
        assert!(doc.beacons.is_empty());
    }

    #[test]
    fn test_invalid_model_rejected() {
        let doc = BeaconDocument {
            path_loss_exponent: 0.0,
            ..BeaconDocument::default()
        };
        assert!(matches!(
            InMemoryBeaconRepository::with_document(doc),
            Err(RegistryError::InvalidModel(_))
        ));

        let doc = BeaconDocument {
            measured_power: 12.0,
            ..BeaconDocument::default()
        };
        assert!(matches!(
            InMemoryBeaconRepository::with_document(doc),
            Err(RegistryError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_key_mismatch_rejected() {
        let mut doc = BeaconDocument::default();
        doc.beacons
            .insert(BeaconKey::new(1, 1), Beacon::new(2, 2, "wrong", 0.0, 0.0));
        assert!(matches!(
            InMemoryBeaconRepository::with_document(doc),
            Err(RegistryError::KeyMismatch { .. })
        ));
    }
}
