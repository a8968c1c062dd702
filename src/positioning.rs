//! 蓝牙信标室内定位服务
//!
//! 支持的功能：
//! - 信标注册 / 删除（按 major:minor 覆盖写入）
//! - RSSI 转距离计算
//! - 根据一批读数计算平面位置（最近信标、加权平均、最小二乘三边定位）
//! - 导出扫描端配置与部署状态

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::algorithms::{
    Beacon, BeaconKey, BeaconReading, GeoReference, LocationAlgorithm, LocationResult,
    PathLossModel, RangedBeacon,
};
use crate::error::{PositioningError, ValidationError};
use crate::registry::BeaconRepository;

/// 三边定位所需的最少信标数
pub const MIN_TRIANGULATION_BEACONS: usize = 3;
/// 推荐部署的信标数
pub const RECOMMENDED_BEACONS: usize = 4;

static UUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("静态正则表达式")
});

/// 扫描端使用的模型常量
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScannerConstants {
    pub measured_power: f64,
    pub path_loss_exponent: f64,
}

/// 导出给扫描端的配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    pub uuid: Option<String>,
    pub beacons: Vec<Beacon>,
    pub constants: ScannerConstants,
}

/// 部署状态
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetupStatus {
    /// 已注册信标数
    pub count: usize,
    /// 至少一个信标即可给出位置
    pub ready: bool,
    /// 至少三个信标才能三边定位
    pub is_configured: bool,
    pub has_uuid: bool,
    pub uuid: Option<String>,
    pub recommended_count: usize,
    pub message: String,
}

/// 信标定位服务
///
/// 服务本身无状态，所有信标与模型常量都来自注入的注册表；
/// 每次定位只读取一次快照。
pub struct BeaconPositioningService<R> {
    repository: Arc<R>,
}

impl<R> Clone for BeaconPositioningService<R> {
    fn clone(&self) -> Self {
        BeaconPositioningService {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: BeaconRepository> BeaconPositioningService<R> {
    pub fn new(repository: R) -> Self {
        Self::with_shared(Arc::new(repository))
    }

    pub fn with_shared(repository: Arc<R>) -> Self {
        BeaconPositioningService { repository }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// 在已知位置注册信标，已存在时覆盖
    #[allow(clippy::too_many_arguments)]
    pub fn register_beacon(
        &self,
        major: u16,
        minor: u16,
        name: &str,
        floor_x: f64,
        floor_y: f64,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Result<(), PositioningError> {
        let mut beacon = Beacon::new(major, minor, name.trim(), floor_x, floor_y);
        beacon.lat = lat;
        beacon.lon = lon;
        beacon.validate()?;

        let key = beacon.key();
        self.repository.upsert(beacon)?;
        info!(beacon = %key, name, floor_x, floor_y, "beacon registered");
        Ok(())
    }

    /// 删除信标，不存在时无操作
    pub fn remove_beacon(&self, major: u16, minor: u16) -> Result<(), PositioningError> {
        let key = BeaconKey::new(major, minor);
        if self.repository.delete(key)? {
            info!(beacon = %key, "beacon removed");
        } else {
            debug!(beacon = %key, "remove requested for unknown beacon");
        }
        Ok(())
    }

    pub fn beacon(&self, major: u16, minor: u16) -> Result<Option<Beacon>, PositioningError> {
        Ok(self.repository.get(BeaconKey::new(major, minor))?)
    }

    pub fn beacons(&self) -> Result<Vec<Beacon>, PositioningError> {
        Ok(self.repository.all()?)
    }

    /// 设置期望的 iBeacon UUID（统一转为小写）
    pub fn set_uuid(&self, uuid: &str) -> Result<(), PositioningError> {
        let normalized = uuid.trim().to_lowercase();
        if !UUID_PATTERN.is_match(&normalized) {
            return Err(ValidationError::InvalidUuid(uuid.to_string()).into());
        }
        self.repository.set_uuid(Some(normalized))?;
        Ok(())
    }

    /// 调整路径损耗模型常量
    pub fn set_model(&self, model: PathLossModel) -> Result<(), PositioningError> {
        model.validate()?;
        self.repository.set_model(model)?;
        info!(%model, "path loss model updated");
        Ok(())
    }

    /// RSSI 转距离（使用注册表中的模型常量）
    pub fn rssi_to_distance(
        &self,
        rssi: f64,
        tx_power: Option<f64>,
    ) -> Result<f64, PositioningError> {
        Ok(self.repository.model()?.rssi_to_distance(rssi, tx_power))
    }

    /// 根据一批读数计算位置
    ///
    /// 未注册的信标被忽略且不做校验；匹配到的读数必须有效。
    /// 没有任何读数匹配时返回 `Ok(None)`。
    /// 同一信标出现多次时取信号最强的一次。
    pub fn calculate_position(
        &self,
        readings: &[BeaconReading],
    ) -> Result<Option<LocationResult>, PositioningError> {
        let snapshot = self.repository.snapshot()?;
        let model = snapshot.model();

        let mut matched: BTreeMap<BeaconKey, RangedBeacon> = BTreeMap::new();
        for reading in readings {
            let key = reading.key();
            let Some(beacon) = snapshot.beacons.get(&key) else {
                debug!(beacon = %key, rssi = reading.rssi, "ignoring unregistered beacon");
                continue;
            };
            reading.validate()?;
            if matched.get(&key).is_some_and(|prev| prev.rssi >= reading.rssi) {
                continue;
            }
            let distance = model.rssi_to_distance(reading.rssi, reading.tx_power);
            matched.insert(
                key,
                RangedBeacon::new(key, beacon.floor_x, beacon.floor_y, reading.rssi, distance),
            );
        }

        let Some(mut result) = LocationAlgorithm::locate(matched.into_values().collect()) else {
            debug!(readings = readings.len(), "no registered beacons detected");
            return Ok(None);
        };

        if let Some(reference) = GeoReference::from_beacons(snapshot.beacons.values()) {
            let (lat, lon) = reference.project(result.x, result.y);
            result = result.with_geo(lat, lon);
        }

        debug!(
            x = result.x,
            y = result.y,
            method = %result.method,
            beacons = result.beacon_count,
            "position calculated"
        );
        Ok(Some(result))
    }

    /// 扫描端配置
    pub fn js_config(&self) -> Result<ScannerConfig, PositioningError> {
        let snapshot = self.repository.snapshot()?;
        Ok(ScannerConfig {
            uuid: snapshot.uuid,
            constants: ScannerConstants {
                measured_power: snapshot.measured_power,
                path_loss_exponent: snapshot.path_loss_exponent,
            },
            beacons: snapshot.beacons.into_values().collect(),
        })
    }

    /// 部署状态
    pub fn setup_status(&self) -> Result<SetupStatus, PositioningError> {
        let snapshot = self.repository.snapshot()?;
        let count = snapshot.beacons.len();
        let message = match count {
            0 => "No beacons configured. Add your 4 iBeacons to get started.".to_string(),
            n if n < MIN_TRIANGULATION_BEACONS => format!(
                "Need {} more beacon(s) for triangulation.",
                MIN_TRIANGULATION_BEACONS - n
            ),
            MIN_TRIANGULATION_BEACONS => {
                "Minimum beacons configured. Consider adding a 4th for better accuracy.".to_string()
            }
            n => format!("Excellent! {n} beacons configured for accurate positioning."),
        };

        Ok(SetupStatus {
            count,
            ready: count >= 1,
            is_configured: count >= MIN_TRIANGULATION_BEACONS,
            has_uuid: snapshot.uuid.as_deref().is_some_and(|u| !u.is_empty()),
            uuid: snapshot.uuid,
            recommended_count: RECOMMENDED_BEACONS,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::PositionMethod;
    use crate::registry::InMemoryBeaconRepository;

    fn service() -> BeaconPositioningService<InMemoryBeaconRepository> {
        BeaconPositioningService::new(InMemoryBeaconRepository::new())
    }

    #[test]
    fn test_register_validates() {
        let svc = service();
        assert!(matches!(
            svc.register_beacon(1, 1, "", 0.0, 0.0, None, None),
            Err(PositioningError::Validation(ValidationError::EmptyName))
        ));
        assert!(svc.beacons().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_readings_keep_strongest() {
        let svc = service();
        svc.register_beacon(1, 1, "A", 4.0, 4.0, None, None).unwrap();
        let result = svc
            .calculate_position(&[
                BeaconReading::new(1, 1, -80.0),
                BeaconReading::new(1, 1, -59.0),
                BeaconReading::new(1, 1, -70.0),
            ])
            .unwrap()
            .unwrap();
        assert_eq!(result.method, PositionMethod::NearestBeacon);
        assert_eq!(result.beacon_count, 1);
        // -59 dBm 对应 1 米
        assert!((result.accuracy - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_reading_is_rejected() {
        let svc = service();
        svc.register_beacon(1, 1, "A", 0.0, 0.0, None, None).unwrap();
        let err = svc
            .calculate_position(&[
                BeaconReading::new(1, 1, -70.0),
                BeaconReading::new(1, 1, 12.0),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            PositioningError::Validation(ValidationError::InvalidRssi(_))
        ));
    }

    #[test]
    fn test_unregistered_invalid_reading_is_ignored() {
        let svc = service();
        svc.register_beacon(1, 1, "A", 2.0, 3.0, None, None).unwrap();

        let stray = BeaconReading::new(9, 9, 12.0);
        assert!(svc.calculate_position(&[stray.clone()]).unwrap().is_none());

        let result = svc
            .calculate_position(&[stray, BeaconReading::new(1, 1, -65.0)])
            .unwrap()
            .unwrap();
        assert_eq!(result.method, PositionMethod::NearestBeacon);
        assert_eq!((result.x, result.y), (2.0, 3.0));
    }

    #[test]
    fn test_set_uuid_normalizes() {
        let svc = service();
        svc.set_uuid("E2C56DB5-DFFB-48D2-B060-D0F5A71096E0").unwrap();
        let status = svc.setup_status().unwrap();
        assert!(status.has_uuid);
        assert_eq!(
            status.uuid.as_deref(),
            Some("e2c56db5-dffb-48d2-b060-d0f5a71096e0")
        );
        assert!(svc.set_uuid("not-a-uuid").is_err());
    }

    #[test]
    fn test_setup_status_messages() {
        let svc = service();
        let status = svc.setup_status().unwrap();
        assert_eq!(status.count, 0);
        assert!(!status.ready);
        assert!(status.message.starts_with("No beacons"));

        svc.register_beacon(1, 1, "A", 0.0, 0.0, None, None).unwrap();
        let status = svc.setup_status().unwrap();
        assert!(status.ready);
        assert!(!status.is_configured);
        assert_eq!(status.message, "Need 2 more beacon(s) for triangulation.");

        svc.register_beacon(1, 2, "B", 10.0, 0.0, None, None).unwrap();
        svc.register_beacon(1, 3, "C", 0.0, 10.0, None, None).unwrap();
        assert!(svc.setup_status().unwrap().is_configured);
        assert!(svc.setup_status().unwrap().message.starts_with("Minimum"));

        svc.register_beacon(1, 4, "D", 10.0, 10.0, None, None).unwrap();
        assert_eq!(
            svc.setup_status().unwrap().message,
            "Excellent! 4 beacons configured for accurate positioning."
        );
    }

    #[test]
    fn test_geo_projection_attached() {
        let svc = service();
        svc.register_beacon(1, 1, "A", 0.0, 0.0, Some(45.0), Some(9.0)).unwrap();
        svc.register_beacon(1, 2, "B", 10.0, 0.0, Some(45.0), Some(9.001)).unwrap();
        svc.register_beacon(1, 3, "C", 0.0, 10.0, Some(44.999), Some(9.0)).unwrap();

        let result = svc
            .calculate_position(&[BeaconReading::new(1, 2, -60.0)])
            .unwrap()
            .unwrap();
        assert_eq!(result.xy(), (10.0, 0.0));
        assert!((result.lat.unwrap() - 45.0).abs() < 1e-9);
        assert!((result.lon.unwrap() - 9.001).abs() < 1e-9);
    }

    #[test]
    fn test_js_config_exports_constants() {
        let svc = service();
        svc.register_beacon(2, 7, "Saw", 1.0, 1.0, None, None).unwrap();
        svc.set_model(PathLossModel::log_distance(-62.0, 3.0)).unwrap();
        let config = svc.js_config().unwrap();
        assert_eq!(config.beacons.len(), 1);
        assert_eq!(config.constants.measured_power, -62.0);
        assert_eq!(config.constants.path_loss_exponent, 3.0);
        assert!(svc.set_model(PathLossModel::log_distance(-62.0, -1.0)).is_err());
    }
}
