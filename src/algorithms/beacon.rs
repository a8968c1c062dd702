//! 蓝牙信标定义和相关数据结构
//!
//! iBeacon 以 (major, minor) 唯一标识，注册表中以 "major:minor" 作为键。

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,10})\s*:\s*(\d{1,10})\s*$").expect("静态正则表达式")
});

/// 信标标识 (major, minor)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BeaconKey {
    pub major: u16,
    pub minor: u16,
}

impl BeaconKey {
    pub fn new(major: u16, minor: u16) -> Self {
        BeaconKey { major, minor }
    }

    /// 从更宽的整数构造（边界层输入），超出 u16 范围时返回校验错误
    pub fn from_wide(major: i64, minor: i64) -> Result<Self, ValidationError> {
        Ok(BeaconKey {
            major: narrow_identifier("major", major)?,
            minor: narrow_identifier("minor", minor)?,
        })
    }
}

fn narrow_identifier(field: &'static str, value: i64) -> Result<u16, ValidationError> {
    u16::try_from(value).map_err(|_| ValidationError::IdentifierOutOfRange { field, value })
}

impl fmt::Display for BeaconKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

impl FromStr for BeaconKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = KEY_PATTERN
            .captures(s)
            .ok_or_else(|| ValidationError::InvalidBeaconKey(s.to_string()))?;
        let parse = |idx: usize| -> Result<i64, ValidationError> {
            caps[idx]
                .parse::<i64>()
                .map_err(|_| ValidationError::InvalidBeaconKey(s.to_string()))
        };
        BeaconKey::from_wide(parse(1)?, parse(2)?)
    }
}

impl Serialize for BeaconKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BeaconKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// 已注册的固定信标
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Beacon {
    pub major: u16,
    pub minor: u16,
    /// 信标友好名称（如 "Front Door"）
    pub name: String,
    /// 平面图 X 坐标
    pub floor_x: f64,
    /// 平面图 Y 坐标
    pub floor_y: f64,
    /// 可选的参考纬度
    #[serde(default)]
    pub lat: Option<f64>,
    /// 可选的参考经度
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Beacon {
    /// 创建新的信标（无地理坐标）
    pub fn new(
        major: u16,
        minor: u16,
        name: impl Into<String>,
        floor_x: f64,
        floor_y: f64,
    ) -> Self {
        Beacon {
            major,
            minor,
            name: name.into(),
            floor_x,
            floor_y,
            lat: None,
            lon: None,
            created_at: Utc::now(),
        }
    }

    /// 附加地理锚点
    pub fn with_geo(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    pub fn key(&self) -> BeaconKey {
        BeaconKey::new(self.major, self.minor)
    }

    /// 获取信标的平面坐标
    pub fn coordinates(&self) -> (f64, f64) {
        (self.floor_x, self.floor_y)
    }

    /// 经纬度均存在时返回地理锚点
    pub fn geo(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lon)
    }

    /// 与另一信标的平面欧几里得距离
    pub fn distance_to(&self, other: &Beacon) -> f64 {
        let dx = self.floor_x - other.floor_x;
        let dy = self.floor_y - other.floor_y;
        (dx * dx + dy * dy).sqrt()
    }

    /// 校验名称、坐标与地理范围
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if !self.floor_x.is_finite() {
            return Err(ValidationError::NonFiniteCoordinate { field: "floor_x" });
        }
        if !self.floor_y.is_finite() {
            return Err(ValidationError::NonFiniteCoordinate { field: "floor_y" });
        }
        if let Some(lat) = self.lat {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(ValidationError::LatitudeOutOfRange(lat));
            }
        }
        if let Some(lon) = self.lon {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(ValidationError::LongitudeOutOfRange(lon));
            }
        }
        Ok(())
    }
}

/// 单次扫描得到的信号读数（不持久化）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeaconReading {
    pub major: u16,
    pub minor: u16,
    /// 信号强度 (dBm)
    pub rssi: f64,
    /// 1 米处的校准发射功率
    #[serde(rename = "txPower", default, skip_serializing_if = "Option::is_none")]
    pub tx_power: Option<f64>,
}

impl BeaconReading {
    pub fn new(major: u16, minor: u16, rssi: f64) -> Self {
        BeaconReading {
            major,
            minor,
            rssi,
            tx_power: None,
        }
    }

    pub fn with_tx_power(mut self, tx_power: f64) -> Self {
        self.tx_power = Some(tx_power);
        self
    }

    pub fn key(&self) -> BeaconKey {
        BeaconKey::new(self.major, self.minor)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.rssi.is_finite() || self.rssi > 0.0 {
            return Err(ValidationError::InvalidRssi(self.rssi));
        }
        match self.tx_power {
            Some(tx) if !tx.is_finite() => Err(ValidationError::InvalidTxPower(tx)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beacon_creation() {
        let beacon = Beacon::new(1, 2, "Front Door", 10.0, 20.0);
        assert_eq!(beacon.key(), BeaconKey::new(1, 2));
        assert_eq!(beacon.coordinates(), (10.0, 20.0));
        assert_eq!(beacon.geo(), None);
    }

    #[test]
    fn test_beacon_distance() {
        let b1 = Beacon::new(1, 1, "B1", 0.0, 0.0);
        let b2 = Beacon::new(1, 2, "B2", 3.0, 4.0);
        assert_eq!(b1.distance_to(&b2), 5.0);
    }

    #[test]
    fn test_key_display_and_parse() {
        let key = BeaconKey::new(100, 65535);
        assert_eq!(key.to_string(), "100:65535");
        assert_eq!("100:65535".parse::<BeaconKey>().unwrap(), key);
        assert_eq!(" 7 : 8 ".parse::<BeaconKey>().unwrap(), BeaconKey::new(7, 8));
    }

    #[test]
    fn test_key_rejects_out_of_range() {
        let err = "70000:1".parse::<BeaconKey>().unwrap_err();
        assert_eq!(
            err,
            ValidationError::IdentifierOutOfRange { field: "major", value: 70000 }
        );
        assert!(matches!(
            "abc".parse::<BeaconKey>(),
            Err(ValidationError::InvalidBeaconKey(_))
        ));
        assert!(BeaconKey::from_wide(1, -1).is_err());
    }

    #[test]
    fn test_beacon_validation() {
        assert_eq!(
            Beacon::new(1, 1, "  ", 0.0, 0.0).validate(),
            Err(ValidationError::EmptyName)
        );
        assert!(Beacon::new(1, 1, "B", f64::NAN, 0.0).validate().is_err());
        assert_eq!(
            Beacon::new(1, 1, "B", 0.0, 0.0).with_geo(91.0, 0.0).validate(),
            Err(ValidationError::LatitudeOutOfRange(91.0))
        );
        assert!(Beacon::new(1, 1, "B", 0.0, 0.0).with_geo(45.0, 9.0).validate().is_ok());
    }

    #[test]
    fn test_reading_validation() {
        assert!(BeaconReading::new(1, 1, -60.0).validate().is_ok());
        assert!(BeaconReading::new(1, 1, 0.0).validate().is_ok());
        assert_eq!(
            BeaconReading::new(1, 1, 5.0).validate(),
            Err(ValidationError::InvalidRssi(5.0))
        );
        assert!(BeaconReading::new(1, 1, -60.0)
            .with_tx_power(f64::INFINITY)
            .validate()
            .is_err());
    }

    #[test]
    fn test_reading_json_uses_tx_power_camel_case() {
        let reading: BeaconReading =
            serde_json::from_str(r#"{"major":1,"minor":2,"rssi":-70,"txPower":-62}"#).unwrap();
        assert_eq!(reading.tx_power, Some(-62.0));
        let reading: BeaconReading =
            serde_json::from_str(r#"{"major":1,"minor":2,"rssi":-70}"#).unwrap();
        assert_eq!(reading.tx_power, None);
    }
}
