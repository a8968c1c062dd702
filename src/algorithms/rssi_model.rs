//! RSSI 到距离转换模型
//!
//! 对数距离路径损耗模型：distance = 10 ^ ((txPower - RSSI) / (10 * n))

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// 默认 1 米处测量功率 (dBm)，多数 iBeacon 为 -59 ~ -65
pub const DEFAULT_MEASURED_POWER: f64 = -59.0;
/// 默认路径损耗指数：2.0 为自由空间，室内有遮挡时 2.5 ~ 4.0
pub const DEFAULT_PATH_LOSS_EXPONENT: f64 = 2.5;
/// 距离下限（同时作为无效读数的返回值）
pub const MIN_DISTANCE: f64 = 0.1;
/// 距离上限
pub const MAX_DISTANCE: f64 = 100.0;

/// 路径损耗模型参数
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathLossModel {
    /// 1 米处的参考功率 (dBm)，读数未携带 txPower 时使用
    pub measured_power: f64,
    /// 路径损耗指数 n
    pub path_loss_exponent: f64,
}

impl PathLossModel {
    /// 创建对数距离模型
    pub fn log_distance(measured_power: f64, path_loss_exponent: f64) -> Self {
        PathLossModel {
            measured_power,
            path_loss_exponent,
        }
    }

    /// 自由空间模型 (n = 2)
    pub fn free_space(measured_power: f64) -> Self {
        Self::log_distance(measured_power, 2.0)
    }

    /// 根据 RSSI 计算距离，结果限制在 [0.1, 100]
    ///
    /// `tx_power` 为读数自带的校准功率，缺省时使用 `measured_power`。
    /// 非负 RSSI 不是有效的接收功率，按最小距离处理。
    pub fn rssi_to_distance(&self, rssi: f64, tx_power: Option<f64>) -> f64 {
        if rssi >= 0.0 || !rssi.is_finite() {
            return MIN_DISTANCE;
        }
        let reference = tx_power.unwrap_or(self.measured_power);
        let exponent = (reference - rssi) / (10.0 * self.path_loss_exponent);
        10_f64.powf(exponent).clamp(MIN_DISTANCE, MAX_DISTANCE)
    }

    /// 根据距离反推 RSSI（用于仿真与标定）
    pub fn distance_to_rssi(&self, distance: f64, tx_power: Option<f64>) -> f64 {
        if distance <= 0.0 {
            return f64::NEG_INFINITY;
        }
        let reference = tx_power.unwrap_or(self.measured_power);
        reference - 10.0 * self.path_loss_exponent * distance.log10()
    }

    /// 验证模型参数的合理性
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.path_loss_exponent.is_finite() || self.path_loss_exponent <= 0.0 {
            return Err(ValidationError::InvalidPathLossModel(format!(
                "路径损耗指数应为正数: {}",
                self.path_loss_exponent
            )));
        }
        if !self.measured_power.is_finite() || self.measured_power > 0.0 {
            return Err(ValidationError::InvalidPathLossModel(format!(
                "参考功率应为非正的 dBm 值: {}",
                self.measured_power
            )));
        }
        Ok(())
    }

    /// 获取模型描述
    pub fn description(&self) -> String {
        format!(
            "路径损耗模型 - 参考功率={:.2} dBm, n={:.2}",
            self.measured_power, self.path_loss_exponent
        )
    }
}

impl Default for PathLossModel {
    fn default() -> Self {
        PathLossModel::log_distance(DEFAULT_MEASURED_POWER, DEFAULT_PATH_LOSS_EXPONENT)
    }
}

impl fmt::Display for PathLossModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_power_is_one_meter() {
        let model = PathLossModel::default();
        let d = model.rssi_to_distance(-59.0, None);
        assert!((d - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ten_meters_at_exponent_two() {
        let model = PathLossModel::free_space(-59.0);
        // 10^((-59 + 79) / 20) = 10
        let d = model.rssi_to_distance(-79.0, None);
        assert!((d - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_tx_power_overrides_measured_power() {
        let model = PathLossModel::default();
        let d = model.rssi_to_distance(-65.0, Some(-65.0));
        assert!((d - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_is_clamped() {
        let model = PathLossModel::default();
        assert_eq!(model.rssi_to_distance(-200.0, None), MAX_DISTANCE);
        assert_eq!(model.rssi_to_distance(-1.0, Some(-100.0)), MIN_DISTANCE);
        assert_eq!(model.rssi_to_distance(0.0, None), MIN_DISTANCE);
        assert_eq!(model.rssi_to_distance(3.0, None), MIN_DISTANCE);
    }

    #[test]
    fn test_distance_to_rssi_inverts() {
        let model = PathLossModel::default();
        let rssi = model.distance_to_rssi(7.5, None);
        assert!((model.rssi_to_distance(rssi, None) - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_validate() {
        assert!(PathLossModel::default().validate().is_ok());
        assert!(PathLossModel::log_distance(-59.0, 0.0).validate().is_err());
        assert!(PathLossModel::log_distance(10.0, 2.0).validate().is_err());
    }
}
