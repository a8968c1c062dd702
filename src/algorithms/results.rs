//! 定位结果数据结构
//!
//! 包含定位输出的坐标、精度估计和所用算法

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 产生定位结果的算法
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMethod {
    /// 仅一个信标：直接使用信标位置
    NearestBeacon,
    /// 两个信标：按距离反比加权平均
    TwoBeaconWeighted,
    /// 三个及以上信标：加权最小二乘三边定位
    Trilateration,
    /// 线性方程组奇异时的加权质心回退
    WeightedCentroid,
}

impl PositionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionMethod::NearestBeacon => "nearest_beacon",
            PositionMethod::TwoBeaconWeighted => "two_beacon_weighted",
            PositionMethod::Trilateration => "trilateration",
            PositionMethod::WeightedCentroid => "weighted_centroid",
        }
    }
}

impl fmt::Display for PositionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 定位结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationResult {
    /// 平面图 X 坐标
    pub x: f64,
    /// 平面图 Y 坐标
    pub y: f64,
    /// 由地理锚点映射得到的纬度
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    /// 由地理锚点映射得到的经度
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    /// 估计误差（与信标坐标单位一致）
    pub accuracy: f64,
    /// 使用的算法
    pub method: PositionMethod,
    /// 参与定位的信标数量
    pub beacon_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl LocationResult {
    /// 创建新的定位结果
    pub fn new(x: f64, y: f64, accuracy: f64, method: PositionMethod, beacon_count: usize) -> Self {
        LocationResult {
            x,
            y,
            lat: None,
            lon: None,
            accuracy,
            method,
            beacon_count,
            timestamp: Utc::now(),
        }
    }

    /// 附加地理坐标
    pub fn with_geo(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    /// 获取 2D 坐标
    pub fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// 与某点的平面距离
    pub fn distance_to_point(&self, x: f64, y: f64) -> f64 {
        let dx = self.x - x;
        let dy = self.y - y;
        (dx * dx + dy * dy).sqrt()
    }

    /// 获取详细描述
    pub fn detailed_description(&self) -> String {
        format!(
            "位置: ({:.2}, {:.2}), 精度: ±{:.2}, 方法: {}, 信标数: {}",
            self.x, self.y, self.accuracy, self.method, self.beacon_count
        )
    }
}

impl fmt::Display for LocationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}) ±{:.2} [{}]", self.x, self.y, self.accuracy, self.method)
    }
}
