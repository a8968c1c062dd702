//! 多种定位算法实现
//!
//! 支持：
//! - 单信标最近位置
//! - 双信标距离反比加权
//! - 三个及以上信标的加权最小二乘三边定位
//! - 方程组奇异时的加权质心回退

use tracing::warn;

use crate::algorithms::{BeaconKey, LocationResult, PositionMethod};

/// 三边定位最多使用的信标数（按信号强度取前 N 个）
pub const MAX_TRILATERATION_BEACONS: usize = 4;

/// 正规方程行列式相对容差，低于此值视为奇异（如信标共线）
const SINGULAR_TOLERANCE: f64 = 1e-10;

// ============================================================================
// 测距数据结构
// ============================================================================

/// 已匹配到注册信标并换算出距离的读数
#[derive(Clone, Debug, PartialEq)]
pub struct RangedBeacon {
    pub key: BeaconKey,
    pub x: f64,
    pub y: f64,
    pub rssi: f64,
    /// 由 RSSI 估计的距离
    pub distance: f64,
}

impl RangedBeacon {
    pub fn new(key: BeaconKey, x: f64, y: f64, rssi: f64, distance: f64) -> Self {
        RangedBeacon {
            key,
            x,
            y,
            rssi,
            distance,
        }
    }
}

// ============================================================================
// 定位算法集合
// ============================================================================

/// 定位算法集合
pub struct LocationAlgorithm;

impl LocationAlgorithm {
    /// 按匹配到的信标数量选择算法
    ///
    /// - 0 个：None
    /// - 1 个：信标自身位置
    /// - 2 个：加权平均
    /// - 3 个及以上：最强的 4 个做最小二乘，奇异时回退到加权质心
    pub fn locate(mut ranged: Vec<RangedBeacon>) -> Option<LocationResult> {
        match ranged.len() {
            0 => None,
            1 => Some(Self::nearest_beacon(&ranged[0])),
            2 => Self::two_beacon_weighted(&ranged),
            _ => {
                sort_strongest_first(&mut ranged);
                ranged.truncate(MAX_TRILATERATION_BEACONS);
                Self::trilateration_least_squares(&ranged).or_else(|| {
                    warn!(
                        beacons = ranged.len(),
                        "trilateration system is singular, falling back to weighted centroid"
                    );
                    Self::weighted_centroid(&ranged)
                })
            }
        }
    }

    /// 单信标：返回信标位置，误差取距离的两倍
    pub fn nearest_beacon(beacon: &RangedBeacon) -> LocationResult {
        LocationResult::new(
            beacon.x,
            beacon.y,
            beacon.distance * 2.0,
            PositionMethod::NearestBeacon,
            1,
        )
    }

    /// 双信标：按距离反比加权平均（距离越近权重越大）
    pub fn two_beacon_weighted(ranged: &[RangedBeacon]) -> Option<LocationResult> {
        if ranged.is_empty() {
            return None;
        }
        let weights: Vec<f64> = ranged.iter().map(|b| 1.0 / b.distance.max(0.1)).collect();
        let (x, y) = weighted_mean(ranged, &weights)?;
        let accuracy = ranged.iter().map(|b| b.distance).sum::<f64>() / ranged.len() as f64;

        Some(LocationResult::new(
            x,
            y,
            accuracy,
            PositionMethod::TwoBeaconWeighted,
            ranged.len(),
        ))
    }

    /// 加权最小二乘三边定位
    ///
    /// 以第一个信标为参考，将圆方程两两相减线性化：
    /// 2(Bi - B1)·P = r1² - ri² + |Bi|² - |B1|²，
    /// 每行按 1/max(0.1, ri) 加权后求解 2x2 正规方程。
    /// 少于 3 个信标或方程组奇异时返回 None。
    pub fn trilateration_least_squares(ranged: &[RangedBeacon]) -> Option<LocationResult> {
        if ranged.len() < 3 {
            return None;
        }

        let reference = &ranged[0];
        let (x1, y1, r1) = (reference.x, reference.y, reference.distance);

        let mut ata = [[0.0_f64; 2]; 2];
        let mut atb = [0.0_f64; 2];

        for beacon in &ranged[1..] {
            let (xi, yi, ri) = (beacon.x, beacon.y, beacon.distance);
            let weight = 1.0 / ri.max(0.1);

            let row = [2.0 * (xi - x1), 2.0 * (yi - y1)];
            let rhs = (r1 * r1 - ri * ri) + (xi * xi - x1 * x1) + (yi * yi - y1 * y1);

            ata[0][0] += weight * row[0] * row[0];
            ata[0][1] += weight * row[0] * row[1];
            ata[1][0] += weight * row[1] * row[0];
            ata[1][1] += weight * row[1] * row[1];
            atb[0] += weight * row[0] * rhs;
            atb[1] += weight * row[1] * rhs;
        }

        let (x, y) = solve_2x2(ata, atb)?;
        let accuracy = mean_residual(ranged, x, y);

        Some(LocationResult::new(
            x,
            y,
            accuracy,
            PositionMethod::Trilateration,
            ranged.len(),
        ))
    }

    /// 加权质心：权重为距离平方的倒数
    pub fn weighted_centroid(ranged: &[RangedBeacon]) -> Option<LocationResult> {
        if ranged.is_empty() {
            return None;
        }
        let weights: Vec<f64> = ranged
            .iter()
            .map(|b| 1.0 / (b.distance * b.distance).max(0.01))
            .collect();
        let (x, y) = weighted_mean(ranged, &weights)?;
        let accuracy = ranged.iter().map(|b| b.distance).sum::<f64>() / ranged.len() as f64;

        Some(LocationResult::new(
            x,
            y,
            accuracy,
            PositionMethod::WeightedCentroid,
            ranged.len(),
        ))
    }
}

// ============================================================================
// 辅助函数
// ============================================================================

/// 信号最强的排前面；RSSI 相同时按标识排序，保证结果确定
fn sort_strongest_first(ranged: &mut [RangedBeacon]) {
    ranged.sort_by(|a, b| b.rssi.total_cmp(&a.rssi).then_with(|| a.key.cmp(&b.key)));
}

fn weighted_mean(ranged: &[RangedBeacon], weights: &[f64]) -> Option<(f64, f64)> {
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) || !total.is_finite() {
        return None;
    }
    let x = ranged.iter().zip(weights).map(|(b, w)| b.x * w).sum::<f64>() / total;
    let y = ranged.iter().zip(weights).map(|(b, w)| b.y * w).sum::<f64>() / total;
    Some((x, y))
}

/// 克莱姆法则求解 2x2 方程组，行列式相对过小或解非有限时返回 None
fn solve_2x2(a: [[f64; 2]; 2], b: [f64; 2]) -> Option<(f64, f64)> {
    let det = a[0][0] * a[1][1] - a[0][1] * a[1][0];
    let scale = a[0][0] * a[1][1];
    if det.abs() <= SINGULAR_TOLERANCE * scale.abs() || det == 0.0 {
        return None;
    }

    let x = (a[1][1] * b[0] - a[0][1] * b[1]) / det;
    let y = (a[0][0] * b[1] - a[1][0] * b[0]) / det;
    if x.is_finite() && y.is_finite() {
        Some((x, y))
    } else {
        None
    }
}

/// 平均距离残差 |‖P - Bi‖ - di|
fn mean_residual(ranged: &[RangedBeacon], x: f64, y: f64) -> f64 {
    if ranged.is_empty() {
        return 0.0;
    }
    let total: f64 = ranged
        .iter()
        .map(|b| {
            let calculated = ((x - b.x).powi(2) + (y - b.y).powi(2)).sqrt();
            (calculated - b.distance).abs()
        })
        .sum();
    total / ranged.len() as f64
}
