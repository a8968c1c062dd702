//! 平面图坐标到经纬度的映射
//!
//! 以带经纬度的注册信标作为锚点：
//! - 3 个及以上不共线锚点：最小二乘仿射拟合
//! - 2 个锚点（或锚点共线）：按 X→经度、Y→纬度 分轴比例映射

use crate::algorithms::Beacon;

const SINGULAR_TOLERANCE: f64 = 1e-12;

/// 平面坐标与经纬度的对应点
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoAnchor {
    pub x: f64,
    pub y: f64,
    pub lat: f64,
    pub lon: f64,
}

/// 仿射映射：value = c0 + c1 * x + c2 * y
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoReference {
    lat: [f64; 3],
    lon: [f64; 3],
}

impl GeoReference {
    /// 从信标集合中收集锚点并拟合，锚点不足时返回 None
    pub fn from_beacons<'a>(beacons: impl IntoIterator<Item = &'a Beacon>) -> Option<Self> {
        let anchors: Vec<GeoAnchor> = beacons
            .into_iter()
            .filter_map(|b| {
                b.geo().map(|(lat, lon)| GeoAnchor {
                    x: b.floor_x,
                    y: b.floor_y,
                    lat,
                    lon,
                })
            })
            .collect();
        Self::fit(&anchors)
    }

    pub fn fit(anchors: &[GeoAnchor]) -> Option<Self> {
        if anchors.len() >= 3 {
            if let Some(reference) = Self::fit_affine(anchors) {
                return Some(reference);
            }
        }
        Self::fit_proportional(anchors)
    }

    /// 将平面坐标映射为 (lat, lon)
    pub fn project(&self, x: f64, y: f64) -> (f64, f64) {
        let eval = |c: &[f64; 3]| c[0] + c[1] * x + c[2] * y;
        (eval(&self.lat), eval(&self.lon))
    }

    fn fit_affine(anchors: &[GeoAnchor]) -> Option<Self> {
        let mut m = [[0.0_f64; 3]; 3];
        let mut v_lat = [0.0_f64; 3];
        let mut v_lon = [0.0_f64; 3];

        for a in anchors {
            let row = [1.0, a.x, a.y];
            for i in 0..3 {
                for j in 0..3 {
                    m[i][j] += row[i] * row[j];
                }
                v_lat[i] += row[i] * a.lat;
                v_lon[i] += row[i] * a.lon;
            }
        }

        Some(GeoReference {
            lat: solve_3x3(m, v_lat)?,
            lon: solve_3x3(m, v_lon)?,
        })
    }

    /// 在锚点中找到 X、Y 都不同的第一对，做分轴比例映射
    fn fit_proportional(anchors: &[GeoAnchor]) -> Option<Self> {
        for (i, a) in anchors.iter().enumerate() {
            for b in &anchors[i + 1..] {
                let dx = b.x - a.x;
                let dy = b.y - a.y;
                if dx.abs() < f64::EPSILON || dy.abs() < f64::EPSILON {
                    continue;
                }
                let lon_per_x = (b.lon - a.lon) / dx;
                let lat_per_y = (b.lat - a.lat) / dy;
                return Some(GeoReference {
                    lat: [a.lat - a.y * lat_per_y, 0.0, lat_per_y],
                    lon: [a.lon - a.x * lon_per_x, lon_per_x, 0.0],
                });
            }
        }
        None
    }
}

fn det3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// 克莱姆法则求解 3x3 方程组
fn solve_3x3(m: [[f64; 3]; 3], v: [f64; 3]) -> Option<[f64; 3]> {
    let det = det3(&m);
    let scale = m[0][0] * m[1][1] * m[2][2];
    if det == 0.0 || det.abs() <= SINGULAR_TOLERANCE * scale.abs() {
        return None;
    }

    let mut out = [0.0_f64; 3];
    for (col, slot) in out.iter_mut().enumerate() {
        let mut replaced = m;
        for row in 0..3 {
            replaced[row][col] = v[row];
        }
        *slot = det3(&replaced) / det;
    }
    out.iter().all(|c| c.is_finite()).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(x: f64, y: f64, lat: f64, lon: f64) -> GeoAnchor {
        GeoAnchor { x, y, lat, lon }
    }

    #[test]
    fn test_affine_fit_interpolates() {
        let reference = GeoReference::fit(&[
            anchor(0.0, 0.0, 45.0, 9.0),
            anchor(10.0, 0.0, 45.0, 9.001),
            anchor(0.0, 10.0, 44.999, 9.0),
        ])
        .unwrap();
        let (lat, lon) = reference.project(5.0, 5.0);
        assert!((lat - 44.9995).abs() < 1e-9);
        assert!((lon - 9.0005).abs() < 1e-9);
    }

    #[test]
    fn test_two_anchor_proportional() {
        let reference = GeoReference::fit(&[
            anchor(0.0, 0.0, 45.0, 9.0),
            anchor(100.0, 50.0, 44.99, 9.02),
        ])
        .unwrap();
        let (lat, lon) = reference.project(50.0, 25.0);
        assert!((lat - 44.995).abs() < 1e-9);
        assert!((lon - 9.01).abs() < 1e-9);
    }

    #[test]
    fn test_collinear_anchors_use_proportional() {
        let reference = GeoReference::fit(&[
            anchor(0.0, 0.0, 45.0, 9.0),
            anchor(10.0, 10.0, 44.99, 9.01),
            anchor(20.0, 20.0, 44.98, 9.02),
        ])
        .unwrap();
        let (lat, lon) = reference.project(10.0, 10.0);
        assert!((lat - 44.99).abs() < 1e-9);
        assert!((lon - 9.01).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_anchors() {
        assert!(GeoReference::fit(&[]).is_none());
        assert!(GeoReference::fit(&[anchor(0.0, 0.0, 45.0, 9.0)]).is_none());
        // 同一 X 的两个锚点无法确定经度比例
        assert!(GeoReference::fit(&[
            anchor(0.0, 0.0, 45.0, 9.0),
            anchor(0.0, 5.0, 45.1, 9.0)
        ])
        .is_none());
    }
}
