//! 定位算法模块
//!
//! 该模块提供室内信标定位的基础构件：
//! - 信标与读数定义
//! - RSSI 到距离的路径损耗模型
//! - 多种定位算法（最近信标、加权平均、最小二乘三边定位、加权质心）
//! - 平面坐标到经纬度的映射

pub mod beacon;
pub mod geo;
pub mod location_algorithms;
pub mod results;
pub mod rssi_model;

pub use beacon::*;
pub use geo::*;
pub use location_algorithms::*;
pub use results::*;
pub use rssi_model::*;
