//! 门店信标定位与柜体复杂度评分

pub mod algorithms;
pub mod api;
pub mod complexity;
pub mod config;
pub mod error;
pub mod positioning;
pub mod registry;
pub mod telemetry;
