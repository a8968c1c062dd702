//! 柜体复杂度评分

pub mod component;
pub mod config;
pub mod hierarchy;
pub mod service;

pub use component::*;
pub use config::*;
pub use hierarchy::*;
pub use service::*;
