//! 错误类型定义
//!
//! 按关注点拆分：输入校验、信标注册表、定位、评分配置、组件树结构。

use crate::algorithms::BeaconKey;
use crate::complexity::NodeId;

/// 输入校验错误（调用方可见，不重试）
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} 超出范围 0..=65535: {value}")]
    IdentifierOutOfRange { field: &'static str, value: i64 },
    #[error("RSSI 必须为有限且不大于 0 的 dBm 值: {0}")]
    InvalidRssi(f64),
    #[error("txPower 必须为有限数值: {0}")]
    InvalidTxPower(f64),
    #[error("坐标 {field} 不是有限数值")]
    NonFiniteCoordinate { field: &'static str },
    #[error("纬度超出范围 [-90, 90]: {0}")]
    LatitudeOutOfRange(f64),
    #[error("经度超出范围 [-180, 180]: {0}")]
    LongitudeOutOfRange(f64),
    #[error("信标名称不能为空")]
    EmptyName,
    #[error("无效的信标标识 (期望 major:minor): {0}")]
    InvalidBeaconKey(String),
    #[error("无效的 UUID: {0}")]
    InvalidUuid(String),
    #[error("路径损耗模型参数无效: {0}")]
    InvalidPathLossModel(String),
}

/// 信标注册表读写错误
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("注册表文件读写失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("注册表 JSON 解析失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("注册表条目键与内容不一致: {key} 对应 {found}")]
    KeyMismatch { key: BeaconKey, found: BeaconKey },
    #[error("注册表中的路径损耗模型无效: {0}")]
    InvalidModel(ValidationError),
    #[error("注册表锁已损坏")]
    Poisoned,
}

/// 定位服务错误
#[derive(Debug, thiserror::Error)]
pub enum PositioningError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// 评分配置错误（加载时即失败）
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("缺少组件类型 {0} 的基础分")]
    MissingBaseScore(&'static str),
    #[error("缺少权重类别 {0} 的权重")]
    MissingWeight(&'static str),
    #[error("未知的组件类型键: {0}")]
    UnknownBaseScoreKey(String),
    #[error("未知的权重类别键: {0}")]
    UnknownWeightKey(String),
    #[error("未知的复杂度等级: {0}")]
    UnknownThresholdLabel(String),
    #[error("至少需要配置一个复杂度阈值")]
    EmptyThresholds,
    #[error("复杂度阈值必须严格递增: {previous} ({previous_bound}) >= {label} ({bound})")]
    NonAscendingThresholds {
        previous: &'static str,
        previous_bound: f64,
        label: &'static str,
        bound: f64,
    },
    #[error("{key} 的分值必须为有限且非负的数: {value}")]
    InvalidPoints { key: String, value: f64 },
    #[error("{key} 的权重必须为有限正数: {value}")]
    InvalidWeight { key: String, value: f64 },
    #[error("{key} 中的标准尺寸无效: {value}")]
    InvalidDimension { key: &'static str, value: f64 },
    #[error("评分配置解析失败: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigurationError {
    fn from(err: serde_json::Error) -> Self {
        ConfigurationError::Parse(err.to_string())
    }
}

/// 组件树结构错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StructuralError {
    #[error("组件树存在环: 节点 {0} 是自身的祖先")]
    Cycle(NodeId),
    #[error("组件树引用了不存在的节点: {0}")]
    MissingNode(NodeId),
    #[error("组件树深度超过上限 {0}")]
    TooDeep(usize),
    #[error("节点 ID 重复: {0}")]
    DuplicateNode(NodeId),
    #[error("层级不匹配: {parent} 下不能包含 {child}")]
    LevelMismatch {
        parent: &'static str,
        child: &'static str,
    },
    #[error("只有 section 可以直接包含组件, 实际为 {0}")]
    ComponentsOutsideSection(&'static str),
}

/// 复杂度评分错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("未知的组件类型: {0}")]
    UnknownComponentType(String),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
}
