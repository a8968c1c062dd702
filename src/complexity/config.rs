//! 复杂度评分配置
//!
//! [`ScoringSettings`] 是管理员可编辑的原始配置（字符串键），
//! [`ScoringConfig`] 是加载时校验过的不可变配置。校验失败在加载时报错，
//! 不会在评分中途暴露。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::complexity::{ComponentKind, WeightCategory};
use crate::error::ConfigurationError;

/// 非标宽度加分键
pub const NON_STANDARD_WIDTH: &str = "non_standard_width";
/// 非标高度加分键
pub const NON_STANDARD_HEIGHT: &str = "non_standard_height";
/// 非标深度加分键
pub const NON_STANDARD_DEPTH: &str = "non_standard_depth";

/// 非标尺寸加分缺省值，配置中缺少对应键时补齐
const DEFAULT_PENALTY_POINTS: [(&str, f64); 3] = [
    (NON_STANDARD_WIDTH, 3.0),
    (NON_STANDARD_HEIGHT, 3.0),
    (NON_STANDARD_DEPTH, 2.0),
];

// ============================================================================
// 复杂度等级
// ============================================================================

/// 复杂度等级
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLabel {
    Simple,
    Standard,
    Moderate,
    Complex,
    VeryComplex,
    Custom,
}

impl ComplexityLabel {
    /// 可配置阈值的等级，按升序排列（custom 没有上界）
    pub const THRESHOLDED: [ComplexityLabel; 5] = [
        ComplexityLabel::Simple,
        ComplexityLabel::Standard,
        ComplexityLabel::Moderate,
        ComplexityLabel::Complex,
        ComplexityLabel::VeryComplex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLabel::Simple => "simple",
            ComplexityLabel::Standard => "standard",
            ComplexityLabel::Moderate => "moderate",
            ComplexityLabel::Complex => "complex",
            ComplexityLabel::VeryComplex => "very_complex",
            ComplexityLabel::Custom => "custom",
        }
    }

    /// 人类可读名称
    pub fn display_name(&self) -> &'static str {
        match self {
            ComplexityLabel::Simple => "Simple",
            ComplexityLabel::Standard => "Standard",
            ComplexityLabel::Moderate => "Moderate",
            ComplexityLabel::Complex => "Complex",
            ComplexityLabel::VeryComplex => "Very Complex",
            ComplexityLabel::Custom => "Custom",
        }
    }

    /// 生产工时系数
    pub fn multiplier(&self) -> f64 {
        match self {
            ComplexityLabel::Simple => 0.8,
            ComplexityLabel::Standard => 1.0,
            ComplexityLabel::Moderate => 1.2,
            ComplexityLabel::Complex => 1.4,
            ComplexityLabel::VeryComplex => 1.6,
            ComplexityLabel::Custom => 1.8,
        }
    }

    fn parse_thresholded(s: &str) -> Option<Self> {
        Self::THRESHOLDED.into_iter().find(|l| l.as_str() == s)
    }
}

impl fmt::Display for ComplexityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// 原始配置
// ============================================================================

/// 管理员可编辑的评分配置
///
/// 前四组表与三组标准尺寸为必填项。标准尺寸允许以字符串形式给出
/// （标签输入控件按字符串保存）。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoringSettings {
    pub base_scores: BTreeMap<String, f64>,
    pub component_weights: BTreeMap<String, f64>,
    pub modification_points: BTreeMap<String, f64>,
    pub score_thresholds: BTreeMap<String, f64>,
    #[serde(deserialize_with = "de_dimension_list")]
    pub standard_door_widths: Vec<f64>,
    #[serde(deserialize_with = "de_dimension_list")]
    pub standard_door_heights: Vec<f64>,
    #[serde(deserialize_with = "de_dimension_list")]
    pub standard_drawer_widths: Vec<f64>,
    /// 为空时不检查抽屉深度
    #[serde(default, deserialize_with = "de_dimension_list")]
    pub standard_drawer_depths: Vec<f64>,
    /// 拉篮宽度超过此值视为非标
    #[serde(default = "default_max_pullout_width")]
    pub max_standard_pullout_width: Option<f64>,
    /// 标准尺寸匹配容差，0 为精确匹配
    #[serde(default)]
    pub dimension_tolerance: f64,
}

fn default_max_pullout_width() -> Option<f64> {
    Some(24.0)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn de_dimension_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
    let raw = Vec::<NumberOrText>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|value| match value {
            NumberOrText::Number(n) => Ok(n),
            NumberOrText::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| serde::de::Error::custom(format!("无效的尺寸值: {s:?}"))),
        })
        .collect()
}

impl ScoringSettings {
    pub fn from_json(raw: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// 解析并校验
    pub fn into_config(self) -> Result<ScoringConfig, ConfigurationError> {
        ScoringConfig::try_from(self)
    }
}

impl Default for ScoringSettings {
    fn default() -> Self {
        ScoringConfig::default().to_settings()
    }
}

// ============================================================================
// 校验后的配置
// ============================================================================

const DEFAULT_BASE_SCORES: [(ComponentKind, f64); 7] = [
    (ComponentKind::Door, 10.0),
    (ComponentKind::Drawer, 15.0),
    (ComponentKind::ShelfFixed, 5.0),
    (ComponentKind::ShelfAdjustable, 7.0),
    (ComponentKind::ShelfRollOut, 13.0),
    (ComponentKind::ShelfPullDown, 15.0),
    (ComponentKind::Pullout, 20.0),
];

const DEFAULT_COMPONENT_WEIGHTS: [(WeightCategory, f64); 4] = [
    (WeightCategory::Door, 1.0),
    (WeightCategory::Drawer, 1.2),
    (WeightCategory::Shelf, 0.5),
    (WeightCategory::Pullout, 1.5),
];

const DEFAULT_MODIFICATION_POINTS: [(&str, f64); 31] = [
    ("soft_close", 3.0),
    ("hinge_euro_concealed", 2.0),
    ("hinge_specialty", 4.0),
    ("slide_blum_tandem", 3.0),
    ("slide_full_extension", 2.0),
    ("slide_undermount", 2.0),
    ("has_glass", 8.0),
    ("glass_mullioned", 12.0),
    ("glass_leaded", 15.0),
    ("joinery_dovetail", 6.0),
    ("joinery_dado", 2.0),
    ("joinery_finger", 4.0),
    ("has_check_rail", 4.0),
    ("profile_beaded", 4.0),
    ("profile_raised_panel", 5.0),
    ("profile_shaker", 2.0),
    ("profile_slab", 0.0),
    ("fabrication_five_piece", 3.0),
    (NON_STANDARD_WIDTH, 3.0),
    (NON_STANDARD_HEIGHT, 3.0),
    (NON_STANDARD_DEPTH, 2.0),
    ("shelf_roll_out", 8.0),
    ("shelf_pull_down", 10.0),
    ("shelf_corner", 5.0),
    ("shelf_floating", 4.0),
    ("pullout_trash", 0.0),
    ("pullout_spice_rack", 3.0),
    ("pullout_lazy_susan", 8.0),
    ("pullout_mixer_lift", 10.0),
    ("pullout_blind_corner", 6.0),
    ("pullout_pantry", 5.0),
];

const DEFAULT_SCORE_THRESHOLDS: [(ComplexityLabel, f64); 5] = [
    (ComplexityLabel::Simple, 10.0),
    (ComplexityLabel::Standard, 15.0),
    (ComplexityLabel::Moderate, 20.0),
    (ComplexityLabel::Complex, 30.0),
    (ComplexityLabel::VeryComplex, 40.0),
];

const DEFAULT_STANDARD_WIDTHS: [f64; 9] = [12.0, 15.0, 18.0, 21.0, 24.0, 27.0, 30.0, 33.0, 36.0];
const DEFAULT_STANDARD_DOOR_HEIGHTS: [f64; 3] = [30.0, 36.0, 42.0];

/// 校验后的评分配置（不可变）
#[derive(Clone, Debug, PartialEq)]
pub struct ScoringConfig {
    base_scores: BTreeMap<ComponentKind, f64>,
    component_weights: BTreeMap<WeightCategory, f64>,
    modification_points: BTreeMap<String, f64>,
    /// 按等级升序，严格递增
    score_thresholds: Vec<(ComplexityLabel, f64)>,
    standard_door_widths: Vec<f64>,
    standard_door_heights: Vec<f64>,
    standard_drawer_widths: Vec<f64>,
    standard_drawer_depths: Vec<f64>,
    max_standard_pullout_width: Option<f64>,
    dimension_tolerance: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            base_scores: DEFAULT_BASE_SCORES.into_iter().collect(),
            component_weights: DEFAULT_COMPONENT_WEIGHTS.into_iter().collect(),
            modification_points: DEFAULT_MODIFICATION_POINTS
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            score_thresholds: DEFAULT_SCORE_THRESHOLDS.to_vec(),
            standard_door_widths: DEFAULT_STANDARD_WIDTHS.to_vec(),
            standard_door_heights: DEFAULT_STANDARD_DOOR_HEIGHTS.to_vec(),
            standard_drawer_widths: DEFAULT_STANDARD_WIDTHS.to_vec(),
            standard_drawer_depths: Vec::new(),
            max_standard_pullout_width: default_max_pullout_width(),
            dimension_tolerance: 0.0,
        }
    }
}

impl ScoringConfig {
    /// 组件类型的基础分（校验保证每种类型都有）
    pub fn base_score(&self, kind: ComponentKind) -> f64 {
        self.base_scores.get(&kind).copied().unwrap_or_default()
    }

    /// 权重类别的权重（校验保证每个类别都有）
    pub fn weight(&self, category: WeightCategory) -> f64 {
        self.component_weights.get(&category).copied().unwrap_or(1.0)
    }

    /// 特征加分，未配置的特征返回 None
    pub fn modification_points(&self, flag: &str) -> Option<f64> {
        self.modification_points.get(flag).copied()
    }

    /// 非标尺寸加分（加载时保证三个键都存在）
    pub fn penalty_points(&self, key: &str) -> f64 {
        self.modification_points(key).unwrap_or_default()
    }

    pub fn score_thresholds(&self) -> &[(ComplexityLabel, f64)] {
        &self.score_thresholds
    }

    pub fn standard_door_widths(&self) -> &[f64] {
        &self.standard_door_widths
    }

    pub fn standard_door_heights(&self) -> &[f64] {
        &self.standard_door_heights
    }

    pub fn standard_drawer_widths(&self) -> &[f64] {
        &self.standard_drawer_widths
    }

    pub fn standard_drawer_depths(&self) -> &[f64] {
        &self.standard_drawer_depths
    }

    pub fn max_standard_pullout_width(&self) -> Option<f64> {
        self.max_standard_pullout_width
    }

    /// 数值是否落在某个标准尺寸的容差内
    pub fn is_standard(&self, value: f64, standards: &[f64]) -> bool {
        standards
            .iter()
            .any(|s| (value - s).abs() <= self.dimension_tolerance)
    }

    /// 升序阈值查找：返回第一个上界大于分数的等级，全部超过时为 custom
    pub fn classify(&self, score: f64) -> ComplexityLabel {
        self.score_thresholds
            .iter()
            .find(|(_, bound)| *bound > score)
            .map(|(label, _)| *label)
            .unwrap_or(ComplexityLabel::Custom)
    }

    /// 导出为可编辑的原始配置
    pub fn to_settings(&self) -> ScoringSettings {
        ScoringSettings {
            base_scores: self
                .base_scores
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), *v))
                .collect(),
            component_weights: self
                .component_weights
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), *v))
                .collect(),
            modification_points: self.modification_points.clone(),
            score_thresholds: self
                .score_thresholds
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), *v))
                .collect(),
            standard_door_widths: self.standard_door_widths.clone(),
            standard_door_heights: self.standard_door_heights.clone(),
            standard_drawer_widths: self.standard_drawer_widths.clone(),
            standard_drawer_depths: self.standard_drawer_depths.clone(),
            max_standard_pullout_width: self.max_standard_pullout_width,
            dimension_tolerance: self.dimension_tolerance,
        }
    }
}

impl TryFrom<ScoringSettings> for ScoringConfig {
    type Error = ConfigurationError;

    fn try_from(settings: ScoringSettings) -> Result<Self, Self::Error> {
        let mut base_scores = BTreeMap::new();
        for (key, value) in settings.base_scores {
            let kind: ComponentKind = key
                .parse()
                .map_err(|_| ConfigurationError::UnknownBaseScoreKey(key.clone()))?;
            check_points(&key, value)?;
            base_scores.insert(kind, value);
        }
        if let Some(missing) = ComponentKind::ALL
            .into_iter()
            .find(|kind| !base_scores.contains_key(kind))
        {
            return Err(ConfigurationError::MissingBaseScore(missing.as_str()));
        }

        let mut component_weights = BTreeMap::new();
        for (key, value) in settings.component_weights {
            let category = WeightCategory::parse(&key)
                .ok_or_else(|| ConfigurationError::UnknownWeightKey(key.clone()))?;
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigurationError::InvalidWeight { key, value });
            }
            component_weights.insert(category, value);
        }
        if let Some(missing) = WeightCategory::ALL
            .into_iter()
            .find(|category| !component_weights.contains_key(category))
        {
            return Err(ConfigurationError::MissingWeight(missing.as_str()));
        }

        let mut modification_points = settings.modification_points;
        for (key, value) in &modification_points {
            check_points(key, *value)?;
        }
        for (key, points) in DEFAULT_PENALTY_POINTS {
            modification_points.entry(key.to_string()).or_insert(points);
        }

        let score_thresholds = ordered_thresholds(settings.score_thresholds)?;

        check_dimensions("standard_door_widths", &settings.standard_door_widths)?;
        check_dimensions("standard_door_heights", &settings.standard_door_heights)?;
        check_dimensions("standard_drawer_widths", &settings.standard_drawer_widths)?;
        check_dimensions("standard_drawer_depths", &settings.standard_drawer_depths)?;
        if let Some(max) = settings.max_standard_pullout_width {
            check_dimensions("max_standard_pullout_width", &[max])?;
        }
        if !settings.dimension_tolerance.is_finite() || settings.dimension_tolerance < 0.0 {
            return Err(ConfigurationError::InvalidDimension {
                key: "dimension_tolerance",
                value: settings.dimension_tolerance,
            });
        }

        Ok(ScoringConfig {
            base_scores,
            component_weights,
            modification_points,
            score_thresholds,
            standard_door_widths: settings.standard_door_widths,
            standard_door_heights: settings.standard_door_heights,
            standard_drawer_widths: settings.standard_drawer_widths,
            standard_drawer_depths: settings.standard_drawer_depths,
            max_standard_pullout_width: settings.max_standard_pullout_width,
            dimension_tolerance: settings.dimension_tolerance,
        })
    }
}

fn check_points(key: &str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidPoints {
            key: key.to_string(),
            value,
        })
    }
}

fn check_dimensions(key: &'static str, values: &[f64]) -> Result<(), ConfigurationError> {
    match values.iter().find(|v| !v.is_finite() || **v <= 0.0) {
        Some(value) => Err(ConfigurationError::InvalidDimension { key, value: *value }),
        None => Ok(()),
    }
}

/// 将阈值表整理为固定等级顺序，并要求严格递增
fn ordered_thresholds(
    raw: BTreeMap<String, f64>,
) -> Result<Vec<(ComplexityLabel, f64)>, ConfigurationError> {
    let mut by_label = BTreeMap::new();
    for (key, bound) in raw {
        let label = ComplexityLabel::parse_thresholded(&key)
            .ok_or_else(|| ConfigurationError::UnknownThresholdLabel(key.clone()))?;
        if !bound.is_finite() {
            return Err(ConfigurationError::InvalidPoints { key, value: bound });
        }
        by_label.insert(label, bound);
    }
    if by_label.is_empty() {
        return Err(ConfigurationError::EmptyThresholds);
    }

    // BTreeMap 按枚举声明顺序（simple < ... < very_complex）迭代
    let ordered: Vec<(ComplexityLabel, f64)> = by_label.into_iter().collect();
    for pair in ordered.windows(2) {
        let (previous, previous_bound) = pair[0];
        let (label, bound) = pair[1];
        if bound <= previous_bound {
            return Err(ConfigurationError::NonAscendingThresholds {
                previous: previous.as_str(),
                previous_bound,
                label: label.as_str(),
                bound,
            });
        }
    }
    Ok(ordered)
}
