//! 复杂度评分服务
//!
//! 组件自身得分 = 基础分 + 特征加分 + 非标尺寸加分；
//! 有子组件时再加上子组件得分的权重归一化平均：
//! Σ(w_c · score_c) / Σ w_c，w_c 取子组件所属类别的权重。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::complexity::config::{NON_STANDARD_DEPTH, NON_STANDARD_HEIGHT, NON_STANDARD_WIDTH};
use crate::complexity::{
    ComplexityLabel, ComponentKind, ComponentNode, ComponentTree, NodeId, ScoringConfig,
    ScoringSettings,
};
use crate::error::{ConfigurationError, ScoringError, StructuralError};

/// 默认最大树深度
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// 保留两位小数
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 组件自身得分明细
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    /// 特征 -> 加分（只包含已配置的特征）
    pub modifications: BTreeMap<String, f64>,
    /// non_standard_* -> 加分
    pub penalties: BTreeMap<String, f64>,
    pub own_score: f64,
}

/// 评分结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplexityResult {
    /// 总分（两位小数）
    pub score: f64,
    pub label: ComplexityLabel,
    /// 生产工时系数
    pub multiplier: f64,
    /// 根组件自身得分明细
    pub breakdown: ComplexityBreakdown,
}

/// 根组件明细与子组件贡献
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplexityBreakdown {
    #[serde(flatten)]
    pub own: ScoreBreakdown,
    /// 子组件加权平均，叶子为 None
    pub children_score: Option<f64>,
    pub child_count: usize,
}

/// 复杂度评分服务
#[derive(Clone, Debug)]
pub struct ComplexityScoreService {
    config: Arc<ScoringConfig>,
    max_depth: usize,
}

impl Default for ComplexityScoreService {
    fn default() -> Self {
        ComplexityScoreService::new(ScoringConfig::default())
    }
}

impl ComplexityScoreService {
    pub fn new(config: ScoringConfig) -> Self {
        ComplexityScoreService {
            config: Arc::new(config),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// 校验原始配置后创建服务
    pub fn from_settings(settings: ScoringSettings) -> Result<Self, ConfigurationError> {
        Ok(Self::new(ScoringConfig::try_from(settings)?))
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// 组件自身得分（不含子组件）
    pub fn own_score(&self, node: &ComponentNode) -> ScoreBreakdown {
        let config = &*self.config;
        let base = config.base_score(node.kind);

        let mut modifications = BTreeMap::new();
        for flag in &node.modifications {
            match config.modification_points(flag) {
                Some(points) => {
                    modifications.insert(flag.clone(), points);
                }
                None => debug!(node = %node.id, flag = %flag, "ignoring unscored modification"),
            }
        }

        let penalties: BTreeMap<String, f64> = self
            .non_standard_dimensions(node)
            .into_iter()
            .map(|key| (key.to_string(), config.penalty_points(key)))
            .collect();

        let own_score =
            base + modifications.values().sum::<f64>() + penalties.values().sum::<f64>();
        ScoreBreakdown {
            base,
            modifications,
            penalties,
            own_score,
        }
    }

    /// 按类型检查非标尺寸，返回触发的加分键
    fn non_standard_dimensions(&self, node: &ComponentNode) -> Vec<&'static str> {
        let config = &*self.config;
        let dims = &node.dimensions;
        let off_standard = |value: Option<f64>, standards: &[f64]| match value {
            Some(v) if v > 0.0 => !config.is_standard(v, standards),
            _ => false,
        };

        let mut keys = Vec::new();
        match node.kind {
            ComponentKind::Door => {
                if off_standard(dims.width, config.standard_door_widths()) {
                    keys.push(NON_STANDARD_WIDTH);
                }
                if off_standard(dims.height, config.standard_door_heights()) {
                    keys.push(NON_STANDARD_HEIGHT);
                }
            }
            ComponentKind::Drawer => {
                if off_standard(dims.width, config.standard_drawer_widths()) {
                    keys.push(NON_STANDARD_WIDTH);
                }
                if !config.standard_drawer_depths().is_empty()
                    && off_standard(dims.depth, config.standard_drawer_depths())
                {
                    keys.push(NON_STANDARD_DEPTH);
                }
            }
            ComponentKind::Pullout => {
                let max = config.max_standard_pullout_width();
                if let (Some(width), Some(max)) = (dims.width, max) {
                    if width > max {
                        keys.push(NON_STANDARD_WIDTH);
                    }
                }
            }
            ComponentKind::ShelfFixed
            | ComponentKind::ShelfAdjustable
            | ComponentKind::ShelfRollOut
            | ComponentKind::ShelfPullDown => {}
        }
        keys
    }

    /// 组件（含子树）总分，未取整
    pub fn score_component(
        &self,
        tree: &ComponentTree,
        root: NodeId,
    ) -> Result<f64, ScoringError> {
        let mut path = BTreeSet::new();
        Ok(self.score_node(tree, root, &mut path, 0)?.0)
    }

    /// 递归评分，返回 (总分, 子组件平均分)
    fn score_node(
        &self,
        tree: &ComponentTree,
        id: NodeId,
        path: &mut BTreeSet<NodeId>,
        depth: usize,
    ) -> Result<(f64, Option<f64>), StructuralError> {
        if depth > self.max_depth {
            return Err(StructuralError::TooDeep(self.max_depth));
        }
        if path.contains(&id) {
            return Err(StructuralError::Cycle(id));
        }
        let node = tree.get(id).ok_or(StructuralError::MissingNode(id))?;

        path.insert(id);
        let own = self.own_score(node).own_score;

        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        for child_id in &node.children {
            let (child_score, _) = self.score_node(tree, *child_id, path, depth + 1)?;
            let child_kind = tree
                .get(*child_id)
                .map(|child| child.kind)
                .ok_or(StructuralError::MissingNode(*child_id))?;
            let weight = self.config.weight(child_kind.category());
            weighted_sum += child_score * weight;
            total_weight += weight;
        }
        path.remove(&id);

        let children = (total_weight > 0.0).then(|| weighted_sum / total_weight);
        Ok((own + children.unwrap_or(0.0), children))
    }

    /// 完整评分结果：总分、等级、系数与明细
    pub fn evaluate(
        &self,
        tree: &ComponentTree,
        root: NodeId,
    ) -> Result<ComplexityResult, ScoringError> {
        let node = tree.get(root).ok_or(StructuralError::MissingNode(root))?;
        let mut path = BTreeSet::new();
        let (total, children_score) = self.score_node(tree, root, &mut path, 0)?;

        let score = round2(total);
        let label = self.classify(score);
        Ok(ComplexityResult {
            score,
            label,
            multiplier: label.multiplier(),
            breakdown: ComplexityBreakdown {
                own: self.own_score(node),
                children_score: children_score.map(round2),
                child_count: node.children.len(),
            },
        })
    }

    pub fn classify(&self, score: f64) -> ComplexityLabel {
        self.config.classify(score)
    }

    /// 分数对应的生产工时系数
    pub fn score_to_multiplier(&self, score: f64) -> f64 {
        self.classify(score).multiplier()
    }
}
