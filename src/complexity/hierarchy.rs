//! 层级汇总：Section → Cabinet → CabinetRun → RoomLocation → Room → Project
//!
//! Section 的得分为其组件根节点得分的权重归一化平均；
//! 更高层级为子层级得分的算术平均，没有子项时为 0。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::complexity::service::round2;
use crate::complexity::{ComplexityLabel, ComplexityScoreService, ComponentSpec};
use crate::error::{ScoringError, StructuralError};

/// 汇总层级
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyLevel {
    Section,
    Cabinet,
    CabinetRun,
    RoomLocation,
    Room,
    Project,
}

impl AssemblyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssemblyLevel::Section => "section",
            AssemblyLevel::Cabinet => "cabinet",
            AssemblyLevel::CabinetRun => "cabinet_run",
            AssemblyLevel::RoomLocation => "room_location",
            AssemblyLevel::Room => "room",
            AssemblyLevel::Project => "project",
        }
    }

    /// 直接下级，Section 没有下级层级（只包含组件）
    pub fn child_level(&self) -> Option<AssemblyLevel> {
        match self {
            AssemblyLevel::Section => None,
            AssemblyLevel::Cabinet => Some(AssemblyLevel::Section),
            AssemblyLevel::CabinetRun => Some(AssemblyLevel::Cabinet),
            AssemblyLevel::RoomLocation => Some(AssemblyLevel::CabinetRun),
            AssemblyLevel::Room => Some(AssemblyLevel::RoomLocation),
            AssemblyLevel::Project => Some(AssemblyLevel::Room),
        }
    }
}

impl fmt::Display for AssemblyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 层级节点（JSON 输入）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssemblyNode {
    pub level: AssemblyLevel,
    #[serde(default)]
    pub name: String,
    /// 仅 Section 使用
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
    #[serde(default)]
    pub children: Vec<AssemblyNode>,
}

impl AssemblyNode {
    pub fn new(level: AssemblyLevel, name: impl Into<String>) -> Self {
        AssemblyNode {
            level,
            name: name.into(),
            components: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: ComponentSpec) -> Self {
        self.components.push(component);
        self
    }

    pub fn with_child(mut self, child: AssemblyNode) -> Self {
        self.children.push(child);
        self
    }
}

/// 层级得分
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssemblyScore {
    pub level: AssemblyLevel,
    pub name: String,
    /// 两位小数
    pub score: f64,
    pub label: ComplexityLabel,
    /// 直接子项数量（Section 为组件数）
    pub count: usize,
    /// Section 下各组件根节点得分
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component_scores: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AssemblyScore>,
}

impl ComplexityScoreService {
    /// 自底向上汇总层级得分
    pub fn score_assembly(&self, node: &AssemblyNode) -> Result<AssemblyScore, ScoringError> {
        match node.level.child_level() {
            None => {
                if let Some(child) = node.children.first() {
                    return Err(StructuralError::LevelMismatch {
                        parent: node.level.as_str(),
                        child: child.level.as_str(),
                    }
                    .into());
                }
                self.score_section(node)
            }
            Some(expected) => {
                if !node.components.is_empty() {
                    let level = node.level.as_str();
                    return Err(StructuralError::ComponentsOutsideSection(level).into());
                }
                let mut children = Vec::with_capacity(node.children.len());
                for child in &node.children {
                    if child.level != expected {
                        return Err(StructuralError::LevelMismatch {
                            parent: node.level.as_str(),
                            child: child.level.as_str(),
                        }
                        .into());
                    }
                    children.push(self.score_assembly(child)?);
                }

                let score = if children.is_empty() {
                    0.0
                } else {
                    children.iter().map(|c| c.score).sum::<f64>() / children.len() as f64
                };
                Ok(self.assembly_score(node, score, Vec::new(), children))
            }
        }
    }

    fn score_section(&self, node: &AssemblyNode) -> Result<AssemblyScore, ScoringError> {
        let mut component_scores = Vec::with_capacity(node.components.len());
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        for spec in &node.components {
            let (tree, root) = spec.clone().into_tree()?;
            let score = self.score_component(&tree, root)?;
            let weight = tree
                .get(root)
                .map(|n| self.config().weight(n.kind.category()))
                .ok_or(StructuralError::MissingNode(root))?;
            weighted_sum += score * weight;
            total_weight += weight;
            component_scores.push(round2(score));
        }

        let score = if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            0.0
        };
        Ok(self.assembly_score(node, score, component_scores, Vec::new()))
    }

    fn assembly_score(
        &self,
        node: &AssemblyNode,
        score: f64,
        component_scores: Vec<f64>,
        children: Vec<AssemblyScore>,
    ) -> AssemblyScore {
        let score = round2(score);
        AssemblyScore {
            level: node.level,
            name: node.name.clone(),
            score,
            label: self.classify(score),
            count: component_scores.len().max(children.len()),
            component_scores,
            children,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(name: &str, kinds: &[&str]) -> AssemblyNode {
        kinds.iter().fold(AssemblyNode::new(AssemblyLevel::Section, name), |node, kind| {
            node.with_component(ComponentSpec::new(*kind))
        })
    }

    #[test]
    fn test_section_weighted_mean() {
        let svc = ComplexityScoreService::default();
        // 门 10 (w=1.0)，拉篮 20 (w=1.5) -> (10 + 30) / 2.5 = 16
        let result = svc.score_assembly(&section("s1", &["door", "pullout"])).unwrap();
        assert_eq!(result.score, 16.0);
        assert_eq!(result.count, 2);
        assert_eq!(result.component_scores, vec![10.0, 20.0]);
        assert_eq!(result.label, ComplexityLabel::Moderate);
    }

    #[test]
    fn test_cabinet_arithmetic_mean() {
        let svc = ComplexityScoreService::default();
        let cabinet = AssemblyNode::new(AssemblyLevel::Cabinet, "base-1")
            .with_child(section("a", &["door"]))
            .with_child(section("b", &["drawer"]));
        let result = svc.score_assembly(&cabinet).unwrap();
        assert_eq!(result.score, 12.5);
        assert_eq!(result.children.len(), 2);
    }

    #[test]
    fn test_empty_levels_score_zero() {
        let svc = ComplexityScoreService::default();
        let project = AssemblyNode::new(AssemblyLevel::Project, "empty");
        let result = svc.score_assembly(&project).unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.count, 0);
        assert_eq!(result.label, ComplexityLabel::Simple);

        let result = svc.score_assembly(&section("bare", &[])).unwrap();
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_full_cascade() {
        let svc = ComplexityScoreService::default();
        let cabinet =
            AssemblyNode::new(AssemblyLevel::Cabinet, "c").with_child(section("s", &["drawer"]));
        let run = AssemblyNode::new(AssemblyLevel::CabinetRun, "r").with_child(cabinet);
        let location = AssemblyNode::new(AssemblyLevel::RoomLocation, "wall").with_child(run);
        let room = AssemblyNode::new(AssemblyLevel::Room, "kitchen")
            .with_child(location)
            .with_child(AssemblyNode::new(AssemblyLevel::RoomLocation, "island"));
        let project = AssemblyNode::new(AssemblyLevel::Project, "p").with_child(room);

        let result = svc.score_assembly(&project).unwrap();
        // kitchen = (15 + 0) / 2
        assert_eq!(result.score, 7.5);
        assert_eq!(result.children[0].children[0].score, 15.0);
    }

    #[test]
    fn test_level_mismatch() {
        let svc = ComplexityScoreService::default();
        let room = AssemblyNode::new(AssemblyLevel::Room, "r").with_child(section("s", &["door"]));
        assert_eq!(
            svc.score_assembly(&room),
            Err(ScoringError::Structural(StructuralError::LevelMismatch {
                parent: "room",
                child: "section",
            }))
        );
    }

    #[test]
    fn test_components_outside_section() {
        let svc = ComplexityScoreService::default();
        let cabinet = AssemblyNode::new(AssemblyLevel::Cabinet, "c")
            .with_component(ComponentSpec::new("door"));
        assert_eq!(
            svc.score_assembly(&cabinet),
            Err(ScoringError::Structural(StructuralError::ComponentsOutsideSection("cabinet")))
        );
    }

    #[test]
    fn test_unknown_component_in_section() {
        let svc = ComplexityScoreService::default();
        assert!(matches!(
            svc.score_assembly(&section("s", &["valance"])),
            Err(ScoringError::UnknownComponentType(_))
        ));
    }

    #[test]
    fn test_assembly_json() {
        let node: AssemblyNode = serde_json::from_str(
            r#"{"level":"cabinet","name":"c1","children":[
                {"level":"section","components":[{"type":"shelf_fixed"}]}
            ]}"#,
        )
        .unwrap();
        let result = ComplexityScoreService::default().score_assembly(&node).unwrap();
        assert_eq!(result.score, 5.0);
    }
}
