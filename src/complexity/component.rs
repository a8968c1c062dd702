//! 柜体组件树
//!
//! 组件以 ID 存放在 [`ComponentTree`] 中，子节点以 ID 引用，
//! 与关系型存储中的父子引用一致；因此树可能出现环或悬空引用，
//! 评分时必须检查。嵌套的 [`ComponentSpec`] 用于 JSON 输入。

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ScoringError, StructuralError};

/// 组件节点 ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 组件类型（封闭集合）
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Door,
    Drawer,
    ShelfFixed,
    ShelfAdjustable,
    ShelfRollOut,
    ShelfPullDown,
    Pullout,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 7] = [
        ComponentKind::Door,
        ComponentKind::Drawer,
        ComponentKind::ShelfFixed,
        ComponentKind::ShelfAdjustable,
        ComponentKind::ShelfRollOut,
        ComponentKind::ShelfPullDown,
        ComponentKind::Pullout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Door => "door",
            ComponentKind::Drawer => "drawer",
            ComponentKind::ShelfFixed => "shelf_fixed",
            ComponentKind::ShelfAdjustable => "shelf_adjustable",
            ComponentKind::ShelfRollOut => "shelf_roll_out",
            ComponentKind::ShelfPullDown => "shelf_pull_down",
            ComponentKind::Pullout => "pullout",
        }
    }

    /// 权重类别：去掉类型后缀，如 shelf_roll_out -> shelf
    pub fn category(&self) -> WeightCategory {
        match self {
            ComponentKind::Door => WeightCategory::Door,
            ComponentKind::Drawer => WeightCategory::Drawer,
            ComponentKind::ShelfFixed
            | ComponentKind::ShelfAdjustable
            | ComponentKind::ShelfRollOut
            | ComponentKind::ShelfPullDown => WeightCategory::Shelf,
            ComponentKind::Pullout => WeightCategory::Pullout,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = ScoringError;

    /// 接受连字符写法（roll-out），未知类型直接拒绝
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ComponentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ScoringError::UnknownComponentType(s.to_string()))
    }
}

/// 组件权重类别
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightCategory {
    Door,
    Drawer,
    Shelf,
    Pullout,
}

impl WeightCategory {
    pub const ALL: [WeightCategory; 4] = [
        WeightCategory::Door,
        WeightCategory::Drawer,
        WeightCategory::Shelf,
        WeightCategory::Pullout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WeightCategory::Door => "door",
            WeightCategory::Drawer => "drawer",
            WeightCategory::Shelf => "shelf",
            WeightCategory::Pullout => "pullout",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        WeightCategory::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// 组件尺寸（英寸），缺省或为 0 时不参与非标尺寸判断
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub depth: Option<f64>,
}

impl Dimensions {
    pub fn new(width: f64, height: f64, depth: f64) -> Self {
        Dimensions {
            width: Some(width),
            height: Some(height),
            depth: Some(depth),
        }
    }
}

/// 组件节点
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentNode {
    pub id: NodeId,
    pub kind: ComponentKind,
    pub dimensions: Dimensions,
    /// 特征标记，如 soft_close、has_glass、joinery_dovetail
    pub modifications: BTreeSet<String>,
    pub children: Vec<NodeId>,
}

impl ComponentNode {
    pub fn new(id: u64, kind: ComponentKind) -> Self {
        ComponentNode {
            id: NodeId(id),
            kind,
            dimensions: Dimensions::default(),
            modifications: BTreeSet::new(),
            children: Vec::new(),
        }
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_modification(mut self, flag: impl Into<String>) -> Self {
        self.modifications.insert(flag.into());
        self
    }

    pub fn with_child(mut self, child: u64) -> Self {
        self.children.push(NodeId(child));
        self
    }
}

/// 以 ID 索引的组件集合
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComponentTree {
    nodes: BTreeMap<NodeId, ComponentNode>,
}

impl ComponentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入节点，ID 重复时报错
    pub fn insert(&mut self, node: ComponentNode) -> Result<NodeId, StructuralError> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(StructuralError::DuplicateNode(id));
        }
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// 追加父子引用（不做结构检查）
    pub fn link(&mut self, parent: NodeId, child: NodeId) -> Result<(), StructuralError> {
        let node = self
            .nodes
            .get_mut(&parent)
            .ok_or(StructuralError::MissingNode(parent))?;
        node.children.push(child);
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> Option<&ComponentNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 从扁平记录构建（如数据库行）
    pub fn from_records(
        records: impl IntoIterator<Item = ComponentRecord>,
    ) -> Result<Self, ScoringError> {
        let mut tree = ComponentTree::new();
        for record in records {
            let node = ComponentNode {
                id: record.id,
                kind: record.kind.parse()?,
                dimensions: record.dimensions,
                modifications: record.modifications.into_iter().collect(),
                children: record.children,
            };
            tree.insert(node)?;
        }
        Ok(tree)
    }
}

/// 扁平组件记录，子节点以 ID 引用
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(default)]
    pub modifications: Vec<String>,
    #[serde(default)]
    pub children: Vec<NodeId>,
}

/// 扁平格式的组件树输入
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlatComponentTree {
    pub root: NodeId,
    pub nodes: Vec<ComponentRecord>,
}

/// 嵌套的组件描述（JSON 输入），不可能成环
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(default)]
    pub modifications: Vec<String>,
    #[serde(default)]
    pub children: Vec<ComponentSpec>,
}

impl ComponentSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        ComponentSpec {
            kind: kind.into(),
            dimensions: Dimensions::default(),
            modifications: Vec::new(),
            children: Vec::new(),
        }
    }

    /// 展开为组件树，按先序分配 ID，返回 (树, 根 ID)
    pub fn into_tree(self) -> Result<(ComponentTree, NodeId), ScoringError> {
        let mut tree = ComponentTree::new();
        let mut next_id = 0_u64;
        let root = flatten(self, &mut tree, &mut next_id)?;
        Ok((tree, root))
    }
}

fn flatten(
    spec: ComponentSpec,
    tree: &mut ComponentTree,
    next_id: &mut u64,
) -> Result<NodeId, ScoringError> {
    let id = NodeId(*next_id);
    *next_id += 1;

    let kind: ComponentKind = spec.kind.parse()?;
    tree.insert(ComponentNode {
        id,
        kind,
        dimensions: spec.dimensions,
        modifications: spec.modifications.into_iter().collect(),
        children: Vec::new(),
    })?;

    for child in spec.children {
        let child_id = flatten(child, tree, next_id)?;
        tree.link(id, child_id)?;
    }
    Ok(id)
}
