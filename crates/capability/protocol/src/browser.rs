//! 类型字段发现（InstanceDeclaration）。
//!
//! 给定类型（或实例）节点，列出其全部字段，含继承字段并处理覆盖关系：
//!
//! 1. 沿 HasSubtype 反向逐级上溯得到超类型链（每级只取第一个目标，遇到绝对引用停止）
//! 2. 从最远的祖先到目标本身，依次以显式工作栈深度优先浏览 HasChild 子节点
//! 3. 以浏览路径文本为键维护覆盖表：新声明的建模规则非空时覆盖同路径旧声明；
//!    建模规则为空的松散实例从覆盖表移除，但仍出现在输出列表里
//! 4. 每批子节点通过一次批量浏览取建模规则、一次批量读取取描述/数据类型/ValueRank，
//!    只有建模规则非空的子节点继续向下浏览
//!
//! 单个节点的浏览/读取失败只影响该节点（视为无子节点），不会中断整体发现。

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::client::UaSession;
use crate::error::ProtocolError;
use crate::ids;
use crate::types::{
    AttributeId, BrowseDescription, BrowseDirection, ContinuationPoint, NodeClass, NodeClassMask,
    NodeId, QualifiedName, ReadValueId, ReferenceDescription, StatusCode,
};

/// 声明在结果集中的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclarationId(pub usize);

/// 类型的一个字段声明
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDeclaration {
    /// 声明所属的类型（超类型链中的某一级）
    pub root_type_id: NodeId,
    pub node_id: NodeId,
    pub browse_name: QualifiedName,
    /// 自类型根起的浏览路径
    pub browse_path: Vec<QualifiedName>,
    /// 浏览路径文本（`A/B`），覆盖表的键
    pub browse_path_text: String,
    pub display_path: String,
    pub display_name: String,
    pub node_class: NodeClass,
    pub modelling_rule: Option<NodeId>,
    pub description: Option<String>,
    pub data_type: Option<NodeId>,
    pub value_rank: Option<i32>,
    /// 被本声明覆盖的父类型同路径声明
    pub overridden: Option<DeclarationId>,
    pub parent: Option<DeclarationId>,
}

/// 发现结果：按发现顺序排列的声明（祖先类型在前），每个声明只出现一次。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceDeclarationSet {
    declarations: Vec<InstanceDeclaration>,
}

impl InstanceDeclarationSet {
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn get(&self, id: DeclarationId) -> Option<&InstanceDeclaration> {
        self.declarations.get(id.0)
    }

    pub fn as_slice(&self) -> &[InstanceDeclaration] {
        &self.declarations
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeclarationId, &InstanceDeclaration)> {
        self.declarations
            .iter()
            .enumerate()
            .map(|(index, declaration)| (DeclarationId(index), declaration))
    }

    /// 被 `id` 覆盖的声明。
    pub fn overridden_of(&self, id: DeclarationId) -> Option<&InstanceDeclaration> {
        self.get(id)
            .and_then(|declaration| declaration.overridden)
            .and_then(|overridden| self.get(overridden))
    }

    /// 按浏览路径文本查找（同路径多条时取最后发现的）。
    pub fn find_by_browse_path(&self, path: &str) -> Option<&InstanceDeclaration> {
        self.declarations
            .iter()
            .rev()
            .find(|declaration| declaration.browse_path_text == path)
    }

    /// 节点 ID 文本以 `suffix` 结尾的第一个声明。
    pub fn find_by_node_suffix(&self, suffix: &str) -> Option<&InstanceDeclaration> {
        self.declarations
            .iter()
            .find(|declaration| declaration.node_id.to_string().ends_with(suffix))
    }
}

/// 发现过程中的声明池 + 覆盖表
#[derive(Default)]
struct DeclarationArena {
    declarations: Vec<InstanceDeclaration>,
    by_path: HashMap<String, DeclarationId>,
}

impl DeclarationArena {
    fn push(&mut self, declaration: InstanceDeclaration) -> DeclarationId {
        let id = DeclarationId(self.declarations.len());
        self.declarations.push(declaration);
        id
    }

    fn get(&self, id: DeclarationId) -> &InstanceDeclaration {
        &self.declarations[id.0]
    }

    fn apply_modelling_rule(&mut self, id: DeclarationId, rule: Option<NodeId>) {
        let path = self.declarations[id.0].browse_path_text.clone();
        match rule.filter(|rule| !rule.is_null()) {
            Some(rule) => {
                let prior = self.by_path.insert(path, id).filter(|prior| *prior != id);
                let declaration = &mut self.declarations[id.0];
                declaration.modelling_rule = Some(rule);
                declaration.overridden = prior;
            }
            None => {
                self.by_path.remove(&path);
            }
        }
    }

    fn finish(self) -> InstanceDeclarationSet {
        InstanceDeclarationSet {
            declarations: self.declarations,
        }
    }
}

/// 浏览参数
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// 单次浏览允许的最大续浏览页数
    pub max_continuation_pages: usize,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            max_continuation_pages: 1_000,
        }
    }
}

/// 类型字段浏览器（无状态，每次请求重新发现）
#[derive(Debug, Clone, Default)]
pub struct TypeBrowser {
    options: BrowserOptions,
}

impl TypeBrowser {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    /// 浏览单个节点并跟随续浏览令牌直到取完。
    pub async fn browse_all(
        &self,
        session: &dyn UaSession,
        description: &BrowseDescription,
    ) -> Result<Vec<ReferenceDescription>, ProtocolError> {
        let first = session
            .browse(std::slice::from_ref(description))
            .await?
            .into_iter()
            .next()
            .ok_or(ProtocolError::Status(StatusCode::BAD_UNEXPECTED_ERROR))?;
        if first.status.is_bad() {
            return Err(ProtocolError::Status(first.status));
        }

        let mut references = first.references;
        let mut continuation = first.continuation_point;
        let mut pages = 0usize;
        while let Some(point) = continuation.take() {
            pages += 1;
            if pages > self.options.max_continuation_pages {
                release_points(session, vec![point]).await;
                return Err(ProtocolError::TooManyPages(
                    self.options.max_continuation_pages,
                ));
            }
            let next = session
                .browse_next(std::slice::from_ref(&point), false)
                .await?
                .into_iter()
                .next()
                .ok_or(ProtocolError::Status(StatusCode::BAD_UNEXPECTED_ERROR))?;
            if next.status.is_bad() {
                return Err(ProtocolError::Status(next.status));
            }
            references.extend(next.references);
            continuation = next.continuation_point;
        }
        Ok(references)
    }

    /// 超类型链：直接父类型在前，最远祖先在后。
    pub async fn browse_super_types(&self, session: &dyn UaSession, type_id: &NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([type_id.clone()]);
        let mut current = type_id.clone();
        loop {
            let description = BrowseDescription {
                node_id: current.clone(),
                direction: BrowseDirection::Inverse,
                reference_type_id: ids::HAS_SUBTYPE,
                include_subtypes: false,
                node_class_mask: NodeClassMask::ALL,
            };
            let references = match self.browse_all(session, &description).await {
                Ok(references) => references,
                Err(err) => {
                    debug!(
                        target: "gw.protocol",
                        node_id = %current,
                        error = %err,
                        "super_type_browse_failed"
                    );
                    break;
                }
            };
            let Some(parent) = references.first().and_then(|reference| reference.node_id.to_local())
            else {
                break;
            };
            if parent.is_null() || !seen.insert(parent.clone()) {
                break;
            }
            chain.push(parent.clone());
            current = parent.clone();
        }
        chain
    }

    /// 收集类型（含继承）的全部字段声明。
    pub async fn collect(&self, session: &dyn UaSession, type_id: &NodeId) -> InstanceDeclarationSet {
        let mut arena = DeclarationArena::default();
        let super_types = self.browse_super_types(session, type_id).await;
        for root in super_types.iter().rev().chain(std::iter::once(type_id)) {
            self.collect_for_root(session, root, &mut arena).await;
        }
        let set = arena.finish();
        debug!(
            target: "gw.protocol",
            type_id = %type_id,
            super_types = super_types.len(),
            declarations = set.len(),
            "instance_declarations_collected"
        );
        set
    }

    async fn collect_for_root(
        &self,
        session: &dyn UaSession,
        root: &NodeId,
        arena: &mut DeclarationArena,
    ) {
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<Option<DeclarationId>> = vec![None];
        while let Some(parent) = stack.pop() {
            let node_id = match parent {
                Some(id) => arena.get(id).node_id.clone(),
                None => root.clone(),
            };
            if !visited.insert(node_id.clone()) {
                debug!(target: "gw.protocol", node_id = %node_id, "browse_cycle_skipped");
                continue;
            }
            let children = self
                .discover_children(session, root, &node_id, parent, arena)
                .await;
            // 逆序入栈，保持与递归深度优先一致的发现顺序。
            for child in children.into_iter().rev() {
                if arena.get(child).modelling_rule.is_some() {
                    stack.push(Some(child));
                }
            }
        }
    }

    async fn discover_children(
        &self,
        session: &dyn UaSession,
        root: &NodeId,
        node_id: &NodeId,
        parent: Option<DeclarationId>,
        arena: &mut DeclarationArena,
    ) -> Vec<DeclarationId> {
        let description = BrowseDescription {
            node_id: node_id.clone(),
            direction: BrowseDirection::Forward,
            reference_type_id: ids::HAS_CHILD,
            include_subtypes: true,
            node_class_mask: NodeClassMask::of(&[
                NodeClass::Object,
                NodeClass::Variable,
                NodeClass::Method,
            ]),
        };
        let references = match self.browse_all(session, &description).await {
            Ok(references) => references,
            Err(err) => {
                warn!(
                    target: "gw.protocol",
                    node_id = %node_id,
                    error = %err,
                    "browse_children_failed"
                );
                return Vec::new();
            }
        };

        let mut children = Vec::new();
        for reference in references {
            let Some(child_id) = reference.node_id.to_local() else {
                continue;
            };
            let display_name = if reference.display_name.text.is_empty() {
                reference.browse_name.name.clone()
            } else {
                reference.display_name.text.clone()
            };
            let (mut browse_path, browse_path_text, display_path) = match parent {
                Some(parent_id) => {
                    let parent = arena.get(parent_id);
                    (
                        parent.browse_path.clone(),
                        format!("{}/{}", parent.browse_path_text, reference.browse_name),
                        format!("{}/{}", parent.display_path, display_name),
                    )
                }
                None => (
                    Vec::new(),
                    reference.browse_name.to_string(),
                    display_name.clone(),
                ),
            };
            browse_path.push(reference.browse_name.clone());

            let id = arena.push(InstanceDeclaration {
                root_type_id: root.clone(),
                node_id: child_id.clone(),
                browse_name: reference.browse_name,
                browse_path,
                browse_path_text,
                display_path,
                display_name,
                node_class: reference.node_class,
                modelling_rule: None,
                description: None,
                data_type: None,
                value_rank: None,
                overridden: None,
                parent,
            });
            children.push(id);
        }
        if children.is_empty() {
            return children;
        }

        let node_ids: Vec<NodeId> = children
            .iter()
            .map(|id| arena.get(*id).node_id.clone())
            .collect();
        let rules = self.find_modelling_rules(session, &node_ids).await;
        for (id, rule) in children.iter().zip(rules) {
            arena.apply_modelling_rule(*id, rule);
        }
        self.update_descriptions(session, &children, arena).await;
        children
    }

    /// 批量查询 HasModellingRule 目标；失败的节点视为无建模规则。
    async fn find_modelling_rules(
        &self,
        session: &dyn UaSession,
        node_ids: &[NodeId],
    ) -> Vec<Option<NodeId>> {
        let descriptions: Vec<BrowseDescription> = node_ids
            .iter()
            .map(|node_id| BrowseDescription {
                node_id: node_id.clone(),
                direction: BrowseDirection::Forward,
                reference_type_id: ids::HAS_MODELLING_RULE,
                include_subtypes: false,
                node_class_mask: NodeClassMask::ALL,
            })
            .collect();
        let results = match session.browse(&descriptions).await {
            Ok(results) if results.len() == node_ids.len() => results,
            Ok(results) => {
                warn!(
                    target: "gw.protocol",
                    expected = node_ids.len(),
                    actual = results.len(),
                    "modelling_rule_result_mismatch"
                );
                return vec![None; node_ids.len()];
            }
            Err(err) => {
                warn!(target: "gw.protocol", error = %err, "modelling_rule_browse_failed");
                return vec![None; node_ids.len()];
            }
        };

        let mut points = Vec::new();
        let mut rules = Vec::with_capacity(results.len());
        for result in results {
            if let Some(point) = result.continuation_point {
                points.push(point);
            }
            if result.status.is_bad() {
                rules.push(None);
                continue;
            }
            let rule = result
                .references
                .first()
                .and_then(|reference| reference.node_id.to_local())
                .filter(|target| !target.is_null())
                .cloned();
            rules.push(rule);
        }
        release_points(session, points).await;
        rules
    }

    /// 一次批量读取 Description / DataType / ValueRank。
    async fn update_descriptions(
        &self,
        session: &dyn UaSession,
        children: &[DeclarationId],
        arena: &mut DeclarationArena,
    ) {
        let reads: Vec<ReadValueId> = children
            .iter()
            .flat_map(|id| {
                let node_id = arena.get(*id).node_id.clone();
                [
                    ReadValueId::new(node_id.clone(), AttributeId::Description),
                    ReadValueId::new(node_id.clone(), AttributeId::DataType),
                    ReadValueId::new(node_id, AttributeId::ValueRank),
                ]
            })
            .collect();
        let values = match session.read(&reads).await {
            Ok(values) if values.len() == reads.len() => values,
            Ok(_) | Err(_) => {
                debug!(
                    target: "gw.protocol",
                    count = children.len(),
                    "instance_description_read_failed"
                );
                return;
            }
        };

        for (id, chunk) in children.iter().zip(values.chunks(3)) {
            let declaration = &mut arena.declarations[id.0];
            if chunk[0].status.is_good() {
                declaration.description = chunk[0].value.as_text().map(str::to_string);
            }
            if chunk[1].status.is_good() {
                declaration.data_type = chunk[1]
                    .value
                    .as_node_id()
                    .filter(|data_type| !data_type.is_null())
                    .cloned();
            }
            if chunk[2].status.is_good() {
                declaration.value_rank = chunk[2]
                    .value
                    .as_i64()
                    .and_then(|rank| i32::try_from(rank).ok());
            }
        }
    }
}

async fn release_points(session: &dyn UaSession, points: Vec<ContinuationPoint>) {
    if points.is_empty() {
        return;
    }
    if let Err(err) = session.browse_next(&points, true).await {
        debug!(target: "gw.protocol", error = %err, "continuation_release_failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declaration(path: &str) -> InstanceDeclaration {
        InstanceDeclaration {
            root_type_id: NodeId::numeric(1, 1),
            node_id: NodeId::string(1, path),
            browse_name: QualifiedName::new(0, path),
            browse_path: vec![QualifiedName::new(0, path)],
            browse_path_text: path.to_string(),
            display_path: path.to_string(),
            display_name: path.to_string(),
            node_class: NodeClass::Variable,
            modelling_rule: None,
            description: None,
            data_type: None,
            value_rank: None,
            overridden: None,
            parent: None,
        }
    }

    #[test]
    fn override_requires_non_null_rule() {
        let mut arena = DeclarationArena::default();
        let base = arena.push(declaration("Level"));
        arena.apply_modelling_rule(base, Some(ids::MODELLING_RULE_MANDATORY));

        let loose = arena.push(declaration("Level"));
        arena.apply_modelling_rule(loose, None);
        assert!(arena.get(loose).overridden.is_none());
        assert!(arena.by_path.get("Level").is_none());

        let redeclared = arena.push(declaration("Level"));
        arena.apply_modelling_rule(redeclared, Some(ids::MODELLING_RULE_OPTIONAL));
        // 松散实例已把旧声明移出覆盖表。
        assert!(arena.get(redeclared).overridden.is_none());

        let again = arena.push(declaration("Level"));
        arena.apply_modelling_rule(again, Some(ids::MODELLING_RULE_MANDATORY));
        assert_eq!(arena.get(again).overridden, Some(redeclared));
    }

    #[test]
    fn suffix_lookup_returns_first_match() {
        let mut arena = DeclarationArena::default();
        arena.push(declaration("Tank1.Level"));
        arena.push(declaration("Tank2.Level"));
        let set = arena.finish();
        let found = set.find_by_node_suffix("Level").expect("found");
        assert_eq!(found.node_id, NodeId::string(1, "Tank1.Level"));
        assert!(set.find_by_node_suffix("Pressure").is_none());
    }
}
