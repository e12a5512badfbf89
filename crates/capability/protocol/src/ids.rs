//! 标准地址空间中的常用节点 ID（命名空间 0）。

use crate::types::NodeId;

pub const SERVER: NodeId = NodeId::numeric(0, 2253);

pub const HIERARCHICAL_REFERENCES: NodeId = NodeId::numeric(0, 33);
pub const HAS_CHILD: NodeId = NodeId::numeric(0, 34);
pub const ORGANIZES: NodeId = NodeId::numeric(0, 35);
pub const HAS_EVENT_SOURCE: NodeId = NodeId::numeric(0, 36);
pub const HAS_MODELLING_RULE: NodeId = NodeId::numeric(0, 37);
pub const HAS_TYPE_DEFINITION: NodeId = NodeId::numeric(0, 40);
pub const AGGREGATES: NodeId = NodeId::numeric(0, 44);
pub const HAS_SUBTYPE: NodeId = NodeId::numeric(0, 45);
pub const HAS_PROPERTY: NodeId = NodeId::numeric(0, 46);
pub const HAS_COMPONENT: NodeId = NodeId::numeric(0, 47);

pub const MODELLING_RULE_MANDATORY: NodeId = NodeId::numeric(0, 78);
pub const MODELLING_RULE_OPTIONAL: NodeId = NodeId::numeric(0, 80);

pub const BASE_OBJECT_TYPE: NodeId = NodeId::numeric(0, 58);
pub const BASE_EVENT_TYPE: NodeId = NodeId::numeric(0, 2041);
pub const CONDITION_TYPE: NodeId = NodeId::numeric(0, 2782);
pub const ACKNOWLEDGEABLE_CONDITION_TYPE: NodeId = NodeId::numeric(0, 2881);
pub const ALARM_CONDITION_TYPE: NodeId = NodeId::numeric(0, 2915);

pub const CONDITION_TYPE_CONDITION_REFRESH: NodeId = NodeId::numeric(0, 3875);
pub const ACKNOWLEDGEABLE_CONDITION_TYPE_ACKNOWLEDGE: NodeId = NodeId::numeric(0, 9111);

/// 引用类型的直接父类型（仅覆盖浏览用到的层级）。
fn reference_supertype(reference_type: &NodeId) -> Option<NodeId> {
    let parent = if *reference_type == HAS_COMPONENT || *reference_type == HAS_PROPERTY {
        AGGREGATES
    } else if *reference_type == AGGREGATES || *reference_type == HAS_SUBTYPE {
        HAS_CHILD
    } else if *reference_type == HAS_CHILD
        || *reference_type == ORGANIZES
        || *reference_type == HAS_EVENT_SOURCE
    {
        HIERARCHICAL_REFERENCES
    } else {
        return None;
    };
    Some(parent)
}

/// `reference_type` 是否等于 `target` 或为其子类型。
pub fn is_reference_subtype_of(reference_type: &NodeId, target: &NodeId) -> bool {
    let mut current = reference_type.clone();
    loop {
        if current == *target {
            return true;
        }
        match reference_supertype(&current) {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_hierarchy() {
        assert!(is_reference_subtype_of(&HAS_COMPONENT, &HAS_CHILD));
        assert!(is_reference_subtype_of(&HAS_SUBTYPE, &HIERARCHICAL_REFERENCES));
        assert!(!is_reference_subtype_of(&HAS_MODELLING_RULE, &HAS_CHILD));
        assert!(!is_reference_subtype_of(&ORGANIZES, &HAS_CHILD));
    }
}
