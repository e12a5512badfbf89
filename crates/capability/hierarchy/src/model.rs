//! 组织层级模型。
//!
//! 配置服务返回 enterprise → site → area → workCenter → workUnit → workCell 的嵌套结构，
//! 每一级带 `name`（UUID）和 `friendly_name`（显示名）。
//! 缓存前展平为节点列表，每个节点带 `fullIdPath` / `fullNamePath`（以 `.` 连接）。

use serde::Deserialize;
use uuid::Uuid;

use crate::error::HierarchyError;

#[derive(Debug, Deserialize)]
struct Enterprise {
    #[serde(rename = "friendly_name", alias = "friendlyName")]
    friendly_name: String,
    name: String,
    #[serde(default, alias = "Sites")]
    sites: Vec<Site>,
}

#[derive(Debug, Deserialize)]
struct Site {
    #[serde(rename = "friendly_name", alias = "friendlyName")]
    friendly_name: String,
    name: String,
    #[serde(default, alias = "Areas")]
    areas: Vec<Area>,
}

#[derive(Debug, Deserialize)]
struct Area {
    #[serde(rename = "friendly_name", alias = "friendlyName")]
    friendly_name: String,
    name: String,
    #[serde(default, rename = "workCenters", alias = "WorkCenters", alias = "work_centers")]
    work_centers: Vec<WorkCenter>,
}

#[derive(Debug, Deserialize)]
struct WorkCenter {
    #[serde(rename = "friendly_name", alias = "friendlyName")]
    friendly_name: String,
    name: String,
    #[serde(default, rename = "workUnits", alias = "WorkUnits", alias = "work_units")]
    work_units: Vec<WorkUnit>,
}

#[derive(Debug, Deserialize)]
struct WorkUnit {
    #[serde(rename = "friendly_name", alias = "friendlyName")]
    friendly_name: String,
    name: String,
    #[serde(default, rename = "workCells", alias = "WorkCells", alias = "work_cells")]
    work_cells: Vec<WorkCell>,
}

#[derive(Debug, Deserialize)]
struct WorkCell {
    #[serde(rename = "friendly_name", alias = "friendlyName")]
    friendly_name: String,
    name: String,
}

/// 层级类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyLevel {
    Enterprise,
    Site,
    Area,
    WorkCenter,
    WorkUnit,
    WorkCell,
}

impl HierarchyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyLevel::Enterprise => "Enterprise",
            HierarchyLevel::Site => "Site",
            HierarchyLevel::Area => "Area",
            HierarchyLevel::WorkCenter => "WorkCenter",
            HierarchyLevel::WorkUnit => "WorkUnit",
            HierarchyLevel::WorkCell => "WorkCell",
        }
    }
}

/// 展平后的层级节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    pub id: Uuid,
    pub name: String,
    pub level: HierarchyLevel,
    pub full_id_path: String,
    pub full_name_path: String,
}

/// 展平后的层级（先序：父节点在子节点之前）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hierarchy {
    nodes: Vec<HierarchyNode>,
}

impl Hierarchy {
    /// 解析配置服务载荷。
    pub fn parse(payload: &str) -> Result<Self, HierarchyError> {
        if payload.trim().is_empty() {
            return Err(HierarchyError::Validation("configuration payload is empty".to_string()));
        }
        let enterprise: Enterprise = serde_json::from_str(payload)
            .map_err(|err| HierarchyError::Validation(format!("configuration payload invalid: {}", err)))?;

        let mut builder = Builder::default();
        let root = builder.push(None, HierarchyLevel::Enterprise, &enterprise.name, &enterprise.friendly_name)?;
        for site in &enterprise.sites {
            let site_idx = builder.push(Some(root), HierarchyLevel::Site, &site.name, &site.friendly_name)?;
            for area in &site.areas {
                let area_idx = builder.push(Some(site_idx), HierarchyLevel::Area, &area.name, &area.friendly_name)?;
                for center in &area.work_centers {
                    let center_idx = builder.push(
                        Some(area_idx),
                        HierarchyLevel::WorkCenter,
                        &center.name,
                        &center.friendly_name,
                    )?;
                    for unit in &center.work_units {
                        let unit_idx = builder.push(
                            Some(center_idx),
                            HierarchyLevel::WorkUnit,
                            &unit.name,
                            &unit.friendly_name,
                        )?;
                        for cell in &unit.work_cells {
                            builder.push(Some(unit_idx), HierarchyLevel::WorkCell, &cell.name, &cell.friendly_name)?;
                        }
                    }
                }
            }
        }
        Ok(Self { nodes: builder.nodes })
    }

    pub fn nodes(&self) -> &[HierarchyNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&HierarchyNode> {
        self.nodes.first()
    }

    /// 按 `fullNamePath` 排序后的节点（稳定排序）。
    pub fn sorted_by_name_path(&self) -> Vec<&HierarchyNode> {
        let mut nodes: Vec<&HierarchyNode> = self.nodes.iter().collect();
        nodes.sort_by(|left, right| left.full_name_path.cmp(&right.full_name_path));
        nodes
    }
}

#[derive(Default)]
struct Builder {
    nodes: Vec<HierarchyNode>,
}

impl Builder {
    fn push(
        &mut self,
        parent: Option<usize>,
        level: HierarchyLevel,
        name: &str,
        friendly_name: &str,
    ) -> Result<usize, HierarchyError> {
        let id = Uuid::parse_str(name.trim()).map_err(|_| {
            HierarchyError::Validation(format!("{} name is not a uuid: {}", level.as_str(), name))
        })?;
        let (full_id_path, full_name_path) = match parent.map(|idx| &self.nodes[idx]) {
            Some(parent) => (
                format!("{}.{}", parent.full_id_path, name),
                format!("{}.{}", parent.full_name_path, friendly_name),
            ),
            None => (name.to_string(), friendly_name.to_string()),
        };
        self.nodes.push(HierarchyNode {
            id,
            name: friendly_name.to_string(),
            level,
            full_id_path,
            full_name_path,
        });
        Ok(self.nodes.len() - 1)
    }
}
