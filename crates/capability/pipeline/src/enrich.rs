//! 取值增强。
//!
//! 对每条事件：读取事件类型的显示名、源节点当前值，
//! 再用 TypeBrowser 发现源节点字段，按配置的字段名（节点 ID 后缀匹配）批量读值。
//! 任何读取失败只影响对应的值，不影响记录生成。

use gw_protocol::{AttributeId, NodeId, ReadValueId, TypeBrowser, UaSession};
use tracing::{debug, warn};

use crate::event::AlarmEvent;

/// 事件增强器
#[derive(Debug, Clone, Default)]
pub struct Enricher {
    browser: TypeBrowser,
    fields: Vec<String>,
}

impl Enricher {
    pub fn new(browser: TypeBrowser, fields: Vec<String>) -> Self {
        Self { browser, fields }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub async fn enrich(&self, session: &dyn UaSession, event: &mut AlarmEvent) {
        self.read_basics(session, event).await;
        if self.fields.is_empty() {
            return;
        }

        let declarations = self.browser.collect(session, &event.source_node).await;
        let targets: Vec<NodeId> = self
            .fields
            .iter()
            .filter_map(|field| match declarations.find_by_node_suffix(field) {
                Some(declaration) => Some(declaration.node_id.clone()),
                None => {
                    debug!(
                        target: "gw.pipeline",
                        source = %event.source_node,
                        field = %field,
                        "enrichment_field_not_found"
                    );
                    None
                }
            })
            .collect();
        if targets.is_empty() {
            return;
        }

        let reads: Vec<ReadValueId> = targets.iter().cloned().map(ReadValueId::value).collect();
        let values = match session.read(&reads).await {
            Ok(values) => values,
            Err(err) => {
                warn!(
                    target: "gw.pipeline",
                    source = %event.source_node,
                    error = %err,
                    "enrichment_read_failed"
                );
                return;
            }
        };
        for (node_id, value) in targets.iter().zip(values) {
            if value.status.is_good() {
                event.values.insert(value_key(node_id), value.value);
            }
        }
    }

    /// 事件类型显示名 + 源节点当前值（一次批量读取）。
    async fn read_basics(&self, session: &dyn UaSession, event: &mut AlarmEvent) {
        let reads = [
            ReadValueId::new(event.event_type.clone(), AttributeId::DisplayName),
            ReadValueId::value(event.source_node.clone()),
        ];
        match session.read(&reads).await {
            Ok(values) => {
                let mut values = values.into_iter();
                if let Some(description) = values.next().filter(|value| value.status.is_good()) {
                    event.event_type_description =
                        description.value.as_text().map(str::to_string);
                }
                if let Some(current) = values.next().filter(|value| value.status.is_good()) {
                    if !current.value.is_empty() {
                        event.current_value = Some(current.value);
                    }
                }
            }
            Err(err) => {
                warn!(
                    target: "gw.pipeline",
                    source = %event.source_node,
                    error = %err,
                    "event_basics_read_failed"
                );
            }
        }
    }
}

/// 增强字段的键：节点 ID 文本按 `.` 分割后的最后一段。
pub fn value_key(node_id: &NodeId) -> String {
    let text = node_id.to_string();
    match text.rsplit_once('.') {
        Some((_, last)) => last.to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_key_uses_last_segment() {
        assert_eq!(value_key(&NodeId::string(2, "Plant.Tank1.Level")), "Level");
        assert_eq!(value_key(&NodeId::numeric(2, 17)), "ns=2;i=17");
    }
}
