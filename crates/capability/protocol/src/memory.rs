//! 内存地址空间。
//!
//! 在进程内实现 `UaConnector` / `UaSession`，用于测试和离线演示（`GW_OPCUA_SIMULATED`）：
//! - 节点图 + 双向引用，支持分页浏览（续浏览令牌）
//! - 故障注入：握手失败、证书错误、子节点浏览失败、方法调用失败
//! - 记录方法调用；向已注册的事件监控项推送事件；向会话发送保活状态

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::client::{
    CertificateInfo, ConnectParams, KeepAliveHandler, MonitoredItemSettings, NotificationSink,
    SubscriptionSettings, UaConnector, UaSession,
};
use crate::error::ProtocolError;
use crate::ids;
use crate::subscription::field_name;
use crate::types::{
    AttributeId, BrowseDescription, BrowseDirection, BrowseResult, CallMethodRequest,
    CallMethodResult, ContinuationPoint, DataValue, EventFilter, EventNotification,
    ExpandedNodeId, LocalizedText, NodeClass, NodeId, QualifiedName, ReadValueId,
    ReferenceDescription, StatusCode, Variant,
};

/// 内存节点
#[derive(Debug, Clone)]
pub struct MemoryNode {
    pub node_id: NodeId,
    pub node_class: NodeClass,
    pub browse_name: QualifiedName,
    pub display_name: LocalizedText,
    pub description: Option<LocalizedText>,
    pub data_type: Option<NodeId>,
    pub value_rank: Option<i32>,
    pub value: Variant,
    pub event_notifier: Option<u8>,
}

impl MemoryNode {
    pub fn new(node_id: NodeId, node_class: NodeClass, browse_name: &str) -> Self {
        Self {
            node_id,
            node_class,
            browse_name: QualifiedName::new(0, browse_name),
            display_name: LocalizedText::new(browse_name),
            description: None,
            data_type: None,
            value_rank: None,
            value: Variant::Empty,
            event_notifier: None,
        }
    }

    pub fn object(node_id: NodeId, browse_name: &str) -> Self {
        Self::new(node_id, NodeClass::Object, browse_name)
    }

    pub fn object_type(node_id: NodeId, browse_name: &str) -> Self {
        Self::new(node_id, NodeClass::ObjectType, browse_name)
    }

    pub fn variable(node_id: NodeId, browse_name: &str, value: Variant) -> Self {
        let mut node = Self::new(node_id, NodeClass::Variable, browse_name);
        node.value = value;
        node.value_rank = Some(-1);
        node
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(LocalizedText::new(description));
        self
    }

    pub fn with_data_type(mut self, data_type: NodeId) -> Self {
        self.data_type = Some(data_type);
        self
    }
}

#[derive(Debug, Clone)]
struct MemoryReference {
    reference_type: NodeId,
    target: ExpandedNodeId,
    is_forward: bool,
}

struct SessionEntry {
    keep_alive: Option<Arc<dyn KeepAliveHandler>>,
    subscriptions: HashSet<u32>,
}

struct MonitoredItemEntry {
    session_id: u64,
    subscription_id: u32,
    item_id: u32,
    filter: EventFilter,
    sink: Arc<dyn NotificationSink>,
}

#[derive(Default)]
struct MemoryState {
    nodes: HashMap<NodeId, MemoryNode>,
    references: HashMap<NodeId, Vec<MemoryReference>>,
    page_size: usize,
    continuations: HashMap<Vec<u8>, Vec<ReferenceDescription>>,
    next_continuation: u64,
    failing_child_browse: HashSet<NodeId>,
    failing_connects: usize,
    application_certificate_invalid: bool,
    server_certificate_error: Option<StatusCode>,
    call_failure: bool,
    calls: Vec<CallMethodRequest>,
    connects: usize,
    sessions: HashMap<u64, SessionEntry>,
    monitored_items: Vec<MonitoredItemEntry>,
    next_session_id: u64,
    next_subscription_id: u32,
    next_item_id: u32,
}

/// 内存服务器（克隆共享同一地址空间）
#[derive(Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        let server = Self::default();
        server.add_node(MemoryNode::object(ids::SERVER, "Server"));
        server
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.state)
    }

    pub fn add_node(&self, node: MemoryNode) {
        self.lock().nodes.insert(node.node_id.clone(), node);
    }

    /// 添加引用（同时登记反向引用）。
    pub fn add_reference(&self, source: &NodeId, reference_type: NodeId, target: &NodeId) {
        let mut state = self.lock();
        state
            .references
            .entry(source.clone())
            .or_default()
            .push(MemoryReference {
                reference_type: reference_type.clone(),
                target: ExpandedNodeId::local(target.clone()),
                is_forward: true,
            });
        state
            .references
            .entry(target.clone())
            .or_default()
            .push(MemoryReference {
                reference_type,
                target: ExpandedNodeId::local(source.clone()),
                is_forward: false,
            });
    }

    /// 添加指向其他服务器的单向引用。
    pub fn add_remote_reference(
        &self,
        source: &NodeId,
        reference_type: NodeId,
        target: ExpandedNodeId,
        is_forward: bool,
    ) {
        self.lock()
            .references
            .entry(source.clone())
            .or_default()
            .push(MemoryReference {
                reference_type,
                target,
                is_forward,
            });
    }

    /// 添加类型节点，并以 HasSubtype 挂到父类型下。
    pub fn add_object_type(&self, node: MemoryNode, super_type: Option<&NodeId>) {
        let node_id = node.node_id.clone();
        self.add_node(node);
        if let Some(super_type) = super_type {
            self.add_reference(super_type, ids::HAS_SUBTYPE, &node_id);
        }
    }

    /// 在父节点下添加字段（变量用 HasProperty，其余用 HasComponent）及其建模规则。
    pub fn add_field(&self, parent: &NodeId, node: MemoryNode, modelling_rule: Option<NodeId>) {
        let node_id = node.node_id.clone();
        let reference_type = if node.node_class == NodeClass::Variable {
            ids::HAS_PROPERTY
        } else {
            ids::HAS_COMPONENT
        };
        self.add_node(node);
        self.add_reference(parent, reference_type, &node_id);
        if let Some(rule) = modelling_rule {
            self.add_reference(&node_id, ids::HAS_MODELLING_RULE, &rule);
        }
    }

    pub fn set_value(&self, node_id: &NodeId, value: Variant) {
        if let Some(node) = self.lock().nodes.get_mut(node_id) {
            node.value = value;
        }
    }

    /// 每页最多返回的引用数（0 表示不分页）。
    pub fn set_page_size(&self, page_size: usize) {
        self.lock().page_size = page_size;
    }

    pub fn fail_child_browse(&self, node_id: &NodeId) {
        self.lock().failing_child_browse.insert(node_id.clone());
    }

    /// 接下来 `count` 次握手失败。
    pub fn fail_next_connects(&self, count: usize) {
        self.lock().failing_connects = count;
    }

    pub fn set_application_certificate_invalid(&self, invalid: bool) {
        self.lock().application_certificate_invalid = invalid;
    }

    /// 握手时服务器证书校验报告的错误（交由信任策略判断）。
    pub fn set_server_certificate_error(&self, error: Option<StatusCode>) {
        self.lock().server_certificate_error = error;
    }

    pub fn set_call_failure(&self, fail: bool) {
        self.lock().call_failure = fail;
    }

    pub fn calls(&self) -> Vec<CallMethodRequest> {
        self.lock().calls.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    pub fn open_session_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.lock().sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn monitored_item_count(&self) -> usize {
        self.lock().monitored_items.len()
    }

    /// 向所有打开的会话发送一次保活状态。
    pub fn signal_keep_alive(&self, status: StatusCode) {
        let handlers: Vec<(u64, Arc<dyn KeepAliveHandler>)> = self
            .lock()
            .sessions
            .iter()
            .filter_map(|(id, entry)| entry.keep_alive.clone().map(|handler| (*id, handler)))
            .collect();
        for (session_id, handler) in handlers {
            handler.on_keep_alive(session_id, status);
        }
    }

    /// 向指定会话发送保活状态；会话已关闭或未安装回调时忽略。
    pub fn signal_keep_alive_for(&self, session_id: u64, status: StatusCode) {
        let handler = self
            .lock()
            .sessions
            .get(&session_id)
            .and_then(|entry| entry.keep_alive.clone());
        if let Some(handler) = handler {
            handler.on_keep_alive(session_id, status);
        }
    }

    /// 推送事件；`values` 以字段名（如 `ActiveState/Id`、`ConditionId`）为键。
    /// 返回收到事件的监控项数量。
    pub fn emit_event(&self, values: &HashMap<String, Variant>) -> usize {
        let deliveries: Vec<(Arc<dyn NotificationSink>, EventNotification)> = self
            .lock()
            .monitored_items
            .iter()
            .map(|item| {
                let fields = item
                    .filter
                    .select_clauses
                    .iter()
                    .map(|clause| values.get(&field_name(clause)).cloned().unwrap_or_default())
                    .collect();
                (
                    item.sink.clone(),
                    EventNotification {
                        subscription_id: item.subscription_id,
                        monitored_item_id: item.item_id,
                        fields,
                    },
                )
            })
            .collect();
        let count = deliveries.len();
        for (sink, notification) in deliveries {
            sink.on_event(notification);
        }
        count
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl UaConnector for MemoryServer {
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn UaSession>, ProtocolError> {
        let server_certificate_error = {
            let mut state = self.lock();
            state.connects += 1;
            if state.application_certificate_invalid {
                return Err(ProtocolError::ApplicationCertificate(
                    "application instance certificate is invalid".to_string(),
                ));
            }
            state.server_certificate_error
        };

        if let Some(error) = server_certificate_error {
            let certificate = CertificateInfo {
                subject: "CN=memory-server".to_string(),
                thumbprint: "00".to_string(),
            };
            if !params.certificate_policy.validate(&certificate, error) {
                return Err(ProtocolError::CertificateRejected {
                    subject: certificate.subject,
                });
            }
        }

        let mut state = self.lock();
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(ProtocolError::Connection(format!(
                "{} unreachable",
                params.endpoint_url
            )));
        }
        state.next_session_id += 1;
        let id = state.next_session_id;
        state.sessions.insert(
            id,
            SessionEntry {
                keep_alive: None,
                subscriptions: HashSet::new(),
            },
        );
        Ok(Arc::new(MemorySession {
            id,
            name: params.session_name.clone(),
            state: self.state.clone(),
        }))
    }
}

/// 内存会话
pub struct MemorySession {
    id: u64,
    name: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySession {
    fn lock_open(&self) -> Result<MutexGuard<'_, MemoryState>, ProtocolError> {
        let state = lock_state(&self.state);
        if state.sessions.contains_key(&self.id) {
            Ok(state)
        } else {
            Err(ProtocolError::Status(StatusCode::BAD_CONNECTION_CLOSED))
        }
    }
}

impl MemoryState {
    fn browse_one(&mut self, description: &BrowseDescription) -> BrowseResult {
        if description.reference_type_id == ids::HAS_CHILD
            && self.failing_child_browse.contains(&description.node_id)
        {
            return BrowseResult::bad(StatusCode::BAD_COMMUNICATION_ERROR);
        }
        if !self.nodes.contains_key(&description.node_id) {
            return BrowseResult::bad(StatusCode::BAD_NODE_ID_UNKNOWN);
        }

        let references: Vec<ReferenceDescription> = self
            .references
            .get(&description.node_id)
            .map(|references| {
                references
                    .iter()
                    .filter(|reference| match description.direction {
                        BrowseDirection::Forward => reference.is_forward,
                        BrowseDirection::Inverse => !reference.is_forward,
                        BrowseDirection::Both => true,
                    })
                    .filter(|reference| {
                        description.reference_type_id.is_null()
                            || reference.reference_type == description.reference_type_id
                            || (description.include_subtypes
                                && ids::is_reference_subtype_of(
                                    &reference.reference_type,
                                    &description.reference_type_id,
                                ))
                    })
                    .map(|reference| self.describe(reference))
                    .filter(|reference| description.node_class_mask.matches(reference.node_class))
                    .collect()
            })
            .unwrap_or_default();
        self.page(references)
    }

    fn describe(&self, reference: &MemoryReference) -> ReferenceDescription {
        let target = reference
            .target
            .to_local()
            .and_then(|node_id| self.nodes.get(node_id));
        let (browse_name, display_name, node_class) = match target {
            Some(node) => (
                node.browse_name.clone(),
                node.display_name.clone(),
                node.node_class,
            ),
            None => {
                let name = reference.target.node_id.to_string();
                (
                    QualifiedName::new(0, name.clone()),
                    LocalizedText::new(name),
                    NodeClass::Object,
                )
            }
        };
        ReferenceDescription {
            reference_type_id: reference.reference_type.clone(),
            is_forward: reference.is_forward,
            node_id: reference.target.clone(),
            browse_name,
            display_name,
            node_class,
        }
    }

    fn page(&mut self, mut references: Vec<ReferenceDescription>) -> BrowseResult {
        let mut continuation_point = None;
        if self.page_size > 0 && references.len() > self.page_size {
            let rest = references.split_off(self.page_size);
            self.next_continuation += 1;
            let token = self.next_continuation.to_be_bytes().to_vec();
            self.continuations.insert(token.clone(), rest);
            continuation_point = Some(ContinuationPoint(token));
        }
        BrowseResult {
            status: StatusCode::GOOD,
            continuation_point,
            references,
        }
    }

    fn read_one(&self, request: &ReadValueId) -> DataValue {
        let Some(node) = self.nodes.get(&request.node_id) else {
            return DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN);
        };
        let value = match request.attribute_id {
            AttributeId::NodeId => Some(Variant::NodeId(node.node_id.clone())),
            AttributeId::NodeClass => Some(Variant::Int32(node.node_class as i32)),
            AttributeId::BrowseName => Some(Variant::QualifiedName(node.browse_name.clone())),
            AttributeId::DisplayName => Some(Variant::LocalizedText(node.display_name.clone())),
            AttributeId::Description => node.description.clone().map(Variant::LocalizedText),
            AttributeId::EventNotifier => node.event_notifier.map(Variant::Byte),
            AttributeId::Value => {
                (node.node_class == NodeClass::Variable).then(|| node.value.clone())
            }
            AttributeId::DataType => node.data_type.clone().map(Variant::NodeId),
            AttributeId::ValueRank => node.value_rank.map(Variant::Int32),
        };
        match value {
            Some(value) => DataValue::good(value),
            None => DataValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
        }
    }

    fn call_one(&self, request: &CallMethodRequest) -> CallMethodResult {
        let status = if request.method_id == ids::CONDITION_TYPE_CONDITION_REFRESH {
            StatusCode::GOOD
        } else if request.method_id == ids::ACKNOWLEDGEABLE_CONDITION_TYPE_ACKNOWLEDGE {
            if self.nodes.contains_key(&request.object_id) {
                StatusCode::GOOD
            } else {
                StatusCode::BAD_NODE_ID_UNKNOWN
            }
        } else {
            StatusCode::BAD_METHOD_INVALID
        };
        CallMethodResult {
            status,
            output_arguments: Vec::new(),
        }
    }
}

#[async_trait]
impl UaSession for MemorySession {
    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn browse(
        &self,
        nodes: &[BrowseDescription],
    ) -> Result<Vec<BrowseResult>, ProtocolError> {
        let mut state = self.lock_open()?;
        Ok(nodes
            .iter()
            .map(|description| state.browse_one(description))
            .collect())
    }

    async fn browse_next(
        &self,
        points: &[ContinuationPoint],
        release: bool,
    ) -> Result<Vec<BrowseResult>, ProtocolError> {
        let mut state = self.lock_open()?;
        let mut results = Vec::with_capacity(points.len());
        for point in points {
            let Some(rest) = state.continuations.remove(&point.0) else {
                results.push(BrowseResult::bad(StatusCode::BAD_CONTINUATION_POINT_INVALID));
                continue;
            };
            if release {
                results.push(BrowseResult {
                    status: StatusCode::GOOD,
                    continuation_point: None,
                    references: Vec::new(),
                });
            } else {
                results.push(state.page(rest));
            }
        }
        Ok(results)
    }

    async fn read(&self, nodes: &[ReadValueId]) -> Result<Vec<DataValue>, ProtocolError> {
        let state = self.lock_open()?;
        Ok(nodes.iter().map(|request| state.read_one(request)).collect())
    }

    async fn call(
        &self,
        requests: &[CallMethodRequest],
    ) -> Result<Vec<CallMethodResult>, ProtocolError> {
        let mut state = self.lock_open()?;
        state.calls.extend(requests.iter().cloned());
        if state.call_failure {
            return Err(ProtocolError::Status(StatusCode::BAD_COMMUNICATION_ERROR));
        }
        Ok(requests.iter().map(|request| state.call_one(request)).collect())
    }

    async fn create_subscription(
        &self,
        _settings: &SubscriptionSettings,
    ) -> Result<u32, ProtocolError> {
        let mut state = self.lock_open()?;
        state.next_subscription_id += 1;
        let subscription_id = state.next_subscription_id;
        if let Some(entry) = state.sessions.get_mut(&self.id) {
            entry.subscriptions.insert(subscription_id);
        }
        Ok(subscription_id)
    }

    async fn create_event_monitored_item(
        &self,
        subscription_id: u32,
        settings: &MonitoredItemSettings,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<u32, ProtocolError> {
        let mut state = self.lock_open()?;
        let owns = state
            .sessions
            .get(&self.id)
            .map(|entry| entry.subscriptions.contains(&subscription_id))
            .unwrap_or(false);
        if !owns {
            return Err(ProtocolError::Status(StatusCode::BAD_NODE_ID_UNKNOWN));
        }
        state.next_item_id += 1;
        let item_id = state.next_item_id;
        state.monitored_items.push(MonitoredItemEntry {
            session_id: self.id,
            subscription_id,
            item_id,
            filter: settings.filter.clone(),
            sink,
        });
        Ok(item_id)
    }

    fn set_keep_alive(&self, handler: Option<Arc<dyn KeepAliveHandler>>) {
        if let Some(entry) = lock_state(&self.state).sessions.get_mut(&self.id) {
            entry.keep_alive = handler;
        }
    }

    async fn close(&self) -> Result<(), ProtocolError> {
        let mut state = lock_state(&self.state);
        state.sessions.remove(&self.id);
        let id = self.id;
        state.monitored_items.retain(|item| item.session_id != id);
        Ok(())
    }
}

impl std::fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySession")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
