//! 协议相关类型定义
//!
//! 与协议 SDK 边界交换的值类型：节点标识、限定名、变体值、状态码等。
//! 文本形式遵循通用写法：`i=2253`、`ns=2;s=Tank1.Level`、`ns=1;g=<uuid>`、`ns=1;b=<hex>`。

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ProtocolError;

/// 节点标识符
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    Numeric(u32),
    String(String),
    Guid(Uuid),
    Opaque(Vec<u8>),
}

/// 节点 ID（命名空间索引 + 标识符）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeId {
    pub const fn numeric(namespace: u16, value: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(value),
        }
    }

    pub fn string(namespace: u16, value: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: Identifier::String(value.into()),
        }
    }

    /// 空节点（`i=0`）。
    pub const fn null() -> Self {
        Self::numeric(0, 0)
    }

    pub fn is_null(&self) -> bool {
        match &self.identifier {
            Identifier::Numeric(value) => self.namespace == 0 && *value == 0,
            Identifier::String(value) => self.namespace == 0 && value.is_empty(),
            Identifier::Guid(value) => self.namespace == 0 && value.is_nil(),
            Identifier::Opaque(value) => self.namespace == 0 && value.is_empty(),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};", self.namespace)?;
        }
        match &self.identifier {
            Identifier::Numeric(value) => write!(f, "i={}", value),
            Identifier::String(value) => write!(f, "s={}", value),
            Identifier::Guid(value) => write!(f, "g={}", value),
            Identifier::Opaque(value) => write!(f, "b={}", hex::encode_upper(value)),
        }
    }
}

impl FromStr for NodeId {
    type Err = ProtocolError;

    /// 解析文本形式；纯数字视为命名空间 0 的数值标识。
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidNodeId(text.to_string());
        let trimmed = text.trim();
        if let Ok(value) = trimmed.parse::<u32>() {
            return Ok(NodeId::numeric(0, value));
        }

        let (namespace, rest) = match trimmed.strip_prefix("ns=") {
            Some(rest) => {
                let (ns, tail) = rest.split_once(';').ok_or_else(invalid)?;
                (ns.parse::<u16>().map_err(|_| invalid())?, tail)
            }
            None => (0, trimmed),
        };

        let (kind, value) = rest.split_once('=').ok_or_else(invalid)?;
        let identifier = match kind {
            "i" => Identifier::Numeric(value.parse::<u32>().map_err(|_| invalid())?),
            "s" => Identifier::String(value.to_string()),
            "g" => Identifier::Guid(Uuid::parse_str(value).map_err(|_| invalid())?),
            "b" => Identifier::Opaque(hex::decode(value).map_err(|_| invalid())?),
            _ => return Err(invalid()),
        };
        Ok(NodeId {
            namespace,
            identifier,
        })
    }
}

/// 扩展节点 ID（可能指向其他服务器或以命名空间 URI 表示）。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedNodeId {
    pub node_id: NodeId,
    pub namespace_uri: Option<String>,
    pub server_index: u32,
}

impl ExpandedNodeId {
    pub fn local(node_id: NodeId) -> Self {
        Self {
            node_id,
            namespace_uri: None,
            server_index: 0,
        }
    }

    /// 指向本地服务器以外（或仅以 URI 表示）的引用。
    pub fn is_absolute(&self) -> bool {
        self.server_index != 0 || self.namespace_uri.is_some()
    }

    /// 本地引用转为 NodeId；绝对引用返回 None。
    pub fn to_local(&self) -> Option<&NodeId> {
        if self.is_absolute() {
            None
        } else {
            Some(&self.node_id)
        }
    }
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        Self::local(node_id)
    }
}

/// 限定名（命名空间索引 + 名称）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub namespace: u16,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace: u16, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "{}:", self.namespace)?;
        }
        f.write_str(&self.name)
    }
}

/// 本地化文本
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalizedText {
    pub locale: Option<String>,
    pub text: String,
}

impl LocalizedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            locale: None,
            text: text.into(),
        }
    }
}

impl fmt::Display for LocalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// 状态码（高两位为严重级别：00 Good / 01 Uncertain / 10 Bad）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusCode(pub u32);

impl StatusCode {
    pub const GOOD: StatusCode = StatusCode(0);
    pub const BAD_UNEXPECTED_ERROR: StatusCode = StatusCode(0x8001_0000);
    pub const BAD_COMMUNICATION_ERROR: StatusCode = StatusCode(0x8005_0000);
    pub const BAD_TIMEOUT: StatusCode = StatusCode(0x800A_0000);
    pub const BAD_CERTIFICATE_INVALID: StatusCode = StatusCode(0x8012_0000);
    pub const BAD_CERTIFICATE_UNTRUSTED: StatusCode = StatusCode(0x801A_0000);
    pub const BAD_NODE_ID_UNKNOWN: StatusCode = StatusCode(0x8034_0000);
    pub const BAD_ATTRIBUTE_ID_INVALID: StatusCode = StatusCode(0x8035_0000);
    pub const BAD_CONTINUATION_POINT_INVALID: StatusCode = StatusCode(0x804A_0000);
    pub const BAD_METHOD_INVALID: StatusCode = StatusCode(0x8075_0000);
    pub const BAD_NOT_CONNECTED: StatusCode = StatusCode(0x808A_0000);
    pub const BAD_CONNECTION_CLOSED: StatusCode = StatusCode(0x80AE_0000);

    pub fn is_good(self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    pub fn is_bad(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            StatusCode::GOOD => "Good",
            StatusCode::BAD_UNEXPECTED_ERROR => "BadUnexpectedError",
            StatusCode::BAD_COMMUNICATION_ERROR => "BadCommunicationError",
            StatusCode::BAD_TIMEOUT => "BadTimeout",
            StatusCode::BAD_CERTIFICATE_INVALID => "BadCertificateInvalid",
            StatusCode::BAD_CERTIFICATE_UNTRUSTED => "BadCertificateUntrusted",
            StatusCode::BAD_NODE_ID_UNKNOWN => "BadNodeIdUnknown",
            StatusCode::BAD_ATTRIBUTE_ID_INVALID => "BadAttributeIdInvalid",
            StatusCode::BAD_CONTINUATION_POINT_INVALID => "BadContinuationPointInvalid",
            StatusCode::BAD_METHOD_INVALID => "BadMethodInvalid",
            StatusCode::BAD_NOT_CONNECTED => "BadNotConnected",
            StatusCode::BAD_CONNECTION_CLOSED => "BadConnectionClosed",
            StatusCode(code) => return write!(f, "0x{:08X}", code),
        };
        f.write_str(name)
    }
}

/// 变体值
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Empty,
    Boolean(bool),
    Byte(u8),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    Double(f64),
    String(String),
    ByteString(Vec<u8>),
    DateTime(DateTime<Utc>),
    NodeId(NodeId),
    QualifiedName(QualifiedName),
    LocalizedText(LocalizedText),
    StatusCode(StatusCode),
    Array(Vec<Variant>),
}

impl Variant {
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    pub fn as_node_id(&self) -> Option<&NodeId> {
        match self {
            Variant::NodeId(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_byte_string(&self) -> Option<&[u8]> {
        match self {
            Variant::ByteString(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_date_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Variant::DateTime(value) => Some(*value),
            _ => None,
        }
    }

    /// 整数类取值（严重度、ValueRank 等）。
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Variant::Byte(value) => Some(i64::from(*value)),
            Variant::UInt16(value) => Some(i64::from(*value)),
            Variant::Int32(value) => Some(i64::from(*value)),
            Variant::UInt32(value) => Some(i64::from(*value)),
            Variant::Int64(value) => Some(*value),
            _ => None,
        }
    }

    /// 文本类取值：字符串、本地化文本、限定名。
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Variant::String(value) => Some(value),
            Variant::LocalizedText(value) => Some(&value.text),
            Variant::QualifiedName(value) => Some(&value.name),
            _ => None,
        }
    }

    /// 转为 JSON 值（运维接口输出）。
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Variant::Empty => Value::Null,
            Variant::Boolean(value) => Value::Bool(*value),
            Variant::Byte(value) => Value::from(*value),
            Variant::UInt16(value) => Value::from(*value),
            Variant::Int32(value) => Value::from(*value),
            Variant::UInt32(value) => Value::from(*value),
            Variant::Int64(value) => Value::from(*value),
            Variant::Double(value) => serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Variant::Array(items) => Value::Array(items.iter().map(Variant::to_json).collect()),
            other => Value::String(other.to_string()),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Empty => Ok(()),
            Variant::Boolean(value) => write!(f, "{}", value),
            Variant::Byte(value) => write!(f, "{}", value),
            Variant::UInt16(value) => write!(f, "{}", value),
            Variant::Int32(value) => write!(f, "{}", value),
            Variant::UInt32(value) => write!(f, "{}", value),
            Variant::Int64(value) => write!(f, "{}", value),
            Variant::Double(value) => write!(f, "{}", value),
            Variant::String(value) => f.write_str(value),
            Variant::ByteString(value) => f.write_str(&hex::encode_upper(value)),
            Variant::DateTime(value) => write!(f, "{}", value.to_rfc3339()),
            Variant::NodeId(value) => write!(f, "{}", value),
            Variant::QualifiedName(value) => write!(f, "{}", value),
            Variant::LocalizedText(value) => write!(f, "{}", value),
            Variant::StatusCode(value) => write!(f, "{}", value),
            Variant::Array(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// 带状态的读取结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    pub value: Variant,
    pub status: StatusCode,
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    pub fn good(value: Variant) -> Self {
        Self {
            value,
            status: StatusCode::GOOD,
            source_timestamp: None,
        }
    }

    pub fn bad(status: StatusCode) -> Self {
        Self {
            value: Variant::Empty,
            status,
            source_timestamp: None,
        }
    }
}

/// 节点类别（取值即浏览掩码位）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeClass {
    Object = 1,
    Variable = 2,
    Method = 4,
    ObjectType = 8,
    VariableType = 16,
    ReferenceType = 32,
    DataType = 64,
    View = 128,
}

impl NodeClass {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeClass::Object => "Object",
            NodeClass::Variable => "Variable",
            NodeClass::Method => "Method",
            NodeClass::ObjectType => "ObjectType",
            NodeClass::VariableType => "VariableType",
            NodeClass::ReferenceType => "ReferenceType",
            NodeClass::DataType => "DataType",
            NodeClass::View => "View",
        }
    }
}

/// 浏览时的节点类别过滤掩码；0 表示不过滤。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeClassMask(pub u32);

impl NodeClassMask {
    pub const ALL: NodeClassMask = NodeClassMask(0);

    pub fn of(classes: &[NodeClass]) -> Self {
        Self(classes.iter().fold(0, |mask, class| mask | *class as u32))
    }

    pub fn matches(self, class: NodeClass) -> bool {
        self.0 == 0 || self.0 & class as u32 != 0
    }
}

/// 属性 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeId {
    NodeId = 1,
    NodeClass = 2,
    BrowseName = 3,
    DisplayName = 4,
    Description = 5,
    EventNotifier = 12,
    Value = 13,
    DataType = 14,
    ValueRank = 15,
}

/// 浏览方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseDirection {
    Forward,
    Inverse,
    Both,
}

/// 浏览请求
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseDescription {
    pub node_id: NodeId,
    pub direction: BrowseDirection,
    pub reference_type_id: NodeId,
    pub include_subtypes: bool,
    pub node_class_mask: NodeClassMask,
}

/// 浏览得到的一条引用
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDescription {
    pub reference_type_id: NodeId,
    pub is_forward: bool,
    pub node_id: ExpandedNodeId,
    pub browse_name: QualifiedName,
    pub display_name: LocalizedText,
    pub node_class: NodeClass,
}

/// 续浏览令牌（不透明）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContinuationPoint(pub Vec<u8>);

/// 单个节点的浏览结果
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseResult {
    pub status: StatusCode,
    pub continuation_point: Option<ContinuationPoint>,
    pub references: Vec<ReferenceDescription>,
}

impl BrowseResult {
    pub fn bad(status: StatusCode) -> Self {
        Self {
            status,
            continuation_point: None,
            references: Vec::new(),
        }
    }
}

/// 读取请求
#[derive(Debug, Clone, PartialEq)]
pub struct ReadValueId {
    pub node_id: NodeId,
    pub attribute_id: AttributeId,
}

impl ReadValueId {
    pub fn new(node_id: NodeId, attribute_id: AttributeId) -> Self {
        Self {
            node_id,
            attribute_id,
        }
    }

    pub fn value(node_id: NodeId) -> Self {
        Self::new(node_id, AttributeId::Value)
    }
}

/// 方法调用请求
#[derive(Debug, Clone, PartialEq)]
pub struct CallMethodRequest {
    pub object_id: NodeId,
    pub method_id: NodeId,
    pub input_arguments: Vec<Variant>,
}

/// 方法调用结果
#[derive(Debug, Clone, PartialEq)]
pub struct CallMethodResult {
    pub status: StatusCode,
    pub output_arguments: Vec<Variant>,
}

/// 事件过滤器中的字段选择子句
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleAttributeOperand {
    pub type_definition_id: NodeId,
    pub browse_path: Vec<QualifiedName>,
    pub attribute_id: AttributeId,
}

impl SimpleAttributeOperand {
    /// 以 `/` 分隔的浏览路径（如 `ActiveState/Id`），按 Value 属性选择。
    pub fn value(type_definition_id: NodeId, path: &str) -> Self {
        Self {
            type_definition_id,
            browse_path: path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| QualifiedName::new(0, segment))
                .collect(),
            attribute_id: AttributeId::Value,
        }
    }

    /// 选择事件所属对象自身的 NodeId 属性（空浏览路径）。
    pub fn node_id(type_definition_id: NodeId) -> Self {
        Self {
            type_definition_id,
            browse_path: Vec::new(),
            attribute_id: AttributeId::NodeId,
        }
    }

    /// 浏览路径文本；空路径返回空串。
    pub fn path_text(&self) -> String {
        self.browse_path
            .iter()
            .map(|name| name.name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// 事件过滤器（仅 select 子句）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventFilter {
    pub select_clauses: Vec<SimpleAttributeOperand>,
}

/// 一次事件通知：字段值与过滤器 select 子句一一对应。
#[derive(Debug, Clone, PartialEq)]
pub struct EventNotification {
    pub subscription_id: u32,
    pub monitored_item_id: u32,
    pub fields: Vec<Variant>,
}
