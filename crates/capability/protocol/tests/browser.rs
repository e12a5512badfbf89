use std::sync::Arc;

use gw_protocol::{
    BrowseDescription, BrowseDirection, BrowserOptions, ConnectParams, DefaultCertificatePolicy,
    ExpandedNodeId, MemoryNode, MemoryServer, NodeClassMask, NodeId, ProtocolError, TypeBrowser,
    UaConnector, UaSession, UserIdentity, Variant, ids,
};

fn params() -> ConnectParams {
    ConnectParams {
        endpoint_url: "opc.tcp://memory:4840".to_string(),
        use_security: false,
        identity: UserIdentity::Anonymous,
        session_name: "browser-test".to_string(),
        session_timeout_ms: 30_000,
        keep_alive_interval_ms: 5_000,
        certificate_policy: Arc::new(DefaultCertificatePolicy::new(false)),
    }
}

fn tank_type() -> NodeId {
    NodeId::numeric(1, 100)
}

fn heated_tank_type() -> NodeId {
    NodeId::numeric(1, 200)
}

/// TankType { Level, Info { Serial }, Loose } ← HeatedTankType { Level, Loose, Temperature }
fn tank_server() -> MemoryServer {
    let server = MemoryServer::new();
    server.add_object_type(MemoryNode::object_type(tank_type(), "TankType"), None);
    server.add_remote_reference(
        &tank_type(),
        ids::HAS_SUBTYPE,
        ExpandedNodeId {
            node_id: NodeId::numeric(0, 58),
            namespace_uri: None,
            server_index: 1,
        },
        false,
    );
    server.add_field(
        &tank_type(),
        MemoryNode::variable(NodeId::string(1, "TankType.Level"), "Level", Variant::Double(0.0))
            .with_description("Fill level")
            .with_data_type(NodeId::numeric(0, 11)),
        Some(ids::MODELLING_RULE_MANDATORY),
    );
    server.add_field(
        &tank_type(),
        MemoryNode::object(NodeId::string(1, "TankType.Info"), "Info"),
        Some(ids::MODELLING_RULE_MANDATORY),
    );
    server.add_field(
        &NodeId::string(1, "TankType.Info"),
        MemoryNode::variable(
            NodeId::string(1, "TankType.Info.Serial"),
            "Serial",
            Variant::String("T-1".to_string()),
        ),
        Some(ids::MODELLING_RULE_OPTIONAL),
    );
    server.add_field(
        &tank_type(),
        MemoryNode::variable(NodeId::string(1, "TankType.Loose"), "Loose", Variant::Empty),
        None,
    );

    server.add_object_type(
        MemoryNode::object_type(heated_tank_type(), "HeatedTankType"),
        Some(&tank_type()),
    );
    server.add_field(
        &heated_tank_type(),
        MemoryNode::variable(
            NodeId::string(1, "HeatedTankType.Level"),
            "Level",
            Variant::Double(0.0),
        ),
        Some(ids::MODELLING_RULE_MANDATORY),
    );
    server.add_field(
        &heated_tank_type(),
        MemoryNode::variable(
            NodeId::string(1, "HeatedTankType.Loose"),
            "Loose",
            Variant::Empty,
        ),
        Some(ids::MODELLING_RULE_MANDATORY),
    );
    server.add_field(
        &heated_tank_type(),
        MemoryNode::variable(
            NodeId::string(1, "HeatedTankType.Temperature"),
            "Temperature",
            Variant::Double(21.5),
        ),
        Some(ids::MODELLING_RULE_OPTIONAL),
    );
    server
}

async fn open(server: &MemoryServer) -> Arc<dyn UaSession> {
    server.connect(&params()).await.expect("session")
}

#[tokio::test]
async fn super_type_chain_stops_at_remote_reference() {
    let server = tank_server();
    let session = open(&server).await;
    let chain = TypeBrowser::default()
        .browse_super_types(session.as_ref(), &heated_tank_type())
        .await;
    assert_eq!(chain, vec![tank_type()]);
}

#[tokio::test]
async fn collects_inherited_declarations_with_overrides() {
    let server = tank_server();
    let session = open(&server).await;
    let set = TypeBrowser::default()
        .collect(session.as_ref(), &heated_tank_type())
        .await;

    let paths: Vec<&str> = set
        .as_slice()
        .iter()
        .map(|declaration| declaration.browse_path_text.as_str())
        .collect();
    assert_eq!(
        paths,
        vec!["Level", "Info", "Loose", "Info/Serial", "Level", "Loose", "Temperature"]
    );

    let (sub_level_id, sub_level) = set
        .iter()
        .find(|(_, declaration)| declaration.node_id == NodeId::string(1, "HeatedTankType.Level"))
        .expect("sub level");
    assert_eq!(sub_level.root_type_id, heated_tank_type());
    let overridden = set.overridden_of(sub_level_id).expect("overrides base level");
    assert_eq!(overridden.node_id, NodeId::string(1, "TankType.Level"));
    assert_eq!(overridden.description.as_deref(), Some("Fill level"));
    assert_eq!(overridden.data_type, Some(NodeId::numeric(0, 11)));
    assert_eq!(overridden.value_rank, Some(-1));

    // 父类型的松散实例没有进入覆盖表。
    let sub_loose = set.find_by_browse_path("Loose").expect("sub loose");
    assert_eq!(sub_loose.node_id, NodeId::string(1, "HeatedTankType.Loose"));
    assert!(sub_loose.overridden.is_none());

    let serial = set.find_by_browse_path("Info/Serial").expect("serial");
    assert_eq!(serial.display_path, "Info/Serial");
    assert_eq!(serial.modelling_rule, Some(ids::MODELLING_RULE_OPTIONAL));
    assert!(serial.parent.is_some());
}

#[tokio::test]
async fn paged_browse_returns_same_declarations() {
    let server = tank_server();
    let session = open(&server).await;
    let browser = TypeBrowser::default();
    let unpaged = browser.collect(session.as_ref(), &heated_tank_type()).await;

    server.set_page_size(1);
    let paged = browser.collect(session.as_ref(), &heated_tank_type()).await;
    assert_eq!(paged, unpaged);
}

#[tokio::test]
async fn too_many_pages_is_an_error() {
    let server = tank_server();
    server.set_page_size(1);
    let session = open(&server).await;
    let browser = TypeBrowser::new(BrowserOptions {
        max_continuation_pages: 1,
    });
    let description = BrowseDescription {
        node_id: tank_type(),
        direction: BrowseDirection::Forward,
        reference_type_id: ids::HAS_CHILD,
        include_subtypes: true,
        node_class_mask: NodeClassMask::ALL,
    };
    let err = browser
        .browse_all(session.as_ref(), &description)
        .await
        .expect_err("page limit");
    assert!(matches!(err, ProtocolError::TooManyPages(1)));
}

#[tokio::test]
async fn cyclic_children_terminate() {
    let server = MemoryServer::new();
    let looped = NodeId::numeric(1, 300);
    let a = NodeId::string(1, "Loop.A");
    let b = NodeId::string(1, "Loop.B");
    server.add_object_type(MemoryNode::object_type(looped.clone(), "LoopType"), None);
    server.add_field(&looped, MemoryNode::object(a.clone(), "A"), Some(ids::MODELLING_RULE_MANDATORY));
    server.add_field(&a, MemoryNode::object(b.clone(), "B"), Some(ids::MODELLING_RULE_MANDATORY));
    server.add_reference(&b, ids::HAS_COMPONENT, &a);

    let session = open(&server).await;
    let set = TypeBrowser::default().collect(session.as_ref(), &looped).await;
    let paths: Vec<&str> = set
        .as_slice()
        .iter()
        .map(|declaration| declaration.browse_path_text.as_str())
        .collect();
    assert_eq!(paths, vec!["A", "A/B", "A/B/A"]);
}

#[tokio::test]
async fn failed_child_browse_only_skips_that_branch() {
    let server = tank_server();
    server.fail_child_browse(&NodeId::string(1, "TankType.Info"));
    let session = open(&server).await;
    let set = TypeBrowser::default()
        .collect(session.as_ref(), &heated_tank_type())
        .await;
    assert_eq!(set.len(), 6);
    assert!(set.find_by_browse_path("Info").is_some());
    assert!(set.find_by_browse_path("Info/Serial").is_none());
}

#[tokio::test]
async fn instance_without_super_types_lists_its_children() {
    let server = tank_server();
    let tank = NodeId::string(2, "Tank1");
    server.add_node(MemoryNode::object(tank.clone(), "Tank1"));
    server.add_field(
        &tank,
        MemoryNode::variable(NodeId::string(2, "Tank1.Level"), "Level", Variant::Double(3.5)),
        Some(ids::MODELLING_RULE_MANDATORY),
    );
    let session = open(&server).await;
    let set = TypeBrowser::default().collect(session.as_ref(), &tank).await;
    assert_eq!(set.len(), 1);
    let level = set.find_by_node_suffix("Level").expect("level");
    assert_eq!(level.root_type_id, tank);
}
