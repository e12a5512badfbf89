use gw_config::{AppConfig, ConfigError};

// 环境变量为进程级共享状态，所有场景放在同一个测试中顺序执行。
#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::remove_var("GW_OPCUA_SERVER_URL");
    }
    assert!(matches!(AppConfig::from_env(), Err(ConfigError::Missing(_))));

    unsafe {
        std::env::set_var("GW_OPCUA_SERVER_URL", "opc.tcp://localhost:4840");
        std::env::set_var("GW_HTTP_ADDR", "127.0.0.1:8081");
        std::env::set_var("GW_OPCUA_FIELDS", "Level, Temperature");
        std::env::set_var("GW_DELIVERY_RETRY", "5");
        std::env::set_var(
            "GW_WEB_APIS",
            r#"[{"name":"Thingworx","baseUrl":"http://tw.local","routes":{"AddAlarmUrl":"/alarms","GetConfigurationUrl":"/config"}}]"#,
        );
        std::env::set_var("GW_UPDATE_CONFIGURATION_WEB_APIS", "Thingworx");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:8081");
    assert_eq!(config.opcua.server_url, "opc.tcp://localhost:4840");
    assert_eq!(config.opcua.subscriptions, vec!["Alarms".to_string()]);
    assert_eq!(
        config.opcua.fields,
        vec!["Level".to_string(), "Temperature".to_string()]
    );
    assert_eq!(config.delivery.retry_count, 5);
    assert_eq!(config.delivery.schedule_interval_seconds, 60);
    assert!(config.alarm.auto_acknowledge);
    assert_eq!(config.alarm.acknowledge_message, "Auto Acknowledged");
    assert!(config.find_web_api("Thingworx").is_some());

    unsafe {
        std::env::set_var("GW_UPDATE_CONFIGURATION_WEB_APIS", "Missing");
    }
    assert!(matches!(AppConfig::from_env(), Err(ConfigError::Invalid(_, _))));

    unsafe {
        std::env::remove_var("GW_UPDATE_CONFIGURATION_WEB_APIS");
        std::env::set_var(
            "GW_WEB_APIS",
            r#"[{"name":"A","baseUrl":"http://a"},{"name":"A","baseUrl":"http://b"}]"#,
        );
    }
    assert!(matches!(AppConfig::from_env(), Err(ConfigError::Invalid(_, _))));

    for name in ["Plant/A", ".hidden", "C:drive", " padded"] {
        let apis = serde_json::json!([{ "name": name, "baseUrl": "http://a" }]).to_string();
        unsafe {
            std::env::set_var("GW_WEB_APIS", apis);
        }
        match AppConfig::from_env() {
            Err(ConfigError::Invalid(key, _)) => assert_eq!(key, "GW_WEB_APIS", "{name}"),
            other => panic!("{name}: {other:?}"),
        }
    }

    unsafe {
        std::env::set_var("GW_WEB_APIS", "not json");
    }
    assert!(matches!(AppConfig::from_env(), Err(ConfigError::Invalid(_, _))));
}
