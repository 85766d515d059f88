use hpl_config::{AppConfig, ConfigError};

const MACHINE_JSON: &str = r#"{
    "info": { "name": "press-01", "hpl": "secs-gem" },
    "settings": { "model": { "enable": true, "ipAddress": "10.0.0.5", "port": 5000 } },
    "variables": [
        { "name": "temp", "format": "float", "type": "Status Variable (SV)", "numericID": 1001 }
    ]
}"#;

#[test]
fn load_config_and_machine_from_env() {
    let path = std::env::temp_dir().join(format!("hpl-config-{}.json", std::process::id()));
    std::fs::write(&path, MACHINE_JSON).expect("write machine file");

    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("HPL_MACHINE_FILE", &path);
        std::env::set_var("HPL_CONNECT_TIMEOUT_MS", "750");
        std::env::set_var("HPL_IP_ADDRESS", "127.0.0.1");
        std::env::set_var("HPL_PORT", "");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.connect_timeout_ms, 750);
    assert_eq!(config.ip_address.as_deref(), Some("127.0.0.1"));
    assert_eq!(config.port, None);

    let machine = config.load_machine().expect("machine");
    assert_eq!(machine.info.name, "press-01");
    assert_eq!(machine.settings.model.ip_address, "127.0.0.1");
    assert_eq!(machine.settings.model.port, 5000);

    unsafe {
        std::env::set_var("HPL_PORT", "not-a-port");
    }
    assert!(matches!(AppConfig::from_env(), Err(ConfigError::Invalid(key, _)) if key == "HPL_PORT"));

    unsafe {
        std::env::set_var("HPL_PORT", "6000");
    }
    let missing = AppConfig {
        machine_file: "/nonexistent/machine.json".to_string(),
        ..AppConfig::from_env().expect("config")
    };
    assert_eq!(missing.port, Some(6000));
    assert!(matches!(missing.load_machine(), Err(ConfigError::Read(_, _))));

    let _ = std::fs::remove_file(&path);
}
