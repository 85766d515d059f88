use domain::{MachineInfo, Variable, VariableValue};
use hpl_host::in_memory::{ChannelDataSink, InMemoryAlertSink, InMemoryConfigStore};
use hpl_host::{Alert, AlertSink, AlertTemplate, ConfigStore, DataSink, HostError};

#[tokio::test]
async fn alerts_render_templates_and_are_idempotent() {
    let alerts = InMemoryAlertSink::new();
    alerts
        .pre_load(vec![AlertTemplate::new(
            "connectivity-alert",
            "press-01: Connection Error",
            "Not connected: {error}",
        )])
        .await;

    alerts
        .raise(Alert::new("connectivity-alert").with_error("refused"))
        .await;
    alerts
        .raise(Alert::new("connectivity-alert").with_error("refused"))
        .await;
    let active = alerts.get("connectivity-alert").expect("active");
    assert_eq!(active.msg, "press-01: Connection Error");
    assert_eq!(active.description, "Not connected: refused");
    assert_eq!(alerts.active_keys(), vec!["connectivity-alert".to_string()]);

    // 无模板的动态告警
    alerts
        .raise(Alert::new("variable-not-writable-error-temp").with_text("press-01: Error Writing Variable", "temp"))
        .await;
    assert_eq!(alerts.active_keys().len(), 2);

    alerts.clear("connectivity-alert").await;
    alerts.clear("never-raised").await;
    assert!(!alerts.is_active("connectivity-alert"));

    alerts.clear_all().await.expect("clear all");
    assert!(alerts.active_keys().is_empty());
    assert!(alerts.template("connectivity-alert").is_some());
}

#[tokio::test]
async fn config_store_round_trips_values() {
    let conf = InMemoryConfigStore::new();
    assert_eq!(conf.get("machines:a:connectionStatus").await.expect("get"), None);
    conf.set("machines:a:connectionStatus", serde_json::Value::Bool(true))
        .await
        .expect("set");
    assert_eq!(
        conf.get("machines:a:connectionStatus").await.expect("get"),
        Some(serde_json::Value::Bool(true))
    );
}

#[tokio::test]
async fn channel_sink_forwards_until_failing() {
    let (sink, mut records) = ChannelDataSink::new();
    let machine = MachineInfo {
        name: "press-01".to_string(),
        ..MachineInfo::default()
    };
    let variable: Variable =
        serde_json::from_str(r#"{ "name": "temp", "format": "float" }"#).expect("variable");

    sink.write(&machine, &variable, VariableValue::F64(1.5))
        .await
        .expect("write");
    let record = records.recv().await.expect("record");
    assert_eq!(record.machine, "press-01");
    assert_eq!(record.variable, "temp");
    assert_eq!(record.value, VariableValue::F64(1.5));

    sink.set_failing(true);
    let result = sink.write(&machine, &variable, VariableValue::F64(2.0)).await;
    assert!(matches!(result, Err(HostError::Write(_))));
}
