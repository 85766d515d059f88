use domain::{Access, Machine, VariableFormat, VariableKind, VariableValue};

const MACHINE_JSON: &str = r#"{
    "info": { "name": "secs-test", "hpl": "secs-gem" },
    "settings": {
        "model": {
            "enable": true,
            "ipAddress": "10.1.2.3",
            "port": 5050,
            "sparkDeviceID": 1,
            "equipDeviceID": 0,
            "requestFrequency": 1
        }
    },
    "variables": [
        { "name": "temp", "format": "float", "type": "Status Variable (SV)", "numericID": 1001 },
        { "name": "setpoint", "format": "int16", "type": "Equipment Constant (EC)",
          "numericID": 2001, "access": "write" },
        { "name": "lot", "format": "char", "type": "Data Variable (DV) (requires CEID)",
          "numericID": 3001, "CEID": 456, "access": "readonly" },
        { "name": "connected", "format": "bool", "type": "Something Else", "machineConnected": true }
    ]
}"#;

#[test]
fn machine_definition_parses() {
    let machine = Machine::from_json(MACHINE_JSON).expect("machine");
    let model = &machine.settings.model;

    assert!(model.enable);
    assert_eq!(model.ip_address, "10.1.2.3");
    assert_eq!(model.port, 5050);
    assert_eq!(model.request_frequency, 1);
    assert_eq!(model.link_test_frequency, 120);
    assert_eq!(model.disconnect_report_time, None);
    assert_eq!(
        machine.connection_status_path(),
        "machines:secs-test:settings:model:connectionStatus"
    );

    assert_eq!(machine.variables.len(), 4);
    assert_eq!(machine.variables[0].format, VariableFormat::Float);
    assert_eq!(machine.variables[1].access, Access::Write);
    assert_eq!(machine.variables[2].ceid, Some(456));
    assert_eq!(machine.variables[2].access, Access::Read);
    assert_eq!(machine.variables[3].kind, VariableKind::Other);
    assert!(machine.variables[3].machine_connected);
}

#[test]
fn variable_value_accessors() {
    assert_eq!(VariableValue::String("42".to_string()).as_i64(), Some(42));
    assert_eq!(VariableValue::I64(-1).as_u64(), None);
    assert_eq!(VariableValue::String("1".to_string()).as_bool(), Some(true));
    assert_eq!(VariableValue::String("yes".to_string()).as_bool(), Some(false));
    assert_eq!(
        VariableValue::Array(vec![VariableValue::U64(1), VariableValue::U64(2)]).to_string(),
        "[1,2]"
    );
}

#[test]
fn unknown_access_falls_back_to_read() {
    let variable: domain::Variable =
        serde_json::from_str(r#"{ "name": "temp", "format": "float", "access": "read-write" }"#)
            .expect("variable");
    assert_eq!(variable.access, Access::Read);

    let writable: domain::Variable =
        serde_json::from_str(r#"{ "name": "setpoint", "format": "int16", "access": "write" }"#)
            .expect("variable");
    assert_eq!(writable.access, Access::Write);
    assert_eq!(Access::default(), Access::Read);
}
