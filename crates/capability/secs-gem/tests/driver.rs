use domain::{Access, Machine, MachineInfo, MachineModel, MachineSettings, Variable, VariableFormat, VariableKind, VariableValue};
use hpl_host::ConfigStore;
use hpl_host::in_memory::{ChannelDataSink, DataRecord, InMemoryAlertSink, InMemoryConfigStore};
use hpl_secs_gem::message::{Encoder, Header, body, stype};
use hpl_secs_gem::{HplSecsGem, SecsError, SecsItem};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(10);

fn variable(name: &str, kind: VariableKind, format: VariableFormat, numeric_id: Option<u32>) -> Variable {
    Variable {
        name: name.to_string(),
        description: None,
        format,
        kind,
        numeric_id,
        ceid: None,
        access: Access::Read,
        array: false,
        machine_connected: false,
    }
}

fn machine(port: u16, variables: Vec<Variable>) -> Machine {
    Machine {
        info: MachineInfo {
            name: "press-01".to_string(),
            ..MachineInfo::default()
        },
        settings: MachineSettings {
            model: MachineModel {
                enable: true,
                ip_address: "127.0.0.1".to_string(),
                port,
                request_frequency: 1,
                disconnect_report_time: Some(0),
                ..MachineModel::default()
            },
        },
        variables,
    }
}

fn polled_variables() -> Vec<Variable> {
    let mut setpoint = variable("setpoint", VariableKind::EquipmentConstant, VariableFormat::Int16, Some(2001));
    setpoint.access = Access::Write;
    let mut online = variable("online", VariableKind::Other, VariableFormat::Bool, None);
    online.machine_connected = true;
    vec![
        variable("temp", VariableKind::StatusVariable, VariableFormat::Int16, Some(1001)),
        variable("pressure", VariableKind::StatusVariable, VariableFormat::Float, Some(1002)),
        setpoint,
        online,
    ]
}

struct Host {
    alerts: Arc<InMemoryAlertSink>,
    conf: Arc<InMemoryConfigStore>,
    data: Arc<ChannelDataSink>,
    records: mpsc::UnboundedReceiver<DataRecord>,
}

impl Host {
    fn new() -> Self {
        let (data, records) = ChannelDataSink::new();
        Self {
            alerts: Arc::new(InMemoryAlertSink::new()),
            conf: Arc::new(InMemoryConfigStore::new()),
            data: Arc::new(data),
            records,
        }
    }

    async fn driver(&self, machine: Machine) -> HplSecsGem {
        HplSecsGem::new(machine, self.alerts.clone(), self.conf.clone())
            .await
            .with_connect_timeout(Duration::from_millis(500))
    }

    /// 等待某个变量的下一次推送
    async fn next_value(&mut self, variable: &str) -> VariableValue {
        tokio::time::timeout(WAIT, async {
            loop {
                let record = self.records.recv().await.expect("record");
                if record.variable == variable {
                    return record.value;
                }
            }
        })
        .await
        .expect("value published in time")
    }

    async fn status(&self) -> Option<serde_json::Value> {
        self.conf
            .get("machines:press-01:settings:model:connectionStatus")
            .await
            .expect("status")
    }
}

async fn read_frame(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut prefix = [0u8; 4];
    stream.read_exact(&mut prefix).await.ok()?;
    let mut rest = vec![0u8; u32::from_be_bytes(prefix) as usize];
    stream.read_exact(&mut rest).await.ok()?;
    let mut frame = prefix.to_vec();
    frame.extend(rest);
    Some(frame)
}

/// 回环设备：应答握手、S1F3 与 S2F15，把收到的每个请求头转发给测试
async fn fake_equipment(listener: TcpListener, seen: mpsc::UnboundedSender<Header>) {
    let (mut stream, _) = listener.accept().await.expect("accept");
    let equipment = Encoder {
        equip_device_id: 0,
        spark_device_id: 1,
        capacity: 256,
    };
    while let Some(frame) = read_frame(&mut stream).await {
        let Some(header) = Header::parse(&frame) else {
            continue;
        };
        let _ = seen.send(header);
        let to = header.system_bytes();
        let reply = if header.stype == stype::SELECT_REQ {
            Some(equipment.control(stype::SELECT_RSP, header.transaction_id))
        } else if header.is(1, 13) {
            Some(equipment.reply(1, 14, to, &body::establish_comm_ack()))
        } else if header.is(5, 3) {
            Some(equipment.reply(5, 4, to, &body::accepted()))
        } else if header.is(1, 3) {
            let values = SecsItem::list(vec![SecsItem::I2(vec![1234]), SecsItem::F4(vec![23.0])]);
            Some(equipment.reply(1, 4, to, &values))
        } else if header.is(2, 15) {
            Some(equipment.reply(2, 16, to, &body::accepted()))
        } else {
            None
        };
        if let Some(reply) = reply {
            if stream.write_all(&reply).await.is_err() {
                break;
            }
        }
    }
}

#[tokio::test]
async fn polls_loopback_equipment() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let (seen_tx, mut seen) = mpsc::unbounded_channel();
    tokio::spawn(fake_equipment(listener, seen_tx));

    let mut host = Host::new();
    let mut driver = host.driver(machine(port, polled_variables())).await;
    assert_eq!(host.status().await, Some(serde_json::Value::Bool(false)));

    driver.start(host.data.clone()).await.expect("start");
    assert_eq!(host.next_value("online").await, VariableValue::Bool(true));
    assert_eq!(host.next_value("temp").await, VariableValue::I64(1234));
    assert_eq!(host.status().await, Some(serde_json::Value::Bool(true)));
    assert!(!host.alerts.is_active("bad-status-response-alert"));
    assert!(!host.alerts.is_active("connectivity-alert"));

    driver
        .write_data("setpoint", VariableValue::I64(42))
        .await
        .expect("write");
    let write = tokio::time::timeout(WAIT, async {
        loop {
            let header = seen.recv().await.expect("header");
            if header.is(2, 15) {
                return header;
            }
        }
    })
    .await
    .expect("S2F15 sent");
    assert!(write.wait);

    driver.stop().await.expect("stop");
    assert!(!driver.is_running());
    assert_eq!(host.status().await, Some(serde_json::Value::Bool(false)));
}

#[tokio::test]
async fn unreachable_equipment_reports_disconnected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let mut host = Host::new();
    let mut driver = host.driver(machine(port, polled_variables())).await;
    driver.start(host.data.clone()).await.expect("start");

    assert_eq!(host.next_value("online").await, VariableValue::Bool(false));
    assert!(host.alerts.is_active("connectivity-alert"));
    assert_eq!(host.status().await, Some(serde_json::Value::Bool(false)));

    let result = driver.write_data("temp", VariableValue::I64(1)).await;
    assert!(matches!(result, Err(SecsError::NotWritable(_))));
    assert!(host.alerts.is_active("variable-not-writable-error-temp"));

    driver.stop().await.expect("stop");
    assert!(host.alerts.active_keys().is_empty());
}

#[tokio::test]
async fn disabled_machine_does_not_connect() {
    let host = Host::new();
    let mut machine = machine(1, polled_variables());
    machine.settings.model.enable = false;
    let mut driver = host.driver(machine).await;

    driver.start(host.data.clone()).await.expect("start");
    assert!(!driver.is_running());
    assert!(matches!(
        driver.write_data("setpoint", VariableValue::I64(1)).await,
        Err(SecsError::NotRunning)
    ));
    driver.wait().await.expect("nothing to wait for");
}

#[tokio::test]
async fn missing_numeric_id_fails_start() {
    let host = Host::new();
    let variables = vec![variable("temp", VariableKind::StatusVariable, VariableFormat::Int16, None)];
    let mut driver = host.driver(machine(1, variables)).await;

    let result = driver.start(host.data.clone()).await;
    assert!(matches!(result, Err(SecsError::MissingNumericId(name)) if name == "temp"));
    assert!(host.alerts.is_active("numeric-id-missing-alert"));
    let alert = host.alerts.get("numeric-id-missing-alert").expect("alert");
    assert!(alert.description.contains("temp"));
}

#[tokio::test]
async fn data_variable_without_ceid_is_skipped_with_alert() {
    let host = Host::new();
    let mut variables = polled_variables();
    variables.push(variable("lot", VariableKind::DataVariable, VariableFormat::Char, Some(3001)));
    let mut driver = host.driver(machine(1, variables)).await;

    driver.start(host.data.clone()).await.expect("start");
    assert!(host.alerts.is_active("DV-requires-CEID-alert"));
    driver.stop().await.expect("stop");
}

#[tokio::test]
async fn publish_failure_raises_database_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let (seen_tx, mut seen) = mpsc::unbounded_channel();
    tokio::spawn(fake_equipment(listener, seen_tx));

    let host = Host::new();
    host.data.set_failing(true);
    let mut driver = host.driver(machine(port, polled_variables())).await;
    driver.start(host.data.clone()).await.expect("start");

    // 第一个 S1F3 的响应在推送时失败
    tokio::time::timeout(WAIT, async {
        loop {
            if seen.recv().await.expect("header").is(1, 3) {
                break;
            }
        }
    })
    .await
    .expect("S1F3 sent");
    tokio::time::timeout(WAIT, async {
        while !host.alerts.is_active("database-error") {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("database-error raised");

    driver.stop().await.expect("stop");
}
