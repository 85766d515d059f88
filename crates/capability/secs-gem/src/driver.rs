//! 驱动生命周期与反应器任务
//!
//! 一个 tokio 任务独占 `Session` 与 `TcpStream`，在命令通道、socket 读、
//! 进行中的连接与会话最近的定时器之间 `select!`，并按顺序执行会话产生的动作。

use crate::alerts;
use crate::error::SecsError;
use crate::mapper::{MapperIssue, VariableMap};
use crate::session::{Action, Session};
use domain::{Machine, MachineInfo, MachineModel, Variable, VariableValue};
use hpl_host::{Alert, AlertSink, ConfigStore, DataSink};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, Span, debug, info, info_span, warn};

/// 默认连接超时
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);
const READ_CHUNK: usize = 4096;
const COMMAND_CAPACITY: usize = 16;

type ConnectFuture = Pin<Box<dyn Future<Output = io::Result<TcpStream>> + Send>>;

enum Command {
    Write {
        name: String,
        value: VariableValue,
        reply: oneshot::Sender<Result<(), SecsError>>,
    },
    Stop,
}

struct Running {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<Result<(), SecsError>>,
}

/// SECS/GEM 机台驱动
pub struct HplSecsGem {
    machine: Machine,
    alerts: Arc<dyn AlertSink>,
    conf: Arc<dyn ConfigStore>,
    connect_timeout: Duration,
    data: Option<Arc<dyn DataSink>>,
    running: Option<Running>,
}

impl HplSecsGem {
    /// 预加载告警模板并发布连接状态 false
    pub async fn new(
        machine: Machine,
        alerts: Arc<dyn AlertSink>,
        conf: Arc<dyn ConfigStore>,
    ) -> Self {
        alerts.pre_load(alerts::templates(&machine.info.name)).await;
        let driver = Self {
            machine,
            alerts,
            conf,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            data: None,
            running: None,
        };
        driver.publish_status(false).await;
        driver
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// 构建变量映射并启动反应器；机台未启用时不连接
    pub async fn start(&mut self, data: Arc<dyn DataSink>) -> Result<(), SecsError> {
        if self.running.is_some() {
            self.stop().await?;
        }
        self.data = Some(data.clone());
        self.publish_status(false).await;

        let model = &self.machine.settings.model;
        if !model.enable {
            info!(machine = %self.machine.info.name, "machine disabled, not connecting");
            return Ok(());
        }

        let map = self.build_map().await?;
        let mut session = Session::new(self.machine.info.name.clone(), model, map);
        session.open();

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let reactor = Reactor {
            session,
            machine: self.machine.info.clone(),
            status_path: self.machine.connection_status_path(),
            address: format!("{}:{}", model.ip_address, model.port),
            connect_timeout: self.connect_timeout,
            alerts: self.alerts.clone(),
            conf: self.conf.clone(),
            data,
            commands: commands_rx,
            commands_open: true,
            replies: Vec::new(),
            stream: None,
            connecting: None,
            span: Span::none(),
        };
        let span = info_span!("secs_driver", machine = %self.machine.info.name);
        info!(machine = %self.machine.info.name, address = %reactor.address, "driver started");
        self.running = Some(Running {
            commands: commands_tx,
            task: tokio::spawn(reactor.run().instrument(span)),
        });
        Ok(())
    }

    async fn build_map(&self) -> Result<VariableMap, SecsError> {
        match VariableMap::build(&self.machine.variables) {
            Ok((map, issues)) => {
                self.alerts.clear(alerts::NUMERIC_ID_MISSING).await;
                if issues.is_empty() {
                    self.alerts.clear(alerts::DV_REQUIRES_CEID).await;
                }
                for issue in issues {
                    let MapperIssue::DataVariableWithoutCeid(name) = issue;
                    warn!(machine = %self.machine.info.name, variable = %name, "data variable without CEID skipped");
                    self.alerts
                        .raise(Alert::new(alerts::DV_REQUIRES_CEID).with_error(name))
                        .await;
                }
                Ok(map)
            }
            Err(SecsError::MissingNumericId(name)) => {
                self.alerts
                    .raise(Alert::new(alerts::NUMERIC_ID_MISSING).with_error(name.clone()))
                    .await;
                Err(SecsError::MissingNumericId(name))
            }
            Err(error) => Err(error),
        }
    }

    /// 停止反应器（进行中的请求最多等待 2 秒），清除全部告警
    pub async fn stop(&mut self) -> Result<(), SecsError> {
        if let Some(running) = self.running.take() {
            // 任务已结束时发送失败，直接等待结果
            let _ = running.commands.send(Command::Stop).await;
            match running.task.await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    warn!(machine = %self.machine.info.name, error = %error, "driver ended with error");
                }
                Err(error) => {
                    warn!(machine = %self.machine.info.name, error = %error, "driver task failed");
                }
            }
        }
        self.alerts.clear_all().await?;
        self.publish_status(false).await;
        info!(machine = %self.machine.info.name, "driver stopped");
        Ok(())
    }

    pub async fn restart(&mut self) -> Result<(), SecsError> {
        let data = self.data.clone().ok_or(SecsError::NotRunning)?;
        self.stop().await?;
        self.start(data).await
    }

    /// 替换连接配置并重启
    pub async fn update_model(&mut self, model: MachineModel) -> Result<(), SecsError> {
        self.machine.settings.model = model;
        if self.data.is_some() {
            self.restart().await?;
        }
        Ok(())
    }

    /// 写入设备常量
    pub async fn write_data(&self, name: &str, value: VariableValue) -> Result<(), SecsError> {
        let running = self.running.as_ref().ok_or(SecsError::NotRunning)?;
        let (reply, response) = oneshot::channel();
        running
            .commands
            .send(Command::Write {
                name: name.to_string(),
                value,
                reply,
            })
            .await
            .map_err(|_| SecsError::ChannelClosed)?;
        response.await.map_err(|_| SecsError::ChannelClosed)?
    }

    /// 等待反应器结束（停止后为 Ok，重连耗尽时为 `ReconnectExhausted`）
    pub async fn wait(&mut self) -> Result<(), SecsError> {
        let Some(running) = self.running.as_mut() else {
            return Ok(());
        };
        let result = (&mut running.task).await;
        self.running = None;
        match result {
            Ok(outcome) => outcome,
            Err(error) => Err(SecsError::Connection(format!("driver task failed: {error}"))),
        }
    }

    async fn publish_status(&self, connected: bool) {
        publish_status(
            self.conf.as_ref(),
            &self.machine.connection_status_path(),
            connected,
        )
        .await;
    }
}

async fn publish_status(conf: &dyn ConfigStore, path: &str, connected: bool) {
    if let Err(error) = conf.set(path, serde_json::Value::Bool(connected)).await {
        warn!(path = %path, error = %error, "failed to publish connection status");
    }
}

struct Reactor {
    session: Session,
    machine: MachineInfo,
    status_path: String,
    address: String,
    connect_timeout: Duration,
    alerts: Arc<dyn AlertSink>,
    conf: Arc<dyn ConfigStore>,
    data: Arc<dyn DataSink>,
    commands: mpsc::Receiver<Command>,
    commands_open: bool,
    replies: Vec<(oneshot::Sender<Result<(), SecsError>>, Result<(), SecsError>)>,
    stream: Option<TcpStream>,
    connecting: Option<ConnectFuture>,
    /// 当前连接的会话 span（每次建连一个新的会话 ID）
    span: Span,
}

impl Reactor {
    async fn run(mut self) -> Result<(), SecsError> {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            loop {
                let actions = self.session.take_actions();
                if actions.is_empty() {
                    break;
                }
                for action in actions {
                    let span = self.span.clone();
                    if let Some(outcome) = self.execute(action).instrument(span).await {
                        return outcome;
                    }
                }
            }
            // 写入结果在其告警动作执行之后回复
            for (reply, result) in self.replies.drain(..) {
                let _ = reply.send(result);
            }

            let deadline = self.session.next_deadline();
            tokio::select! {
                command = self.commands.recv(), if self.commands_open => {
                    let _entered = self.span.enter();
                    match command {
                        Some(Command::Write { name, value, reply }) => {
                            let result = self.session.write_data(&name, &value, Instant::now());
                            self.replies.push((reply, result));
                        }
                        Some(Command::Stop) => self.session.begin_stop(Instant::now()),
                        None => {
                            self.commands_open = false;
                            self.session.begin_stop(Instant::now());
                        }
                    }
                }
                result = poll_connect(&mut self.connecting) => {
                    self.connecting = None;
                    let _entered = self.span.enter();
                    match result {
                        Ok(stream) => {
                            if let Err(error) = stream.set_nodelay(true) {
                                debug!(error = %error, "set_nodelay failed");
                            }
                            self.stream = Some(stream);
                            self.session.on_connected(Instant::now());
                        }
                        Err(error) => self.session.on_connect_failed(&error.to_string(), Instant::now()),
                    }
                }
                read = read_some(&mut self.stream, &mut buf) => {
                    let _entered = self.span.enter();
                    match read {
                        Ok(0) => {
                            self.stream = None;
                            self.session.on_socket_end(Instant::now());
                        }
                        Ok(n) => self.session.on_data(&buf[..n], Instant::now()),
                        Err(error) => {
                            self.stream = None;
                            self.session.on_socket_error(&error.to_string(), Instant::now());
                        }
                    }
                }
                _ = sleep_until_opt(deadline) => {
                    let _entered = self.span.enter();
                    self.session.on_timer(Instant::now());
                }
            }
        }
    }

    /// 执行一个动作；返回 `Some` 时反应器结束
    async fn execute(&mut self, action: Action) -> Option<Result<(), SecsError>> {
        match action {
            Action::Connect => {
                self.stream = None;
                self.span = info_span!(
                    "connection",
                    session_id = %hpl_telemetry::new_session_id(),
                    address = %self.address
                );
                self.connecting = Some(Box::pin(connect(
                    self.address.clone(),
                    self.connect_timeout,
                )));
            }
            Action::Send(frame) => match self.stream.as_mut() {
                Some(stream) => match stream.write_all(&frame).await {
                    Ok(()) => hpl_telemetry::record_frame_sent(),
                    Err(error) => {
                        self.stream = None;
                        let _entered = self.span.enter();
                        self.session
                            .on_socket_error(&error.to_string(), Instant::now());
                    }
                },
                None => debug!(len = frame.len(), "not connected, frame dropped"),
            },
            Action::Close { graceful } => {
                self.connecting = None;
                if let Some(mut stream) = self.stream.take() {
                    if graceful {
                        if let Err(error) = stream.shutdown().await {
                            debug!(error = %error, "socket shutdown failed");
                        }
                    }
                }
            }
            Action::Publish {
                variable,
                value,
                report_errors,
            } => self.publish(&variable, value, report_errors).await,
            Action::RaiseAlert(alert) => self.alerts.raise(alert).await,
            Action::ClearAlert(key) => self.alerts.clear(&key).await,
            Action::ConnectionStatus(connected) => {
                publish_status(self.conf.as_ref(), &self.status_path, connected).await;
            }
            Action::Stopped => return Some(Ok(())),
            Action::Terminate { failures } => {
                return Some(Err(SecsError::ReconnectExhausted(failures)));
            }
        }
        None
    }

    async fn publish(&mut self, variable: &Variable, value: VariableValue, report_errors: bool) {
        match self.data.write(&self.machine, variable, value).await {
            Ok(()) => {
                hpl_telemetry::record_value_published();
                if report_errors {
                    self.alerts.clear(alerts::DATABASE_ERROR).await;
                }
            }
            Err(error) => {
                hpl_telemetry::record_publish_failure();
                warn!(variable = %variable.name, error = %error, "failed to write variable value");
                if report_errors {
                    self.alerts
                        .raise(Alert::new(alerts::DATABASE_ERROR).with_error(error.to_string()))
                        .await;
                }
            }
        }
    }
}

async fn connect(address: String, timeout: Duration) -> io::Result<TcpStream> {
    match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
    }
}

async fn poll_connect(connecting: &mut Option<ConnectFuture>) -> io::Result<TcpStream> {
    match connecting {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn read_some(stream: &mut Option<TcpStream>, buf: &mut [u8]) -> io::Result<usize> {
    match stream {
        Some(stream) => stream.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
