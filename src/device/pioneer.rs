//! Pioneer VSX receiver driver
//!
//! Speaks the receiver's line-based telnet control protocol over TCP.
//! Commands are terminated by `\r`, responses by `\r\n`. The driver runs in
//! its own task, reconnects with backoff when the link drops, and reports
//! everything it hears as [`DeviceEvent`]s.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};

use super::{DeviceCommand, DeviceCommander, DeviceEvent};
use crate::config::DeviceConfig;
use crate::error::{BridgeError, Result};
use crate::state::InputId;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_RECONNECT_DELAY_MS: u64 = 30_000;
/// Pause between the status queries sent after connecting
const QUERY_SPACING: Duration = Duration::from_millis(50);
const EVENT_CHANNEL_SIZE: usize = 256;

/// Volume level at 0 dB; each step is 0.5 dB
const VOLUME_ZERO_DB_LEVEL: f64 = 161.0;
const VOLUME_MAX_LEVEL: f64 = 185.0;

/// Factory input names, overwritten by whatever the receiver reports
const DEFAULT_INPUTS: &[(&str, &str)] = &[
    ("00", "PHONO"),
    ("01", "CD"),
    ("02", "TUNER"),
    ("03", "CD-R/TAPE"),
    ("04", "DVD"),
    ("05", "TV/SAT"),
    ("10", "VIDEO 1"),
    ("12", "MULTI CH IN"),
    ("14", "VIDEO 2"),
    ("15", "DVR/BDR"),
    ("17", "iPod/USB"),
    ("19", "HDMI 1"),
    ("20", "HDMI 2"),
    ("21", "HDMI 3"),
    ("22", "HDMI 4"),
    ("23", "HDMI 5"),
    ("25", "BD"),
    ("26", "HOME MEDIA GALLERY"),
    ("33", "ADAPTER PORT"),
];

/// A response line decoded from the receiver
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Power(bool),
    /// Raw volume level (0-185)
    Volume(u16),
    Mute(bool),
    Input(String),
    InputName { id: String, name: String },
}

/// Decode one response line; `None` for lines the bridge does not track
pub fn parse_response(line: &str) -> Option<Response> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("PWR") {
        return match rest {
            "0" => Some(Response::Power(true)),
            "1" | "2" => Some(Response::Power(false)),
            _ => None,
        };
    }
    if let Some(rest) = line.strip_prefix("VOL") {
        return rest.parse().ok().map(Response::Volume);
    }
    if let Some(rest) = line.strip_prefix("MUT") {
        return match rest {
            "0" => Some(Response::Mute(true)),
            "1" => Some(Response::Mute(false)),
            _ => None,
        };
    }
    if let Some(rest) = line.strip_prefix("FN") {
        if rest.len() == 2 && rest.bytes().all(|b| b.is_ascii_digit()) {
            return Some(Response::Input(rest.to_string()));
        }
        return None;
    }
    if let Some(rest) = line.strip_prefix("RGB") {
        // RGB<id:2><renamed flag:1><name>
        let id = rest.get(..2)?;
        let name = rest.get(3..)?.trim();
        if !id.bytes().all(|b| b.is_ascii_digit()) || name.is_empty() {
            return None;
        }
        return Some(Response::InputName {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    None
}

pub fn level_to_db(level: u16) -> f64 {
    (level as f64 - VOLUME_ZERO_DB_LEVEL) * 0.5
}

pub fn db_to_level(db: f64) -> u16 {
    (db * 2.0 + VOLUME_ZERO_DB_LEVEL)
        .round()
        .clamp(0.0, VOLUME_MAX_LEVEL) as u16
}

/// Encode a command as a protocol line (without terminator)
pub fn encode_command(command: &DeviceCommand) -> Result<String> {
    let line = match command {
        DeviceCommand::Power(true) => "PO".to_string(),
        DeviceCommand::Power(false) => "PF".to_string(),
        DeviceCommand::Volume(db) => {
            if !db.is_finite() {
                return Err(BridgeError::InvalidCommand(format!("volume {} dB", db)));
            }
            format!("{:03}VL", db_to_level(*db))
        },
        DeviceCommand::Mute(true) => "MO".to_string(),
        DeviceCommand::Mute(false) => "MF".to_string(),
        DeviceCommand::SelectInput(id) => {
            let id = id.as_str();
            if id.is_empty() || id.len() > 2 || !id.bytes().all(|b| b.is_ascii_digit()) {
                return Err(BridgeError::InvalidCommand(format!("input id '{}'", id)));
            }
            format!("{:0>2}FN", id)
        },
    };
    Ok(line)
}

/// Handle for sending commands to a running [`PioneerReceiver`]
#[derive(Clone)]
pub struct PioneerHandle {
    cmd_tx: mpsc::UnboundedSender<String>,
    shutdown_flag: Arc<Mutex<bool>>,
    shutdown: Arc<Notify>,
}

impl PioneerHandle {
    /// Stop the driver task and close the connection
    pub fn shutdown(&self) {
        *self.shutdown_flag.lock() = true;
        self.shutdown.notify_one();
    }
}

impl DeviceCommander for PioneerHandle {
    fn send(&self, command: DeviceCommand) -> Result<()> {
        let line = encode_command(&command)?;
        self.cmd_tx
            .send(line)
            .map_err(|_| BridgeError::DeviceUnavailable("driver task stopped".to_string()))
    }
}

enum SessionEnd {
    Stop,
    Lost(String),
}

/// Pioneer receiver connection task
pub struct PioneerReceiver {
    host: String,
    port: u16,
    event_tx: mpsc::Sender<DeviceEvent>,
    cmd_rx: mpsc::UnboundedReceiver<String>,
    /// Input names known so far (factory defaults plus receiver renames)
    names: HashMap<String, String>,
    reconnect_count: u64,
    shutdown_flag: Arc<Mutex<bool>>,
    shutdown: Arc<Notify>,
}

impl PioneerReceiver {
    /// Spawn the driver task and return its command handle and event stream
    pub fn spawn(config: &DeviceConfig) -> (PioneerHandle, mpsc::Receiver<DeviceEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let shutdown_flag = Arc::new(Mutex::new(false));
        let shutdown = Arc::new(Notify::new());

        let receiver = PioneerReceiver {
            host: config.host.clone(),
            port: config.port,
            event_tx,
            cmd_rx,
            names: DEFAULT_INPUTS
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
            reconnect_count: 0,
            shutdown_flag: Arc::clone(&shutdown_flag),
            shutdown: Arc::clone(&shutdown),
        };

        tokio::spawn(receiver.run());

        (
            PioneerHandle {
                cmd_tx,
                shutdown_flag,
                shutdown,
            },
            event_rx,
        )
    }

    async fn run(mut self) {
        loop {
            if *self.shutdown_flag.lock() {
                break;
            }

            info!("📡 Connecting to receiver at {}:{}", self.host, self.port);
            match timeout(CONNECT_TIMEOUT, TcpStream::connect((self.host.as_str(), self.port))).await {
                Ok(Ok(stream)) => {
                    self.reconnect_count = 0;
                    info!("✅ Receiver connected");

                    if self.event_tx.send(DeviceEvent::Connected).await.is_err() {
                        break;
                    }

                    match self.serve(stream).await {
                        SessionEnd::Stop => break,
                        SessionEnd::Lost(reason) => {
                            warn!("🔌 Receiver connection lost: {}", reason);
                            if self.event_tx.send(DeviceEvent::Disconnected).await.is_err() {
                                break;
                            }
                        },
                    }
                },
                Ok(Err(e)) => debug!("Receiver connect failed: {}", e),
                Err(_) => debug!("Receiver connect timed out after {:?}", CONNECT_TIMEOUT),
            }

            self.drop_pending_commands();

            self.reconnect_count += 1;
            let delay_ms = std::cmp::min(MAX_RECONNECT_DELAY_MS, 1000 * self.reconnect_count);
            debug!("⏳ Receiver reconnect #{} in {}ms", self.reconnect_count, delay_ms);

            tokio::select! {
                _ = sleep(Duration::from_millis(delay_ms)) => {},
                _ = self.shutdown.notified() => break,
            }
        }

        debug!("Receiver driver stopped");
    }

    /// Commands issued while disconnected are stale by the time we reconnect
    fn drop_pending_commands(&mut self) {
        while let Ok(line) = self.cmd_rx.try_recv() {
            warn!("Receiver offline, dropping command {}", line);
        }
    }

    async fn serve(&mut self, stream: TcpStream) -> SessionEnd {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        if let Err(e) = self.query_status(&mut writer).await {
            return SessionEnd::Lost(e.to_string());
        }

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if !self.handle_line(&line).await {
                            return SessionEnd::Stop;
                        }
                    },
                    Ok(None) => return SessionEnd::Lost("connection closed by receiver".to_string()),
                    Err(e) => return SessionEnd::Lost(e.to_string()),
                },
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(line) => {
                        debug!("➡️  Receiver command: {}", line);
                        if let Err(e) = write_line(&mut writer, &line).await {
                            return SessionEnd::Lost(e.to_string());
                        }
                    },
                    None => return SessionEnd::Stop,
                },
                _ = self.shutdown.notified() => return SessionEnd::Stop,
            }
        }
    }

    /// Ask for the full current state and every input's name
    async fn query_status(&self, writer: &mut OwnedWriteHalf) -> std::io::Result<()> {
        let mut ids: Vec<&String> = self.names.keys().collect();
        ids.sort();

        let queries = ["?P", "?V", "?M", "?F"]
            .into_iter()
            .map(str::to_string)
            .chain(ids.into_iter().map(|id| format!("?RGB{}", id)));

        for query in queries {
            write_line(writer, &query).await?;
            sleep(QUERY_SPACING).await;
        }
        Ok(())
    }

    /// Translate a response line into an event; returns false once nobody listens
    async fn handle_line(&mut self, line: &str) -> bool {
        trace!("⬅️  Receiver: {:?}", line);

        let event = match parse_response(line) {
            Some(Response::Power(on)) => DeviceEvent::Power(on),
            Some(Response::Volume(level)) => DeviceEvent::Volume(level_to_db(level)),
            Some(Response::Mute(muted)) => DeviceEvent::Mute(muted),
            Some(Response::Input(id)) => DeviceEvent::Input {
                name: self.names.get(&id).cloned(),
                id: InputId(id),
            },
            Some(Response::InputName { id, name }) => {
                self.names.insert(id.clone(), name.clone());
                DeviceEvent::InputName {
                    id: InputId(id),
                    name,
                }
            },
            None => return true,
        };

        self.event_tx.send(event).await.is_ok()
    }
}

async fn write_line(writer: &mut OwnedWriteHalf, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r").await?;
    writer.flush().await
}
