//! # Telemetry
//!
//! Once the drone is armed it pushes a status frame to UDP port 8890 roughly
//! ten times per second, independent of the command channel:
//!
//! ```text
//! pitch:0;roll:0;yaw:-45;vgx:0;vgy:0;vgz:0;templ:69;temph:70;tof:10;h:0;bat:92;baro:548.55;time:0;agx:-5.00;agy:0.00;agz:-998.00;
//! ```
//!
//! The receive loop runs in its own task and publishes every frame through a
//! `watch` channel, so readers always see the last known state and never
//! block the command traffic.

use chrono::{DateTime, Utc};
use std::{io, net::SocketAddr, str::FromStr, time::Duration};
use tokio::{net::UdpSocket, sync::watch, task::JoinHandle, time::timeout};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, trace, warn};

use crate::signal::{StopListener, StopSignal};

const FRAME_BUFFER: usize = 1024;
const RECEIVE_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// Last known state of the drone. Fields stay 0 until a frame carried them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub battery_percent: i32,
    pub temperature_c: i32,
    pub height_cm: i32,
    pub time_of_flight_cm: i32,

    pub temperature_low_c: i32,
    pub temperature_high_c: i32,
    pub pitch_deg: i32,
    pub roll_deg: i32,
    pub yaw_deg: i32,
    pub barometer: f32,
    /// motor on time in seconds
    pub flight_time_s: i32,

    pub last_updated: Option<DateTime<Utc>>,
}

fn parse_into<T: FromStr>(field: &mut T, value: &str) -> bool {
    match value.trim().parse() {
        Ok(parsed) => {
            *field = parsed;
            true
        }
        Err(_) => false,
    }
}

impl TelemetrySnapshot {
    /// Apply one `key:value;key:value;` frame field by field and return how many
    /// fields were updated. Broken pairs and unknown keys are skipped.
    pub fn apply_frame(&mut self, frame: &str, received_at: DateTime<Utc>) -> usize {
        let mut applied = 0;
        for pair in frame.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
            let (key, value) = match pair.split_once(':') {
                Some(kv) => kv,
                None => {
                    trace!("dropping malformed telemetry pair {:?}", pair);
                    continue;
                }
            };
            let updated = match key.trim() {
                "bat" => parse_into(&mut self.battery_percent, value),
                "temp" => parse_into(&mut self.temperature_c, value),
                "h" => parse_into(&mut self.height_cm, value),
                "tof" => parse_into(&mut self.time_of_flight_cm, value),
                "templ" => parse_into(&mut self.temperature_low_c, value),
                "temph" => parse_into(&mut self.temperature_high_c, value),
                "pitch" => parse_into(&mut self.pitch_deg, value),
                "roll" => parse_into(&mut self.roll_deg, value),
                "yaw" => parse_into(&mut self.yaw_deg, value),
                "baro" => parse_into(&mut self.barometer, value),
                "time" => parse_into(&mut self.flight_time_s, value),
                _ => continue,
            };
            if updated {
                applied += 1;
            } else {
                trace!("dropping unparsable telemetry value {:?}", pair);
            }
        }
        if applied > 0 {
            self.last_updated = Some(received_at);
        }
        applied
    }
}

/// Receive-only socket on the telemetry port.
#[derive(Debug)]
pub struct TelemetryChannel {
    socket: UdpSocket,
    snapshot: watch::Sender<TelemetrySnapshot>,
}

impl TelemetryChannel {
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        debug!("telemetry socket bound to {}", socket.local_addr()?);
        let (snapshot, _) = watch::channel(TelemetrySnapshot::default());
        Ok(Self { socket, snapshot })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.snapshot.subscribe()
    }

    /// Wait up to `probe` for a single frame. A drone that is already armed
    /// streams telemetry without any handshake.
    pub async fn is_online(&self, probe: Duration) -> bool {
        let mut buf = [0u8; FRAME_BUFFER];
        match timeout(probe, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) => {
                debug!("telemetry from {} is already flowing", from);
                publish(&self.snapshot, &buf[..len]);
                true
            }
            Ok(Err(e)) => {
                debug!("telemetry probe failed: {}", e);
                false
            }
            Err(_) => false,
        }
    }

    /// Move the socket into its own receive task.
    pub fn start(self) -> TelemetryTask {
        let stop = StopSignal::new();
        let snapshot = self.subscribe();
        let handle = tokio::spawn(receive_loop(self.socket, self.snapshot, stop.listener()));
        TelemetryTask {
            stop,
            handle,
            snapshot,
        }
    }
}

fn publish(snapshot: &watch::Sender<TelemetrySnapshot>, datagram: &[u8]) {
    let frame = String::from_utf8_lossy(datagram);
    let now = Utc::now();
    snapshot.send_if_modified(|state| state.apply_frame(&frame, now) > 0);
}

async fn receive_loop(
    socket: UdpSocket,
    snapshot: watch::Sender<TelemetrySnapshot>,
    mut stop: StopListener,
) {
    let mut buf = [0u8; FRAME_BUFFER];
    loop {
        let received = tokio::select! {
            _ = stop.stopped() => break,
            received = socket.recv_from(&mut buf) => received,
        };
        match received {
            Ok((len, _)) => publish(&snapshot, &buf[..len]),
            Err(_) if stop.is_stopped() => break,
            Err(e) => {
                warn!("telemetry receive failed: {}", e);
                tokio::time::sleep(RECEIVE_ERROR_PAUSE).await;
            }
        }
    }
    debug!("telemetry receiver stopped");
}

/// Handle of a running telemetry receive loop.
#[derive(Debug)]
pub struct TelemetryTask {
    stop: StopSignal,
    handle: JoinHandle<()>,
    snapshot: watch::Receiver<TelemetrySnapshot>,
}

impl TelemetryTask {
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.snapshot.clone()
    }

    pub fn stream(&self) -> WatchStream<TelemetrySnapshot> {
        WatchStream::new(self.snapshot.clone())
    }

    pub fn stop(&self) {
        self.stop.trigger();
    }

    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.stop.trigger();
        self.handle.await
    }
}
