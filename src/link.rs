//! # Link controller
//!
//! The single entry point for callers. It owns the session components,
//! performs the handshake and turns typed operations into commands.
//!
//! ```text
//! Disconnected --connect()----> Connected --emergency()--> Faulted
//!      ^                            |
//!      +-------disconnect()---------+
//! ```
//!
//! `Faulted` is terminal: every operation is rejected with `NotConnected`
//! and a new controller is needed to fly again.

use std::{mem, sync::Arc};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info, warn};

use crate::{
    channel::CommandChannel,
    command::{Command, Direction, Flip, Response, Rotation},
    keep_alive::{KeepAlivePolicy, KeepAliveScheduler},
    odometry::Odometry,
    telemetry::{TelemetryChannel, TelemetrySnapshot, TelemetryTask},
    transport::UdpTransport,
    video::{Frame, VideoStream},
    FailureKind, LinkConfig, Result, TelloError,
};

/// Observable state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
    Faulted,
}

#[derive(Debug)]
struct Session {
    channel: Arc<CommandChannel>,
    telemetry: TelemetryTask,
    keep_alive: KeepAliveScheduler,
    keep_alive_policy: KeepAlivePolicy,
    video: Option<VideoStream>,
}

impl Session {
    /// Stop both background tasks, close the sockets and wait until the tasks are gone.
    async fn shutdown(self) -> Result<()> {
        self.telemetry.stop();
        self.keep_alive.stop();
        self.channel.close();

        let video = match self.video {
            Some(video) => video.stop().await,
            None => Ok(()),
        };
        let telemetry = self.telemetry.join().await;
        let keep_alive = self.keep_alive.join().await;
        video?;
        telemetry?;
        keep_alive?;
        Ok(())
    }
}

#[derive(Debug)]
enum Link {
    Disconnected,
    Connected(Session),
    Faulted,
}

#[derive(Debug)]
pub struct LinkController {
    config: LinkConfig,
    link: Link,
    telemetry: watch::Receiver<TelemetrySnapshot>,

    /// position estimate from the acknowledged moves of this controller
    pub odometry: Odometry,
}

impl LinkController {
    pub fn new(config: LinkConfig) -> Self {
        let (_, telemetry) = watch::channel(TelemetrySnapshot::default());
        Self {
            config,
            link: Link::Disconnected,
            telemetry,
            odometry: Odometry::default(),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn state(&self) -> LinkState {
        match self.link {
            Link::Disconnected => LinkState::Disconnected,
            Link::Connected(_) => LinkState::Connected,
            Link::Faulted => LinkState::Faulted,
        }
    }

    /// Bring the link up.
    ///
    /// When the drone already streams telemetry the previous session is still
    /// alive and the handshake is skipped. A failed handshake leaves the link
    /// `Disconnected`; call `connect()` again to retry.
    pub async fn connect(&mut self) -> Result<()> {
        match self.link {
            Link::Connected(_) => return Ok(()),
            Link::Faulted => return Err(TelloError::Faulted),
            Link::Disconnected => {}
        }
        self.config.validate()?;

        let telemetry = TelemetryChannel::bind(self.config.telemetry_bind).await?;
        let transport = UdpTransport::bind(self.config.control_bind, self.config.drone_addr).await?;
        let channel = Arc::new(CommandChannel::new(transport));

        if telemetry.is_online(self.config.telemetry_probe()).await {
            info!("drone is already streaming telemetry, skipping handshake");
        } else {
            let response = channel.send(&Command::handshake(self.config.handshake_timeout())).await;
            if !response.succeeded {
                channel.close();
                let kind = response.failure.unwrap_or(FailureKind::UnexpectedReply);
                error!(
                    "drone at {} did not accept the handshake: {}",
                    self.config.drone_addr, kind
                );
                error!("check the wifi connection and the firewall");
                return Err(TelloError::HandshakeFailed(kind));
            }
        }

        self.telemetry = telemetry.subscribe();
        let telemetry = telemetry.start();
        let keep_alive_policy = KeepAlivePolicy::from(&self.config);
        let keep_alive = KeepAliveScheduler::spawn(channel.clone(), keep_alive_policy);
        self.link = Link::Connected(Session {
            channel,
            telemetry,
            keep_alive,
            keep_alive_policy,
            video: None,
        });
        info!("connected to {}", self.config.drone_addr);
        Ok(())
    }

    /// Tear the session down. Calling it again, or while `Faulted`, does nothing.
    pub async fn disconnect(&mut self) -> Result<()> {
        match mem::replace(&mut self.link, Link::Disconnected) {
            Link::Connected(session) => {
                session.shutdown().await?;
                info!("disconnected from {}", self.config.drone_addr);
            }
            Link::Faulted => self.link = Link::Faulted,
            Link::Disconnected => {}
        }
        Ok(())
    }

    /// Stop all motors immediately. The link ends up `Faulted` and cannot be
    /// used again, the drone has to be restarted.
    ///
    /// The stop shares the command channel with everything else. A keep-alive
    /// still waiting on a silent drone delays it by up to 5 x `keep_alive_timeout_ms`.
    pub async fn emergency(&mut self) -> Response {
        let session = match mem::replace(&mut self.link, Link::Faulted) {
            Link::Connected(session) => session,
            other => {
                self.link = other;
                return Response::from(FailureKind::NotConnected);
            }
        };
        let response = session.channel.send(&Command::emergency()).await;
        if !response.succeeded {
            warn!("emergency stop could not be sent: {:?}", response.failure);
        }
        if let Err(e) = session.shutdown().await {
            error!("teardown after emergency stop failed: {}", e);
        }
        info!("link faulted after emergency stop");
        response
    }

    /// Send a command after the idle keep-alive check. Invalid arguments never reach the network.
    async fn dispatch(&mut self, command: std::result::Result<Command, FailureKind>) -> Response {
        let session = match &self.link {
            Link::Connected(session) => session,
            _ => return Response::from(FailureKind::NotConnected),
        };
        let command = match command {
            Ok(command) => command,
            Err(kind) => return Response::from(kind),
        };
        session.keep_alive_policy.send_if_idle(&session.channel).await;
        session.channel.send(&command).await
    }

    /// Send any command, e.g. one from a newer SDK version.
    pub async fn send_command(&mut self, command: Command) -> Response {
        self.dispatch(Ok(command)).await
    }

    pub async fn take_off(&mut self) -> Response {
        let response = self.dispatch(Ok(Command::take_off(self.config.command_timeout()))).await;
        if response.succeeded {
            // takeoff climbs to roughly one meter
            self.odometry.reset();
            self.odometry.apply_move(Direction::Up, 100);
        }
        response
    }

    pub async fn land(&mut self) -> Response {
        let response = self.dispatch(Ok(Command::land(self.config.command_timeout()))).await;
        if response.succeeded {
            self.odometry.land();
        }
        response
    }

    pub async fn move_by(&mut self, direction: Direction, cm: u32) -> Response {
        let response = self.dispatch(Command::move_by(direction, cm)).await;
        if response.succeeded {
            self.odometry.apply_move(direction, cm);
        }
        response
    }

    pub async fn up(&mut self, cm: u32) -> Response {
        self.move_by(Direction::Up, cm).await
    }
    pub async fn down(&mut self, cm: u32) -> Response {
        self.move_by(Direction::Down, cm).await
    }
    pub async fn left(&mut self, cm: u32) -> Response {
        self.move_by(Direction::Left, cm).await
    }
    pub async fn right(&mut self, cm: u32) -> Response {
        self.move_by(Direction::Right, cm).await
    }
    pub async fn forward(&mut self, cm: u32) -> Response {
        self.move_by(Direction::Forward, cm).await
    }
    pub async fn back(&mut self, cm: u32) -> Response {
        self.move_by(Direction::Back, cm).await
    }

    pub async fn rotate(&mut self, rotation: Rotation, degrees: u32) -> Response {
        let response = self.dispatch(Command::rotate(rotation, degrees)).await;
        if response.succeeded {
            self.odometry.apply_rotation(rotation, degrees);
        }
        response
    }

    pub async fn cw(&mut self, degrees: u32) -> Response {
        self.rotate(Rotation::Clockwise, degrees).await
    }
    pub async fn ccw(&mut self, degrees: u32) -> Response {
        self.rotate(Rotation::CounterClockwise, degrees).await
    }

    pub async fn speed(&mut self, cm_s: u32) -> Response {
        self.dispatch(Command::speed(cm_s)).await
    }

    pub async fn go_to(&mut self, x: u32, y: u32, z: u32, speed: u32) -> Response {
        let command = Command::go(x, y, z, speed, self.config.command_timeout());
        self.dispatch(command).await
    }

    pub async fn curve(&mut self, first: [u32; 3], second: [u32; 3], speed: u32) -> Response {
        let command = Command::curve(first, second, speed, self.config.command_timeout());
        self.dispatch(command).await
    }

    /// virtual sticks, -100..=100 per axis, not acknowledged by the drone
    pub async fn rc(
        &mut self,
        left_right: i32,
        forward_back: i32,
        up_down: i32,
        yaw: i32,
    ) -> Response {
        self.dispatch(Command::rc(left_right, forward_back, up_down, yaw)).await
    }

    pub async fn flip(&mut self, direction: Flip) -> Response {
        self.dispatch(Ok(Command::flip(direction, self.config.command_timeout()))).await
    }

    /// Start the video stream and the frame receiver.
    pub async fn stream_on(&mut self) -> Response {
        let response = self.dispatch(Ok(Command::stream_on())).await;
        if !response.succeeded {
            return response;
        }
        if let Link::Connected(session) = &mut self.link {
            if session.video.is_none() {
                match VideoStream::start(self.config.video_bind).await {
                    Ok(video) => session.video = Some(video),
                    Err(e) => {
                        error!("could not open video socket {}: {}", self.config.video_bind, e);
                        return Response::failure(FailureKind::Io, response.payload);
                    }
                }
            }
        }
        response
    }

    pub async fn stream_off(&mut self) -> Response {
        let response = self.dispatch(Ok(Command::stream_off())).await;
        if response.succeeded {
            if let Link::Connected(session) = &mut self.link {
                if let Some(video) = session.video.take() {
                    if let Err(e) = video.stop().await {
                        warn!("video receiver ended badly: {}", e);
                    }
                }
            }
        }
        response
    }

    pub fn is_streaming(&self) -> bool {
        matches!(&self.link, Link::Connected(Session { video: Some(_), .. }))
    }

    /// The most recent undecoded video frame while streaming.
    pub fn latest_frame(&self) -> Option<Frame> {
        match &self.link {
            Link::Connected(Session { video: Some(video), .. }) => video.latest_frame(),
            _ => None,
        }
    }

    /// Last known telemetry. Kept after a disconnect.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.borrow().clone()
    }

    pub fn telemetry_stream(&self) -> WatchStream<TelemetrySnapshot> {
        WatchStream::new(self.telemetry.clone())
    }

    pub fn battery(&self) -> i32 {
        self.telemetry.borrow().battery_percent
    }
}
