//! # Tello link
//!
//! Client for the text based SDK of the Tello drone. The drone listens for
//! plain text commands like `takeoff` or `forward 100` on UDP port 8889 and
//! answers each of them with `ok` or an error text. Independently it pushes
//! status frames to port 8890 and, after `streamon`, H264 video to 11111.
//!
//! The [`LinkController`] wraps all of this. It performs the `command`
//! handshake, sends a keep-alive when the link was idle for too long and keeps
//! the last known telemetry for you. Every operation returns a [`Response`]
//! instead of panicking, so you can decide what to do with a missed reply.
//!
//! **Please keep in mind, advanced maneuvers require a bright environment. (Flip, Bounce, ...)**
//!
//! ## Communication
//!
//! In the AP mode the drone will appear with the default ip 192.168.10.1.
//! Commands are sent one at a time. A command that gets no matching reply
//! within its timeout is sent again, at most five times in total.
//!
//! ### Example
//!
//! ```no_run
//! use tello_link::{LinkConfig, LinkController};
//!
//! #[tokio::main]
//! async fn main() -> tello_link::Result<()> {
//!     let mut drone = LinkController::new(LinkConfig::default());
//!     drone.connect().await?;
//!
//!     println!("battery {}%", drone.battery());
//!     if drone.take_off().await.succeeded {
//!         drone.forward(100).await;
//!         drone.cw(90).await;
//!         drone.land().await;
//!     }
//!
//!     drone.disconnect().await
//! }
//! ```
//!
//! ## Telemetry
//!
//! The telemetry is received in a background task. `drone.telemetry()` returns
//! a copy of the last snapshot, `drone.telemetry_stream()` yields every update.

mod channel;
mod command;
mod config;
mod error;
mod keep_alive;
mod link;
mod odometry;
mod signal;
mod telemetry;
mod transport;
mod video;

#[cfg(test)]
mod testing;

pub use channel::CommandChannel;
pub use command::{
    Command, Direction, Expectation, Flip, Response, Rotation, DISTANCE_CM, GO_SPEED_CM_S,
    MAX_ATTEMPTS, RC_AXIS, ROTATION_DEG, SPEED_CM_S,
};
pub use config::{LinkConfig, SDK_PORT, TELEMETRY_PORT, VIDEO_PORT};
pub use error::{FailureKind, Result, TelloError};
pub use keep_alive::{KeepAlivePolicy, KeepAliveScheduler};
pub use link::{LinkController, LinkState};
pub use odometry::Odometry;
pub use telemetry::{TelemetryChannel, TelemetrySnapshot, TelemetryTask};
pub use transport::{ControlTransport, UdpTransport};
pub use video::{Frame, VideoStream};
