//! Text commands of the Tello SDK and the reply expected for each of them.
//!
//! Every builder validates its arguments before a [`Command`] exists, so an
//! out of range value never reaches the network.

use std::{fmt, ops::RangeInclusive, time::Duration};

use tracing::warn;

use crate::FailureKind;

/// every command is transmitted at most this often
pub const MAX_ATTEMPTS: u32 = 5;

pub const DISTANCE_CM: RangeInclusive<u32> = 20..=500;
pub const ROTATION_DEG: RangeInclusive<u32> = 1..=3600;
pub const SPEED_CM_S: RangeInclusive<u32> = 10..=100;
pub const GO_SPEED_CM_S: RangeInclusive<u32> = 10..=60;
pub const RC_AXIS: RangeInclusive<i32> = -100..=100;

pub const SPEED_TIMEOUT: Duration = Duration::from_secs(5);
pub const STREAM_TIMEOUT: Duration = Duration::from_secs(15);

/// What reply makes a command successful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// the reply must match the token, ignoring ASCII case
    Token(String),
    /// any reply counts as success
    AnyReply,
    /// transmit once and do not wait for a reply at all
    NoReply,
}

impl Expectation {
    pub fn ok() -> Self {
        Expectation::Token("ok".to_string())
    }

    pub fn accepts(&self, reply: &str) -> bool {
        match self {
            Expectation::Token(token) => token.eq_ignore_ascii_case(reply.trim()),
            Expectation::AnyReply | Expectation::NoReply => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    expectation: Expectation,
    timeout: Duration,
    max_attempts: u32,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" (expect {:?}, timeout {:?})", self.text, self.expectation, self.timeout)
    }
}

impl Command {
    /// build any command, e.g. one from a newer SDK version that has no builder here
    pub fn new(text: impl Into<String>, expectation: Expectation, timeout: Duration) -> Self {
        Self {
            text: text.into(),
            expectation,
            timeout,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
    pub fn expectation(&self) -> &Expectation {
        &self.expectation
    }
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// linear directions of the move commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Forward,
    Back,
}

impl Direction {
    pub fn token(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Forward => "forward",
            Direction::Back => "back",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

impl Rotation {
    pub fn token(self) -> &'static str {
        match self {
            Rotation::Clockwise => "cw",
            Rotation::CounterClockwise => "ccw",
        }
    }
}

/// Flip directions, advanced maneuvers require a bright environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flip {
    Forward,
    Back,
    Left,
    Right,
}

impl Flip {
    pub fn token(self) -> &'static str {
        match self {
            Flip::Forward => "f",
            Flip::Back => "b",
            Flip::Left => "l",
            Flip::Right => "r",
        }
    }
}

fn check<T>(name: &str, value: T, range: &RangeInclusive<T>) -> Result<T, FailureKind>
where
    T: PartialOrd + fmt::Display,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        warn!("{} {} is outside of {}..={}", name, value, range.start(), range.end());
        Err(FailureKind::InvalidArgument)
    }
}

/// the drone needs roughly one second per 15cm plus some time to settle
pub fn motion_timeout(amount: u32) -> Duration {
    Duration::from_secs(u64::from(amount / 15 + 3))
}

impl Command {
    pub fn handshake(timeout: Duration) -> Self {
        Self::new("command", Expectation::ok(), timeout)
    }
    pub fn keep_alive(timeout: Duration) -> Self {
        Self::new("alive", Expectation::AnyReply, timeout)
    }
    pub fn take_off(timeout: Duration) -> Self {
        Self::new("takeoff", Expectation::ok(), timeout)
    }
    pub fn land(timeout: Duration) -> Self {
        Self::new("land", Expectation::ok(), timeout)
    }
    /// stops the motors at once, sent a single time without waiting for a reply
    pub fn emergency() -> Self {
        Self::new("emergency", Expectation::NoReply, Duration::ZERO)
    }
    pub fn stream_on() -> Self {
        Self::new("streamon", Expectation::ok(), STREAM_TIMEOUT)
    }
    pub fn stream_off() -> Self {
        Self::new("streamoff", Expectation::ok(), STREAM_TIMEOUT)
    }

    pub fn move_by(direction: Direction, cm: u32) -> Result<Self, FailureKind> {
        let cm = check(direction.token(), cm, &DISTANCE_CM)?;
        Ok(Self::new(
            format!("{} {}", direction.token(), cm),
            Expectation::ok(),
            motion_timeout(cm),
        ))
    }

    pub fn rotate(rotation: Rotation, degrees: u32) -> Result<Self, FailureKind> {
        let degrees = check(rotation.token(), degrees, &ROTATION_DEG)?;
        Ok(Self::new(
            format!("{} {}", rotation.token(), degrees),
            Expectation::ok(),
            motion_timeout(degrees),
        ))
    }

    pub fn speed(cm_s: u32) -> Result<Self, FailureKind> {
        let cm_s = check("speed", cm_s, &SPEED_CM_S)?;
        Ok(Self::new(format!("speed {}", cm_s), Expectation::ok(), SPEED_TIMEOUT))
    }

    pub fn go(x: u32, y: u32, z: u32, speed: u32, timeout: Duration) -> Result<Self, FailureKind> {
        let x = check("x", x, &DISTANCE_CM)?;
        let y = check("y", y, &DISTANCE_CM)?;
        let z = check("z", z, &DISTANCE_CM)?;
        let speed = check("speed", speed, &GO_SPEED_CM_S)?;
        Ok(Self::new(
            format!("go {} {} {} {}", x, y, z, speed),
            Expectation::ok(),
            timeout,
        ))
    }

    /// fly a curve through the first point to the second one
    pub fn curve(
        first: [u32; 3],
        second: [u32; 3],
        speed: u32,
        timeout: Duration,
    ) -> Result<Self, FailureKind> {
        for (name, value) in ["x1", "y1", "z1"].iter().zip(first.iter()) {
            check(name, *value, &DISTANCE_CM)?;
        }
        for (name, value) in ["x2", "y2", "z2"].iter().zip(second.iter()) {
            check(name, *value, &DISTANCE_CM)?;
        }
        let speed = check("speed", speed, &GO_SPEED_CM_S)?;
        Ok(Self::new(
            format!(
                "curve {} {} {} {} {} {} {}",
                first[0], first[1], first[2], second[0], second[1], second[2], speed
            ),
            Expectation::ok(),
            timeout,
        ))
    }

    /// remote control stick values. The drone does not answer these, they are sent once.
    pub fn rc(
        left_right: i32,
        forward_back: i32,
        up_down: i32,
        yaw: i32,
    ) -> Result<Self, FailureKind> {
        let left_right = check("left_right", left_right, &RC_AXIS)?;
        let forward_back = check("forward_back", forward_back, &RC_AXIS)?;
        let up_down = check("up_down", up_down, &RC_AXIS)?;
        let yaw = check("yaw", yaw, &RC_AXIS)?;
        Ok(Self::new(
            format!("rc {} {} {} {}", left_right, forward_back, up_down, yaw),
            Expectation::NoReply,
            Duration::ZERO,
        ))
    }

    pub fn flip(direction: Flip, timeout: Duration) -> Self {
        Self::new(format!("flip {}", direction.token()), Expectation::ok(), timeout)
    }
}

/// The outcome of exactly one [`Command`] sent through the command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub succeeded: bool,
    /// the last reply received for the command, if any
    pub payload: Option<String>,
    pub failure: Option<FailureKind>,
}

impl Response {
    pub fn success(payload: Option<String>) -> Self {
        Self {
            succeeded: true,
            payload,
            failure: None,
        }
    }

    pub fn failure(kind: FailureKind, payload: Option<String>) -> Self {
        Self {
            succeeded: false,
            payload,
            failure: Some(kind),
        }
    }

    pub fn into_result(self) -> Result<Option<String>, FailureKind> {
        match self.failure {
            None if self.succeeded => Ok(self.payload),
            Some(kind) => Err(kind),
            None => Err(FailureKind::UnexpectedReply),
        }
    }
}

impl From<FailureKind> for Response {
    fn from(kind: FailureKind) -> Self {
        Response::failure(kind, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_below_range_is_rejected() {
        assert_eq!(Command::move_by(Direction::Forward, 10), Err(FailureKind::InvalidArgument));
    }

    #[test]
    fn forward_in_range_builds_text() {
        let cmd = Command::move_by(Direction::Forward, 100).unwrap();
        assert_eq!(cmd.text(), "forward 100");
        assert_eq!(cmd.expectation(), &Expectation::ok());
        assert_eq!(cmd.timeout(), Duration::from_secs(9));
        assert_eq!(cmd.max_attempts(), MAX_ATTEMPTS);
    }

    #[test]
    fn range_edges() {
        assert!(Command::move_by(Direction::Up, 20).is_ok());
        assert!(Command::move_by(Direction::Up, 500).is_ok());
        assert!(Command::move_by(Direction::Up, 501).is_err());
        assert!(Command::rotate(Rotation::Clockwise, 0).is_err());
        assert_eq!(Command::rotate(Rotation::CounterClockwise, 3600).unwrap().text(), "ccw 3600");
        assert!(Command::speed(9).is_err());
        assert_eq!(Command::speed(100).unwrap().text(), "speed 100");
    }

    #[test]
    fn go_speed_is_capped_at_60() {
        let timeout = Duration::from_secs(20);
        assert!(Command::go(20, 20, 20, 61, timeout).is_err());
        assert_eq!(Command::go(20, 30, 40, 60, timeout).unwrap().text(), "go 20 30 40 60");
    }

    #[test]
    fn curve_checks_every_coordinate() {
        let timeout = Duration::from_secs(20);
        assert!(Command::curve([20, 20, 20], [20, 19, 20], 30, timeout).is_err());
        let cmd = Command::curve([20, 30, 40], [50, 60, 70], 30, timeout).unwrap();
        assert_eq!(cmd.text(), "curve 20 30 40 50 60 70 30");
    }

    #[test]
    fn rc_is_not_awaited() {
        let cmd = Command::rc(-100, 0, 50, 100).unwrap();
        assert_eq!(cmd.text(), "rc -100 0 50 100");
        assert_eq!(cmd.expectation(), &Expectation::NoReply);
        assert!(Command::rc(0, 101, 0, 0).is_err());
    }

    #[test]
    fn token_match_ignores_case() {
        assert!(Expectation::ok().accepts("OK"));
        assert!(Expectation::ok().accepts("ok\r\n"));
        assert!(!Expectation::ok().accepts("error"));
        assert!(Expectation::AnyReply.accepts("error"));
    }

    #[test]
    fn flip_and_emergency() {
        assert_eq!(Command::flip(Flip::Left, Duration::from_secs(20)).text(), "flip l");
        assert_eq!(Command::emergency().expectation(), &Expectation::NoReply);
    }

    #[test]
    fn response_into_result() {
        assert_eq!(Response::success(Some("ok".into())).into_result(), Ok(Some("ok".into())));
        assert_eq!(
            Response::from(FailureKind::NotConnected).into_result(),
            Err(FailureKind::NotConnected)
        );
    }
}
