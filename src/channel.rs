//! # Command channel
//!
//! The text SDK answers every command with one datagram and does not support
//! pipelining. The channel therefore owns the control socket exclusively and
//! holds a lock for the complete send/await/retry cycle of a command, so a
//! keep-alive and a user command can never cross their replies.
//!
//! A lost datagram is masked by resending immediately, up to
//! [`MAX_ATTEMPTS`](crate::command::MAX_ATTEMPTS) times.

use std::{io, sync::Mutex as StdMutex, time::Duration};
use tokio::{
    sync::Mutex,
    time::{timeout, Instant},
};
use tracing::{debug, error, warn};

use crate::{
    command::{Command, Expectation, Response},
    signal::StopSignal,
    transport::ControlTransport,
    FailureKind,
};

const REPLY_BUFFER: usize = 1024;

/// Time of the last transmission on the control socket.
#[derive(Debug, Default)]
pub struct LastSent {
    at: StdMutex<Option<Instant>>,
}

impl LastSent {
    pub fn mark(&self) {
        *self.at.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }

    pub fn get(&self) -> Option<Instant> {
        *self.at.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `None` when nothing was sent yet
    pub fn idle_for(&self, now: Instant) -> Option<Duration> {
        self.get().map(|at| now.saturating_duration_since(at))
    }
}

pub struct CommandChannel {
    transport: Mutex<Box<dyn ControlTransport>>,
    last_sent: LastSent,
    closed: StopSignal,
}

impl std::fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("last_sent", &self.last_sent)
            .field("open", &self.is_open())
            .finish()
    }
}

impl CommandChannel {
    pub fn new(transport: impl ControlTransport + 'static) -> Self {
        Self {
            transport: Mutex::new(Box::new(transport)),
            last_sent: LastSent::default(),
            closed: StopSignal::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        !self.closed.is_triggered()
    }

    /// Close the channel. Queued and later commands fail with `NotConnected`,
    /// a command waiting for its reply gives up with `Io`.
    pub fn close(&self) {
        self.closed.trigger();
    }

    pub fn last_sent(&self) -> &LastSent {
        &self.last_sent
    }

    /// Turn a command into exactly one response.
    pub async fn send(&self, command: &Command) -> Response {
        if !self.is_open() {
            return Response::from(FailureKind::NotConnected);
        }
        let transport = self.transport.lock().await;
        // the link may have been closed while we were queued behind another command
        if !self.is_open() {
            return Response::from(FailureKind::NotConnected);
        }
        drain_stale_replies(&**transport);

        if *command.expectation() == Expectation::NoReply {
            return match transport.send(command.text().as_bytes()).await {
                Ok(()) => {
                    self.last_sent.mark();
                    debug!("sent {} without waiting for a reply", command);
                    Response::success(None)
                }
                Err(e) => {
                    error!("failed to send {}: {}", command, e);
                    Response::from(FailureKind::Io)
                }
            };
        }

        let mut closed = self.closed.listener();
        let mut last_reply = None;
        let mut buf = [0u8; REPLY_BUFFER];
        for attempt in 1..=command.max_attempts() {
            if let Err(e) = transport.send(command.text().as_bytes()).await {
                error!("failed to send {}: {} | giving up", command, e);
                return Response::failure(FailureKind::Io, last_reply);
            }
            self.last_sent.mark();

            let received = tokio::select! {
                _ = closed.stopped() => {
                    warn!("channel closed while waiting for a reply to {}", command);
                    return Response::failure(FailureKind::Io, last_reply);
                }
                received = timeout(command.timeout(), transport.recv(&mut buf)) => received,
            };

            match received {
                Err(_) => {
                    warn!(
                        "timed out waiting for {} | attempt {}/{}, retrying",
                        command,
                        attempt,
                        command.max_attempts()
                    );
                }
                Ok(Err(e)) => {
                    error!("receive failed for {}: {} | giving up", command, e);
                    return Response::failure(FailureKind::Io, last_reply);
                }
                Ok(Ok(len)) => {
                    let reply = String::from_utf8_lossy(&buf[..len]).trim().to_string();
                    if command.expectation().accepts(&reply) {
                        debug!("got accepted reply {:?} for {}", reply, command);
                        return Response::success(Some(reply));
                    }
                    warn!(
                        "{}: got {:?} for {} | attempt {}/{}",
                        FailureKind::UnexpectedReply,
                        reply,
                        command,
                        attempt,
                        command.max_attempts()
                    );
                    last_reply = Some(reply);
                }
            }
        }

        error!("no accepted reply for {} after {} attempts", command, command.max_attempts());
        Response::failure(FailureKind::Timeout, last_reply)
    }
}

/// A reply that arrived after its command timed out must not be taken for the
/// answer to the next command.
fn drain_stale_replies(transport: &dyn ControlTransport) {
    let mut buf = [0u8; REPLY_BUFFER];
    let mut dropped = 0;
    loop {
        match transport.try_recv(&mut buf) {
            Ok(len) => {
                dropped += 1;
                debug!("dropping stale reply {:?}", String::from_utf8_lossy(&buf[..len]));
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => {
                debug!("stopped draining control socket: {}", e);
                break;
            }
        }
        if dropped >= 64 {
            break;
        }
    }
}
