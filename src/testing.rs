//! In-memory command transport for tests.

use async_trait::async_trait;
use std::{
    collections::VecDeque,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::transport::ControlTransport;

#[derive(Debug, Clone, Copy)]
pub(crate) enum Reply {
    Text(&'static str),
    Silence,
}

#[derive(Debug)]
struct State {
    sent: Mutex<Vec<String>>,
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    reply_delay: Duration,
    fail_send: bool,
    inbox_tx: mpsc::UnboundedSender<String>,
    inbox_rx: AsyncMutex<mpsc::UnboundedReceiver<String>>,
    awaiting_reply: AtomicBool,
    interleaved: AtomicBool,
}

/// Records every datagram and answers according to a script.
///
/// A second transmission while a receive is still pending is flagged as interleaved.
#[derive(Debug, Clone)]
pub(crate) struct FakeTransport {
    state: Arc<State>,
}

impl FakeTransport {
    pub fn replying(fallback: Reply) -> Self {
        Self::build(fallback, Vec::new(), Duration::ZERO, false)
    }

    pub fn scripted(script: Vec<Reply>, fallback: Reply) -> Self {
        Self::build(fallback, script, Duration::ZERO, false)
    }

    pub fn delayed(reply: &'static str, delay: Duration) -> Self {
        Self::build(Reply::Text(reply), Vec::new(), delay, false)
    }

    pub fn broken() -> Self {
        Self::build(Reply::Silence, Vec::new(), Duration::ZERO, true)
    }

    fn build(fallback: Reply, script: Vec<Reply>, reply_delay: Duration, fail_send: bool) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(State {
                sent: Mutex::new(Vec::new()),
                script: Mutex::new(script.into()),
                fallback,
                reply_delay,
                fail_send,
                inbox_tx,
                inbox_rx: AsyncMutex::new(inbox_rx),
                awaiting_reply: AtomicBool::new(false),
                interleaved: AtomicBool::new(false),
            }),
        }
    }

    /// a datagram that arrives without being asked for
    pub fn inject(&self, text: &str) {
        let _ = self.state.inbox_tx.send(text.to_string());
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.sent.lock().unwrap().clone()
    }

    pub fn interleaved(&self) -> bool {
        self.state.interleaved.load(Ordering::SeqCst)
    }
}

struct PendingReceive<'a>(&'a AtomicBool);

impl Drop for PendingReceive<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl ControlTransport for FakeTransport {
    async fn send(&self, payload: &[u8]) -> io::Result<()> {
        if self.state.fail_send {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "fake transport is broken",
            ));
        }
        if self.state.awaiting_reply.load(Ordering::SeqCst) {
            self.state.interleaved.store(true, Ordering::SeqCst);
        }
        self.state
            .sent
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(payload).to_string());

        let reply = self
            .state
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.state.fallback);
        if let Reply::Text(text) = reply {
            if self.state.reply_delay.is_zero() {
                self.inject(text);
            } else {
                let tx = self.state.inbox_tx.clone();
                let delay = self.state.reply_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(text.to_string());
                });
            }
        }
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.state.awaiting_reply.store(true, Ordering::SeqCst);
        let _pending = PendingReceive(&self.state.awaiting_reply);
        let mut inbox = self.state.inbox_rx.lock().await;
        match inbox.recv().await {
            Some(text) => {
                let len = text.len().min(buf.len());
                buf[..len].copy_from_slice(&text.as_bytes()[..len]);
                Ok(len)
            }
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "inbox closed")),
        }
    }

    fn try_recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inbox = self
            .state
            .inbox_rx
            .try_lock()
            .map_err(|_| io::Error::from(io::ErrorKind::WouldBlock))?;
        match inbox.try_recv() {
            Ok(text) => {
                let len = text.len().min(buf.len());
                buf[..len].copy_from_slice(&text.as_bytes()[..len]);
                Ok(len)
            }
            Err(_) => Err(io::Error::from(io::ErrorKind::WouldBlock)),
        }
    }
}
