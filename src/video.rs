//! Raw video pump.
//!
//! After `streamon` the drone sends H264 data to UDP port 11111 in chunks of
//! 1460 bytes, a shorter chunk ends a frame. The frames are handed out
//! undecoded; decoding and display are up to the consumer.

use std::{io, net::SocketAddr, sync::Arc};
use tokio::{net::UdpSocket, sync::watch, task::JoinHandle};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, trace, warn};

use crate::signal::{StopListener, StopSignal};

const CHUNK_SIZE: usize = 1460;
const MAX_FRAME_SIZE: usize = 512 * 1024;

pub type Frame = Arc<Vec<u8>>;

#[derive(Debug, Default)]
struct FrameAssembler {
    buffer: Vec<u8>,
    overflowed: bool,
}

impl FrameAssembler {
    fn push(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        if self.buffer.len() + chunk.len() > MAX_FRAME_SIZE {
            self.buffer.clear();
            self.overflowed = true;
        } else if !self.overflowed {
            self.buffer.extend_from_slice(chunk);
        }

        if chunk.len() < CHUNK_SIZE {
            let frame = std::mem::take(&mut self.buffer);
            if std::mem::take(&mut self.overflowed) {
                warn!("dropping oversized video frame");
                return None;
            }
            if !frame.is_empty() {
                return Some(frame);
            }
        }
        None
    }
}

#[derive(Debug)]
pub struct VideoStream {
    stop: StopSignal,
    handle: JoinHandle<()>,
    latest: watch::Receiver<Option<Frame>>,
    local_addr: SocketAddr,
}

impl VideoStream {
    pub async fn start(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        debug!("video socket bound to {}", local_addr);
        let (tx, latest) = watch::channel(None);
        let stop = StopSignal::new();
        let handle = tokio::spawn(receive_frames(socket, tx, stop.listener()));
        Ok(Self {
            stop,
            handle,
            latest,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// the most recent complete frame, if one arrived yet
    pub fn latest_frame(&self) -> Option<Frame> {
        self.latest.borrow().clone()
    }

    pub fn frames(&self) -> WatchStream<Option<Frame>> {
        WatchStream::new(self.latest.clone())
    }

    pub async fn stop(self) -> Result<(), tokio::task::JoinError> {
        self.stop.trigger();
        self.handle.await
    }
}

async fn receive_frames(
    socket: UdpSocket,
    frames: watch::Sender<Option<Frame>>,
    mut stop: StopListener,
) {
    let mut assembler = FrameAssembler::default();
    let mut buf = [0u8; 2048];
    loop {
        let received = tokio::select! {
            _ = stop.stopped() => break,
            received = socket.recv(&mut buf) => received,
        };
        match received {
            Ok(len) => {
                if let Some(frame) = assembler.push(&buf[..len]) {
                    trace!("video frame of {} bytes", frame.len());
                    frames.send_replace(Some(Arc::new(frame)));
                }
            }
            Err(e) => {
                warn!("video receive failed: {}", e);
                break;
            }
        }
    }
    debug!("video receiver stopped");
}
