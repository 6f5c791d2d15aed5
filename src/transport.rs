use async_trait::async_trait;
use std::{io, net::SocketAddr};
use tokio::net::UdpSocket;
use tracing::debug;

/// Datagram link to the drone's command port.
///
/// One datagram is one command or one reply, there is no framing.
#[async_trait]
pub trait ControlTransport: Send + Sync {
    async fn send(&self, payload: &[u8]) -> io::Result<()>;

    /// wait for the next datagram from the drone
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// returns `WouldBlock` when nothing is queued
    fn try_recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

/// UDP socket connected to the drone, datagrams from other peers are filtered by the OS.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub async fn bind(local: SocketAddr, drone: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        socket.connect(drone).await?;
        debug!("control socket {} connected to {}", socket.local_addr()?, drone);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl ControlTransport for UdpTransport {
    async fn send(&self, payload: &[u8]) -> io::Result<()> {
        self.socket.send(payload).await.map(|_| ())
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(buf).await
    }

    fn try_recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.try_recv(buf)
    }
}
