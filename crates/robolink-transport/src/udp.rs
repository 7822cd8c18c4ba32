use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use socket2::Socket as Socket2;
use tracing::{debug, info, warn};

use robolink_wire::MAX_PACKET_SIZE;

use crate::bind::determine_bind_address;
use crate::channel::{Channel, Datagram};
use crate::error::{Result, TransportError};

/// Port both sides of the control link use.
pub const LINK_PORT: u16 = 20884;

/// Datagram time-to-live. The link stays within a couple of hops.
pub const TTL: u32 = 3;

/// Socket construction options for [`UdpChannel::bind`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Local port. Zero picks an ephemeral port.
    pub port: u16,
    /// Peer address used to pick the local interface, when already known.
    /// Without one the unspecified address is bound.
    pub peer_hint: Option<IpAddr>,
    /// How often a blocked receive re-checks the closed flag. Must be
    /// non-zero.
    pub poll_interval: Duration,
    /// Packet time-to-live.
    pub ttl: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            port: LINK_PORT,
            peer_hint: None,
            poll_interval: Duration::from_millis(250),
            ttl: TTL,
        }
    }
}

/// UDP implementation of [`Channel`].
///
/// `close` flags the channel rather than tearing down the descriptor, so a
/// receive blocked in the kernel notices within one poll interval.
pub struct UdpChannel {
    socket: UdpSocket,
    closed: AtomicBool,
    peer: Mutex<Option<SocketAddr>>,
}

impl UdpChannel {
    /// Bind a channel per `config`.
    pub fn bind(config: ChannelConfig) -> Result<UdpChannel> {
        let ip = match config.peer_hint {
            Some(peer) => determine_bind_address(peer),
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let addr = SocketAddr::new(ip, config.port);
        let socket =
            UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        socket.set_read_timeout(Some(config.poll_interval))?;
        socket.set_ttl(config.ttl)?;

        let options = Socket2::from(socket.try_clone()?);
        options.set_recv_buffer_size(MAX_PACKET_SIZE)?;

        let local = socket.local_addr()?;
        info!(addr = %local, "listening for control link datagrams");

        Ok(Self {
            socket,
            closed: AtomicBool::new(false),
            peer: Mutex::new(None),
        })
    }
}

impl Channel for UdpChannel {
    fn send(&self, data: &[u8]) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let peer = *self.peer.lock().unwrap_or_else(|e| e.into_inner());
        match peer {
            Some(_) => {
                if let Err(e) = self.socket.send(data) {
                    warn!(error = %e, "send failed");
                }
            }
            None => warn!("dropping datagram, no connected peer"),
        }
    }

    fn send_to(&self, data: &[u8], addr: SocketAddr) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Err(e) = self.socket.send_to(data, addr) {
            warn!(%addr, error = %e, "send failed");
        }
    }

    fn recv(&self) -> Option<Datagram> {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        loop {
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            match self.socket.recv_from(&mut buf) {
                Ok((len, addr)) => {
                    return Some(Datagram {
                        data: Bytes::copy_from_slice(&buf[..len]),
                        addr,
                    });
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) => {}
                Err(e) => {
                    if !self.closed.load(Ordering::Acquire) {
                        warn!(error = %e, "receive failed");
                    }
                    return None;
                }
            }
        }
    }

    fn connect(&self, addr: SocketAddr) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.socket
            .connect(addr)
            .map_err(|source| TransportError::Connect { addr, source })?;
        *self.peer.lock().unwrap_or_else(|e| e.into_inner()) = Some(addr);
        debug!(peer = %addr, "channel connected");
        Ok(())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("channel closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        *self.peer.lock().unwrap_or_else(|e| e.into_inner())
    }
}
