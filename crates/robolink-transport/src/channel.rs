use std::net::SocketAddr;

use bytes::Bytes;

use crate::error::Result;

/// One received datagram with its sender.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub data: Bytes,
    pub addr: SocketAddr,
}

/// Datagram channel the link engine runs over.
///
/// Implementations must tolerate concurrent use: one thread blocked in
/// [`recv`](Channel::recv) while others send and eventually
/// [`close`](Channel::close) the channel.
pub trait Channel: Send + Sync {
    /// Send to the connected peer.
    ///
    /// Failures, including having no peer yet, are logged and swallowed;
    /// lost datagrams are the protocol's job to recover from.
    fn send(&self, data: &[u8]);

    /// Send to an explicit address, bypassing the connected peer.
    fn send_to(&self, data: &[u8], addr: SocketAddr);

    /// Block until a datagram arrives.
    ///
    /// Returns `None` once the channel is closed or after a transient
    /// receive error; callers poll again until
    /// [`is_closed`](Channel::is_closed) reports true.
    fn recv(&self) -> Option<Datagram>;

    /// Restrict the channel to one peer; subsequent
    /// [`send`](Channel::send) calls go to it.
    fn connect(&self, addr: SocketAddr) -> Result<()>;

    /// Close the channel. Idempotent; unblocks an in-flight receive.
    fn close(&self);

    fn is_closed(&self) -> bool;

    fn local_addr(&self) -> Option<SocketAddr>;

    /// The connected peer, if any.
    fn peer_addr(&self) -> Option<SocketAddr>;
}
