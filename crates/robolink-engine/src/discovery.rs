use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, warn};

use robolink_transport::Channel;
use robolink_wire::{PeerDiscovery, PeerType};

use crate::cancel::CancelToken;

const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(1);

/// Periodic presence announcer used by the operator console side of the
/// link.
///
/// Once started it sends a peer discovery frame to the target every
/// interval until stopped. The robot side answers the first frame it
/// accepts, after which the channel is connected and announcements flow
/// over the connected socket.
pub struct DiscoveryAnnouncer {
    channel: Arc<dyn Channel>,
    interval: Duration,
    worker: Option<(CancelToken, JoinHandle<()>)>,
}

impl DiscoveryAnnouncer {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self::with_interval(channel, ANNOUNCE_INTERVAL)
    }

    pub fn with_interval(channel: Arc<dyn Channel>, interval: Duration) -> Self {
        Self { channel, interval, worker: None }
    }

    /// Begin announcing to `target`, replacing any previous target.
    /// Announcing to our own address is skipped.
    pub fn start(&mut self, target: SocketAddr) {
        if self.channel.local_addr().map(|a| a.ip()) == Some(target.ip()) {
            debug!(%target, "not announcing to ourselves");
            return;
        }
        self.stop();

        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let channel = Arc::clone(&self.channel);
        let interval = self.interval;
        let spawned = thread::Builder::new()
            .name("robolink-discovery".into())
            .spawn(move || {
                debug!(%target, "peer discovery announcer started");
                while !worker_cancel.is_cancelled() {
                    thread::sleep(interval);
                    if worker_cancel.is_cancelled() {
                        break;
                    }
                    match PeerDiscovery::new(PeerType::Peer).encode() {
                        Ok(frame) => {
                            if channel.peer_addr().is_none() {
                                channel.send_to(&frame, target);
                            } else {
                                channel.send(&frame);
                            }
                        }
                        Err(e) => warn!(error = %e, "failed to encode peer discovery frame"),
                    }
                }
                debug!("peer discovery announcer exited");
            });
        match spawned {
            Ok(handle) => self.worker = Some((cancel, handle)),
            Err(e) => error!(error = %e, "failed to spawn discovery announcer"),
        }
    }

    /// Stop announcing and wait for the worker to exit.
    pub fn stop(&mut self) {
        if let Some((cancel, handle)) = self.worker.take() {
            cancel.cancel();
            let _ = handle.join();
        }
    }
}

impl Drop for DiscoveryAnnouncer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::MemoryChannel;
    use robolink_wire::{frame_kind, MsgKind};

    fn target() -> SocketAddr {
        "192.0.2.40:20884".parse().unwrap()
    }

    #[test]
    fn announces_until_stopped() {
        let channel = MemoryChannel::new();
        let mut announcer = DiscoveryAnnouncer::with_interval(
            Arc::clone(&channel) as Arc<dyn Channel>,
            Duration::from_millis(5),
        );
        announcer.start(target());
        thread::sleep(Duration::from_millis(60));
        announcer.stop();

        let sent = channel.sent();
        assert!(sent.len() >= 2, "expected repeated announcements, got {}", sent.len());
        for datagram in &sent {
            assert_eq!(frame_kind(&datagram.data), Some(MsgKind::PeerDiscovery));
            assert_eq!(datagram.to, Some(target()));
        }

        let settled = channel.sent().len();
        thread::sleep(Duration::from_millis(25));
        assert_eq!(channel.sent().len(), settled);
    }

    #[test]
    fn never_announces_to_our_own_address() {
        let channel = MemoryChannel::new();
        let local = channel.local_addr().unwrap();
        let mut announcer = DiscoveryAnnouncer::with_interval(
            Arc::clone(&channel) as Arc<dyn Channel>,
            Duration::from_millis(5),
        );
        announcer.start(local);
        thread::sleep(Duration::from_millis(30));
        announcer.stop();
        assert!(channel.sent().is_empty());
    }

    #[test]
    fn prefers_the_connected_channel() {
        let channel = MemoryChannel::new();
        channel.connect(target()).unwrap();
        let mut announcer = DiscoveryAnnouncer::with_interval(
            Arc::clone(&channel) as Arc<dyn Channel>,
            Duration::from_millis(5),
        );
        announcer.start(target());
        thread::sleep(Duration::from_millis(40));
        announcer.stop();

        let sent = channel.sent();
        assert!(!sent.is_empty());
        assert!(sent.iter().all(|d| d.to.is_none()));
    }
}
