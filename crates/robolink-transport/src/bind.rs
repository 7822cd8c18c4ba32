use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use tracing::debug;

use crate::udp::LINK_PORT;

/// Pick a local address with a route to `peer`, preferring a real interface
/// over loopback.
///
/// Consults the OS routing table by connecting a throwaway UDP socket; no
/// packets are sent. Falls back to loopback when no route exists.
pub fn determine_bind_address(peer: IpAddr) -> IpAddr {
    match probe_route(peer) {
        Some(local) => {
            debug!(%peer, %local, "using routed local address");
            local
        }
        None => {
            debug!(%peer, "no route to peer, falling back to loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

fn probe_route(peer: IpAddr) -> Option<IpAddr> {
    let unspecified: IpAddr = match peer {
        IpAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        IpAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };
    let socket = UdpSocket::bind(SocketAddr::new(unspecified, 0)).ok()?;
    socket.connect(SocketAddr::new(peer, LINK_PORT)).ok()?;
    let local = socket.local_addr().ok()?.ip();
    if local.is_unspecified() {
        None
    } else {
        Some(local)
    }
}
