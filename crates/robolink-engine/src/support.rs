//! In-memory channel double for engine tests. Inbound datagrams are
//! injected by the test, outbound ones are captured for inspection.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use bytes::Bytes;

use robolink_transport::{Channel, Datagram, Result as TransportResult};

pub(crate) struct MemoryChannel {
    local: SocketAddr,
    inbound: Mutex<VecDeque<Datagram>>,
    available: Condvar,
    outbound: Mutex<Vec<SentDatagram>>,
    peer: Mutex<Option<SocketAddr>>,
    closed: AtomicBool,
}

/// A captured outbound datagram. `to` is `None` for connected sends.
#[derive(Clone, Debug)]
pub(crate) struct SentDatagram {
    pub data: Bytes,
    pub to: Option<SocketAddr>,
}

impl MemoryChannel {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            local: "192.0.2.2:20884".parse().unwrap(),
            inbound: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            outbound: Mutex::new(Vec::new()),
            peer: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Queue a datagram as if `from` had sent it to us.
    pub(crate) fn inject(&self, data: impl Into<Bytes>, from: SocketAddr) {
        let datagram = Datagram { data: data.into(), addr: from };
        self.inbound.lock().unwrap().push_back(datagram);
        self.available.notify_all();
    }

    pub(crate) fn sent(&self) -> Vec<SentDatagram> {
        self.outbound.lock().unwrap().clone()
    }

    pub(crate) fn take_sent(&self) -> Vec<SentDatagram> {
        std::mem::take(&mut self.outbound.lock().unwrap())
    }
}

impl Channel for MemoryChannel {
    fn send(&self, data: &[u8]) {
        if self.is_closed() {
            return;
        }
        let sent = SentDatagram { data: Bytes::copy_from_slice(data), to: None };
        self.outbound.lock().unwrap().push(sent);
    }

    fn send_to(&self, data: &[u8], addr: SocketAddr) {
        if self.is_closed() {
            return;
        }
        let sent = SentDatagram { data: Bytes::copy_from_slice(data), to: Some(addr) };
        self.outbound.lock().unwrap().push(sent);
    }

    fn recv(&self) -> Option<Datagram> {
        let mut queue = self.inbound.lock().unwrap();
        loop {
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            if let Some(datagram) = queue.pop_front() {
                return Some(datagram);
            }
            let (guard, _) = self
                .available
                .wait_timeout(queue, Duration::from_millis(5))
                .unwrap();
            queue = guard;
        }
    }

    fn connect(&self, addr: SocketAddr) -> TransportResult<()> {
        *self.peer.lock().unwrap() = Some(addr);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.available.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        *self.peer.lock().unwrap()
    }
}
