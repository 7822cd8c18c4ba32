use std::time::Duration;

use robolink_transport::LINK_PORT;

/// Timing and retry policy for a [`LinkManager`](crate::LinkManager).
///
/// The defaults suit a robot on a local radio link; tests shrink them to
/// keep scenario runs fast.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Heartbeat age beyond which the connection counts as lost.
    pub staleness_threshold: Duration,
    /// Pause between driver polls while no heartbeat has ever arrived.
    pub heartbeat_wait: Duration,
    /// Minimum period of one control loop iteration.
    pub min_loop_interval: Duration,
    /// Sleep quantum used while enforcing the minimum period.
    pub throttle_resolution: Duration,
    /// Period of the outbound command retransmit sweep.
    pub resend_interval: Duration,
    /// Delivery attempts before an unacknowledged command is abandoned.
    pub max_command_attempts: u8,
    /// Grace given to a cancelled driver before teardown proceeds.
    pub shutdown_grace: Duration,
    /// Port the operator console listens on, used when connecting back to a
    /// discovered peer.
    pub peer_port: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            staleness_threshold: Duration::from_secs(2),
            heartbeat_wait: Duration::from_millis(250),
            min_loop_interval: Duration::from_millis(1),
            throttle_resolution: Duration::from_millis(5),
            resend_interval: Duration::from_millis(100),
            max_command_attempts: 10,
            shutdown_grace: Duration::from_millis(200),
            peer_port: LINK_PORT,
        }
    }
}
