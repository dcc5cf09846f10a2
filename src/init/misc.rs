use crate::listener::{DatagramSocket, Listener};
use std::net::SocketAddr;
use tower::BoxError;

/// Sockets for one syslog endpoint, bound ahead of runtime startup so that
/// bind failures surface before anything else is wired up.
pub struct BoundSockets {
    pub tcp: Listener,
    pub udp: DatagramSocket,
}

pub fn bind_endpoint(endpoint: SocketAddr) -> Result<BoundSockets, BoxError> {
    let tcp = Listener::listen_std(endpoint)?;
    let udp = DatagramSocket::bind_std(endpoint)?;

    Ok(BoundSockets { tcp, udp })
}
