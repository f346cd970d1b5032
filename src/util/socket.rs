//! Socket utilities

use anyhow::Result;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener};

/// Pending connection backlog for the API listener
pub const LISTEN_BACKLOG: i32 = 1024;

/// Create a blocking TCP listener with address reuse enabled
pub fn create_tcp_listener(addr: SocketAddr) -> Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // Allow quick restarts while old connections sit in TIME_WAIT
    socket.set_reuse_address(true)?;
    socket.set_nodelay(true)?;

    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}
