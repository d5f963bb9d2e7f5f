// Reusable listener module
// Creates TCP listeners with SO_REUSEADDR, and SO_REUSEPORT on unix so
// several instances can share one port and one storage directory

use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::net::TcpListener;

const LISTEN_BACKLOG: i32 = 1024;

/// Create a non-blocking `TcpListener` bound to `addr`.
///
/// Must be called from inside a tokio runtime.
pub fn create_reusable_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    // Allows rebinding while old connections sit in TIME_WAIT
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;

    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}
