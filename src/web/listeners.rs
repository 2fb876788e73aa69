use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Binds the HTTP listener.
///
/// `host == "*"` listens on every interface: an IPv6 dual-stack socket when
/// the system supports it, plain IPv4 otherwise. Returns the bound address
/// for logging together with the listener.
pub async fn create_listener(
    host: &str,
    port: u16,
) -> std::io::Result<(SocketAddr, tokio::net::TcpListener)> {
    if host == "*" {
        return create_wildcard_listener(port);
    }

    let addr = format!("{}:{}", host, port);
    tracing::info!("Attempting to bind server to {}...", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    Ok((listener.local_addr()?, listener))
}

fn create_wildcard_listener(port: u16) -> std::io::Result<(SocketAddr, tokio::net::TcpListener)> {
    let ipv6_addr = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port);
    tracing::info!(
        "Attempting to bind server to {}... (IPv6 + IPv4 dual-stack)",
        ipv6_addr
    );

    match bind_socket(Domain::IPV6, ipv6_addr) {
        Ok(listener) => return Ok((listener.local_addr()?, listener)),
        Err(e) => tracing::warn!("Failed to bind IPv6 listener: {}. Attempting IPv4 only.", e),
    }

    let ipv4_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    tracing::info!("Attempting to bind server to {}... (IPv4)", ipv4_addr);

    let listener = bind_socket(Domain::IPV4, ipv4_addr)?;
    Ok((listener.local_addr()?, listener))
}

fn bind_socket(domain: Domain, addr: SocketAddr) -> std::io::Result<tokio::net::TcpListener> {
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    if domain == Domain::IPV6 {
        // Some systems refuse dual-stack; IPv6-only still serves.
        if let Err(e) = socket.set_only_v6(false) {
            tracing::warn!("Failed to set dual-stack mode for IPv6 socket: {}. Continuing anyway.", e);
        }
    }

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    // Tokio requires non-blocking sockets
    socket.set_nonblocking(true)?;

    tokio::net::TcpListener::from_std(socket.into())
}
