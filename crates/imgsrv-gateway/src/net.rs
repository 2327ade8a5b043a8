use imgsrv_core::config::ServerConfig;
use imgsrv_core::error::{ImgsrvError, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::{TcpListener, UdpSocket};

/// Bind the HTTP listener on `bind:port`; port 0 asks the OS for a free one.
pub async fn bind_listener(config: &ServerConfig) -> Result<TcpListener> {
    let addr = format!("{}:{}", config.bind, config.port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| ImgsrvError::ListenFailed {
            addr,
            reason: e.to_string(),
        })
}

/// Local IP the kernel would route outbound traffic from.
///
/// Connecting a UDP socket only picks a route; no packet is sent.
pub async fn outbound_ip(probe_addr: &str) -> Result<IpAddr> {
    let fail = |e: std::io::Error| ImgsrvError::PortResolutionFailed(format!("{probe_addr}: {e}"));

    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.map_err(fail)?;
    socket.connect(probe_addr).await.map_err(fail)?;
    Ok(socket.local_addr().map_err(fail)?.ip())
}

/// Address to put in the viewer URL for a listener bound at `local`.
///
/// A wildcard bind is replaced by the outbound IP, or by loopback when
/// `advertise` is off.
pub async fn advertised_addr(config: &ServerConfig, local: SocketAddr) -> Result<SocketAddr> {
    if !local.ip().is_unspecified() {
        return Ok(local);
    }
    let ip = if config.advertise {
        outbound_ip(&config.probe_addr).await?
    } else {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    };
    Ok(SocketAddr::new(ip, local.port()))
}
