use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use metrics::counter;
use tokio::net::{self, TcpStream};
use tokio::time;
use tracing::debug;

/// Check that a TCP connection to `host:port` can be opened within `timeout`.
///
/// Exactly one attempt is made, against the first IPv4 address `host` resolves
/// to (or its first address if it has no IPv4 one). Refusals, resolution
/// failures and timeouts all come back as `false`. A successful connection is
/// closed right away. The timeout covers resolution too.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> bool {
    let reachable = match time::timeout(timeout, connect_once(host, port)).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(err)) => {
            debug!("{}:{} is not reachable: {}", host, port, err);
            false
        }
        Err(_) => {
            debug!("{}:{} did not answer within {:?}", host, port, timeout);
            false
        }
    };

    let outcome = if reachable { "reachable" } else { "unreachable" };
    counter!("reachability_probes_total", "outcome" => outcome).increment(1);

    reachable
}

async fn connect_once(host: &str, port: u16) -> io::Result<TcpStream> {
    let addrs: Vec<SocketAddr> = net::lookup_host((host, port)).await?.collect();
    let addr = addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address resolved"))?;

    TcpStream::connect(addr).await
}
