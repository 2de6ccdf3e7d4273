//! Channel naming and host address.

use std::env;
use std::net::UdpSocket;

/// Channel a component publishes its output on.
#[must_use]
pub fn output_channel(component: &str, ip: &str) -> String {
    format!("{component}:{ip}")
}

/// Channel a component serves control and user requests on.
#[must_use]
pub fn reqreply_channel(component: &str, ip: &str) -> String {
    format!("{component}:reqreply:{ip}")
}

/// Channel a client publishes input for a component on.
#[must_use]
pub fn input_channel(component: &str, ip: &str) -> String {
    format!("{component}:input:{ip}")
}

/// Channel the component manager of a host listens on.
#[must_use]
pub fn manager_channel(ip: &str) -> String {
    ip.to_string()
}

/// This host's address as other hosts see it.
///
/// `SIC_HOST_IP` overrides detection. Detection opens a UDP socket towards
/// a non-routable address, which sends nothing, and reads the local end.
/// Falls back to `127.0.0.1`.
#[must_use]
pub fn local_ip() -> String {
    if let Ok(ip) = env::var("SIC_HOST_IP") {
        let ip = ip.trim();
        if !ip.is_empty() {
            return ip.to_string();
        }
    }
    detect_ip().unwrap_or_else(|| "127.0.0.1".to_string())
}

fn detect_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("10.254.254.254:1").ok()?;
    let addr = socket.local_addr().ok()?;
    if addr.ip().is_unspecified() {
        return None;
    }
    Some(addr.ip().to_string())
}
