//! Port availability check run before spawning the server.

use std::net::TcpListener;

/// Check if a loopback port is free by binding it and releasing it immediately.
pub fn is_port_available(port: u16) -> bool {
    match TcpListener::bind(("127.0.0.1", port)) {
        Ok(listener) => listener.local_addr().is_ok(),
        Err(_) => false,
    }
}
