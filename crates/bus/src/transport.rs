use std::fmt;

use serde::{Deserialize, Serialize};

/// TCP address of a broker socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Transport {
    pub host: String,
    pub port: u16,
}

impl Transport {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The replica's own broker, reached over the loopback interface.
    pub fn loopback(port: u16) -> Self {
        Self::tcp("127.0.0.1", port)
    }

    /// Listen on every interface, for sockets remote replicas connect to.
    pub fn any(port: u16) -> Self {
        Self::tcp("0.0.0.0", port)
    }

    /// ZeroMQ endpoint string, bracketing IPv6 hosts.
    pub fn endpoint(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("tcp://[{}]:{}", self.host, self.port)
        } else {
            format!("tcp://{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.endpoint())
    }
}
