//! SSH forwarding configuration types.

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// First TCP port used by X servers; display `N` listens on `6000 + N`.
pub const X11_BASE_PORT: u16 = 6000;

/// Directory holding the per-display Unix sockets of a local X server.
pub const X11_UNIX_SOCKET_DIR: &str = "/tmp/.X11-unix";

/// Collection of forwarding directives for an SSH session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingConfig {
    /// X11 forwarding configuration; `None` disables forwarding for the session.
    #[serde(default)]
    pub x11: Option<X11Forward>,
}

impl ForwardingConfig {
    /// Returns true when no forwarding directives are present.
    pub fn is_empty(&self) -> bool {
        self.x11.is_none()
    }
}

/// X11 forwarding options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct X11Forward {
    /// Local display that forwarded connections are relayed to.
    pub display: X11Display,
    /// Real MIT-MAGIC-COOKIE-1 of the local display.
    ///
    /// When set, validated setup packets have their auth data replaced with
    /// this value before reaching the local server.
    #[serde(default)]
    pub local_cookie: Option<Vec<u8>>,
}

/// A parsed X display name (`[host]:display[.screen]`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct X11Display {
    /// Host running the X server; `None` means the local machine.
    pub host: Option<String>,
    /// Display number.
    pub display: u16,
    /// Screen number.
    #[serde(default)]
    pub screen: u16,
}

impl X11Display {
    /// Resolve where connections for this display should be made.
    ///
    /// A missing host (or the literal `unix`) selects the local Unix socket on
    /// Unix platforms and loopback TCP elsewhere. Returns `None` when a TCP
    /// target would need a port past 65535.
    pub fn target(&self) -> Option<DisplayTarget> {
        let host = self.host.as_deref().filter(|host| !host.is_empty() && *host != "unix");
        match host {
            Some(host) => Some(DisplayTarget::Tcp {
                host: host.to_string(),
                port: self.tcp_port()?,
            }),
            None if cfg!(unix) => Some(DisplayTarget::Unix {
                path: PathBuf::from(format!("{X11_UNIX_SOCKET_DIR}/X{}", self.display)),
            }),
            None => Some(DisplayTarget::Tcp {
                host: "127.0.0.1".to_string(),
                port: self.tcp_port()?,
            }),
        }
    }

    /// `6000 + display`, if it fits in a port number.
    pub fn tcp_port(&self) -> Option<u16> {
        X11_BASE_PORT.checked_add(self.display)
    }
}

impl fmt::Display for X11Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host.as_deref() {
            Some(host) if host.contains(':') => write!(f, "[{host}]")?,
            Some(host) => f.write_str(host)?,
            None => {}
        }
        write!(f, ":{}.{}", self.display, self.screen)
    }
}

/// Concrete endpoint of the local X server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayTarget {
    /// TCP listener, typically `host:6000+N`.
    Tcp { host: String, port: u16 },
    /// Unix domain socket, typically `/tmp/.X11-unix/XN`.
    Unix { path: PathBuf },
}

impl fmt::Display for DisplayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayTarget::Tcp { host, port } if host.contains(':') => write!(f, "[{host}]:{port}"),
            DisplayTarget::Tcp { host, port } => write!(f, "{host}:{port}"),
            DisplayTarget::Unix { path } => write!(f, "unix:{}", path.display()),
        }
    }
}
