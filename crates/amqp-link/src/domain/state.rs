//! Connection state machine.
//!
//! ```text
//!  Disconnected ──dial ok──► Connected ──abnormal close──► Reconnecting
//!       ▲                       ▲                              │
//!       │                       └──────────redial ok───────────┤
//!       └───────────────────────attempts exhausted─────────────┘
//!
//!  any state ──shutdown()──► Closed (terminal)
//! ```

use std::fmt;

/// Lifecycle state of the broker link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No live connection; the next `ensure_live` dials.
    Disconnected,
    /// Connection and channel are open.
    Connected,
    /// A backoff retry sequence is running after an abnormal close.
    Reconnecting,
    /// Shut down by the owner. No transitions out.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// Point-in-time view of the link, for logs and readiness output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Incremented on every successful dial.
    pub generation: u64,
    /// Most recent dial or close failure, cleared by a successful dial.
    pub last_failure: Option<String>,
}
