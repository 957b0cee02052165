//! nodo_mesh: sensor-actuator coordination over a connectionless wireless mesh
//!
//! Nodes exchange small fixed-width packets over an ESP-NOW style datagram
//! link. Each node debounces its presence sensors, reports to its peers,
//! tracks who it has heard from recently and drives its outputs from local
//! presence or remote commands.
pub mod actuator;
pub mod core;
pub mod network;
pub mod node;
pub mod protocol;
pub mod sensor;
pub mod time;
mod util;

// Re-export commonly used items
pub use core::{Error, Result};
pub use node::{Dispatcher, NodeConfig, NodeHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
