//! # Adapters
//!
//! | Adapter | Port / role |
//! |---------|-------------|
//! | `SystemTimeSource` | `TimeSource` |
//! | `StaticConfigProvider`, `TomlConfigProvider` | `ConfigProvider` |
//! | `P2pTransport` | peer listener and dialer |
//! | `ModuleListener` | local module listener |

pub mod api;
pub mod config;
pub mod connection;
pub mod p2p;
pub mod time;

pub use api::ModuleListener;
pub use config::{StaticConfigProvider, TomlConfigProvider};
pub use p2p::P2pTransport;
pub use time::SystemTimeSource;
