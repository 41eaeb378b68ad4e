//! # Ports
//!
//! - **Inbound:** `OverlayApi`, the query and control surface the node exposes.
//! - **Outbound:** `TimeSource` and `ConfigProvider`, supplied by the host.

pub mod inbound;
pub mod outbound;

pub use inbound::OverlayApi;
pub use outbound::{ConfigProvider, TimeSource};
