//! # Overlay Service
//!
//! `OverlayService` owns every overlay table and implements the protocol on
//! top of them. It never touches sockets: connection tasks feed it decoded
//! messages and it answers through `ConnectionHandle`s.
//!
//! | Submodule | Concern |
//! |-----------|---------|
//! | `core` | state, construction, fan-out |
//! | `events` | connection lifecycle, peer message dispatch |
//! | `enrollment` | challenge/response on both sides |
//! | `membership` | maintenance planning, dial bookkeeping |
//! | `broadcast` | announce, relay, abuse checks |
//! | `notification` | local modules, validation gate |
//! | `maintenance` | timer-driven cleanup |
//! | `api` | `OverlayApi` implementation |

mod api;
mod broadcast;
mod core;
mod enrollment;
mod events;
mod maintenance;
mod membership;
mod notification;

pub use broadcast::RelayOutcome;
pub use self::core::{LinkRole, OverlayService};
