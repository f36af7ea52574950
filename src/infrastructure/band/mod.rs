//! BLE fitness band protocol engine.
//!
//! Layering, top to bottom:
//!
//! ```text
//! BandClient ............ operations, event correlation, listener registry
//!   PendingTable ........ single-slot in-flight request tracking
//!   NotificationHub ..... unsolicited payload dispatch
//!   protocol ............ wire encode/decode and command bytes
//!   channels ............ GATT service/characteristic identities
//!   Transport (trait) ... platform BLE stack, supplied by the host
//! ```
//!
//! The engine is transport-agnostic: it never talks to a radio, it writes
//! and reads channels through the [`Transport`] trait and consumes the
//! host's [`TransportEvent`] stream.

pub mod channels;
pub mod client;
mod notifications;
mod pending;
pub mod protocol;
pub mod transport;

pub use channels::Channel;
pub use client::BandClient;
pub use pending::Reply;
pub use protocol::Command;
pub use transport::{Transport, TransportEvent};
