//! Protocol engine for first-generation BLE fitness bands.
//!
//! The crate models the band's GATT surface (channels, wire formats,
//! command bytes) and drives a request/response engine over a
//! host-supplied [`Transport`]. The host owns the platform BLE stack;
//! it forwards every completion, failure and unsolicited notification
//! to [`BandClient::handle_event`] and awaits the [`Reply`] futures the
//! operations hand back.
//!
//! Typical flow: connect, pair, write the owner profile, then issue
//! operations (battery snapshot, vibration, LED color, heart rate scan)
//! and register listeners for the streaming channels (realtime steps,
//! raw sensor frames, heart rate).

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::models::{
    BandAddress, BatteryInfo, BatteryStatus, ChargeTimestamp, ConnectionStatus, HeartRateVariant,
    LedColor, UserProfile, VibrationMode,
};
pub use domain::settings::LogSettings;
pub use error::{Error, Result};
pub use infrastructure::band::{BandClient, Channel, Command, Reply, Transport, TransportEvent};
pub use infrastructure::logging::{init_logging, LoggingGuard};
