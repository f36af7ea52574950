//! Contract between the engine and the physical GATT transport.
//!
//! The transport owns connection establishment, service discovery and the
//! actual radio I/O; the engine only issues raw operations and consumes the
//! completions the transport reports back as [`TransportEvent`]s.

use crate::domain::models::BandAddress;
use crate::error::Result;
use crate::infrastructure::band::channels::Channel;
use uuid::Uuid;

/// Raw GATT operations the engine issues.
///
/// Every method returns immediately: `Err` means the request never left the
/// host (the engine fails the logical request right away), `Ok` means the
/// outcome will arrive later as a [`TransportEvent`] delivered to
/// [`BandClient::handle_event`](crate::infrastructure::band::client::BandClient::handle_event),
/// possibly from an internal transport thread.
pub trait Transport: Send + Sync {
    /// Starts connecting to the device. Reports back `Connected`,
    /// `ConnectionFailed`, or a later `Disconnected`.
    fn connect(&self, address: BandAddress) -> Result<()>;

    /// Writes a value to a channel's characteristic.
    fn write_channel(&self, channel: &'static Channel, value: &[u8]) -> Result<()>;

    /// Reads a channel's characteristic.
    fn read_channel(&self, channel: &'static Channel) -> Result<()>;

    /// Queries the received signal strength of the link.
    fn read_signal_strength(&self) -> Result<()>;

    /// Registers or unregisters for unsolicited payload delivery on a
    /// channel. Safe to call when already in the requested state.
    fn set_notify_enabled(&self, channel: &'static Channel, enabled: bool) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn connect(&self, address: BandAddress) -> Result<()> {
        (**self).connect(address)
    }

    fn write_channel(&self, channel: &'static Channel, value: &[u8]) -> Result<()> {
        (**self).write_channel(channel, value)
    }

    fn read_channel(&self, channel: &'static Channel) -> Result<()> {
        (**self).read_channel(channel)
    }

    fn read_signal_strength(&self) -> Result<()> {
        (**self).read_signal_strength()
    }

    fn set_notify_enabled(&self, channel: &'static Channel, enabled: bool) -> Result<()> {
        (**self).set_notify_enabled(channel, enabled)
    }
}

/// Completions and unsolicited data reported by the transport.
///
/// Channel-scoped events carry the raw (service, characteristic) identity;
/// the engine resolves it through the channel registry.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connection is established and services are discovered.
    Connected,
    /// Connection establishment failed; the link was never up.
    ConnectionFailed { reason: String },
    /// The link was lost. May arrive at any time after `Connected`.
    Disconnected,
    /// A read or write on a characteristic completed. For writes the value
    /// is the device's echo of the written bytes.
    ChannelResult {
        service: Uuid,
        characteristic: Uuid,
        value: Vec<u8>,
    },
    /// A read or write on a characteristic failed.
    ChannelFailure {
        service: Uuid,
        characteristic: Uuid,
        reason: String,
    },
    /// Signal strength reading, in dBm.
    Rssi(i16),
    /// The signal strength query failed.
    RssiFailed { reason: String },
    /// An unsolicited payload pushed on a notify-enabled channel.
    Notification {
        service: Uuid,
        characteristic: Uuid,
        value: Vec<u8>,
    },
}
