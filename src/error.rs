use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the protocol engine.
///
/// Decode and shape-mismatch errors are local to the one request or
/// notification that triggered them. [`Error::Disconnected`] is the only
/// broadcast error: on link loss every outstanding request fails with it.
#[derive(Error, Debug)]
pub enum Error {
    /// An operation was attempted before a connection exists.
    #[error("device is not connected")]
    NotConnected,

    /// A request is already outstanding on the same channel. There is no
    /// queuing; the caller must wait for the prior request to resolve.
    #[error("a `{0}` request is already pending on this channel")]
    AlreadyPending(&'static str),

    /// A wire payload failed a length or shape check.
    #[error("malformed `{channel}` payload: expected {expected}, got {actual} bytes")]
    MalformedPayload {
        channel: &'static str,
        expected: &'static str,
        actual: usize,
    },

    /// The pairing handshake returned an unexpected value.
    #[error("pairing rejected by device")]
    PairingRejected,

    /// The transport could not produce a signal strength reading.
    #[error("RSSI read failed: {0}")]
    RssiReadFailed(String),

    /// The transport reported a write failure on a channel.
    #[error("write on `{channel}` failed: {reason}")]
    ChannelWriteFailed {
        channel: &'static str,
        reason: String,
    },

    /// The transport reported a read failure on a channel.
    #[error("read on `{channel}` failed: {reason}")]
    ChannelReadFailed {
        channel: &'static str,
        reason: String,
    },

    /// Establishing the connection failed before it was ever up.
    #[error("establishing connection failed: {0}")]
    ConnectionFailed(String),

    /// The link was lost while the request was outstanding.
    #[error("connection lost while the request was outstanding")]
    Disconnected,
}
