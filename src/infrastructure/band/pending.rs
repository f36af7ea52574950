//! In-flight request tracking.
//!
//! Each logical operation kind has at most one outstanding request. A
//! request is a single-slot promise: the caller holds the [`Reply`] future,
//! the table holds the matching sender until a transport completion (or the
//! loss of the link) resolves it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::warn;

use crate::domain::models::{BatteryInfo, LedColor};
use crate::error::{Error, Result};
use crate::infrastructure::band::channels::{self, Channel};

/// The logical operation families the engine can have in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Connect,
    Pair,
    Battery,
    StartVibration,
    StopVibration,
    SensorNotify,
    RealtimeSteps,
    LedColor,
    UserInfo,
    HeartRateScan,
    Rssi,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Pair => "pair",
            Self::Battery => "battery",
            Self::StartVibration => "start-vibration",
            Self::StopVibration => "stop-vibration",
            Self::SensorNotify => "sensor-notify",
            Self::RealtimeSteps => "realtime-steps-notify",
            Self::LedColor => "led-color",
            Self::UserInfo => "user-info",
            Self::HeartRateScan => "heart-rate-scan",
            Self::Rssi => "rssi",
        }
    }

    /// Physical channel this operation occupies while in flight. `Connect`
    /// and `Rssi` correlate by operation kind alone.
    pub fn channel(&self) -> Option<&'static Channel> {
        match self {
            Self::Connect | Self::Rssi => None,
            Self::Pair => Some(&channels::PAIR),
            Self::Battery => Some(&channels::BATTERY),
            Self::StartVibration | Self::StopVibration => Some(&channels::VIBRATION),
            Self::SensorNotify | Self::RealtimeSteps | Self::LedColor => {
                Some(&channels::CONTROL_POINT)
            }
            Self::UserInfo => Some(&channels::USER_INFO),
            Self::HeartRateScan => Some(&channels::HEART_RATE_CONTROL),
        }
    }
}

/// Typed result slot for one pending request.
pub(crate) enum ResponseSink {
    Unit(oneshot::Sender<Result<()>>),
    /// Pairing carries the handshake phase: `read_issued` flips once the
    /// follow-up read after the initial write has been sent.
    Pair {
        tx: oneshot::Sender<Result<()>>,
        read_issued: bool,
    },
    Battery(oneshot::Sender<Result<BatteryInfo>>),
    Flag(oneshot::Sender<Result<bool>>),
    Led(oneshot::Sender<Result<LedColor>>),
    Rssi(oneshot::Sender<Result<i16>>),
}

impl ResponseSink {
    /// Completes the request with an error, whatever its response shape.
    /// A dropped receiver is fine; the caller discarded interest.
    fn fail(self, err: Error) {
        match self {
            Self::Unit(tx) | Self::Pair { tx, .. } => {
                let _ = tx.send(Err(err));
            }
            Self::Battery(tx) => {
                let _ = tx.send(Err(err));
            }
            Self::Flag(tx) => {
                let _ = tx.send(Err(err));
            }
            Self::Led(tx) => {
                let _ = tx.send(Err(err));
            }
            Self::Rssi(tx) => {
                let _ = tx.send(Err(err));
            }
        }
    }
}

/// Async handle for one logical request. Resolves exactly once, with the
/// operation's result or with [`Error::Disconnected`] if the engine is torn
/// down while the request is outstanding.
pub struct Reply<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Reply<T> {
    pub(crate) fn channel() -> (oneshot::Sender<Result<T>>, Reply<T>) {
        let (tx, rx) = oneshot::channel();
        (tx, Reply { rx })
    }
}

impl<T> std::fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply").finish_non_exhaustive()
    }
}

impl<T> Future for Reply<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Disconnected)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Tracks the single in-flight request per operation kind.
#[derive(Default)]
pub(crate) struct PendingTable {
    entries: HashMap<OperationKind, ResponseSink>,
}

impl PendingTable {
    /// Registers a request. Rejects it if the kind, or any kind sharing its
    /// physical channel, is already outstanding.
    pub fn begin(&mut self, kind: OperationKind, sink: ResponseSink) -> Result<()> {
        let conflict = self.entries.keys().copied().find(|existing| {
            *existing == kind
                || matches!(
                    (existing.channel(), kind.channel()),
                    (Some(a), Some(b)) if a == b
                )
        });
        if let Some(existing) = conflict {
            return Err(Error::AlreadyPending(existing.name()));
        }
        self.entries.insert(kind, sink);
        Ok(())
    }

    /// Removes an entry without completing it. Used to roll back when the
    /// raw transport call itself fails at issue time.
    pub fn discard(&mut self, kind: OperationKind) {
        self.entries.remove(&kind);
    }

    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.entries.contains_key(&kind)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Kinds currently outstanding on a physical channel.
    pub fn kinds_on_channel(&self, channel: &Channel) -> Vec<OperationKind> {
        self.entries
            .keys()
            .copied()
            .filter(|kind| kind.channel().is_some_and(|c| c == channel))
            .collect()
    }

    /// Handshake phase of a pending pair request, if one exists.
    pub fn pair_read_issued(&self) -> Option<bool> {
        match self.entries.get(&OperationKind::Pair) {
            Some(ResponseSink::Pair { read_issued, .. }) => Some(*read_issued),
            _ => None,
        }
    }

    pub fn mark_pair_read_issued(&mut self) {
        if let Some(ResponseSink::Pair { read_issued, .. }) =
            self.entries.get_mut(&OperationKind::Pair)
        {
            *read_issued = true;
        }
    }

    pub fn resolve_unit(&mut self, kind: OperationKind, result: Result<()>) {
        match self.entries.remove(&kind) {
            Some(ResponseSink::Unit(tx)) | Some(ResponseSink::Pair { tx, .. }) => {
                let _ = tx.send(result);
            }
            Some(other) => self.mismatch(kind, other),
            None => spurious(kind),
        }
    }

    pub fn resolve_battery(&mut self, result: Result<BatteryInfo>) {
        match self.entries.remove(&OperationKind::Battery) {
            Some(ResponseSink::Battery(tx)) => {
                let _ = tx.send(result);
            }
            Some(other) => self.mismatch(OperationKind::Battery, other),
            None => spurious(OperationKind::Battery),
        }
    }

    pub fn resolve_flag(&mut self, kind: OperationKind, result: Result<bool>) {
        match self.entries.remove(&kind) {
            Some(ResponseSink::Flag(tx)) => {
                let _ = tx.send(result);
            }
            Some(other) => self.mismatch(kind, other),
            None => spurious(kind),
        }
    }

    pub fn resolve_led(&mut self, result: Result<LedColor>) {
        match self.entries.remove(&OperationKind::LedColor) {
            Some(ResponseSink::Led(tx)) => {
                let _ = tx.send(result);
            }
            Some(other) => self.mismatch(OperationKind::LedColor, other),
            None => spurious(OperationKind::LedColor),
        }
    }

    pub fn resolve_rssi(&mut self, result: Result<i16>) {
        match self.entries.remove(&OperationKind::Rssi) {
            Some(ResponseSink::Rssi(tx)) => {
                let _ = tx.send(result);
            }
            Some(other) => self.mismatch(OperationKind::Rssi, other),
            None => spurious(OperationKind::Rssi),
        }
    }

    /// Fails a pending request; a no-op if nothing is pending for the kind.
    pub fn fail(&mut self, kind: OperationKind, err: Error) {
        match self.entries.remove(&kind) {
            Some(sink) => sink.fail(err),
            None => spurious(kind),
        }
    }

    /// Fails every outstanding request. Used on disconnect.
    pub fn fail_all(&mut self, make_err: impl Fn() -> Error) {
        for (kind, sink) in self.entries.drain() {
            warn!(operation = kind.name(), "failing outstanding request");
            sink.fail(make_err());
        }
    }

    fn mismatch(&mut self, kind: OperationKind, sink: ResponseSink) {
        // Unreachable by construction; dropping the sink resolves the
        // caller's reply with Disconnected rather than hanging it.
        warn!(
            operation = kind.name(),
            "pending entry had an unexpected response shape"
        );
        drop(sink);
    }
}

fn spurious(kind: OperationKind) {
    warn!(
        operation = kind.name(),
        "dropping completion with no pending request"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_rejects_same_kind() {
        let mut table = PendingTable::default();
        let (tx, _reply) = Reply::channel();
        table
            .begin(OperationKind::Battery, ResponseSink::Battery(tx))
            .unwrap();

        let (tx, _reply) = Reply::channel();
        let err = table
            .begin(OperationKind::Battery, ResponseSink::Battery(tx))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyPending("battery")));
    }

    #[test]
    fn begin_rejects_shared_channel_kinds() {
        let mut table = PendingTable::default();
        let (tx, _reply) = Reply::channel();
        table
            .begin(OperationKind::StartVibration, ResponseSink::Unit(tx))
            .unwrap();

        let (tx, _reply) = Reply::channel();
        let err = table
            .begin(OperationKind::StopVibration, ResponseSink::Unit(tx))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyPending("start-vibration")));

        // The three control-point families exclude each other too.
        let (tx, _reply) = Reply::channel();
        table
            .begin(OperationKind::SensorNotify, ResponseSink::Flag(tx))
            .unwrap();
        let (tx, _reply) = Reply::channel();
        assert!(table
            .begin(OperationKind::LedColor, ResponseSink::Led(tx))
            .is_err());
    }

    #[test]
    fn distinct_channels_are_independent() {
        let mut table = PendingTable::default();
        let (tx, _r1) = Reply::channel();
        table
            .begin(OperationKind::Battery, ResponseSink::Battery(tx))
            .unwrap();
        let (tx, _r2) = Reply::channel();
        table
            .begin(OperationKind::StartVibration, ResponseSink::Unit(tx))
            .unwrap();
        let (tx, _r3) = Reply::channel();
        table
            .begin(OperationKind::Rssi, ResponseSink::Rssi(tx))
            .unwrap();
        assert!(table.is_pending(OperationKind::Battery));
        assert!(table.is_pending(OperationKind::StartVibration));
        assert!(table.is_pending(OperationKind::Rssi));
    }

    #[tokio::test]
    async fn fail_all_drains_and_broadcasts() {
        let mut table = PendingTable::default();
        let (tx, battery) = Reply::channel();
        table
            .begin(OperationKind::Battery, ResponseSink::Battery(tx))
            .unwrap();
        let (tx, vibration) = Reply::channel();
        table
            .begin(OperationKind::StartVibration, ResponseSink::Unit(tx))
            .unwrap();
        let (tx, rssi) = Reply::channel();
        table
            .begin(OperationKind::Rssi, ResponseSink::Rssi(tx))
            .unwrap();

        table.fail_all(|| Error::Disconnected);
        assert!(table.is_empty());

        assert!(matches!(battery.await, Err(Error::Disconnected)));
        assert!(matches!(vibration.await, Err(Error::Disconnected)));
        assert!(matches!(rssi.await, Err(Error::Disconnected)));
    }

    #[test]
    fn spurious_completion_is_harmless() {
        let mut table = PendingTable::default();
        table.resolve_battery(Ok(crate::infrastructure::band::protocol::decode_battery_info(
            &[50, 25, 1, 1, 0, 0, 0, 0, 0, 3],
        )
        .unwrap()));
        table.resolve_unit(OperationKind::UserInfo, Ok(()));
        table.fail(OperationKind::Rssi, Error::Disconnected);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn reply_resolves_to_disconnected_when_sender_dropped() {
        let (tx, reply) = Reply::<()>::channel();
        drop(tx);
        assert!(matches!(reply.await, Err(Error::Disconnected)));
    }

    #[test]
    fn pair_handshake_flag() {
        let mut table = PendingTable::default();
        let (tx, _reply) = Reply::channel();
        table
            .begin(
                OperationKind::Pair,
                ResponseSink::Pair {
                    tx,
                    read_issued: false,
                },
            )
            .unwrap();
        assert_eq!(table.pair_read_issued(), Some(false));
        table.mark_pair_read_issued();
        assert_eq!(table.pair_read_issued(), Some(true));
    }
}
