//! Request/response engine on top of a [`Transport`].
//!
//! The client owns the per-operation pending table and the listener hub.
//! Callers issue operations and get a [`Reply`] future; the transport's
//! event stream is fed back through [`BandClient::handle_event`], which
//! correlates completions to the matching pending request.
//!
//! Locking discipline: state is taken, mutated, and released before any
//! transport call, so a transport that completes synchronously re-enters
//! `handle_event` without deadlocking.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::models::{
    BandAddress, BatteryInfo, ConnectionStatus, HeartRateVariant, LedColor, UserProfile,
    VibrationMode,
};
use crate::error::{Error, Result};
use crate::infrastructure::band::channels::{self, Channel};
use crate::infrastructure::band::notifications::{Listener, NotificationHub};
use crate::infrastructure::band::pending::{OperationKind, PendingTable, Reply, ResponseSink};
use crate::infrastructure::band::protocol::{self, Command};
use crate::infrastructure::band::transport::{Transport, TransportEvent};

struct EngineState {
    connection: ConnectionStatus,
    address: Option<BandAddress>,
    pending: PendingTable,
}

impl EngineState {
    fn ensure_connected(&self) -> Result<()> {
        if self.connection == ConnectionStatus::Connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

/// Protocol engine for one band over one transport.
pub struct BandClient<T: Transport> {
    transport: T,
    state: Mutex<EngineState>,
    hub: Mutex<NotificationHub>,
}

impl<T: Transport> BandClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: Mutex::new(EngineState {
                connection: ConnectionStatus::Disconnected,
                address: None,
                pending: PendingTable::default(),
            }),
            hub: Mutex::new(NotificationHub::default()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_hub(&self) -> MutexGuard<'_, NotificationHub> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.lock_state().connection
    }

    /// Address of the band we are connected or connecting to.
    pub fn device_address(&self) -> Option<BandAddress> {
        self.lock_state().address
    }

    /// Begins connecting to the band. Only valid while disconnected; the
    /// reply resolves once the transport reports the link up or failed.
    pub fn connect(&self, address: BandAddress) -> Result<Reply<()>> {
        let (tx, reply) = Reply::channel();
        {
            let mut state = self.lock_state();
            if state.connection != ConnectionStatus::Disconnected {
                return Err(Error::AlreadyPending(OperationKind::Connect.name()));
            }
            state.pending.begin(OperationKind::Connect, ResponseSink::Unit(tx))?;
            state.connection = ConnectionStatus::Connecting;
            state.address = Some(address);
        }
        info!(%address, "connecting to band");
        if let Err(err) = self.transport.connect(address) {
            let mut state = self.lock_state();
            state.pending.discard(OperationKind::Connect);
            state.connection = ConnectionStatus::Disconnected;
            state.address = None;
            return Err(err);
        }
        Ok(reply)
    }

    /// Starts the pairing handshake: write the pair command, then confirm
    /// by reading the channel back once the write completes.
    pub fn pair(&self) -> Result<Reply<()>> {
        let (tx, reply) = Reply::channel();
        self.issue_write(
            OperationKind::Pair,
            ResponseSink::Pair {
                tx,
                read_issued: false,
            },
            &channels::PAIR,
            Command::Pair.bytes(),
        )?;
        Ok(reply)
    }

    /// Requests the battery snapshot.
    pub fn battery_info(&self) -> Result<Reply<BatteryInfo>> {
        let (tx, reply) = Reply::channel();
        {
            let mut state = self.lock_state();
            state.ensure_connected()?;
            state
                .pending
                .begin(OperationKind::Battery, ResponseSink::Battery(tx))?;
        }
        debug!("reading battery info");
        if let Err(err) = self.transport.read_channel(&channels::BATTERY) {
            self.lock_state().pending.discard(OperationKind::Battery);
            return Err(err);
        }
        Ok(reply)
    }

    pub fn start_vibration(&self, mode: VibrationMode) -> Result<Reply<()>> {
        let (tx, reply) = Reply::channel();
        self.issue_write(
            OperationKind::StartVibration,
            ResponseSink::Unit(tx),
            &channels::VIBRATION,
            Command::for_vibration(mode).bytes(),
        )?;
        Ok(reply)
    }

    pub fn stop_vibration(&self) -> Result<Reply<()>> {
        let (tx, reply) = Reply::channel();
        self.issue_write(
            OperationKind::StopVibration,
            ResponseSink::Unit(tx),
            &channels::VIBRATION,
            Command::StopVibration.bytes(),
        )?;
        Ok(reply)
    }

    /// Asks the band to start streaming raw sensor frames. The reply carries
    /// whether the band acknowledged the enable form of the command.
    pub fn enable_sensor_notify(&self) -> Result<Reply<bool>> {
        self.control_point_flag(OperationKind::SensorNotify, Command::EnableSensorData)
    }

    pub fn disable_sensor_notify(&self) -> Result<Reply<bool>> {
        self.control_point_flag(OperationKind::SensorNotify, Command::DisableSensorData)
    }

    pub fn enable_realtime_steps(&self) -> Result<Reply<bool>> {
        self.control_point_flag(OperationKind::RealtimeSteps, Command::EnableRealtimeSteps)
    }

    pub fn disable_realtime_steps(&self) -> Result<Reply<bool>> {
        self.control_point_flag(OperationKind::RealtimeSteps, Command::DisableRealtimeSteps)
    }

    fn control_point_flag(&self, kind: OperationKind, command: Command) -> Result<Reply<bool>> {
        let (tx, reply) = Reply::channel();
        self.issue_write(
            kind,
            ResponseSink::Flag(tx),
            &channels::CONTROL_POINT,
            command.bytes(),
        )?;
        Ok(reply)
    }

    /// Sets the band's LED color. The reply carries the color the band
    /// echoed back.
    pub fn set_led_color(&self, color: LedColor) -> Result<Reply<LedColor>> {
        let (tx, reply) = Reply::channel();
        self.issue_write(
            OperationKind::LedColor,
            ResponseSink::Led(tx),
            &channels::CONTROL_POINT,
            Command::for_led(color).bytes(),
        )?;
        Ok(reply)
    }

    /// Writes the owner profile record. The record's trailing checksum is
    /// bound to the connected band's address, so this requires an
    /// established connection.
    pub fn set_user_info(&self, profile: &UserProfile) -> Result<Reply<()>> {
        let (tx, reply) = Reply::channel();
        let record = {
            let mut state = self.lock_state();
            state.ensure_connected()?;
            let address = state.address.ok_or(Error::NotConnected)?;
            state
                .pending
                .begin(OperationKind::UserInfo, ResponseSink::Unit(tx))?;
            protocol::encode_user_profile(profile, address.low_byte())
        };
        debug!(uid = profile.uid, "writing user profile");
        if let Err(err) = self.transport.write_channel(&channels::USER_INFO, &record) {
            self.lock_state().pending.discard(OperationKind::UserInfo);
            return Err(err);
        }
        Ok(reply)
    }

    /// Triggers a one-shot manual heart rate measurement. Results arrive on
    /// the heart-rate data channel; register a listener to receive them.
    pub fn start_heart_rate_scan(&self) -> Result<Reply<()>> {
        let (tx, reply) = Reply::channel();
        self.issue_write(
            OperationKind::HeartRateScan,
            ResponseSink::Unit(tx),
            &channels::HEART_RATE_CONTROL,
            Command::StartHeartRateScan.bytes(),
        )?;
        Ok(reply)
    }

    /// Reads the link's signal strength in dBm.
    pub fn read_rssi(&self) -> Result<Reply<i16>> {
        let (tx, reply) = Reply::channel();
        {
            let mut state = self.lock_state();
            state.ensure_connected()?;
            state
                .pending
                .begin(OperationKind::Rssi, ResponseSink::Rssi(tx))?;
        }
        if let Err(err) = self.transport.read_signal_strength() {
            self.lock_state().pending.discard(OperationKind::Rssi);
            return Err(err);
        }
        Ok(reply)
    }

    /// Registers a request: claims the pending slot, then issues the write.
    /// An issue-time transport failure rolls the slot back so the operation
    /// can be retried immediately.
    fn issue_write(
        &self,
        kind: OperationKind,
        sink: ResponseSink,
        channel: &'static Channel,
        payload: &[u8],
    ) -> Result<()> {
        {
            let mut state = self.lock_state();
            state.ensure_connected()?;
            state.pending.begin(kind, sink)?;
        }
        debug!(operation = kind.name(), channel = channel.name, "issuing write");
        if let Err(err) = self.transport.write_channel(channel, payload) {
            self.lock_state().pending.discard(kind);
            return Err(err);
        }
        Ok(())
    }

    pub fn set_realtime_steps_listener(
        &self,
        listener: impl FnMut(i32) + Send + 'static,
    ) -> Result<()> {
        self.subscribe(&channels::REALTIME_STEPS, Listener::Steps(Box::new(listener)))
    }

    pub fn remove_realtime_steps_listener(&self) -> Result<()> {
        self.unsubscribe(&channels::REALTIME_STEPS)
    }

    pub fn set_sensor_data_listener(
        &self,
        listener: impl FnMut(&[u8]) + Send + 'static,
    ) -> Result<()> {
        self.subscribe(&channels::SENSOR_DATA, Listener::Raw(Box::new(listener)))
    }

    pub fn remove_sensor_data_listener(&self) -> Result<()> {
        self.unsubscribe(&channels::SENSOR_DATA)
    }

    pub fn set_notify_listener(&self, listener: impl FnMut(&[u8]) + Send + 'static) -> Result<()> {
        self.subscribe(&channels::NOTIFICATION, Listener::Raw(Box::new(listener)))
    }

    pub fn remove_notify_listener(&self) -> Result<()> {
        self.unsubscribe(&channels::NOTIFICATION)
    }

    /// Registers a heart rate listener. The variant gates which payloads
    /// reach the callback; re-registering replaces both.
    pub fn set_heart_rate_listener(
        &self,
        variant: HeartRateVariant,
        listener: impl FnMut(u8) + Send + 'static,
    ) -> Result<()> {
        self.subscribe(
            &channels::HEART_RATE_DATA,
            Listener::HeartRate {
                variant,
                callback: Box::new(listener),
            },
        )
    }

    pub fn remove_heart_rate_listener(&self) -> Result<()> {
        self.unsubscribe(&channels::HEART_RATE_DATA)
    }

    fn subscribe(&self, channel: &'static Channel, listener: Listener) -> Result<()> {
        self.lock_state().ensure_connected()?;
        self.transport.set_notify_enabled(channel, true)?;
        self.lock_hub().set(channel, listener);
        info!(channel = channel.name, "listener registered");
        Ok(())
    }

    /// A no-op when no listener is registered; the transport is only told
    /// to stop notifying when there was one.
    fn unsubscribe(&self, channel: &'static Channel) -> Result<()> {
        if self.lock_hub().remove(channel) {
            self.transport.set_notify_enabled(channel, false)?;
            info!(channel = channel.name, "listener removed");
        }
        Ok(())
    }

    /// Feeds one transport event through the engine. This is the single
    /// entry point for everything the transport reports back.
    pub fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                let mut state = self.lock_state();
                state.connection = ConnectionStatus::Connected;
                info!("band connected");
                state.pending.resolve_unit(OperationKind::Connect, Ok(()));
            }
            TransportEvent::ConnectionFailed { reason } => {
                let mut state = self.lock_state();
                state.connection = ConnectionStatus::Disconnected;
                state.address = None;
                warn!(%reason, "connection failed");
                state
                    .pending
                    .fail(OperationKind::Connect, Error::ConnectionFailed(reason));
            }
            TransportEvent::Disconnected => {
                let mut state = self.lock_state();
                state.connection = ConnectionStatus::Disconnected;
                state.address = None;
                warn!("band disconnected, failing outstanding requests");
                state.pending.fail_all(|| Error::Disconnected);
            }
            TransportEvent::ChannelResult {
                service,
                characteristic,
                value,
            } => self.on_channel_result(service, characteristic, &value),
            TransportEvent::ChannelFailure {
                service,
                characteristic,
                reason,
            } => self.on_channel_failure(service, characteristic, &reason),
            TransportEvent::Rssi(value) => {
                self.lock_state().pending.resolve_rssi(Ok(value));
            }
            TransportEvent::RssiFailed { reason } => {
                self.lock_state()
                    .pending
                    .fail(OperationKind::Rssi, Error::RssiReadFailed(reason));
            }
            TransportEvent::Notification {
                service: _,
                characteristic,
                value,
            } => {
                self.lock_hub().dispatch(characteristic, &value);
            }
        }
    }

    fn on_channel_result(&self, service: Uuid, characteristic: Uuid, value: &[u8]) {
        let Some(channel) = channels::lookup(service, characteristic) else {
            debug!(%service, %characteristic, "completion on unknown channel");
            return;
        };
        debug!(channel = channel.name, len = value.len(), "channel completion");

        match channel.name {
            "pair" => self.on_pair_result(value),
            "battery" => {
                self.lock_state()
                    .pending
                    .resolve_battery(protocol::decode_battery_info(value));
            }
            "vibration" => {
                let mut state = self.lock_state();
                // The echo tells the start and stop slots apart.
                if value == Command::StopVibration.bytes() {
                    state
                        .pending
                        .resolve_unit(OperationKind::StopVibration, Ok(()));
                } else {
                    state
                        .pending
                        .resolve_unit(OperationKind::StartVibration, Ok(()));
                }
            }
            "control-point" => self.on_control_point_result(value),
            "user-info" => {
                self.lock_state()
                    .pending
                    .resolve_unit(OperationKind::UserInfo, Ok(()));
            }
            "heart-rate-control" => {
                let mut state = self.lock_state();
                if value == Command::StartHeartRateScan.bytes() {
                    state
                        .pending
                        .resolve_unit(OperationKind::HeartRateScan, Ok(()));
                } else {
                    state.pending.fail(
                        OperationKind::HeartRateScan,
                        Error::ChannelWriteFailed {
                            channel: channel.name,
                            reason: format!("unexpected acknowledgement {value:?}"),
                        },
                    );
                }
            }
            _ => debug!(channel = channel.name, "completion on notification-only channel"),
        }
    }

    /// Pairing runs in two phases on the same channel: the write completion
    /// triggers a confirmation read, and the read completion carries the
    /// band's verdict.
    fn on_pair_result(&self, value: &[u8]) {
        enum Phase {
            IssueRead,
            Confirm,
            Spurious,
        }

        let phase = {
            let mut state = self.lock_state();
            match state.pending.pair_read_issued() {
                Some(false) => {
                    state.pending.mark_pair_read_issued();
                    Phase::IssueRead
                }
                Some(true) => Phase::Confirm,
                None => Phase::Spurious,
            }
        };

        match phase {
            Phase::IssueRead => {
                debug!("pair write acknowledged, reading confirmation");
                if let Err(err) = self.transport.read_channel(&channels::PAIR) {
                    self.lock_state().pending.fail(OperationKind::Pair, err);
                }
            }
            Phase::Confirm => {
                let result = if value == [protocol::PAIR_CONFIRMED] {
                    Ok(())
                } else {
                    Err(Error::PairingRejected)
                };
                self.lock_state().pending.resolve_unit(OperationKind::Pair, result);
            }
            Phase::Spurious => warn!("pair completion with no pending pair request"),
        }
    }

    /// The three control-point families exclude each other at issue time,
    /// so at most one of them is pending here. The echo is compared against
    /// that family's own command shapes.
    fn on_control_point_result(&self, value: &[u8]) {
        let mut state = self.lock_state();
        if state.pending.is_pending(OperationKind::SensorNotify) {
            let acknowledged = value == Command::EnableSensorData.bytes();
            state
                .pending
                .resolve_flag(OperationKind::SensorNotify, Ok(acknowledged));
        } else if state.pending.is_pending(OperationKind::RealtimeSteps) {
            let acknowledged = value == Command::EnableRealtimeSteps.bytes();
            state
                .pending
                .resolve_flag(OperationKind::RealtimeSteps, Ok(acknowledged));
        } else if state.pending.is_pending(OperationKind::LedColor) {
            state
                .pending
                .resolve_led(Ok(protocol::led_color_from_echo(value)));
        } else {
            warn!("control-point completion with no pending request");
        }
    }

    fn on_channel_failure(&self, service: Uuid, characteristic: Uuid, reason: &str) {
        let Some(channel) = channels::lookup(service, characteristic) else {
            debug!(%service, %characteristic, %reason, "failure on unknown channel");
            return;
        };
        let mut state = self.lock_state();
        let kinds = state.pending.kinds_on_channel(channel);
        if kinds.is_empty() {
            warn!(channel = channel.name, %reason, "transport failure with nothing pending");
            return;
        }
        for kind in kinds {
            let read_phase = kind == OperationKind::Battery
                || (kind == OperationKind::Pair
                    && state.pending.pair_read_issued() == Some(true));
            let err = if read_phase {
                Error::ChannelReadFailed {
                    channel: channel.name,
                    reason: reason.to_string(),
                }
            } else {
                Error::ChannelWriteFailed {
                    channel: channel.name,
                    reason: reason.to_string(),
                }
            };
            state.pending.fail(kind, err);
        }
    }
}
