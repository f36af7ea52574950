//! Static registry of the band's logical channels.
//!
//! Each channel addresses one GATT data point as a (service, characteristic)
//! pair. The table is fixed at compile time; the engine resolves
//! transport-reported identities back to a channel with [`lookup`].

use uuid::Uuid;

/// A logical channel on the band.
#[derive(Debug, PartialEq, Eq)]
pub struct Channel {
    pub name: &'static str,
    pub service: Uuid,
    pub characteristic: Uuid,
}

/// Expands a 16-bit assigned number to a full UUID on the Bluetooth base
/// `0000xxxx-0000-1000-8000-00805f9b34fb`.
const fn sig_uuid(short: u32) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_1000_8000_0080_5f9b_34fb)
}

/// Primary data service hosting most of the band's characteristics.
pub const SERVICE_BAND: Uuid = sig_uuid(0xfee0);
/// Immediate-alert service driving the vibration motor.
pub const SERVICE_VIBRATION: Uuid = sig_uuid(0x1802);
/// Standard heart-rate service.
pub const SERVICE_HEART_RATE: Uuid = sig_uuid(0x180d);

/// Pairing handshake channel.
pub const PAIR: Channel = Channel {
    name: "pair",
    service: SERVICE_BAND,
    characteristic: sig_uuid(0xff0f),
};

/// Battery status reads.
pub const BATTERY: Channel = Channel {
    name: "battery",
    service: SERVICE_BAND,
    characteristic: sig_uuid(0xff0c),
};

/// User profile writes.
pub const USER_INFO: Channel = Channel {
    name: "user-info",
    service: SERVICE_BAND,
    characteristic: sig_uuid(0xff04),
};

/// Control point shared by the sensor-notify, realtime-steps and LED
/// command families.
pub const CONTROL_POINT: Channel = Channel {
    name: "control-point",
    service: SERVICE_BAND,
    characteristic: sig_uuid(0xff05),
};

/// Realtime step-count notification stream.
pub const REALTIME_STEPS: Channel = Channel {
    name: "realtime-steps",
    service: SERVICE_BAND,
    characteristic: sig_uuid(0xff06),
};

/// Raw sensor-data notification stream.
pub const SENSOR_DATA: Channel = Channel {
    name: "sensor-data",
    service: SERVICE_BAND,
    characteristic: sig_uuid(0xff0e),
};

/// Generic notification stream.
pub const NOTIFICATION: Channel = Channel {
    name: "notification",
    service: SERVICE_BAND,
    characteristic: sig_uuid(0xff03),
};

/// Vibration start/stop commands (two logical operations, one channel).
pub const VIBRATION: Channel = Channel {
    name: "vibration",
    service: SERVICE_VIBRATION,
    characteristic: sig_uuid(0x2a06),
};

/// Heart-rate scan control writes.
pub const HEART_RATE_CONTROL: Channel = Channel {
    name: "heart-rate-control",
    service: SERVICE_HEART_RATE,
    characteristic: sig_uuid(0x2a39),
};

/// Heart-rate measurement notification stream.
pub const HEART_RATE_DATA: Channel = Channel {
    name: "heart-rate-data",
    service: SERVICE_HEART_RATE,
    characteristic: sig_uuid(0x2a37),
};

/// Every channel the engine knows about.
pub const ALL: [&Channel; 10] = [
    &PAIR,
    &BATTERY,
    &USER_INFO,
    &CONTROL_POINT,
    &REALTIME_STEPS,
    &SENSOR_DATA,
    &NOTIFICATION,
    &VIBRATION,
    &HEART_RATE_CONTROL,
    &HEART_RATE_DATA,
];

/// Resolves a transport-reported (service, characteristic) identity back to
/// its channel.
pub fn lookup(service: Uuid, characteristic: Uuid) -> Option<&'static Channel> {
    ALL.iter()
        .copied()
        .find(|c| c.service == service && c.characteristic == characteristic)
}
