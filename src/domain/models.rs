use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Hardware address of the band, as shown on the device packaging.
///
/// The last octet feeds into the user-profile checksum, so the engine keeps
/// the address of the currently connected device around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandAddress(pub [u8; 6]);

impl BandAddress {
    /// Low byte of the address, mixed into the user-profile checksum.
    pub fn low_byte(&self) -> u8 {
        self.0[5]
    }
}

impl fmt::Display for BandAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

#[derive(Debug, Error)]
#[error("invalid band address: {0:?}")]
pub struct InvalidAddress(String);

impl FromStr for BandAddress {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(|| InvalidAddress(s.to_string()))?;
            *octet =
                u8::from_str_radix(part, 16).map_err(|_| InvalidAddress(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(InvalidAddress(s.to_string()));
        }
        Ok(BandAddress(octets))
    }
}

/// User profile written to the band on `set_user_info`.
///
/// The wire encoding is always exactly 20 bytes; the alias is truncated or
/// zero-padded to 8 bytes and the final byte is a checksum derived from the
/// record and the device address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: u32,
    pub gender: u8,
    pub age: u8,
    pub height_cm: u8,
    pub weight_kg: u8,
    pub alias: String,
    pub profile_type: u8,
}

/// Battery charging state reported by the band.
///
/// Codes outside the known range map to `Unknown` rather than failing the
/// decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryStatus {
    Unknown,
    Low,
    Full,
    Charging,
    NotCharging,
}

impl BatteryStatus {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            1 => BatteryStatus::Low,
            2 => BatteryStatus::Charging,
            3 => BatteryStatus::Full,
            4 => BatteryStatus::NotCharging,
            _ => BatteryStatus::Unknown,
        }
    }
}

/// Device-local wall clock of the last charge. The band reports no timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Battery record, only constructible from a well-formed 10-byte payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryInfo {
    /// Charge level, 0-100.
    pub level: u8,
    /// Completed charge cycles.
    pub cycles: u16,
    pub status: BatteryStatus,
    pub last_charge: ChargeTimestamp,
}

/// LED colors the band accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedColor {
    Red,
    Blue,
    Green,
    Orange,
}

/// Available vibration modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VibrationMode {
    WithLed,
    TenTimesWithLed,
    WithoutLed,
}

/// Hardware generation of the heart-rate sensor. The two generations tag
/// their 2-byte notifications with different discriminant bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeartRateVariant {
    Gen1,
    Gen2,
}

impl HeartRateVariant {
    /// Required value of byte 0 in a heart-rate notification.
    pub fn discriminant(&self) -> u8 {
        match self {
            HeartRateVariant::Gen1 => 6,
            HeartRateVariant::Gen2 => 0,
        }
    }
}

/// Connection lifecycle of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parse_and_low_byte() {
        let addr: BandAddress = "C8:0F:10:32:46:AB".parse().unwrap();
        assert_eq!(addr.low_byte(), 0xAB);
        assert_eq!(addr.to_string(), "C8:0F:10:32:46:AB");

        assert!("C8:0F:10".parse::<BandAddress>().is_err());
        assert!("C8:0F:10:32:46:AB:00".parse::<BandAddress>().is_err());
        assert!("zz:0F:10:32:46:AB".parse::<BandAddress>().is_err());
    }

    #[test]
    fn battery_status_mapping_is_closed() {
        assert_eq!(BatteryStatus::from_byte(1), BatteryStatus::Low);
        assert_eq!(BatteryStatus::from_byte(2), BatteryStatus::Charging);
        assert_eq!(BatteryStatus::from_byte(3), BatteryStatus::Full);
        assert_eq!(BatteryStatus::from_byte(4), BatteryStatus::NotCharging);
        assert_eq!(BatteryStatus::from_byte(0), BatteryStatus::Unknown);
        assert_eq!(BatteryStatus::from_byte(99), BatteryStatus::Unknown);
    }

    #[test]
    fn heart_rate_discriminants() {
        assert_eq!(HeartRateVariant::Gen1.discriminant(), 6);
        assert_eq!(HeartRateVariant::Gen2.discriminant(), 0);
    }
}
