//! Wire formats: command payloads, binary records, and the profile checksum.
//!
//! Everything in here is pure. Decode failures surface as
//! [`Error::MalformedPayload`] for the one request that triggered them; they
//! never affect other in-flight operations.

use crate::domain::models::{
    BatteryInfo, BatteryStatus, ChargeTimestamp, HeartRateVariant, LedColor, UserProfile,
    VibrationMode,
};
use crate::error::{Error, Result};

/// Encoded length of a user profile record.
pub const USER_PROFILE_LEN: usize = 20;
/// Length of the alias field inside a user profile record.
pub const ALIAS_LEN: usize = 8;
/// Value the band returns on the pair channel once pairing is accepted.
pub const PAIR_CONFIRMED: u8 = 2;

/// Command payloads written to the band's control channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pair,
    VibrationWithLed,
    VibrationTenTimesWithLed,
    VibrationWithoutLed,
    StopVibration,
    EnableRealtimeSteps,
    DisableRealtimeSteps,
    EnableSensorData,
    DisableSensorData,
    SetColorRed,
    SetColorBlue,
    SetColorOrange,
    SetColorGreen,
    StartHeartRateScan,
}

impl Command {
    /// Raw bytes for this command.
    pub fn bytes(&self) -> &'static [u8] {
        match self {
            Self::Pair => &[2],
            Self::VibrationWithLed => &[1],
            Self::VibrationTenTimesWithLed => &[2],
            Self::VibrationWithoutLed => &[4],
            Self::StopVibration => &[0],
            Self::EnableRealtimeSteps => &[3, 1],
            Self::DisableRealtimeSteps => &[3, 0],
            Self::EnableSensorData => &[18, 1],
            Self::DisableSensorData => &[18, 0],
            Self::SetColorRed => &[14, 6, 1, 2, 1],
            Self::SetColorBlue => &[14, 0, 6, 6, 1],
            Self::SetColorOrange => &[14, 6, 2, 0, 1],
            Self::SetColorGreen => &[14, 4, 5, 0, 1],
            Self::StartHeartRateScan => &[21, 2, 1],
        }
    }

    /// Command for a vibration mode.
    pub fn for_vibration(mode: VibrationMode) -> Self {
        match mode {
            VibrationMode::WithLed => Self::VibrationWithLed,
            VibrationMode::TenTimesWithLed => Self::VibrationTenTimesWithLed,
            VibrationMode::WithoutLed => Self::VibrationWithoutLed,
        }
    }

    /// LED command template for a color.
    pub fn for_led(color: LedColor) -> Self {
        match color {
            LedColor::Red => Self::SetColorRed,
            LedColor::Blue => Self::SetColorBlue,
            LedColor::Orange => Self::SetColorOrange,
            LedColor::Green => Self::SetColorGreen,
        }
    }
}

/// Matches an echoed control-point payload against the four LED templates.
/// Unknown echoes default to blue.
pub fn led_color_from_echo(echo: &[u8]) -> LedColor {
    if echo == Command::SetColorRed.bytes() {
        LedColor::Red
    } else if echo == Command::SetColorGreen.bytes() {
        LedColor::Green
    } else if echo == Command::SetColorOrange.bytes() {
        LedColor::Orange
    } else {
        LedColor::Blue
    }
}

/// CRC-8 with polynomial 0x8C (reflected), right-shifting, initial value 0.
fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &byte in data {
        let mut extract = byte;
        for _ in 0..8 {
            let sum = (crc ^ extract) & 0x01;
            crc >>= 1;
            if sum != 0 {
                crc ^= 0x8C;
            }
            extract >>= 1;
        }
    }
    crc
}

/// Encodes a user profile into its fixed 20-byte wire record.
///
/// Layout: uid as little-endian u32, then gender, age, height, weight and
/// profile type bytes, two constant bytes `0x04 0x00`, the alias truncated or
/// zero-padded to 8 bytes, and finally the checksum: CRC-8 over the first 19
/// bytes XORed with the low byte of the paired device's address.
pub fn encode_user_profile(profile: &UserProfile, address_low_byte: u8) -> [u8; USER_PROFILE_LEN] {
    let mut record = [0u8; USER_PROFILE_LEN];
    record[0..4].copy_from_slice(&profile.uid.to_le_bytes());
    record[4] = profile.gender;
    record[5] = profile.age;
    record[6] = profile.height_cm;
    record[7] = profile.weight_kg;
    record[8] = profile.profile_type;
    record[9] = 0x04;
    record[10] = 0x00;

    let alias = profile.alias.as_bytes();
    let len = alias.len().min(ALIAS_LEN);
    record[11..11 + len].copy_from_slice(&alias[..len]);

    record[19] = crc8(&record[..19]) ^ address_low_byte;
    record
}

/// Decodes a user profile record. The checksum byte is write-only metadata
/// and is not validated; a non-UTF-8 alias falls back to the empty string.
pub fn decode_user_profile(payload: &[u8]) -> Result<UserProfile> {
    if payload.len() < USER_PROFILE_LEN {
        return Err(Error::MalformedPayload {
            channel: "user-info",
            expected: "at least 20",
            actual: payload.len(),
        });
    }

    let alias_bytes = &payload[11..11 + ALIAS_LEN];
    let trimmed = match alias_bytes.iter().rposition(|&b| b != 0) {
        Some(last) => &alias_bytes[..=last],
        None => &[],
    };
    let alias = std::str::from_utf8(trimmed).unwrap_or("").to_string();

    Ok(UserProfile {
        uid: u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]),
        gender: payload[4],
        age: payload[5],
        height_cm: payload[6],
        weight_kg: payload[7],
        profile_type: payload[8],
        alias,
    })
}

/// Decodes the 10-byte battery record. The length check is strict; status
/// codes outside the known set map to [`BatteryStatus::Unknown`].
pub fn decode_battery_info(payload: &[u8]) -> Result<BatteryInfo> {
    if payload.len() != 10 {
        return Err(Error::MalformedPayload {
            channel: "battery",
            expected: "exactly 10",
            actual: payload.len(),
        });
    }

    Ok(BatteryInfo {
        level: payload[0],
        cycles: u16::from_le_bytes([payload[7], payload[8]]),
        status: BatteryStatus::from_byte(payload[9]),
        last_charge: ChargeTimestamp {
            year: 2000 + payload[1] as u16,
            month: payload[2],
            day: payload[3],
            hour: payload[4],
            minute: payload[5],
            second: payload[6],
        },
    })
}

/// Decodes a 4-byte realtime step-count payload (little-endian signed).
pub fn decode_step_count(payload: &[u8]) -> Result<i32> {
    if payload.len() != 4 {
        return Err(Error::MalformedPayload {
            channel: "realtime-steps",
            expected: "exactly 4",
            actual: payload.len(),
        });
    }
    Ok(i32::from_le_bytes([
        payload[0], payload[1], payload[2], payload[3],
    ]))
}

/// Decodes a 2-byte heart-rate payload. Byte 0 must carry the variant's
/// discriminant; byte 1 is the rate.
pub fn decode_heart_rate(payload: &[u8], variant: HeartRateVariant) -> Result<u8> {
    if payload.len() != 2 || payload[0] != variant.discriminant() {
        return Err(Error::MalformedPayload {
            channel: "heart-rate-data",
            expected: "2 bytes with matching discriminant",
            actual: payload.len(),
        });
    }
    Ok(payload[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> UserProfile {
        UserProfile {
            uid: 20271234,
            gender: 1,
            age: 32,
            height_cm: 160,
            weight_kg: 40,
            alias: "alias".to_string(),
            profile_type: 0,
        }
    }

    #[test]
    fn command_bytes() {
        assert_eq!(Command::Pair.bytes(), &[2]);
        assert_eq!(Command::StopVibration.bytes(), &[0]);
        assert_eq!(Command::EnableSensorData.bytes(), &[18, 1]);
        assert_eq!(Command::StartHeartRateScan.bytes(), &[21, 2, 1]);
        assert_eq!(
            Command::for_vibration(VibrationMode::WithoutLed).bytes(),
            &[4]
        );
        assert_eq!(Command::for_led(LedColor::Green).bytes(), &[14, 4, 5, 0, 1]);
    }

    #[test]
    fn user_profile_golden_vector() {
        // Fixed regression vector for the CRC-8 + address-XOR checksum.
        let encoded = encode_user_profile(&sample_profile(), 0xAB);
        assert_eq!(
            encoded,
            [
                0x82, 0x50, 0x35, 0x01, // uid 20271234 little-endian
                0x01, 0x20, 0xA0, 0x28, 0x00, // gender, age, height, weight, type
                0x04, 0x00, // constant bytes
                0x61, 0x6C, 0x69, 0x61, 0x73, 0x00, 0x00, 0x00, // "alias" padded
                0x69, // checksum
            ]
        );
    }

    #[test]
    fn user_profile_round_trips() {
        let profile = sample_profile();
        let encoded = encode_user_profile(&profile, 0xAB);
        let decoded = decode_user_profile(&encoded).unwrap();
        assert_eq!(decoded, profile);
    }

    #[test]
    fn user_profile_alias_truncated_to_eight_bytes() {
        let mut profile = sample_profile();
        profile.alias = "overlong-alias".to_string();
        let encoded = encode_user_profile(&profile, 0x00);
        assert_eq!(&encoded[11..19], b"overlong");

        let decoded = decode_user_profile(&encoded).unwrap();
        assert_eq!(decoded.alias, "overlong");
    }

    #[test]
    fn user_profile_invalid_alias_falls_back_to_empty() {
        let mut encoded = encode_user_profile(&sample_profile(), 0x00);
        encoded[11..19].copy_from_slice(&[0xFF; 8]);
        let decoded = decode_user_profile(&encoded).unwrap();
        assert_eq!(decoded.alias, "");
    }

    #[test]
    fn user_profile_rejects_short_payload() {
        assert!(matches!(
            decode_user_profile(&[0u8; 19]),
            Err(Error::MalformedPayload { actual: 19, .. })
        ));
    }

    #[test]
    fn battery_decodes_only_ten_bytes() {
        let payload = [77, 25, 8, 30, 14, 5, 59, 0x34, 0x12, 2];
        let info = decode_battery_info(&payload).unwrap();
        assert_eq!(info.level, 77);
        assert_eq!(info.cycles, 0x1234);
        assert_eq!(info.status, BatteryStatus::Charging);
        assert_eq!(info.last_charge.year, 2025);
        assert_eq!(info.last_charge.month, 8);
        assert_eq!(info.last_charge.day, 30);
        assert_eq!(info.last_charge.hour, 14);
        assert_eq!(info.last_charge.minute, 5);
        assert_eq!(info.last_charge.second, 59);

        for len in [0usize, 9, 11, 20] {
            let payload = vec![0u8; len];
            assert!(matches!(
                decode_battery_info(&payload),
                Err(Error::MalformedPayload { .. })
            ));
        }
    }

    #[test]
    fn battery_unknown_status_code_does_not_fail() {
        let mut payload = [0u8; 10];
        payload[9] = 200;
        assert_eq!(
            decode_battery_info(&payload).unwrap().status,
            BatteryStatus::Unknown
        );
    }

    #[test]
    fn step_count_is_signed_little_endian() {
        assert_eq!(decode_step_count(&[0x39, 0x05, 0x00, 0x00]).unwrap(), 1337);
        assert_eq!(
            decode_step_count(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap(),
            -1
        );
        assert!(decode_step_count(&[1, 2, 3]).is_err());
        assert!(decode_step_count(&[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn heart_rate_discriminant_gates_by_variant() {
        assert_eq!(decode_heart_rate(&[6, 72], HeartRateVariant::Gen1).unwrap(), 72);
        assert_eq!(decode_heart_rate(&[0, 72], HeartRateVariant::Gen2).unwrap(), 72);
        assert!(decode_heart_rate(&[0, 72], HeartRateVariant::Gen1).is_err());
        assert!(decode_heart_rate(&[6, 72], HeartRateVariant::Gen2).is_err());
        assert!(decode_heart_rate(&[6], HeartRateVariant::Gen1).is_err());
        assert!(decode_heart_rate(&[6, 72, 0], HeartRateVariant::Gen1).is_err());
    }

    #[test]
    fn led_echo_matching_defaults_to_blue() {
        assert_eq!(led_color_from_echo(&[14, 6, 1, 2, 1]), LedColor::Red);
        assert_eq!(led_color_from_echo(&[14, 4, 5, 0, 1]), LedColor::Green);
        assert_eq!(led_color_from_echo(&[14, 6, 2, 0, 1]), LedColor::Orange);
        assert_eq!(led_color_from_echo(&[14, 0, 6, 6, 1]), LedColor::Blue);
        assert_eq!(led_color_from_echo(&[99, 99]), LedColor::Blue);
    }
}
