//! Dispatch of unsolicited payloads to registered listeners.
//!
//! Streams are independent of the one-shot request/response flow: a channel
//! has zero or one listener, and payloads that fail their shape check are
//! dropped silently because a stream has no per-item failure path.

use std::collections::HashMap;

use tracing::trace;
use uuid::Uuid;

use crate::domain::models::HeartRateVariant;
use crate::infrastructure::band::channels::Channel;
use crate::infrastructure::band::protocol;

/// A caller-supplied handler for one notification channel.
pub(crate) enum Listener {
    /// Raw payload passthrough (sensor data, generic notifications).
    Raw(Box<dyn FnMut(&[u8]) + Send>),
    /// Realtime step count, decoded from 4-byte payloads.
    Steps(Box<dyn FnMut(i32) + Send>),
    /// Heart rate, gated on the hardware generation's discriminant byte.
    HeartRate {
        variant: HeartRateVariant,
        callback: Box<dyn FnMut(u8) + Send>,
    },
}

/// Listener table keyed by characteristic identity.
#[derive(Default)]
pub(crate) struct NotificationHub {
    listeners: HashMap<Uuid, Listener>,
}

impl NotificationHub {
    /// Records a listener for a channel, replacing any prior one.
    pub fn set(&mut self, channel: &'static Channel, listener: Listener) {
        self.listeners.insert(channel.characteristic, listener);
    }

    /// Removes a channel's listener. Returns whether one was present.
    pub fn remove(&mut self, channel: &'static Channel) -> bool {
        self.listeners.remove(&channel.characteristic).is_some()
    }

    /// Delivers an unsolicited payload to the channel's listener, if any.
    pub fn dispatch(&mut self, characteristic: Uuid, payload: &[u8]) {
        let Some(listener) = self.listeners.get_mut(&characteristic) else {
            trace!(%characteristic, "notification on channel without listener");
            return;
        };

        match listener {
            Listener::Raw(callback) => callback(payload),
            Listener::Steps(callback) => match protocol::decode_step_count(payload) {
                Ok(steps) => callback(steps),
                Err(_) => trace!(len = payload.len(), "dropping malformed step payload"),
            },
            Listener::HeartRate { variant, callback } => {
                match protocol::decode_heart_rate(payload, *variant) {
                    Ok(rate) => callback(rate),
                    Err(_) => trace!(len = payload.len(), "dropping non-matching heart-rate payload"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::band::channels;
    use std::sync::{Arc, Mutex};

    fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl FnMut(T) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value| sink.lock().unwrap().push(value))
    }

    #[test]
    fn steps_listener_gets_decoded_counts_only() {
        let mut hub = NotificationHub::default();
        let (seen, mut record) = recorder::<i32>();
        hub.set(
            &channels::REALTIME_STEPS,
            Listener::Steps(Box::new(move |steps| record(steps))),
        );

        hub.dispatch(channels::REALTIME_STEPS.characteristic, &[0x39, 0x05, 0, 0]);
        hub.dispatch(channels::REALTIME_STEPS.characteristic, &[1, 2, 3]); // dropped
        hub.dispatch(channels::REALTIME_STEPS.characteristic, &[0x01, 0, 0, 0]);

        assert_eq!(*seen.lock().unwrap(), vec![1337, 1]);
    }

    #[test]
    fn heart_rate_listener_gated_on_variant() {
        let mut hub = NotificationHub::default();
        let (gen1_seen, mut record) = recorder::<u8>();
        hub.set(
            &channels::HEART_RATE_DATA,
            Listener::HeartRate {
                variant: HeartRateVariant::Gen1,
                callback: Box::new(move |rate| record(rate)),
            },
        );

        hub.dispatch(channels::HEART_RATE_DATA.characteristic, &[6, 72]);
        hub.dispatch(channels::HEART_RATE_DATA.characteristic, &[0, 72]); // gen2, dropped
        assert_eq!(*gen1_seen.lock().unwrap(), vec![72]);

        // Replacing with a gen2 listener flips the gating.
        let (gen2_seen, mut record) = recorder::<u8>();
        hub.set(
            &channels::HEART_RATE_DATA,
            Listener::HeartRate {
                variant: HeartRateVariant::Gen2,
                callback: Box::new(move |rate| record(rate)),
            },
        );
        hub.dispatch(channels::HEART_RATE_DATA.characteristic, &[6, 72]); // gen1, dropped
        hub.dispatch(channels::HEART_RATE_DATA.characteristic, &[0, 80]);
        assert_eq!(*gen2_seen.lock().unwrap(), vec![80]);
    }

    #[test]
    fn raw_listener_passes_payload_through() {
        let mut hub = NotificationHub::default();
        let (seen, mut record) = recorder::<Vec<u8>>();
        hub.set(
            &channels::SENSOR_DATA,
            Listener::Raw(Box::new(move |payload| record(payload.to_vec()))),
        );

        hub.dispatch(channels::SENSOR_DATA.characteristic, &[1, 2, 3, 4]);
        assert_eq!(*seen.lock().unwrap(), vec![vec![1, 2, 3, 4]]);
    }

    #[test]
    fn dispatch_without_listener_is_a_no_op() {
        let mut hub = NotificationHub::default();
        hub.dispatch(channels::NOTIFICATION.characteristic, &[1, 2, 3]);
        assert!(!hub.remove(&channels::NOTIFICATION));
    }
}
