// communication/publisher.rs

use crate::error::PublishError;
use serde::Serialize;
use std::thread;
use std::time::Duration;

/// Transport to the external message bus.
///
/// Implementations must return promptly: the simulation loop calls this
/// inline for every record it produces.
pub trait MessageBus: Send {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

/// Best-effort delivery of telemetry and alerts.
///
/// Once offline the publisher stays offline for the rest of the process and
/// `publish` becomes a silent no-op. Nothing here ever surfaces an error to
/// the caller.
pub struct StreamingPublisher {
    bus: Option<Box<dyn MessageBus>>,
    delivered: u64,
    skipped: u64,
}

impl StreamingPublisher {
    /// Tries `connector` up to `attempts` times, sleeping `backoff` between
    /// attempts. Falls back to offline mode if every attempt fails.
    ///
    /// This blocks while retrying, so async callers should run it on a
    /// blocking thread.
    pub fn connect<F>(mut connector: F, attempts: u32, backoff: Duration) -> Self
    where
        F: FnMut() -> Result<Box<dyn MessageBus>, PublishError>,
    {
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            match connector() {
                Ok(bus) => {
                    log::info!("Message bus connected on attempt {}", attempt);
                    return Self::with_bus(bus);
                }
                Err(e) => {
                    log::warn!(
                        "Message bus connection attempt {}/{} failed: {}",
                        attempt,
                        attempts,
                        e
                    );
                    if attempt < attempts {
                        thread::sleep(backoff);
                    }
                }
            }
        }
        log::warn!("Message bus unavailable, running in offline mode");
        Self::offline()
    }

    pub fn with_bus(bus: Box<dyn MessageBus>) -> Self {
        Self {
            bus: Some(bus),
            delivered: 0,
            skipped: 0,
        }
    }

    pub fn offline() -> Self {
        Self {
            bus: None,
            delivered: 0,
            skipped: 0,
        }
    }

    pub fn is_online(&self) -> bool {
        self.bus.is_some()
    }

    /// Records handed to the bus so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Records not sent because the publisher was offline or the payload
    /// could not be built.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Serializes `record` as JSON and hands it to the bus. Returns whether it
    /// was accepted. A transport failure switches the publisher offline
    /// without retrying.
    pub fn publish<T: Serialize>(&mut self, topic: &str, record: &T) -> bool {
        let Some(bus) = self.bus.as_ref() else {
            self.skipped += 1;
            return false;
        };
        let payload = match serde_json::to_vec(record) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("Dropping {} record: {}", topic, PublishError::from(e));
                self.skipped += 1;
                return false;
            }
        };
        match bus.publish(topic, payload) {
            Ok(()) => {
                self.delivered += 1;
                true
            }
            Err(e) => {
                log::warn!(
                    "Publishing to '{}' failed, switching to offline mode: {}",
                    topic,
                    e
                );
                self.bus = None;
                self.skipped += 1;
                false
            }
        }
    }
}
