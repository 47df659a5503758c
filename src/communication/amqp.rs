// communication/amqp.rs

use crate::communication::publisher::MessageBus;
use crate::error::PublishError;
use crate::global_variables::{CONNECT_TIMEOUT_SECS, PUBLISH_QUEUE_CAPACITY};
use amiquip::{Connection, Exchange, Publish, QueueDeclareOptions};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// RabbitMQ transport.
///
/// The blocking amiquip connection lives on its own thread; `publish` only
/// queues the payload for that thread, so a slow broker can never hold up a
/// simulation tick. While the queue is full new payloads are dropped with a
/// warning. Once the broker thread has died `publish` reports a transport
/// error.
pub struct AmqpBus {
    tx: Sender<(String, Vec<u8>)>,
    dropped: AtomicU64,
}

impl AmqpBus {
    /// Opens the connection and declares one queue per topic. Returns once the
    /// broker thread is ready, or with the connection error.
    pub fn connect(url: &str, topics: &[&str]) -> Result<Self, PublishError> {
        Self::connect_with_timeout(url, topics, Duration::from_secs(CONNECT_TIMEOUT_SECS))
    }

    /// Like `connect`, but gives up if the broker has not finished the
    /// handshake within `timeout`.
    pub fn connect_with_timeout(
        url: &str,
        topics: &[&str],
        timeout: Duration,
    ) -> Result<Self, PublishError> {
        let url = url.to_string();
        let topics: Vec<String> = topics.iter().map(|t| t.to_string()).collect();
        let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);
        let (tx, rx) = bounded::<(String, Vec<u8>)>(PUBLISH_QUEUE_CAPACITY);

        thread::Builder::new()
            .name("amqp-publisher".to_string())
            .spawn(move || {
                let setup = (|| -> amiquip::Result<(Connection, amiquip::Channel)> {
                    let mut connection = Connection::insecure_open(&url)?;
                    let channel = connection.open_channel(None)?;
                    for topic in &topics {
                        channel.queue_declare(topic.as_str(), QueueDeclareOptions::default())?;
                    }
                    Ok((connection, channel))
                })();
                let (connection, channel) = match setup {
                    Ok(pair) => {
                        let _ = ready_tx.send(Ok(()));
                        pair
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };

                // Ends at once if the caller already gave up and dropped the sender.
                {
                    let exchange = Exchange::direct(&channel);
                    for (topic, payload) in rx.iter() {
                        if let Err(e) = exchange.publish(Publish::new(&payload, topic.as_str())) {
                            log::warn!("AMQP publish to '{}' failed: {}", topic, e);
                            break;
                        }
                    }
                }
                let _ = channel.close();
                if let Err(e) = connection.close() {
                    log::debug!("AMQP connection close failed: {}", e);
                }
            })
            .map_err(|e| PublishError::Connect(e.to_string()))?;

        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(())) => Ok(Self::from_sender(tx)),
            Ok(Err(e)) => Err(PublishError::Connect(e)),
            Err(RecvTimeoutError::Timeout) => Err(PublishError::Connect(format!(
                "broker did not answer within {:?}",
                timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(PublishError::Connect(
                "publisher thread exited during setup".to_string(),
            )),
        }
    }

    fn from_sender(tx: Sender<(String, Vec<u8>)>) -> Self {
        Self {
            tx,
            dropped: AtomicU64::new(0),
        }
    }

    /// Payloads discarded because the broker thread was behind.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl MessageBus for AmqpBus {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        match self.tx.try_send((topic.to_string(), payload)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!(
                    "AMQP queue full ({} pending), dropped '{}' payload ({} dropped so far)",
                    PUBLISH_QUEUE_CAPACITY,
                    topic,
                    dropped
                );
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(PublishError::Transport(
                "broker connection closed".to_string(),
            )),
        }
    }
}
