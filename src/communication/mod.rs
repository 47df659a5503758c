// communication/mod.rs
pub mod amqp;
pub mod publisher;
pub mod sinks;

pub use amqp::AmqpBus;
pub use publisher::{MessageBus, StreamingPublisher};
pub use sinks::{AlertSink, CsvSink, LogSink, TelemetrySink};
