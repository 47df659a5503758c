use thiserror::Error;

/// Invalid parameters or road table. The only error class that stops the
/// process, and only before the simulation enters its running loop.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("fleet size must be at least 1")]
    EmptyFleet,

    #[error("{name} cadence must be at least 1 tick")]
    ZeroCadence { name: &'static str },

    #[error("rush hour window {start_hour}-{end_hour} is invalid (hours 0-23, start <= end)")]
    InvalidRushWindow { start_hour: u32, end_hour: u32 },

    #[error("fixed hour {0} is outside 0-23")]
    InvalidHour(u32),

    #[error("{profile} profile: {reason}")]
    InvalidProfile { profile: &'static str, reason: String },

    #[error("congestion thresholds: {0}")]
    InvalidThresholds(String),

    #[error("road network has no segments")]
    EmptyRoadNetwork,

    #[error("duplicate road id {0}")]
    DuplicateRoad(String),

    #[error("road {road_id} has an invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate {
        road_id: String,
        latitude: f64,
        longitude: f64,
    },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures on the path to the external message bus. None of these ever
/// reach the generation path; the publisher turns them into offline mode.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("broker connection failed: {0}")]
    Connect(String),

    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("broker transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("sink rejected record: {0}")]
    Rejected(String),
}

/// Failure inside a single simulation tick. The driver logs it, cools down
/// and carries on with the next tick.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("tick {batch_number} produced an empty batch")]
    EmptyBatch { batch_number: u64 },

    #[error("vehicle index {0} is not part of the fleet")]
    UnknownVehicle(usize),
}
