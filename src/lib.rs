//! Fleet telemetry simulator.
//!
//! Moves a fixed fleet of vehicles along a small road network, emits a batch
//! of GPS telemetry every tick, flags congested roads and streams both to a
//! RabbitMQ broker when one is reachable.

pub mod communication;
pub mod config;
pub mod error;
pub mod flow_analyzer;
pub mod global_variables;
pub mod shared_data;
pub mod simulation_engine;

pub use config::SimulationConfig;
pub use error::{ConfigError, PublishError, SimulationError, SinkError};
pub use simulation_engine::simulation::{run_simulation, DriverState, Simulation, TickSummary};
