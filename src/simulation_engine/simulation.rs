// simulation.rs
use crate::communication::{
    AlertSink, AmqpBus, CsvSink, LogSink, MessageBus, StreamingPublisher, TelemetrySink,
};
use crate::config::SimulationConfig;
use crate::error::{ConfigError, SimulationError};
use crate::flow_analyzer::CongestionDetector;
use crate::global_variables::{QUEUE_CONGESTION_ALERTS, QUEUE_VEHICLE_GPS};
use crate::shared_data::CongestionAlert;
use crate::simulation_engine::road_network::{create_road_network, RoadNetwork};
use crate::simulation_engine::traffic_generator::{TelemetryBatch, TrafficBatchGenerator};
use crate::simulation_engine::vehicles::{fleet_ids, VehiclePositionModel};

use chrono::{Local, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::task;
use tokio::time::sleep;

/// Lifecycle of the simulation driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Initializing,
    Running,
    /// Running, but the message bus is unreachable. Records stay local.
    DegradedPublisher,
    Stopped,
}

/// What one tick produced.
#[derive(Debug, Clone)]
pub struct TickSummary {
    pub batch_number: u64,
    pub hour: u32,
    pub records: usize,
    pub average_speed: f64,
    pub alerts: Vec<CongestionAlert>,
    pub publisher_online: bool,
}

pub struct Simulation {
    config: SimulationConfig,
    network: RoadNetwork,
    model: VehiclePositionModel,
    generator: TrafficBatchGenerator,
    detector: CongestionDetector,
    publisher: StreamingPublisher,
    telemetry_sink: Box<dyn TelemetrySink>,
    alert_sink: Box<dyn AlertSink>,
    rng: StdRng,
    batch_count: u64,
    state: DriverState,
}

impl Simulation {
    /// Validates the configuration and places the fleet. A configuration
    /// error is the only way this can fail.
    pub fn new(
        config: SimulationConfig,
        network: RoadNetwork,
        publisher: StreamingPublisher,
        telemetry_sink: Box<dyn TelemetrySink>,
        alert_sink: Box<dyn AlertSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if network.is_empty() {
            return Err(ConfigError::EmptyRoadNetwork);
        }
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let model =
            VehiclePositionModel::initialize(fleet_ids(config.fleet_size), &network, &mut rng);
        Ok(Self {
            generator: TrafficBatchGenerator::from_config(&config),
            detector: CongestionDetector::new(config.thresholds),
            config,
            network,
            model,
            publisher,
            telemetry_sink,
            alert_sink,
            rng,
            batch_count: 0,
            state: DriverState::Initializing,
        })
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn batch_count(&self) -> u64 {
        self.batch_count
    }

    pub fn model(&self) -> &VehiclePositionModel {
        &self.model
    }

    /// Configured hour of day, or the local clock's.
    pub fn current_hour(&self) -> u32 {
        self.config.fixed_hour.unwrap_or_else(|| Local::now().hour())
    }

    /// Runs one iteration: generate a batch, check congestion every Nth tick,
    /// push a sample record every Mth tick.
    pub fn tick(&mut self, hour: u32) -> Result<TickSummary, SimulationError> {
        self.batch_count += 1;
        let batch_number = self.batch_count;

        let batch = self.generator.generate_batch(
            batch_number,
            hour,
            &mut self.model,
            &mut self.publisher,
            &mut self.rng,
        )?;
        let average_speed = batch
            .average_speed()
            .ok_or(SimulationError::EmptyBatch { batch_number })?;

        let alerts = if batch_number % self.config.congestion_check_cadence == 0 {
            self.raise_alerts(&batch)
        } else {
            Vec::new()
        };

        if batch_number % self.config.sink_push_cadence == 0 {
            let sample = &batch.records()[self.rng.random_range(0..batch.len())];
            if let Err(e) = self.telemetry_sink.accept(sample) {
                log::warn!(
                    "Telemetry sink rejected sample from batch {}: {}",
                    batch_number,
                    e
                );
            }
        }

        self.refresh_state();
        let summary = TickSummary {
            batch_number,
            hour,
            records: batch.len(),
            average_speed,
            alerts,
            publisher_online: self.publisher.is_online(),
        };
        log::info!(
            "Batch {}: {} vehicles | Avg speed: {:.1} km/h | alerts: {} | bus: {}",
            summary.batch_number,
            summary.records,
            summary.average_speed,
            summary.alerts.len(),
            if summary.publisher_online { "online" } else { "offline" }
        );
        Ok(summary)
    }

    fn raise_alerts(&mut self, batch: &TelemetryBatch) -> Vec<CongestionAlert> {
        let alerts = self.detector.detect(batch.records(), &mut self.rng);
        for alert in &alerts {
            log::warn!(
                "Congestion on {} ({}): {} severity, {:.2} km/h over {} vehicles",
                alert.road_name,
                alert.road_id,
                alert.severity,
                alert.avg_speed,
                alert.vehicle_count
            );
            self.publisher.publish(QUEUE_CONGESTION_ALERTS, alert);
            if let Err(e) = self.alert_sink.accept(alert) {
                log::warn!("Alert sink rejected {}: {}", alert.alert_id, e);
            }
        }
        alerts
    }

    fn refresh_state(&mut self) {
        self.state = match (self.state, self.publisher.is_online()) {
            (DriverState::Initializing, true) => DriverState::Running,
            (DriverState::Initializing, false) => DriverState::DegradedPublisher,
            (DriverState::Running, false) => {
                log::warn!("Message bus lost; continuing with local telemetry only");
                DriverState::DegradedPublisher
            }
            (state, _) => state,
        };
    }

    /// Drives ticks until `shutdown` turns true or `max_ticks` is reached.
    /// A failing tick is logged and followed by the longer error cooldown;
    /// it never ends the loop. Shutdown is honoured between ticks, so a batch
    /// that has started is always finished.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        log::info!(
            "Starting traffic simulation: {} vehicles | {} roads | bus {}",
            self.model.len(),
            self.network.len(),
            if self.publisher.is_online() { "connected" } else { "offline" }
        );
        self.refresh_state();

        loop {
            if *shutdown.borrow() {
                log::info!("Shutdown requested after batch {}", self.batch_count);
                break;
            }

            let hour = self.current_hour();
            let pause = match self.tick(hour) {
                Ok(_) => self.config.tick_interval(),
                Err(e) => {
                    log::error!("Error in batch {}: {}", self.batch_count, e);
                    self.config.error_cooldown()
                }
            };

            if let Some(max_ticks) = self.config.max_ticks {
                if self.batch_count >= max_ticks {
                    log::info!("Reached tick limit of {}", max_ticks);
                    break;
                }
            }

            tokio::select! {
                _ = sleep(pause) => {}
                changed = shutdown.changed() => {
                    // Sender gone: nobody can ask us to stop any more, keep pacing.
                    if changed.is_err() {
                        sleep(pause).await;
                    }
                }
            }
        }

        self.state = DriverState::Stopped;
        log::info!(
            "Simulation stopped after {} batches ({} records published)",
            self.batch_count,
            self.publisher.delivered()
        );
    }
}

fn connect_publisher(config: &SimulationConfig) -> StreamingPublisher {
    let url = config.amqp_url.clone();
    StreamingPublisher::connect(
        || {
            AmqpBus::connect(&url, &[QUEUE_VEHICLE_GPS, QUEUE_CONGESTION_ALERTS])
                .map(|bus| Box::new(bus) as Box<dyn MessageBus>)
        },
        config.connect_attempts,
        config.connect_backoff(),
    )
}

/// Builds everything from `config` and runs until shutdown. Only a
/// configuration error is returned; an unreachable broker just means
/// offline mode.
pub async fn run_simulation(
    config: SimulationConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<(), ConfigError> {
    config.validate()?;

    let publisher_config = config.clone();
    let publisher = task::spawn_blocking(move || connect_publisher(&publisher_config))
        .await
        .unwrap_or_else(|e| {
            log::warn!("Publisher setup task failed: {}", e);
            StreamingPublisher::offline()
        });

    let telemetry_sink: Box<dyn TelemetrySink> = match &config.telemetry_csv {
        Some(path) => Box::new(CsvSink::new(path)),
        None => Box::new(LogSink),
    };
    let alert_sink: Box<dyn AlertSink> = match &config.alerts_csv {
        Some(path) => Box::new(CsvSink::new(path)),
        None => Box::new(LogSink),
    };

    let mut simulation = Simulation::new(
        config,
        create_road_network(),
        publisher,
        telemetry_sink,
        alert_sink,
    )?;
    simulation.run(shutdown).await;
    Ok(())
}
