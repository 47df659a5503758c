// fleet_simulator.rs
use clap::Parser;
use fleet_telemetry::{run_simulation, SimulationConfig};
use std::path::PathBuf;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "fleet_simulator")]
#[command(about = "Simulated vehicle telemetry with congestion alerts")]
struct Cli {
    /// JSON config file; unset fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of vehicles in the fleet
    #[arg(long)]
    fleet_size: Option<usize>,

    /// Seconds between ticks
    #[arg(long)]
    tick_interval: Option<u64>,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Simulate this hour of day (0-23) instead of the local clock
    #[arg(long)]
    hour: Option<u32>,

    /// Stop after this many ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// RabbitMQ URL
    #[arg(long)]
    amqp_url: Option<String>,

    /// Append sampled telemetry to this CSV file
    #[arg(long)]
    telemetry_csv: Option<PathBuf>,

    /// Append congestion alerts to this CSV file
    #[arg(long)]
    alerts_csv: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<SimulationConfig, fleet_telemetry::ConfigError> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::from_json_file(path)?,
            None => SimulationConfig::default(),
        };
        if let Some(fleet_size) = self.fleet_size {
            config.fleet_size = fleet_size;
        }
        if let Some(tick_interval) = self.tick_interval {
            config.tick_interval_secs = tick_interval;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.hour.is_some() {
            config.fixed_hour = self.hour;
        }
        if self.ticks.is_some() {
            config.max_ticks = self.ticks;
        }
        if let Some(url) = self.amqp_url {
            config.amqp_url = url;
        }
        if self.telemetry_csv.is_some() {
            config.telemetry_csv = self.telemetry_csv;
        }
        if self.alerts_csv.is_some() {
            config.alerts_csv = self.alerts_csv;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Ctrl-C received, finishing current batch");
            let _ = shutdown_tx.send(true);
        }
    });

    if let Err(e) = run_simulation(config, shutdown_rx).await {
        log::error!("Simulation setup failed: {}", e);
        std::process::exit(1);
    }
}
