use std::io::{self, BufWriter};
use std::sync::Arc;

use cvdp_ppm::{config::ServiceConfig, BsmHandler, StreamRunner};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> anyhow::Result<()> {
    let service = ServiceConfig::from_env(std::env::args().nth(1))?;

    init_tracing(&service.log_level);

    info!("cvdp-ppm starting");
    if let Some(path) = &service.config_file {
        info!("  Config file: {}", path.display());
    }
    if let Some(path) = &service.map_file {
        info!("  Map file: {}", path.display());
    }

    let config = service.load_ppm_config()?;
    config.validate()?;
    info!("Configuration validated successfully");

    let geofence = config.build_geofence()?;
    let handler = BsmHandler::new(Arc::new(geofence), &config);
    let mut runner = StreamRunner::new(handler);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let summary = runner.run(stdin.lock(), BufWriter::new(stdout.lock()))?;

    info!(
        summary = %serde_json::to_string(&summary)?,
        "cvdp-ppm stopped"
    );
    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}
