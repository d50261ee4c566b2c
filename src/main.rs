use anyhow::Result;
use callguard::{BackendClient, Config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = Config::load()?;

    info!("callguard v0.1.0");
    info!("Backend HTTP endpoint: {}", cfg.backend.base_url);
    info!("Backend WS endpoint: {}", cfg.backend.ws_base_url);

    let backend = BackendClient::new(cfg.backend.base_url.clone());
    if backend.health().await {
        info!("Backend reachable");
    } else {
        info!("Backend not reachable; sessions will surface per-panel errors");
    }

    // Probe a fixture recording if one is present
    let fixture_path = "tests/fixtures/sample-call.wav";
    if std::path::Path::new(fixture_path).exists() {
        let source = callguard::AudioSource::probe(fixture_path)?;

        info!("Loaded fixture recording");
        info!("Duration: {:.1} seconds", source.duration_seconds);
        info!("Sample rate: {} Hz", source.sample_rate);
        info!("Channels: {}", source.channels);
    } else {
        info!("No fixture recording at {}", fixture_path);
        info!("Place a .wav file there to probe it on startup");
    }

    Ok(())
}
