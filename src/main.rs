use restaurant::config::configuration::Settings;
use restaurant::jobs::spawn_sweep;
use restaurant::realtime::BroadcastNotifier;
use restaurant::services::account::ensure_owner;
use restaurant::startup::{build_gateway, Application};
use restaurant::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let subscriber = get_subscriber("restaurant".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    let config = Settings::new().expect("Failed to load configurations");
    let gateway = build_gateway(&config.database)
        .await
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?;
    ensure_owner(&gateway, &config.owner)
        .await
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?;
    let _sweep = spawn_sweep(gateway.clone(), config.sweep.clone());

    let application = Application::build(config, gateway, BroadcastNotifier::default()).await?;
    tracing::info!(port = application.port(), "restaurant server listening");
    application.run_until_stopped().await?;
    Ok(())
}
