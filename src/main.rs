//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run UI.
//! No business logic here; consent, sampling and delivery live in the use cases.

use dotenv::dotenv;
use geo_relay::adapters::http::HttpTransport;
use geo_relay::adapters::persistence::SettingsJson;
use geo_relay::adapters::platform::{
    PromptConsent, ReplayLocationProvider, StaticConsent, TerminalNotifier,
};
use geo_relay::adapters::ui::tui::TuiInputPort;
use geo_relay::domain::EndpointConfig;
use geo_relay::ports::{
    ConsentPort, DeliveryTransport, InputPort, LocationProvider, NotifierPort, SettingsPort,
};
use geo_relay::shared::config::AppConfig;
use geo_relay::usecases::{
    Coordinator, DeliveryQueue, NotificationSink, PermissionGate, PositionSource,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Googleplex; used when neither a track file nor a fixed position is configured.
const DEFAULT_POSITION: (f64, f64) = (37.422, -122.084);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cfg = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "config load failed; using defaults");
        AppConfig::default()
    });
    let headless = cfg.headless();
    if !headless {
        geo_relay::adapters::ui::init_ui();
    }

    // --- Settings (endpoint URL survives restarts) ---
    let settings_impl = SettingsJson::new(cfg.settings_path_or_default());
    settings_impl
        .load()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let stored_endpoint = settings_impl
        .load_endpoint()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let settings: Arc<dyn SettingsPort> = Arc::new(settings_impl);
    let endpoint = cfg
        .endpoint_url()
        .map(EndpointConfig::new)
        .or(stored_endpoint)
        .unwrap_or_default();
    info!(url = %endpoint.url, "endpoint");

    // --- Consent: prompts in the terminal unless auto-granted or headless ---
    let consent: Arc<dyn ConsentPort> = if cfg.auto_grant() || headless {
        info!("auto-granting all capabilities");
        Arc::new(StaticConsent::granting())
    } else {
        Arc::new(PromptConsent::new())
    };
    let gate = Arc::new(PermissionGate::new(consent));
    let permissions = gate.request_all().await;
    if !permissions.location_fully_granted() {
        warn!("location permissions are necessary for tracking");
    }
    if !permissions.notifications.is_granted() {
        warn!("notification permissions are necessary for push notifications");
    }

    // --- Positioning (simulated: CSV track or fixed point) ---
    let provider: Arc<dyn LocationProvider> = match &cfg.track_file {
        Some(path) => Arc::new(
            ReplayLocationProvider::from_csv_path(path, cfg.sample_interval())
                .map_err(|e| anyhow::anyhow!("{}", e))?,
        ),
        None => {
            let (lat, lon) = cfg.fixed_position().unwrap_or(DEFAULT_POSITION);
            Arc::new(
                ReplayLocationProvider::fixed(lat, lon, cfg.sample_interval())
                    .map_err(|e| anyhow::anyhow!("{}", e))?,
            )
        }
    };
    let positions = Arc::new(PositionSource::new(
        provider,
        Arc::clone(&gate),
        cfg.background_task_name_or_default(),
        cfg.accuracy_or_default(),
    ));

    // --- Delivery ---
    let transport: Arc<dyn DeliveryTransport> = Arc::new(
        HttpTransport::new(cfg.request_timeout()).map_err(|e| anyhow::anyhow!("{}", e))?,
    );
    let notifier: Arc<dyn NotifierPort> = Arc::new(TerminalNotifier::new());
    let notifications = Arc::new(NotificationSink::new(notifier, Arc::clone(&gate)));
    let retry = cfg.retry_policy();
    info!(
        max_attempts = retry.max_attempts,
        base_delay_ms = retry.base_delay.as_millis() as u64,
        factor = retry.factor,
        status_policy = ?cfg.status_policy(),
        max_in_flight = cfg.max_in_flight_or_default(),
        "delivery policy"
    );
    let queue = Arc::new(DeliveryQueue::new(
        transport,
        notifications,
        retry,
        cfg.status_policy(),
        cfg.max_in_flight_or_default(),
    ));

    let coordinator = Arc::new(Coordinator::new(
        positions,
        queue,
        Arc::clone(&gate),
        settings,
        cfg.stream_config(),
        endpoint,
    ));

    // Background sampling only with both location grants; the gate refuses otherwise.
    if permissions.location_fully_granted() {
        if let Err(e) = coordinator.start_tracking().await {
            warn!(error = %e, "background tracking not started");
        }
    }

    if headless {
        info!("headless mode: tracking until Ctrl-C");
        tokio::signal::ctrl_c().await?;
    } else {
        let input_port: Arc<dyn InputPort> = Arc::new(TuiInputPort::new(Arc::clone(&coordinator)));
        input_port
            .run()
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;
    }

    coordinator.stop_tracking().await;
    info!("bye");
    Ok(())
}
