use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use moveecho_client::{ConnectionManager, ConnectionState, MqttTransport};
use moveecho_codec::LocationMessage;
use moveecho_core::{AppConfig, LogFormat, LoggingConfig, LocationSample, TransportTag};
use moveecho_tracking::{
    FilePreferences, LocationPublisher, LocationRequest, LocationRouter, LoggingHost,
    PreferenceStore, SimulatedProvider, TrackingSession,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// MoveEcho - share your position with everyone on the same broker
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "MOVEECHO_CONFIG",
        default_value = "config/moveecho.yaml",
        global = true
    )]
    config: PathBuf,

    /// Override broker URI (tcp://host:port)
    #[arg(short, long, global = true)]
    broker: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish simulated positions and log peer positions until Ctrl-C
    Track(TrackArgs),
    /// Connect, publish one test location and report what comes back
    Probe(ProbeArgs),
    /// Store the transport type attached to published locations
    SetTransport {
        /// car, bike, truck, motorcycle or walking
        tag: TransportTag,
    },
}

#[derive(Args, Debug)]
struct TrackArgs {
    /// Transport type to store before starting
    #[arg(short, long)]
    transport: Option<TransportTag>,

    /// Latitude of the simulated start point
    #[arg(long, default_value_t = 37.7749, allow_hyphen_values = true)]
    start_lat: f64,

    /// Longitude of the simulated start point
    #[arg(long, default_value_t = -122.4194, allow_hyphen_values = true)]
    start_lng: f64,

    /// Compass heading of the simulated walk in degrees
    #[arg(long, default_value_t = 45.0)]
    heading: f64,

    /// Speed of the simulated walk in meters per second
    #[arg(long, default_value_t = 13.9)]
    speed: f64,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    /// Seconds to wait for the broker connection
    #[arg(long, default_value_t = 90)]
    timeout: u64,

    /// Seconds to wait before publishing the test location
    #[arg(long, default_value_t = 3)]
    publish_delay: u64,

    /// Seconds to keep listening after publishing
    #[arg(long, default_value_t = 10)]
    listen: u64,
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let path = cli.config.as_path();
    let mut config = if path.exists() {
        AppConfig::from_config_builder(Some(path))
    } else {
        AppConfig::from_config_builder(None::<&Path>)
    }
    .with_context(|| format!("Failed to load configuration from {:?}", path))?;

    if let Some(uri) = &cli.broker {
        config.broker.uri = uri.clone();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    logging.parse_level()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.to_lowercase()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }

    Ok(())
}

fn log_peer(message: &LocationMessage) -> Result<()> {
    info!(
        peer = %message.client_id,
        lat = message.lat,
        lng = message.lng,
        transport = %message.transport,
        timestamp = message.timestamp,
        "Peer location"
    );
    Ok(())
}

async fn track(config: AppConfig, args: TrackArgs) -> Result<()> {
    let transport = MqttTransport::new(&config.broker)?;
    let manager = ConnectionManager::new(config.broker.clone(), transport);

    let preferences = Arc::new(FilePreferences::new(
        &config.tracking.preferences_path,
        config.tracking.default_transport,
    ));
    if let Some(tag) = args.transport {
        preferences.set_transport_tag(tag)?;
    }

    let provider = SimulatedProvider::new(args.start_lat, args.start_lng)
        .with_heading(args.heading)
        .with_speed(args.speed);

    let session = TrackingSession::new(
        manager,
        Arc::new(provider),
        preferences.clone(),
        Arc::new(LoggingHost::new()),
    )
    .with_request(LocationRequest::from_config(&config.tracking));

    session.router().add_observer(log_peer);

    let mut states = session.manager().watch_state();
    let state_logger = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            match state {
                ConnectionState::Failed => {
                    warn!("Broker unreachable, giving up until restart")
                }
                state => info!(state = %state, "Broker connection state changed"),
            }
        }
    });

    info!(
        client_id = %session.manager().client_id(),
        broker = %config.broker.uri,
        topic = %config.broker.topic,
        transport = %preferences.transport_tag(),
        "Starting MoveEcho tracking"
    );

    session.start().await?;

    signal::ctrl_c().await?;
    info!("Received shutdown signal, stopping tracking session...");

    session.stop().await;
    state_logger.abort();

    let stats = session.router().stats();
    info!(
        published = session.publisher().metrics().published(),
        dropped = session.publisher().metrics().dropped(),
        peers_received = stats.delivered,
        "Tracking session finished"
    );
    Ok(())
}

async fn probe(config: AppConfig, args: ProbeArgs) -> Result<()> {
    let transport = MqttTransport::new(&config.broker)?;
    let manager = ConnectionManager::new(config.broker.clone(), transport);

    let router = Arc::new(LocationRouter::new(manager.client_id().clone()));
    router.add_observer(log_peer);
    manager.set_message_handler(router.clone());

    info!(
        client_id = %manager.client_id(),
        broker = %config.broker.uri,
        "Starting connection probe"
    );

    manager.connect();
    manager.subscribe(&config.broker.topic).await?;

    let mut states = manager.watch_state();
    let settled = tokio::time::timeout(Duration::from_secs(args.timeout), async {
        states
            .wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Failed))
            .await
            .is_ok()
    })
    .await
    .unwrap_or(false);

    let state = manager.state();
    if !settled || state != ConnectionState::Connected {
        let reason = manager
            .last_error()
            .unwrap_or_else(|| "timed out".to_string());
        error!(state = %state, error = %reason, "Probe could not connect");
        manager.disconnect().await;
        bail!("Broker {} unreachable: {}", config.broker.uri, reason);
    }

    info!("Connected, publishing test location in {}s", args.publish_delay);
    tokio::time::sleep(Duration::from_secs(args.publish_delay)).await;

    let publisher = LocationPublisher::new(manager.clone());
    let sample = LocationSample::now(37.7749, -122.4194);
    match publisher.publish(&sample, TransportTag::Car) {
        Ok(()) => info!(lat = sample.latitude, lng = sample.longitude, "Test location published"),
        Err(e) => error!(error = %e, "Test location not published"),
    }

    tokio::time::sleep(Duration::from_secs(args.listen)).await;

    let metrics = manager.metrics();
    let stats = router.stats();
    info!(
        sent = metrics.messages_sent,
        received = metrics.messages_received,
        own_echoes = stats.self_echo_dropped,
        peers = stats.delivered,
        malformed = stats.malformed_dropped,
        "Probe finished"
    );

    manager.disconnect().await;
    Ok(())
}

fn set_transport(config: &AppConfig, tag: TransportTag) -> Result<()> {
    let preferences = FilePreferences::new(
        &config.tracking.preferences_path,
        config.tracking.default_transport,
    );
    preferences.set_transport_tag(tag)?;
    info!(
        transport = %tag,
        path = %preferences.path().display(),
        "Transport preference stored"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config.logging)?;

    match cli.command {
        Command::Track(args) => track(config, args).await,
        Command::Probe(args) => probe(config, args).await,
        Command::SetTransport { tag } => set_transport(&config, tag),
    }
}
