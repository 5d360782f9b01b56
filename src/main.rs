//! AVR MQTT GW - Rust implementation
//!
//! Gateway exposing a Pioneer AV receiver on an MQTT broker.

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avr_mqtt_gw::bridge::{Bridge, LinkState};
use avr_mqtt_gw::bus::{BusEvent, MqttBus};
use avr_mqtt_gw::config::AppConfig;
use avr_mqtt_gw::device::{PioneerHandle, PioneerReceiver};
use avr_mqtt_gw::topics::{Channel, TopicRegistry, QUERY_SUFFIX};

/// AVR MQTT Gateway - Mirror a Pioneer AV receiver onto MQTT
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Receiver host, overrides the configuration file
    #[arg(long, env = "AVR_HOST")]
    device_host: Option<String>,

    /// MQTT broker host, overrides the configuration file
    #[arg(long, env = "MQTT_HOST")]
    mqtt_host: Option<String>,

    /// Device id used in the topic root
    #[arg(long, env = "AVR_ID")]
    device_id: Option<String>,

    /// Print the resolved topics and exit
    #[arg(long)]
    print_topics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting AVR MQTT GW v{}...", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).await?;
    let topics = config.topic_registry();

    if args.print_topics {
        print_topics(&topics);
        return Ok(());
    }

    info!("Topic root: {}", topics.root());

    run_app(config, topics, shutdown_signal()).await?;

    info!("AVR MQTT GW shutdown complete");
    Ok(())
}

async fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Configuration file: {}", path);
            AppConfig::load(path).await?
        },
        None => {
            info!("No configuration file, using defaults");
            AppConfig::default()
        },
    };

    if let Some(host) = &args.device_host {
        config.device.host = host.clone();
    }
    if let Some(host) = &args.mqtt_host {
        config.mqtt.host = host.clone();
    }
    if let Some(id) = &args.device_id {
        config.device.id = Some(id.clone());
    }

    config.validate()?;
    Ok(config)
}

async fn run_app(
    config: AppConfig,
    topics: TopicRegistry,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let (device, mut device_rx) = PioneerReceiver::spawn(&config.device);
    let mut bridge: Bridge<PioneerHandle, MqttBus> = Bridge::new(topics, device.clone());
    let mut bus_rx: Option<mpsc::Receiver<BusEvent>> = None;

    info!("Waiting for the receiver at {}:{}", config.device.host, config.device.port);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Receiver events
            event = device_rx.recv() => {
                let Some(event) = event else {
                    info!("Receiver driver stopped");
                    break;
                };
                debug!(?event, "Receiver event");
                bridge.on_device_event(event);

                // The bus is opened once, after the first receiver connect
                if bridge.link_state() == LinkState::DeviceConnected {
                    let (bus, rx) = MqttBus::connect(&config.mqtt);
                    bridge.attach_bus(bus);
                    bus_rx = Some(rx);
                }
            }

            // Bus lifecycle and inbound messages
            event = next_bus_event(&mut bus_rx) => {
                match event {
                    Some(event) => bridge.on_bus_event(event),
                    None => {
                        info!("MQTT event loop stopped");
                        bus_rx = None;
                    },
                }
            }

            // Handle shutdown signal
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    // Cleanup
    info!(
        "Shutting down after {} state updates...",
        bridge.cache().update_count()
    );
    if let Some(bus) = bridge.bus() {
        bus.disconnect().await;
    }
    device.shutdown();

    Ok(())
}

/// Next bus event, or never while no bus connection exists
async fn next_bus_event(rx: &mut Option<mpsc::Receiver<BusEvent>>) -> Option<BusEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn print_topics(topics: &TopicRegistry) {
    use colored::*;

    println!("\n{}", "=== AVR MQTT Topics ===".bold().cyan());
    println!("  Root: {}", topics.root().green());

    for channel in Channel::all() {
        println!("\n  {}:", channel.as_str().bright_white());
        match topics.inbound(*channel) {
            Some(inbound) => println!("    control: {}", inbound.yellow()),
            None => println!("    control: {}", "(read-only)".dimmed()),
        }
        println!("    state:   {}", topics.outbound(*channel).green());
        println!("    query:   {}", topics.query_topic(*channel).cyan());
    }

    println!(
        "\n  Publish a reply topic to any topic ending in '{}' to receive the cached value.",
        QUERY_SUFFIX
    );
}
