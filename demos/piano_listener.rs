//! Listens to one piano's play topic and prints every message.
//!
//! ```bash
//! PIANO_MQTT_CONFIG='{"username":"u","password":"p","broker":"mqtt.example.com","port":8883}' \
//! RUST_LOG=piano_mqtt=debug cargo run --example piano_listener -- p1 players
//! ```
//!
//! The first argument is the piano id; an optional second argument joins
//! that consumer group through a shared subscription.

use piano_mqtt::{ClientConfig, initialize_client};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_ENV: &str = "PIANO_MQTT_CONFIG";

fn setup_tracing() {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| "info".into());
	tracing_subscriber::registry()
		.with(filter)
		.with(
			tracing_subscriber::fmt::layer()
				.with_target(true)
				.with_thread_ids(false)
				.with_file(false)
				.with_line_number(false)
				.compact(),
		)
		.init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	setup_tracing();

	let mut args = std::env::args().skip(1);
	let piano_id = args.next().unwrap_or_else(|| "p1".to_string());
	let consumer_group = args.next();

	let raw = std::env::var(CONFIG_ENV)
		.map_err(|_| format!("{CONFIG_ENV} must hold the broker credentials as JSON"))?;
	let config = ClientConfig::from_json(&raw)?;
	info!(config = ?config, "Loaded broker configuration");

	let (client, connection) = initialize_client(
		config,
		&piano_id,
		|topic, payload, meta| {
			println!(
				"[{topic}] {} (from {})",
				String::from_utf8_lossy(payload),
				meta.user_property("client_id").unwrap_or("unknown")
			);
		},
		consumer_group.is_some(),
		consumer_group.as_deref(),
	)
	.await?;

	let connection_id = client.connection_id().await?;
	info!(connection_id = ?connection_id, "Listening, press Ctrl+C to stop");

	let mut states = client.state_changes();
	tokio::select! {
		_ = tokio::signal::ctrl_c() => info!("Ctrl+C received"),
		_ = async {
			while states.changed().await.is_ok() {
				info!(state = %*states.borrow(), "Connection state changed");
			}
		} => {}
	}

	connection.shutdown().await?;
	Ok(())
}
