//! One-call setup for a piano play subscription
//!
//! Builds the subscribe target from caller intent, derives a unique
//! connection identifier, registers the callback and connects.

use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use super::async_client::MqttClient;
use super::config::{ClientConfig, ClientSettings};
use super::error::MqttClientError;
use super::session::{Connector, RumqttcConnector};
use crate::connection::MqttConnection;
use crate::routing::DeliveryMetadata;
use crate::topic::SHARE_PREFIX;

/// Topic prefix every piano publishes its play events under
pub const PIANO_PLAY_TOPIC: &str = "piano/play";

/// Subscribe target for one piano.
///
/// With `shared` and a non-empty group the target is
/// `$share/{group}/piano/play/{id}`, otherwise `piano/play/{id}`.
pub fn build_subscribe_topic(
	piano_id: &str,
	shared: bool,
	consumer_group: Option<&str>,
) -> String {
	match consumer_group.filter(|group| shared && !group.is_empty()) {
		| Some(group) => format!("{SHARE_PREFIX}{group}/{PIANO_PLAY_TOPIC}/{piano_id}"),
		| None => format!("{PIANO_PLAY_TOPIC}/{piano_id}"),
	}
}

/// `{piano_id}_{uuid}`, unique per connection
pub fn unique_connection_id(piano_id: &str) -> String {
	format!("{piano_id}_{}", Uuid::new_v4())
}

/// Subscribes to one piano's play topic and connects over rumqttc.
///
/// Resolves once the broker acknowledged CONNECT and the subscription was
/// issued. Set `shared` with a `consumer_group` to spread messages across
/// several clients of the same group.
///
/// ```rust,no_run
/// use piano_mqtt::{ClientConfig, initialize_client};
///
/// # async fn run() -> Result<(), piano_mqtt::MqttClientError> {
/// let config = ClientConfig::new("user", "secret", "mqtt.example.com", 8883);
/// let (client, connection) = initialize_client(
/// 	config,
/// 	"p1",
/// 	|topic, payload, _meta| println!("{topic}: {} bytes", payload.len()),
/// 	true,
/// 	Some("players"),
/// )
/// .await?;
/// client.publish("piano/ack/p1", "ok").await?;
/// connection.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub async fn initialize_client<F>(
	config: ClientConfig,
	piano_id: &str,
	callback: F,
	shared: bool,
	consumer_group: Option<&str>,
) -> Result<(MqttClient, MqttConnection), MqttClientError>
where
	F: Fn(&str, &Bytes, &DeliveryMetadata) + Send + Sync + 'static,
{
	initialize_client_with(
		RumqttcConnector,
		ClientSettings::default(),
		config,
		piano_id,
		callback,
		shared,
		consumer_group,
	)
	.await
}

/// [`initialize_client`] with an explicit transport and settings
pub async fn initialize_client_with<C, F>(
	connector: C,
	settings: ClientSettings,
	config: ClientConfig,
	piano_id: &str,
	callback: F,
	shared: bool,
	consumer_group: Option<&str>,
) -> Result<(MqttClient<C>, MqttConnection), MqttClientError>
where
	C: Connector,
	F: Fn(&str, &Bytes, &DeliveryMetadata) + Send + Sync + 'static,
{
	if piano_id.is_empty() {
		return Err(MqttClientError::MissingPianoId);
	}
	if shared && consumer_group.is_none_or(str::is_empty) {
		warn!(piano_id, "Shared subscription requested without consumer group, subscribing exclusively");
	}
	let topic = build_subscribe_topic(piano_id, shared, consumer_group);
	let connection_id = unique_connection_id(piano_id);

	let (client, connection) = MqttClient::new(connector, settings);
	let setup = async {
		client.subscribe(topic.as_str(), callback).await?;
		client.connect(config, connection_id.as_str()).await
	};
	match setup.await {
		| Ok(()) => {
			info!(topic = %topic, connection_id = %connection_id, "MQTT client initialized");
			Ok((client, connection))
		}
		| Err(err) => {
			let _ = connection.shutdown().await;
			Err(err)
		}
	}
}
