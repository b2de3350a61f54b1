//! Configuration for MQTT client initialization

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::MqttClientError;
use crate::topic::MultiLevelWildcard;

/// Default connect timeout in milliseconds
pub const DEFAULT_CONNECTION_TIMEOUT_MILLIS: u64 = 10_000;

fn default_connection_timeout() -> u64 {
	DEFAULT_CONNECTION_TIMEOUT_MILLIS
}

/// Broker credentials and address for one connection attempt.
///
/// Deserializes from the credential document handed out to integrators:
///
/// ```rust
/// use piano_mqtt::ClientConfig;
///
/// let config = ClientConfig::from_json(
/// 	r#"{"username":"u","password":"p","broker":"mqtt.example.com","port":8883}"#,
/// )?;
/// assert_eq!(config.connection_timeout_millis, 10_000);
/// # Ok::<(), piano_mqtt::MqttClientError>(())
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Broker user name
	pub username: String,
	/// Broker password
	pub password: String,
	/// Broker host name
	pub broker: String,
	/// Broker TLS port
	pub port: u16,
	/// Connect timeout in milliseconds
	#[serde(rename = "connection_timeout", default = "default_connection_timeout")]
	pub connection_timeout_millis: u64,
}

impl ClientConfig {
	/// Create config with the default connect timeout
	pub fn new(
		username: impl Into<String>,
		password: impl Into<String>,
		broker: impl Into<String>,
		port: u16,
	) -> Self {
		Self {
			username: username.into(),
			password: password.into(),
			broker: broker.into(),
			port,
			connection_timeout_millis: DEFAULT_CONNECTION_TIMEOUT_MILLIS,
		}
	}

	/// Parse the JSON credential document
	pub fn from_json(json: &str) -> Result<Self, MqttClientError> {
		serde_json::from_str(json).map_err(MqttClientError::Configuration)
	}

	/// Override the connect timeout
	pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
		self.connection_timeout_millis =
			u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
		self
	}

	/// Connect timeout as a duration
	pub fn connection_timeout(&self) -> Duration {
		Duration::from_millis(self.connection_timeout_millis)
	}

	/// Broker URL in `mqtts://host:port/mqtt` form, for logging
	pub fn broker_url(&self) -> String {
		format!("mqtts://{}:{}/mqtt", self.broker, self.port)
	}
}

impl fmt::Debug for ClientConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ClientConfig")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.field("broker", &self.broker)
			.field("port", &self.port)
			.field("connection_timeout_millis", &self.connection_timeout_millis)
			.finish()
	}
}

/// Delay policy between transport reconnect attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectBackoff {
	/// Delay after the first consecutive error
	pub initial_delay: Duration,
	/// Upper bound for the delay
	pub max_delay: Duration,
	/// Give up after this many consecutive errors; `None` retries forever
	pub max_consecutive_errors: Option<u32>,
}

impl Default for ReconnectBackoff {
	fn default() -> Self {
		Self {
			initial_delay: Duration::from_millis(100),
			max_delay: Duration::from_secs(30),
			max_consecutive_errors: None,
		}
	}
}

impl ReconnectBackoff {
	/// Exponential delay for the given consecutive error count (1-based)
	pub fn delay(&self, error_count: u32) -> Duration {
		let exponent = error_count.saturating_sub(1).min(10);
		self.initial_delay
			.saturating_mul(2_u32.pow(exponent))
			.min(self.max_delay)
	}

	/// Whether the error budget is spent
	pub fn exhausted(&self, error_count: u32) -> bool {
		self.max_consecutive_errors
			.is_some_and(|max| error_count >= max)
	}
}

/// Client-level behavior settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
	/// MQTT keep-alive interval
	pub keep_alive: Duration,
	/// Capacity of the transport request channel
	pub request_channel_capacity: usize,
	/// Capacity of the connection manager command channel
	pub command_channel_capacity: usize,
	/// Transport reconnect pacing
	pub reconnect: ReconnectBackoff,
	/// Boundary behaviour of trailing `#` filters
	pub multi_level_wildcard: MultiLevelWildcard,
	/// How long shutdown waits for the DISCONNECT to go out
	pub shutdown_timeout: Duration,
}

impl Default for ClientSettings {
	fn default() -> Self {
		Self {
			keep_alive: Duration::from_secs(60),
			request_channel_capacity: 10,
			command_channel_capacity: 100,
			reconnect: ReconnectBackoff::default(),
			multi_level_wildcard: MultiLevelWildcard::Legacy,
			shutdown_timeout: Duration::from_millis(500),
		}
	}
}
