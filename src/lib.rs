//! # Piano MQTT
//!
//! Client-side subscription and dispatch layer for an MQTT v5 broker.
//! Register interest in a piano's play topic, optionally as a member of a
//! shared consumer group, and receive matching messages through a
//! callback. The crate owns connection establishment, resubscription after
//! reconnects and topic-filter matching; the wire protocol is `rumqttc`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use piano_mqtt::{ClientConfig, initialize_client};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_json(
//!         r#"{"username":"u","password":"p","broker":"mqtt.example.com","port":8883}"#,
//!     )?;
//!
//!     let (client, connection) = initialize_client(
//!         config,
//!         "p1",
//!         |topic, payload, meta| {
//!             println!("{topic}: {payload:?} from {:?}", meta.user_property("client_id"));
//!         },
//!         false,
//!         None,
//!     )
//!     .await?;
//!
//!     client.publish("piano/status/p1", "ready").await?;
//!
//!     // Graceful shutdown
//!     connection.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Pattern Matching
//!
//! - `+` matches exactly one non-empty topic level (`sensors/+/temp`)
//! - `#` matches the rest of the topic (`sensors/#`)
//! - `$share/{group}/...` filters are sent to the broker as given and
//!   matched locally without the group prefix
//!
//! By default `sensors/#` does not match the parent topic `sensors`; set
//! [`ClientSettings::multi_level_wildcard`] to
//! [`MultiLevelWildcard::Strict`] for MQTT specification behaviour.
//!
//! ## Callbacks
//!
//! Callbacks run synchronously on the connection task, in registration
//! order (exact filters first, then wildcard filters). Keep them short or
//! hand work off to another task.

#![warn(missing_docs)]

pub mod client;
pub mod connection;
pub mod message_serializer;
pub mod routing;
pub mod topic;

// === Core Public API ===
pub use client::{
	ClientConfig, ClientSettings, ConnectionState, MqttClient, MqttClientError,
	PublishOptions, build_subscribe_topic, initialize_client,
	initialize_client_with, unique_connection_id,
};
pub use connection::MqttConnection;
// Message serialization
pub use message_serializer::{JsonSerializer, MessageSerializer};
// Inbound messages
pub use routing::{DeliveryMetadata, IncomingMessage, MessageCallback};
// Essential external types
pub use rumqttc::v5::mqttbytes::QoS;
// Topic types
pub use topic::{MultiLevelWildcard, TopicError, TopicFilter, TopicMatcher};

/// Result type alias for operations that may fail with MqttClientError
pub type Result<T> = std::result::Result<T, MqttClientError>;

/// Prelude module for convenient imports
///
/// ```rust
/// use piano_mqtt::prelude::*;
/// ```
pub mod prelude {
	pub use crate::{
		ClientConfig, ClientSettings, ConnectionState, DeliveryMetadata,
		MqttClient, MqttClientError, MqttConnection, PublishOptions, QoS,
		Result, initialize_client,
	};
}

/// Transport seam for custom connectors
///
/// ```rust
/// use piano_mqtt::transport::*;
/// ```
pub mod transport {
	pub use crate::client::session::{
		CONNECTION_ID_PROPERTY, Connector, PublishRequest, RumqttcConnector,
		RumqttcSession, Session, SessionError, SessionEvent, SessionEvents,
		SessionOptions,
	};
}

/// Error types used throughout the library
///
/// ```rust
/// use piano_mqtt::errors::*;
/// ```
pub mod errors {
	pub use crate::client::{ConnectionEstablishmentError, MqttClientError};
	pub use crate::client::session::SessionError;
	pub use crate::routing::SubscriptionError;
	pub use crate::topic::TopicError;
}
