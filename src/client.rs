//! MQTT client module
//!
//! Client context, connection lifecycle, transport seam and the one-call
//! piano subscription entry point.

/// Callback-based MQTT client handle
pub mod async_client;
pub mod config;
pub(crate) mod connection_manager;
/// Client error types
pub mod error;
pub mod init;
pub mod session;

pub use async_client::{MqttClient, PublishOptions};
pub use config::{ClientConfig, ClientSettings, ReconnectBackoff};
pub use connection_manager::ConnectionState;
pub use error::{ConnectionEstablishmentError, MqttClientError};
pub use init::{
	PIANO_PLAY_TOPIC, build_subscribe_topic, initialize_client,
	initialize_client_with, unique_connection_id,
};
pub use session::{
	CONNECTION_ID_PROPERTY, Connector, PublishRequest, RumqttcConnector,
	RumqttcSession, Session, SessionError, SessionEvent, SessionEvents,
	SessionOptions,
};
