use thiserror::Error;

use super::session::SessionError;
use crate::routing::SubscriptionError;
use crate::topic::TopicError;

/// Why a connect attempt did not reach the Connected state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionEstablishmentError {
	/// Transport failed before the broker acknowledged CONNECT
	#[error("Network connection failed: {0}")]
	Transport(#[from] SessionError),

	/// No CONNACK within the configured window
	#[error("MQTT connect timeout after {timeout_millis}ms")]
	Timeout {
		/// Configured window in milliseconds
		timeout_millis: u64,
	},

	/// A newer connect request replaced this one
	#[error("Connect attempt superseded by a newer one")]
	Superseded,

	/// Client shut down while connecting
	#[error("Client shut down while connecting")]
	Shutdown,
}

/// Errors that can occur in MQTT client operations
#[derive(Debug, Error)]
pub enum MqttClientError {
	/// Logical piano identifier was empty
	#[error("Piano ID is required to initialize the MQTT client")]
	MissingPianoId,

	/// Publish attempted without a connected session
	#[error("MQTT client not connected")]
	NotConnected,

	/// Connection establishment failed
	#[error("Failed to establish connection: {0}")]
	ConnectionEstablishment(#[from] ConnectionEstablishmentError),

	/// Transport request failed
	#[error("Session operation failed: {0}")]
	Session(#[from] SessionError),

	/// Subscription management errors
	#[error("Subscription error: {0}")]
	Subscription(#[from] SubscriptionError),

	/// Credential document could not be parsed
	#[error("Configuration error: {0}")]
	Configuration(#[source] serde_json::Error),

	/// Serialization errors when converting data to bytes
	#[error("Serialization error: {0}")]
	Serialization(String),

	/// Topic filter errors
	#[error("Topic error: {0}")]
	Topic(#[from] TopicError),

	/// Connection manager task is gone
	#[error("Connection manager channel closed")]
	ChannelClosed,

	/// Connection manager dropped the reply
	#[error("Response from connection manager was lost")]
	ResponseLost,
}

impl MqttClientError {
	/// True for a connect timeout
	pub fn is_timeout(&self) -> bool {
		matches!(
			self,
			MqttClientError::ConnectionEstablishment(
				ConnectionEstablishmentError::Timeout { .. }
			)
		)
	}
}
