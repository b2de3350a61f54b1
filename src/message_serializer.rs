//! Payload serialization for typed publishes.
//!
//! Byte and string payloads go out unchanged through
//! [`MqttClient::publish`](crate::MqttClient::publish); everything else is
//! turned into a textual form by a [`MessageSerializer`], JSON by default.

use std::fmt::Debug;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Trait for serializing and deserializing MQTT message payloads.
///
/// Implement this trait to use custom serialization formats.
pub trait MessageSerializer<T>: Default + Clone + Send + Sync + 'static {
	/// Error type for serialization failures
	type SerializeError: Debug + Send + Sync + 'static;
	/// Error type for deserialization failures
	type DeserializeError: Debug + Send + Sync + 'static;

	/// Convert data to bytes for MQTT transmission
	fn serialize(&self, data: &T) -> Result<Vec<u8>, Self::SerializeError>;
	/// Convert bytes from MQTT into typed data
	fn deserialize(&self, bytes: &[u8]) -> Result<T, Self::DeserializeError>;
}

/// JSON serializer, the textual form used for structured payloads
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSerializer;

impl<T> MessageSerializer<T> for JsonSerializer
where T: Serialize + DeserializeOwned + 'static
{
	type SerializeError = serde_json::Error;
	type DeserializeError = serde_json::Error;

	fn serialize(&self, data: &T) -> Result<Vec<u8>, Self::SerializeError> {
		serde_json::to_vec(data)
	}

	fn deserialize(&self, bytes: &[u8]) -> Result<T, Self::DeserializeError> {
		serde_json::from_slice(bytes)
	}
}
