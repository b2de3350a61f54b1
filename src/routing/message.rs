//! Inbound message types and the callback signature

use std::sync::Arc;

use arcstr::ArcStr;
use bytes::Bytes;

use crate::QoS;

/// Delivery details that accompany an inbound publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryMetadata {
	/// QoS the broker delivered with
	pub qos: QoS,
	/// Retain flag of the delivered publish
	pub retain: bool,
	/// Duplicate delivery flag
	pub duplicate: bool,
	/// MQTT v5 user properties, e.g. the publisher's `client_id`
	pub user_properties: Vec<(String, String)>,
}

impl Default for DeliveryMetadata {
	fn default() -> Self {
		Self {
			qos: QoS::AtMostOnce,
			retain: false,
			duplicate: false,
			user_properties: Vec::new(),
		}
	}
}

impl DeliveryMetadata {
	/// Looks up a user property by key
	pub fn user_property(&self, key: &str) -> Option<&str> {
		self.user_properties
			.iter()
			.find(|(k, _)| k == key)
			.map(|(_, v)| v.as_str())
	}
}

/// A publish received from the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
	/// Concrete topic the message was published to
	pub topic: ArcStr,
	/// Raw payload
	pub payload: Bytes,
	/// Delivery details
	pub metadata: DeliveryMetadata,
}

impl IncomingMessage {
	/// Builds a message with default metadata
	pub fn new(topic: impl Into<ArcStr>, payload: impl Into<Bytes>) -> Self {
		Self {
			topic: topic.into(),
			payload: payload.into(),
			metadata: DeliveryMetadata::default(),
		}
	}
}

/// Callback invoked for every message matching a registered filter.
///
/// Runs synchronously on the connection manager task. A slow callback
/// delays every following message and keep-alive handling, so long work
/// must be handed off by the callback itself.
pub type MessageCallback =
	Arc<dyn Fn(&str, &Bytes, &DeliveryMetadata) + Send + Sync + 'static>;
