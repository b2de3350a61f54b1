use tracing::debug;

use super::message::IncomingMessage;
use super::subscription_registry::SubscriptionRegistry;

/// Fans an inbound message out to every matching callback.
///
/// Callbacks run inline, one after another, in registry lookup order. They
/// are not isolated: a panicking or blocking callback affects the caller.
#[derive(Debug, Default)]
pub struct Dispatcher {
	messages: u64,
	deliveries: u64,
	unmatched: u64,
}

impl Dispatcher {
	/// Creates a dispatcher with zeroed counters
	pub fn new() -> Self {
		Self::default()
	}

	/// Delivers one message; returns how many callbacks ran
	pub fn dispatch(
		&mut self,
		registry: &SubscriptionRegistry,
		message: &IncomingMessage,
	) -> usize {
		self.messages += 1;
		let callbacks = registry.lookup(&message.topic);
		if callbacks.is_empty() {
			self.unmatched += 1;
			debug!(topic = %message.topic, "No subscription matches inbound message");
			return 0;
		}
		debug!(
			topic = %message.topic,
			payload_size = message.payload.len(),
			callbacks = callbacks.len(),
			"Dispatching MQTT message"
		);
		for callback in &callbacks {
			callback(message.topic.as_str(), &message.payload, &message.metadata);
		}
		self.deliveries += callbacks.len() as u64;
		callbacks.len()
	}

	/// Messages seen so far
	pub fn messages(&self) -> u64 {
		self.messages
	}

	/// Callback invocations so far
	pub fn deliveries(&self) -> u64 {
		self.deliveries
	}

	/// Messages that matched no filter
	pub fn unmatched(&self) -> u64 {
		self.unmatched
	}
}
