use arcstr::ArcStr;
use thiserror::Error;

use crate::client::session::SessionError;

/// Errors during subscription operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
	/// Broker subscribe request could not be issued
	#[error("Failed to subscribe to '{topic}': {source}")]
	SubscribeFailed {
		/// Subscribe string as sent to the broker
		topic: ArcStr,
		/// Transport failure
		#[source]
		source: SessionError,
	},
}

impl SubscriptionError {
	/// Creates a new SubscribeFailed error
	pub fn subscribe_failed(topic: ArcStr, source: SessionError) -> Self {
		Self::SubscribeFailed { topic, source }
	}

	/// Subscribe string the failure belongs to
	pub fn topic(&self) -> &ArcStr {
		match self {
			| Self::SubscribeFailed { topic, .. } => topic,
		}
	}
}
