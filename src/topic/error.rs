//! Error types and limits for the topic module

use thiserror::Error;

/// Errors raised while parsing or validating topic filters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
	/// Subscription filter is empty
	#[error("Topic filter cannot be empty")]
	EmptyFilter,

	/// Topic or filter exceeds the protocol length limit
	#[error("Topic '{topic}' is too long: {len} > {max}")]
	TooLong {
		/// The rejected topic, truncated for display
		topic: String,
		/// Actual length in bytes
		len: usize,
		/// Maximum allowed length in bytes
		max: usize,
	},

	/// Filter contains a null byte
	#[error("Topic filter '{filter}' contains a null byte")]
	NullByte {
		/// The rejected filter
		filter: String,
	},
}

impl TopicError {
	/// Creates a new TooLong error
	pub fn too_long(topic: &str, max: usize) -> Self {
		Self::TooLong {
			topic: topic.chars().take(64).collect(),
			len: topic.len(),
			max,
		}
	}
}

/// Convenient Result type for topic operations
pub type TopicResult<T> = Result<T, TopicError>;

/// Topic processing limits
pub mod limits {
	/// Maximum encoded topic length allowed by MQTT
	pub const MAX_TOPIC_LENGTH: usize = 65535;
}

/// Validation utilities for subscription filters
pub mod validation {
	use super::limits::MAX_TOPIC_LENGTH;
	use super::TopicError;

	/// Validates a subscription filter before it is registered
	pub fn validate_filter(filter: &str) -> Result<(), TopicError> {
		if filter.is_empty() {
			return Err(TopicError::EmptyFilter);
		}
		if filter.len() > MAX_TOPIC_LENGTH {
			return Err(TopicError::too_long(filter, MAX_TOPIC_LENGTH));
		}
		if filter.contains('\0') {
			return Err(TopicError::NullByte {
				filter: filter.to_string(),
			});
		}
		Ok(())
	}
}
