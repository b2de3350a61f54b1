//! Shared-subscription normalization and filter classification

use arcstr::ArcStr;

use super::error::{TopicResult, validation};
use super::topic_matcher::{MultiLevelWildcard, TopicMatcher};

/// Prefix marking an MQTT v5 shared subscription
pub const SHARE_PREFIX: &str = "$share/";
/// Single-level wildcard character
pub const SINGLE_LEVEL_WILDCARD: char = '+';
/// Multi-level wildcard character
pub const MULTI_LEVEL_WILDCARD: char = '#';
/// Topic level separator
pub const SEPARATOR: char = '/';

/// Strips `$share/{group}/` from a shared subscription filter.
///
/// Filters with fewer than three levels after splitting are returned
/// unchanged, so `$share/group` stays as is.
pub fn normalize(filter: &str) -> &str {
	if !filter.starts_with(SHARE_PREFIX) {
		return filter;
	}
	let mut parts = filter.splitn(3, SEPARATOR);
	match (parts.next(), parts.next(), parts.next()) {
		| (Some(_), Some(_), Some(rest)) => rest,
		| _ => filter,
	}
}

/// True iff the normalized filter contains `+` or `#` anywhere.
pub fn is_wildcard(filter: &str) -> bool {
	normalize(filter)
		.contains([SINGLE_LEVEL_WILDCARD, MULTI_LEVEL_WILDCARD])
}

/// A subscription filter as registered by the caller.
///
/// Keeps the string sent to the broker (which may carry a share group)
/// next to the filter used for local matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter {
	original: ArcStr,
	filter: ArcStr,
}

impl TopicFilter {
	/// Validates and splits a subscribe string into broker and local forms
	pub fn parse(original: impl Into<ArcStr>) -> TopicResult<Self> {
		let original = original.into();
		validation::validate_filter(&original)?;
		let filter = ArcStr::from(normalize(&original));
		Ok(Self { original, filter })
	}

	/// The subscribe string as sent to the broker
	pub fn original(&self) -> &ArcStr {
		&self.original
	}

	/// The filter used for local matching, share prefix stripped
	pub fn filter(&self) -> &ArcStr {
		&self.filter
	}

	/// Whether this filter is delivered through a share group
	pub fn is_shared(&self) -> bool {
		self.original != self.filter
	}

	/// Whether the local filter contains wildcards
	pub fn is_wildcard(&self) -> bool {
		self.filter
			.contains([SINGLE_LEVEL_WILDCARD, MULTI_LEVEL_WILDCARD])
	}

	/// Builds the matcher for this filter, classifying it once.
	pub fn matcher(&self, mode: MultiLevelWildcard) -> TopicMatcher {
		if self.is_wildcard() {
			TopicMatcher::compile(&self.filter, mode)
		} else {
			TopicMatcher::exact(self.filter.clone())
		}
	}
}

impl std::fmt::Display for TopicFilter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.original)
	}
}
