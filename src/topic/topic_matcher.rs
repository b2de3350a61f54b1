//! Compiled topic matchers for exact and wildcard filters

use std::fmt::Display;

use arcstr::ArcStr;

use super::topic_filter::{MULTI_LEVEL_WILDCARD, SEPARATOR, SINGLE_LEVEL_WILDCARD};

/// How a trailing `#` treats the parent level.
///
/// `Legacy` needs a separator before `#`, so `sensors/#` matches
/// `sensors/a` but not `sensors`. `Strict` follows the MQTT specification
/// and also matches `sensors`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MultiLevelWildcard {
	/// `#` matches one or more remaining levels
	#[default]
	Legacy,
	/// `#` matches zero or more remaining levels
	Strict,
}

/// One level of a compiled wildcard filter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterSegment {
	/// Level must equal this text
	Literal(ArcStr),
	/// `+`: exactly one non-empty level
	SingleLevel,
	/// `#`: the remainder of the topic
	MultiLevel,
}

impl FilterSegment {
	fn parse(level: &str) -> Self {
		let mut chars = level.chars();
		match (chars.next(), chars.next()) {
			| (Some(SINGLE_LEVEL_WILDCARD), None) => FilterSegment::SingleLevel,
			| (Some(MULTI_LEVEL_WILDCARD), None) => FilterSegment::MultiLevel,
			| _ => FilterSegment::Literal(ArcStr::from(level)),
		}
	}
}

/// Matching capability attached to every registered subscription.
///
/// Both variants answer `matches(topic)`; exact filters compare by
/// equality and wildcard filters walk their compiled segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicMatcher {
	/// Filter without wildcards
	Exact(ArcStr),
	/// Filter compiled into levels
	Wildcard {
		/// Filter text the segments were compiled from
		filter: ArcStr,
		/// Compiled levels
		segments: Vec<FilterSegment>,
		/// Boundary behaviour of `#`
		mode: MultiLevelWildcard,
	},
}

impl TopicMatcher {
	/// Matcher for a filter compared by string equality
	pub fn exact(filter: impl Into<ArcStr>) -> Self {
		TopicMatcher::Exact(filter.into())
	}

	/// Compiles a group-stripped filter into a wildcard matcher.
	///
	/// Every level that is exactly `+` or `#` becomes a wildcard, all other
	/// levels match literally, and the whole topic must be consumed.
	pub fn compile(filter: &str, mode: MultiLevelWildcard) -> Self {
		let segments = filter.split(SEPARATOR).map(FilterSegment::parse).collect();
		TopicMatcher::Wildcard {
			filter: ArcStr::from(filter),
			segments,
			mode,
		}
	}

	/// Whether this matcher was compiled from a wildcard filter
	pub fn is_wildcard(&self) -> bool {
		matches!(self, TopicMatcher::Wildcard { .. })
	}

	/// Filter text this matcher was built from
	pub fn filter(&self) -> &ArcStr {
		match self {
			| TopicMatcher::Exact(filter)
			| TopicMatcher::Wildcard { filter, .. } => filter,
		}
	}

	/// Tests a full topic string
	pub fn matches(&self, topic: &str) -> bool {
		match self {
			| TopicMatcher::Exact(filter) => filter.as_str() == topic,
			| TopicMatcher::Wildcard { .. } => {
				let levels: Vec<&str> = topic.split(SEPARATOR).collect();
				self.matches_levels(topic, &levels)
			}
		}
	}

	/// Tests a topic already split into levels.
	///
	/// Lets the registry split an inbound topic once for all wildcard
	/// entries.
	pub(crate) fn matches_levels(&self, topic: &str, levels: &[&str]) -> bool {
		match self {
			| TopicMatcher::Exact(filter) => filter.as_str() == topic,
			| TopicMatcher::Wildcard { segments, mode, .. } => {
				match_segments(segments, levels, *mode)
			}
		}
	}
}

/// Walks filter segments against topic levels without recursion.
///
/// `#` is handled like a glob star: the walk remembers the segment after
/// the most recent `#` and the level where it resumed, and on a mismatch
/// lets that `#` absorb one more level. Earlier `#` positions never need
/// revisiting, so one resume point is enough.
fn match_segments(
	segments: &[FilterSegment],
	levels: &[&str],
	mode: MultiLevelWildcard,
) -> bool {
	let min_levels = match mode {
		| MultiLevelWildcard::Legacy => 1,
		| MultiLevelWildcard::Strict => 0,
	};
	let (mut seg, mut lvl) = (0, 0);
	let mut resume: Option<(usize, usize)> = None;
	loop {
		let advanced = match segments.get(seg) {
			| None if lvl == levels.len() => return true,
			| None => false,
			| Some(FilterSegment::Literal(literal)) => levels
				.get(lvl)
				.is_some_and(|level| literal.as_str() == *level),
			| Some(FilterSegment::SingleLevel) => {
				levels.get(lvl).is_some_and(|level| !level.is_empty())
			}
			| Some(FilterSegment::MultiLevel) => {
				let after = lvl + min_levels;
				if after <= levels.len() {
					seg += 1;
					lvl = after;
					resume = Some((seg, lvl));
					continue;
				}
				false
			}
		};
		if advanced {
			seg += 1;
			lvl += 1;
			continue;
		}
		match resume {
			| Some((resume_seg, resume_lvl)) if resume_lvl < levels.len() => {
				seg = resume_seg;
				lvl = resume_lvl + 1;
				resume = Some((seg, lvl));
			}
			| _ => return false,
		}
	}
}

impl Display for TopicMatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.filter())
	}
}
