use super::{MultiLevelWildcard, TopicError, TopicFilter, TopicMatcher};
use super::{is_wildcard, normalize};

fn matcher(filter: &str) -> TopicMatcher {
	TopicFilter::parse(filter)
		.expect("Filter should be valid")
		.matcher(MultiLevelWildcard::Legacy)
}

fn strict_matcher(filter: &str) -> TopicMatcher {
	TopicFilter::parse(filter)
		.expect("Filter should be valid")
		.matcher(MultiLevelWildcard::Strict)
}

// Checks every (topic, expected) pair against one matcher
fn assert_matches(matcher: &TopicMatcher, cases: &[(&str, bool)]) {
	for (topic, expected) in cases {
		assert_eq!(
			matcher.matches(topic),
			*expected,
			"filter '{matcher}' against topic '{topic}'"
		);
	}
}

mod normalize_tests {
	use super::*;

	#[test]
	fn strips_share_group() {
		assert_eq!(normalize("$share/g1/piano/play/p1"), "piano/play/p1");
	}

	#[test]
	fn leaves_plain_filters_alone() {
		assert_eq!(normalize("piano/play/p1"), "piano/play/p1");
		assert_eq!(normalize("sensors/+/temp"), "sensors/+/temp");
	}

	#[test]
	fn short_share_filter_is_unchanged() {
		assert_eq!(normalize("$share/g1"), "$share/g1");
		assert_eq!(normalize("$share/g1/"), "");
	}

	#[test]
	fn share_marker_must_be_a_prefix() {
		assert_eq!(normalize("a/$share/g1/b"), "a/$share/g1/b");
	}

	#[test]
	fn classification_uses_normalized_filter() {
		assert!(is_wildcard("$share/g1/sensors/#"));
		assert!(is_wildcard("sensors/+/temp"));
		assert!(!is_wildcard("$share/g1/piano/play/p1"));
		assert!(is_wildcard("a+b/c"));
	}

	#[test]
	fn parse_keeps_both_forms() {
		let filter = TopicFilter::parse("$share/g1/piano/play/p1").unwrap();
		assert_eq!(filter.original().as_str(), "$share/g1/piano/play/p1");
		assert_eq!(filter.filter().as_str(), "piano/play/p1");
		assert!(filter.is_shared());
		assert!(!filter.is_wildcard());
	}

	#[test]
	fn empty_filter_is_rejected() {
		assert_eq!(TopicFilter::parse(""), Err(TopicError::EmptyFilter));
	}

	#[test]
	fn null_byte_is_rejected() {
		assert!(matches!(
			TopicFilter::parse("a/\0/b"),
			Err(TopicError::NullByte { .. })
		));
	}
}

mod exact_tests {
	use super::*;

	#[test]
	fn exact_filter_matches_only_equal_topic() {
		let m = matcher("piano/play/p1");
		assert!(!m.is_wildcard());
		assert_matches(&m, &[
			("piano/play/p1", true),
			("piano/play/p1/", false),
			("piano/play", false),
			("piano/play/p2", false),
			("Piano/play/p1", false),
		]);
	}

	#[test]
	fn shared_exact_filter_matches_underlying_topic() {
		let m = matcher("$share/g1/piano/play/p1");
		assert_matches(&m, &[
			("piano/play/p1", true),
			("$share/g1/piano/play/p1", false),
		]);
	}
}

mod wildcard_tests {
	use super::*;

	#[test]
	fn single_level_wildcard() {
		let m = matcher("sensors/+/temp");
		assert!(m.is_wildcard());
		assert_matches(&m, &[
			("sensors/a/temp", true),
			("sensors/kitchen/temp", true),
			("sensors/a/b/temp", false),
			("sensors/temp", false),
			("sensors//temp", false),
		]);
	}

	#[test]
	fn multi_level_wildcard_keeps_legacy_boundary() {
		let m = matcher("sensors/#");
		assert_matches(&m, &[
			("sensors/a", true),
			("sensors/a/b", true),
			("sensors/", true),
			("sensors", false),
			("other/a", false),
		]);
	}

	#[test]
	fn strict_multi_level_wildcard_matches_parent() {
		let m = strict_matcher("sensors/#");
		assert_matches(&m, &[
			("sensors", true),
			("sensors/a", true),
			("sensors/a/b", true),
			("sensorsx", false),
		]);
	}

	#[test]
	fn lone_hash_matches_everything() {
		let m = matcher("#");
		assert_matches(&m, &[("a", true), ("a/b/c", true), ("/", true)]);
	}

	#[test]
	fn hash_in_the_middle_spans_levels() {
		let m = matcher("a/#/b");
		assert_matches(&m, &[
			("a/x/b", true),
			("a/x/y/b", true),
			("a/b", false),
			("a/x/c", false),
		]);
	}

	#[test]
	fn embedded_wildcard_chars_are_literal() {
		let m = matcher("a+b/c");
		assert!(m.is_wildcard());
		assert_matches(&m, &[("a+b/c", true), ("axb/c", false)]);
	}

	#[test]
	fn regex_metacharacters_are_literal() {
		let m = matcher("dev.ice/(1)/+");
		assert_matches(&m, &[("dev.ice/(1)/x", true), ("devXice/(1)/x", false)]);
	}

	#[test]
	fn shared_wildcard_matches_underlying_topic() {
		let m = matcher("$share/g1/piano/play/+");
		assert_matches(&m, &[
			("piano/play/p1", true),
			("piano/play/p1/extra", false),
		]);
	}

	#[test]
	fn several_hashes_backtrack_correctly() {
		let m = matcher("a/#/b/#/c");
		assert_matches(&m, &[
			("a/x/b/y/c", true),
			("a/b/b/b/c/c", true),
			("a/x/b/c", false),
			("a/x/y/b/z/w/c", true),
			("a/x/y/b/z/w/d", false),
		]);
		let strict = strict_matcher("a/#/b/#");
		assert_matches(&strict, &[("a/b", true), ("a/x/b", true), ("a/x/c", false)]);
	}

	#[test]
	fn deep_filters_match_without_recursion() {
		let depth = 20_000;
		let filter = format!("{}+", "a/".repeat(depth));
		let m = matcher(&filter);
		assert!(m.matches(&format!("{}x", "a/".repeat(depth))));
		assert!(!m.matches(&format!("{}x/y", "a/".repeat(depth))));
		assert!(!m.matches(&format!("{}x", "a/".repeat(depth - 1))));

		let hashes = matcher(&format!("{}z", "#/".repeat(depth)));
		assert!(hashes.matches(&format!("{}z", "a/".repeat(depth))));
		assert!(!hashes.matches(&format!("{}z", "a/".repeat(depth - 1))));
	}

	#[test]
	fn display_shows_local_filter() {
		assert_eq!(matcher("$share/g1/a/+").to_string(), "a/+");
	}
}
