//! Topic handling module
//!
//! Normalizes shared-subscription filters, classifies them as exact or
//! wildcard and compiles wildcard filters into matchers.

pub mod error;
pub mod topic_filter;
pub mod topic_matcher;

#[cfg(test)]
mod topic_matcher_tests;

pub use error::{TopicError, TopicResult, limits, validation};
pub use topic_filter::{SHARE_PREFIX, TopicFilter, is_wildcard, normalize};
pub use topic_matcher::{FilterSegment, MultiLevelWildcard, TopicMatcher};
