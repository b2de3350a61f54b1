//! Registered filters, their callbacks and the replay log
//!
//! Each filter is classified once when it is registered. Exact filters are
//! indexed by their text, wildcard filters keep a compiled matcher and are
//! checked in registration order. Every registration is also appended to
//! the replay log, which is re-sent to the broker after each CONNACK.

use std::collections::HashMap;
use std::sync::Arc;

use arcstr::ArcStr;
use tracing::{debug, error, info};

use super::error::SubscriptionError;
use super::message::MessageCallback;
use crate::QoS;
use crate::client::session::Session;
use crate::topic::topic_filter::SEPARATOR;
use crate::topic::{MultiLevelWildcard, TopicFilter, TopicMatcher};

/// One registered filter with its callback
pub struct Subscription {
	filter: TopicFilter,
	matcher: TopicMatcher,
	callback: MessageCallback,
}

impl Subscription {
	/// Subscribe string as sent to the broker
	pub fn original_topic(&self) -> &ArcStr {
		self.filter.original()
	}

	/// Filter used for local matching
	pub fn filter(&self) -> &ArcStr {
		self.filter.filter()
	}

	/// Matcher chosen at registration
	pub fn matcher(&self) -> &TopicMatcher {
		&self.matcher
	}

	/// Callback invoked for matching messages
	pub fn callback(&self) -> &MessageCallback {
		&self.callback
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("original_topic", self.original_topic())
			.field("matcher", &self.matcher)
			.finish_non_exhaustive()
	}
}

/// Outcome of re-sending the replay log
#[derive(Debug, Default)]
pub struct ReplayReport {
	/// Subscribe requests handed to the transport
	pub issued: usize,
	/// Entries whose subscribe request failed
	pub failures: Vec<SubscriptionError>,
}

impl ReplayReport {
	/// True when every entry was issued
	pub fn is_complete(&self) -> bool {
		self.failures.is_empty()
	}
}

/// Filters registered on one client
#[derive(Default)]
pub struct SubscriptionRegistry {
	exact: HashMap<ArcStr, Vec<MessageCallback>>,
	wildcard: Vec<Arc<Subscription>>,
	replay_log: Vec<Arc<Subscription>>,
	mode: MultiLevelWildcard,
}

impl SubscriptionRegistry {
	/// Empty registry compiling `#` filters with the given boundary mode
	pub fn new(mode: MultiLevelWildcard) -> Self {
		Self {
			mode,
			..Self::default()
		}
	}

	/// Stores a filter and its callback.
	///
	/// Does not talk to the broker; the caller issues the subscribe when a
	/// session is connected.
	pub fn register(
		&mut self,
		filter: TopicFilter,
		callback: MessageCallback,
	) -> Arc<Subscription> {
		let matcher = filter.matcher(self.mode);
		let subscription = Arc::new(Subscription {
			filter,
			matcher,
			callback,
		});
		if subscription.matcher.is_wildcard() {
			self.wildcard.push(Arc::clone(&subscription));
		} else {
			self.exact
				.entry(subscription.filter().clone())
				.or_default()
				.push(Arc::clone(&subscription.callback));
		}
		self.replay_log.push(Arc::clone(&subscription));
		debug!(
			topic = %subscription.original_topic(),
			wildcard = subscription.matcher.is_wildcard(),
			total = self.replay_log.len(),
			"Subscription registered"
		);
		subscription
	}

	/// Callbacks for a concrete topic.
	///
	/// Exact matches come first, then wildcard matches, each group in
	/// registration order. A topic matching several filters yields the
	/// callback of every one of them.
	pub fn lookup(&self, topic: &str) -> Vec<&MessageCallback> {
		let mut callbacks: Vec<&MessageCallback> = self
			.exact
			.get(topic)
			.map(|exact| exact.iter().collect())
			.unwrap_or_default();
		if !self.wildcard.is_empty() {
			let levels: Vec<&str> = topic.split(SEPARATOR).collect();
			callbacks.extend(
				self.wildcard
					.iter()
					.filter(|sub| sub.matcher.matches_levels(topic, &levels))
					.map(|sub| &sub.callback),
			);
		}
		callbacks
	}

	/// Re-issues one subscribe per replay log entry, in registration order.
	///
	/// A failed entry is logged and reported; later entries are still sent.
	pub async fn replay_all<S: Session>(&self, session: &S) -> ReplayReport {
		let mut report = ReplayReport::default();
		for subscription in &self.replay_log {
			match subscribe(session, subscription.original_topic()).await {
				| Ok(()) => report.issued += 1,
				| Err(err) => {
					error!(error = %err, "Resubscribe failed");
					report.failures.push(err);
				}
			}
		}
		info!(
			issued = report.issued,
			failed = report.failures.len(),
			"Subscriptions replayed"
		);
		report
	}

	/// Subscribe strings in replay order
	pub fn replay_topics(&self) -> impl Iterator<Item = &ArcStr> {
		self.replay_log.iter().map(|sub| sub.original_topic())
	}

	/// Number of registrations
	pub fn len(&self) -> usize {
		self.replay_log.len()
	}

	/// True when nothing is registered
	pub fn is_empty(&self) -> bool {
		self.replay_log.is_empty()
	}
}

/// Issues one QoS 0 subscribe for a broker subscribe string
pub(crate) async fn subscribe<S: Session>(
	session: &S,
	topic: &ArcStr,
) -> Result<(), SubscriptionError> {
	session
		.subscribe(topic, QoS::AtMostOnce)
		.await
		.map_err(|err| SubscriptionError::subscribe_failed(topic.clone(), err))
}
