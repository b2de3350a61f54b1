use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use super::{
	DeliveryMetadata, Dispatcher, IncomingMessage, MessageCallback,
	SubscriptionRegistry,
};
use crate::QoS;
use crate::client::session::{PublishRequest, Session, SessionError};
use crate::topic::{MultiLevelWildcard, TopicFilter};

type Log = Arc<Mutex<Vec<String>>>;

// Callback that appends "<label>:<topic>" to the shared log
fn recorder(log: &Log, label: &str) -> MessageCallback {
	let log = Arc::clone(log);
	let label = label.to_string();
	Arc::new(move |topic: &str, _: &Bytes, _: &DeliveryMetadata| {
		log.lock().unwrap().push(format!("{label}:{topic}"));
	})
}

fn register(registry: &mut SubscriptionRegistry, filter: &str, callback: MessageCallback) {
	registry.register(TopicFilter::parse(filter).unwrap(), callback);
}

fn entries(log: &Log) -> Vec<String> {
	log.lock().unwrap().clone()
}

#[derive(Clone, Default)]
struct RecordingSession {
	subscribed: Arc<Mutex<Vec<String>>>,
	failing: Arc<HashSet<String>>,
}

impl Session for RecordingSession {
	async fn subscribe(&self, filter: &str, qos: QoS) -> Result<(), SessionError> {
		assert_eq!(qos, QoS::AtMostOnce);
		self.subscribed.lock().unwrap().push(filter.to_string());
		if self.failing.contains(filter) {
			return Err(SessionError::Request("refused".to_string()));
		}
		Ok(())
	}

	async fn publish(&self, _request: PublishRequest) -> Result<(), SessionError> {
		Ok(())
	}

	async fn disconnect(&self) -> Result<(), SessionError> {
		Ok(())
	}

	fn terminate(&self) {}
}

mod lookup_tests {
	use super::*;

	#[test]
	fn exact_callbacks_fire_in_registration_order() {
		let log = Log::default();
		let mut registry = SubscriptionRegistry::default();
		register(&mut registry, "piano/play/p1", recorder(&log, "first"));
		register(&mut registry, "piano/play/p1", recorder(&log, "second"));

		let delivered = Dispatcher::new()
			.dispatch(&registry, &IncomingMessage::new("piano/play/p1", "C4"));

		assert_eq!(delivered, 2);
		assert_eq!(entries(&log), ["first:piano/play/p1", "second:piano/play/p1"]);
	}

	#[test]
	fn exact_and_wildcard_both_deliver() {
		let log = Log::default();
		let mut registry = SubscriptionRegistry::default();
		register(&mut registry, "sensors/+/temp", recorder(&log, "wild"));
		register(&mut registry, "sensors/a/temp", recorder(&log, "exact"));
		register(&mut registry, "sensors/#", recorder(&log, "hash"));

		let delivered = Dispatcher::new()
			.dispatch(&registry, &IncomingMessage::new("sensors/a/temp", "21"));

		// exact first, then wildcards in registration order
		assert_eq!(delivered, 3);
		assert_eq!(entries(&log), [
			"exact:sensors/a/temp",
			"wild:sensors/a/temp",
			"hash:sensors/a/temp",
		]);
	}

	#[test]
	fn unmatched_topic_delivers_nothing() {
		let log = Log::default();
		let mut registry = SubscriptionRegistry::default();
		register(&mut registry, "piano/play/p1", recorder(&log, "p1"));
		let mut dispatcher = Dispatcher::new();

		assert_eq!(dispatcher.dispatch(&registry, &IncomingMessage::new("piano/play/p2", "x")), 0);
		assert_eq!(dispatcher.unmatched(), 1);
		assert!(entries(&log).is_empty());
	}

	#[test]
	fn shared_filter_is_matched_without_group() {
		let log = Log::default();
		let mut registry = SubscriptionRegistry::default();
		register(&mut registry, "$share/g1/piano/play/p1", recorder(&log, "shared"));

		assert_eq!(registry.lookup("piano/play/p1").len(), 1);
		assert!(registry.lookup("$share/g1/piano/play/p1").is_empty());
	}

	#[test]
	fn legacy_hash_skips_parent_topic() {
		let log = Log::default();
		let mut registry = SubscriptionRegistry::default();
		register(&mut registry, "sensors/#", recorder(&log, "hash"));

		assert!(registry.lookup("sensors").is_empty());
		assert_eq!(registry.lookup("sensors/a").len(), 1);
	}

	#[test]
	fn strict_hash_includes_parent_topic() {
		let log = Log::default();
		let mut registry = SubscriptionRegistry::new(MultiLevelWildcard::Strict);
		register(&mut registry, "sensors/#", recorder(&log, "hash"));

		assert_eq!(registry.lookup("sensors").len(), 1);
	}

	#[test]
	fn callback_receives_payload_and_metadata() {
		let seen = Arc::new(Mutex::new(None));
		let seen_clone = Arc::clone(&seen);
		let mut registry = SubscriptionRegistry::default();
		register(
			&mut registry,
			"piano/play/p1",
			Arc::new(move |_: &str, payload: &Bytes, meta: &DeliveryMetadata| {
				*seen_clone.lock().unwrap() =
					Some((payload.clone(), meta.user_property("client_id").map(str::to_string)));
			}),
		);
		let mut message = IncomingMessage::new("piano/play/p1", "C4");
		message.metadata.user_properties =
			vec![("client_id".to_string(), "p1_sender".to_string())];

		Dispatcher::new().dispatch(&registry, &message);

		assert_eq!(
			*seen.lock().unwrap(),
			Some((Bytes::from("C4"), Some("p1_sender".to_string())))
		);
	}
}

mod replay_tests {
	use super::*;

	#[tokio::test]
	async fn replays_every_entry_in_order() {
		let log = Log::default();
		let mut registry = SubscriptionRegistry::default();
		register(&mut registry, "$share/g1/piano/play/p1", recorder(&log, "a"));
		register(&mut registry, "sensors/#", recorder(&log, "b"));
		register(&mut registry, "piano/play/p2", recorder(&log, "c"));
		let session = RecordingSession::default();

		let report = registry.replay_all(&session).await;

		assert!(report.is_complete());
		assert_eq!(report.issued, 3);
		assert_eq!(*session.subscribed.lock().unwrap(), [
			"$share/g1/piano/play/p1",
			"sensors/#",
			"piano/play/p2",
		]);
	}

	#[tokio::test]
	async fn failed_entry_does_not_stop_replay() {
		let log = Log::default();
		let mut registry = SubscriptionRegistry::default();
		register(&mut registry, "a/1", recorder(&log, "a"));
		register(&mut registry, "b/2", recorder(&log, "b"));
		register(&mut registry, "c/3", recorder(&log, "c"));
		let session = RecordingSession {
			failing: Arc::new(HashSet::from(["b/2".to_string()])),
			..RecordingSession::default()
		};

		let report = registry.replay_all(&session).await;

		assert_eq!(report.issued, 2);
		assert_eq!(report.failures.len(), 1);
		assert_eq!(report.failures[0].topic().as_str(), "b/2");
		assert_eq!(*session.subscribed.lock().unwrap(), ["a/1", "b/2", "c/3"]);
	}

	#[tokio::test]
	async fn replay_log_is_never_shrunk() {
		let log = Log::default();
		let mut registry = SubscriptionRegistry::default();
		register(&mut registry, "a/1", recorder(&log, "a"));
		register(&mut registry, "a/1", recorder(&log, "again"));
		let session = RecordingSession::default();

		registry.replay_all(&session).await;
		registry.replay_all(&session).await;

		assert_eq!(registry.len(), 2);
		assert_eq!(session.subscribed.lock().unwrap().len(), 4);
		let topics: Vec<&str> = registry.replay_topics().map(|t| t.as_str()).collect();
		assert_eq!(topics, ["a/1", "a/1"]);
	}
}
