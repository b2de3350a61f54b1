//! In-memory transport for connection lifecycle tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use piano_mqtt::QoS;
use piano_mqtt::transport::{
	Connector, PublishRequest, Session, SessionError, SessionEvent,
	SessionEvents, SessionOptions,
};
use piano_mqtt::{ClientConfig, ClientSettings};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

/// Everything the fake broker saw
#[derive(Default)]
pub struct BrokerState {
	pub opens: Vec<SessionOptions>,
	pub subscribes: Vec<String>,
	pub publishes: Vec<PublishRequest>,
	pub disconnects: usize,
	pub terminated: usize,
	pub failing_filters: HashSet<String>,
	/// Acknowledge CONNECT as soon as a session opens
	pub auto_ack: bool,
	/// Report this error right after open instead of acknowledging
	pub fail_connect: Option<SessionError>,
	events: Option<UnboundedSender<SessionEvent>>,
}

#[derive(Clone, Default)]
pub struct FakeBroker {
	inner: Arc<Mutex<BrokerState>>,
}

impl FakeBroker {
	pub fn acking() -> Self {
		let broker = Self::default();
		broker.state().auto_ack = true;
		broker
	}

	pub fn silent() -> Self {
		Self::default()
	}

	pub fn state(&self) -> MutexGuard<'_, BrokerState> {
		self.inner.lock().unwrap()
	}

	pub fn connector(&self) -> FakeConnector {
		FakeConnector {
			broker: self.clone(),
		}
	}

	pub fn fail_filter(&self, filter: &str) {
		self.state().failing_filters.insert(filter.to_string());
	}

	/// Pushes an event on the most recently opened session
	pub fn emit(&self, event: SessionEvent) {
		let state = self.state();
		let events = state.events.as_ref().expect("no session opened");
		events.send(event).expect("session events receiver dropped");
	}

	pub fn subscribes(&self) -> Vec<String> {
		self.state().subscribes.clone()
	}

	pub fn open_count(&self) -> usize {
		self.state().opens.len()
	}
}

pub struct FakeConnector {
	broker: FakeBroker,
}

impl Connector for FakeConnector {
	type Session = FakeSession;

	fn open(
		&mut self,
		options: SessionOptions,
	) -> Result<(FakeSession, SessionEvents), SessionError> {
		let (events_tx, events_rx) = unbounded_channel();
		let mut state = self.broker.state();
		state.opens.push(options);
		state.events = Some(events_tx.clone());
		if let Some(err) = state.fail_connect.clone() {
			events_tx.send(SessionEvent::Error(err)).unwrap();
		} else if state.auto_ack {
			events_tx
				.send(SessionEvent::ConnAck {
					session_present: false,
				})
				.unwrap();
		}
		drop(state);
		Ok((
			FakeSession {
				broker: self.broker.clone(),
				events: events_tx,
			},
			events_rx,
		))
	}
}

#[derive(Clone)]
pub struct FakeSession {
	broker: FakeBroker,
	events: UnboundedSender<SessionEvent>,
}

impl Session for FakeSession {
	async fn subscribe(&self, filter: &str, _qos: QoS) -> Result<(), SessionError> {
		let mut state = self.broker.state();
		state.subscribes.push(filter.to_string());
		if state.failing_filters.contains(filter) {
			return Err(SessionError::Request(format!("refused {filter}")));
		}
		Ok(())
	}

	async fn publish(&self, request: PublishRequest) -> Result<(), SessionError> {
		self.broker.state().publishes.push(request);
		Ok(())
	}

	async fn disconnect(&self) -> Result<(), SessionError> {
		self.broker.state().disconnects += 1;
		let _ = self.events.send(SessionEvent::Closed);
		let _ = self.events.send(SessionEvent::Ended);
		Ok(())
	}

	fn terminate(&self) {
		self.broker.state().terminated += 1;
	}
}

pub fn config() -> ClientConfig {
	ClientConfig::new("user", "secret", "broker.test", 8883)
}

pub fn settings() -> ClientSettings {
	ClientSettings::default()
}

/// Polls `condition` until it holds, failing the test after a while
pub async fn eventually(mut condition: impl FnMut() -> bool) {
	for _ in 0 .. 200 {
		if condition() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	panic!("condition not reached in time");
}
