//! Transport seam between the connection manager and the MQTT library
//!
//! A [`Connector`] opens one network [`Session`] plus a stream of
//! [`SessionEvent`]s. [`RumqttcConnector`] drives a `rumqttc` v5 event loop
//! in its own task; tests plug in an in-memory connector instead.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arcstr::ArcStr;
use bytes::Bytes;
use rumqttc::v5::mqttbytes::v5::{Packet, Publish, PublishProperties};
use rumqttc::v5::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions};
use rumqttc::{Outgoing, Transport};
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use super::config::{ClientConfig, ClientSettings, ReconnectBackoff};
use crate::QoS;
use crate::routing::{DeliveryMetadata, IncomingMessage};

/// User property carrying the connection identifier on CONNECT and PUBLISH
pub const CONNECTION_ID_PROPERTY: &str = "client_id";

/// Errors reported by the transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
	/// A subscribe/publish/disconnect request could not be queued
	#[error("Client request failed: {0}")]
	Request(String),

	/// Network or protocol failure on the connection
	#[error("Connection error: {0}")]
	Connection(String),

	/// Broker answered CONNECT with a failure code
	#[error("Broker rejected connection: {0}")]
	Rejected(String),

	/// Session was closed before the operation completed
	#[error("Session closed")]
	Closed,
}

/// Lifecycle and traffic notifications from a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
	/// Broker accepted CONNECT
	ConnAck {
		/// Session-present flag from the CONNACK
		session_present: bool,
	},
	/// Inbound publish
	Message(IncomingMessage),
	/// Transport is about to attempt a new connection
	Reconnecting,
	/// Network connection closed; the transport may reconnect
	Closed,
	/// Session is finished for good, no more events follow
	Ended,
	/// Transport error
	Error(SessionError),
}

/// Receiving side of a session's event stream
pub type SessionEvents = UnboundedReceiver<SessionEvent>;

/// Everything a connector needs to open one session
#[derive(Debug, Clone)]
pub struct SessionOptions {
	/// Broker host name
	pub host: String,
	/// Broker TLS port
	pub port: u16,
	/// Broker user name
	pub username: String,
	/// Broker password
	pub password: String,
	/// Unique connection identifier, also used as MQTT client id
	pub connection_id: ArcStr,
	/// Keep-alive interval
	pub keep_alive: Duration,
	/// Capacity of the transport request channel
	pub request_channel_capacity: usize,
	/// Reconnect pacing inside the transport
	pub reconnect: ReconnectBackoff,
}

impl SessionOptions {
	/// Combines per-attempt credentials with client settings
	pub fn new(
		config: &ClientConfig,
		connection_id: ArcStr,
		settings: &ClientSettings,
	) -> Self {
		Self {
			host: config.broker.clone(),
			port: config.port,
			username: config.username.clone(),
			password: config.password.clone(),
			connection_id,
			keep_alive: settings.keep_alive,
			request_channel_capacity: settings.request_channel_capacity,
			reconnect: settings.reconnect,
		}
	}
}

/// Outbound publish as handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
	/// Target topic
	pub topic: ArcStr,
	/// Payload bytes
	pub payload: Bytes,
	/// Delivery QoS
	pub qos: QoS,
	/// Retain flag
	pub retain: bool,
	/// MQTT v5 user properties
	pub user_properties: Vec<(String, String)>,
}

/// Handle to one live network session.
///
/// Request methods resolve once the request is handed to the transport,
/// not when the broker acknowledges it.
pub trait Session: Clone + Send + Sync + 'static {
	/// Queue a SUBSCRIBE for one filter
	fn subscribe(
		&self,
		filter: &str,
		qos: QoS,
	) -> impl Future<Output = Result<(), SessionError>> + Send;

	/// Queue a PUBLISH
	fn publish(
		&self,
		request: PublishRequest,
	) -> impl Future<Output = Result<(), SessionError>> + Send;

	/// Queue a DISCONNECT for graceful close
	fn disconnect(&self) -> impl Future<Output = Result<(), SessionError>> + Send;

	/// Tear the session down immediately without a DISCONNECT
	fn terminate(&self);
}

/// Opens network sessions
pub trait Connector: Send + 'static {
	/// Session type produced by this connector
	type Session: Session;

	/// Start connecting. Progress is reported through the returned events.
	fn open(
		&mut self,
		options: SessionOptions,
	) -> Result<(Self::Session, SessionEvents), SessionError>;
}

/// Connector backed by `rumqttc` over TLS with certificate validation
#[derive(Debug, Clone, Default)]
pub struct RumqttcConnector;

/// Session backed by a `rumqttc` client and its event loop task
#[derive(Clone)]
pub struct RumqttcSession {
	client: AsyncClient,
	event_loop: Arc<AbortHandle>,
}

impl std::fmt::Debug for RumqttcSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RumqttcSession")
			.field("finished", &self.event_loop.is_finished())
			.finish()
	}
}

impl RumqttcConnector {
	fn mqtt_options(options: &SessionOptions) -> MqttOptions {
		let mut mqtt_options = MqttOptions::new(
			options.connection_id.as_str(),
			options.host.as_str(),
			options.port,
		);
		mqtt_options
			.set_keep_alive(options.keep_alive)
			.set_clean_start(true)
			.set_credentials(options.username.as_str(), options.password.as_str())
			.set_transport(Transport::tls_with_default_config())
			.set_user_properties(vec![(
				CONNECTION_ID_PROPERTY.to_string(),
				options.connection_id.to_string(),
			)]);
		mqtt_options
	}
}

impl Connector for RumqttcConnector {
	type Session = RumqttcSession;

	fn open(
		&mut self,
		options: SessionOptions,
	) -> Result<(RumqttcSession, SessionEvents), SessionError> {
		let (client, event_loop) = AsyncClient::new(
			Self::mqtt_options(&options),
			options.request_channel_capacity,
		);
		let (events_tx, events_rx) = unbounded_channel();
		let reconnect = options.reconnect;
		let handle = tokio::spawn(async move {
			run_event_loop(event_loop, events_tx, reconnect).await;
		});
		info!(
			broker = %options.host,
			port = options.port,
			connection_id = %options.connection_id,
			"Connecting to MQTT broker"
		);
		let session = RumqttcSession {
			client,
			event_loop: Arc::new(handle.abort_handle()),
		};
		Ok((session, events_rx))
	}
}

impl Session for RumqttcSession {
	async fn subscribe(&self, filter: &str, qos: QoS) -> Result<(), SessionError> {
		self.client
			.subscribe(filter, qos)
			.await
			.map_err(|err| SessionError::Request(err.to_string()))
	}

	async fn publish(&self, request: PublishRequest) -> Result<(), SessionError> {
		let properties = PublishProperties {
			user_properties: request.user_properties,
			..PublishProperties::default()
		};
		self.client
			.publish_with_properties(
				request.topic.as_str(),
				request.qos,
				request.retain,
				request.payload,
				properties,
			)
			.await
			.map_err(|err| SessionError::Request(err.to_string()))
	}

	async fn disconnect(&self) -> Result<(), SessionError> {
		self.client
			.disconnect()
			.await
			.map_err(|err| SessionError::Request(err.to_string()))
	}

	fn terminate(&self) {
		self.event_loop.abort();
	}
}

/// Drives the rumqttc event loop and forwards what the manager cares about.
///
/// Polling again after an error makes rumqttc reconnect, so errors are
/// reported, paced with backoff and followed by `Reconnecting`.
async fn run_event_loop(
	mut event_loop: EventLoop,
	events: UnboundedSender<SessionEvent>,
	backoff: ReconnectBackoff,
) {
	let mut error_count: u32 = 0;
	loop {
		let event = match event_loop.poll().await {
			| Ok(Event::Incoming(Packet::ConnAck(ack))) => {
				error_count = 0;
				debug!(session_present = ack.session_present, "CONNACK received");
				SessionEvent::ConnAck {
					session_present: ack.session_present,
				}
			}
			| Ok(Event::Incoming(Packet::Publish(publish))) => {
				match incoming_message(publish) {
					| Some(message) => SessionEvent::Message(message),
					| None => continue,
				}
			}
			| Ok(Event::Incoming(Packet::Disconnect(disconnect))) => {
				info!(reason = ?disconnect.reason_code, "Received MQTT Disconnect packet from server");
				SessionEvent::Closed
			}
			| Ok(Event::Outgoing(Outgoing::Disconnect)) => {
				info!("Sent MQTT Disconnect packet to server");
				let _ = events.send(SessionEvent::Closed);
				let _ = events.send(SessionEvent::Ended);
				break;
			}
			| Ok(notification) => {
				debug!(notification = ?notification, "MQTT notification");
				continue;
			}
			| Err(err) => {
				error_count = error_count.saturating_add(1);
				error!(error_count, error = %err, "MQTT event loop error");
				let reported = events
					.send(SessionEvent::Error(session_error(&err)))
					.and_then(|()| events.send(SessionEvent::Closed));
				if reported.is_err() {
					break;
				}
				if backoff.exhausted(error_count) {
					warn!(error_count, "Too many consecutive errors, ending session");
					let _ = events.send(SessionEvent::Ended);
					break;
				}
				let delay = backoff.delay(error_count);
				warn!(delay = ?delay, error_count, "Retrying MQTT connection");
				tokio::time::sleep(delay).await;
				SessionEvent::Reconnecting
			}
		};
		if events.send(event).is_err() {
			debug!("Session event receiver dropped, stopping event loop");
			break;
		}
	}
}

/// Refused CONNACKs surface as poll errors in rumqttc
fn session_error(err: &ConnectionError) -> SessionError {
	match err {
		| ConnectionError::ConnectionRefused(code) => SessionError::Rejected(format!("{code:?}")),
		| other => SessionError::Connection(other.to_string()),
	}
}

fn incoming_message(publish: Publish) -> Option<IncomingMessage> {
	let topic = match std::str::from_utf8(&publish.topic) {
		| Ok(topic) => ArcStr::from(topic),
		| Err(err) => {
			warn!(error = %err, payload_size = publish.payload.len(), "Dropping message with non UTF-8 topic");
			return None;
		}
	};
	let user_properties = publish
		.properties
		.map(|properties| properties.user_properties)
		.unwrap_or_default();
	Some(IncomingMessage {
		topic,
		payload: publish.payload,
		metadata: DeliveryMetadata {
			qos: publish.qos,
			retain: publish.retain,
			duplicate: publish.dup,
			user_properties,
		},
	})
}
