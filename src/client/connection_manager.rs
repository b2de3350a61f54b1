//! Connection lifecycle state machine
//!
//! One task owns the session, the connection state and the subscription
//! registry. Callers reach it through [`Command`]s; the transport reaches it
//! through [`SessionEvent`]s. Inbound messages are dispatched inline on this
//! task.

use std::fmt;
use std::future::pending;

use arcstr::ArcStr;
use tokio::sync::mpsc::{Receiver, Sender, channel};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, error, info, warn};

use super::config::{ClientConfig, ClientSettings};
use super::error::{ConnectionEstablishmentError, MqttClientError};
use super::session::{
	CONNECTION_ID_PROPERTY, Connector, PublishRequest, Session, SessionError,
	SessionEvent, SessionEvents, SessionOptions,
};
use crate::routing::subscription_registry::subscribe;
use crate::routing::{Dispatcher, MessageCallback, SubscriptionRegistry};
use crate::topic::TopicFilter;

/// Connection state of one client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
	/// No live session, or the session lost its connection
	Disconnected,
	/// CONNECT sent, waiting for CONNACK
	Connecting,
	/// CONNACK received, subscriptions replayed
	Connected,
}

impl ConnectionState {
	/// Lowercase name for logs
	pub fn as_str(&self) -> &'static str {
		match self {
			| ConnectionState::Disconnected => "disconnected",
			| ConnectionState::Connecting => "connecting",
			| ConnectionState::Connected => "connected",
		}
	}
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

type ConnectReply = oneshot::Sender<Result<(), ConnectionEstablishmentError>>;

/// Everything a caller needs to publish outside the manager task
pub(crate) struct PublishPermit<S> {
	session: S,
	connection_id: ArcStr,
}

impl<S: Session> PublishPermit<S> {
	/// Sends the publish tagged with the connection identifier
	pub(crate) async fn publish(
		self,
		mut request: PublishRequest,
	) -> Result<(), MqttClientError> {
		request.user_properties.push((
			CONNECTION_ID_PROPERTY.to_string(),
			self.connection_id.to_string(),
		));
		self.session.publish(request).await.map_err(MqttClientError::from)
	}
}

pub(crate) enum Command<S> {
	Connect {
		config: ClientConfig,
		connection_id: ArcStr,
		reply: ConnectReply,
	},
	Register {
		filter: TopicFilter,
		callback: MessageCallback,
		reply: oneshot::Sender<()>,
	},
	Publish {
		reply: oneshot::Sender<Result<PublishPermit<S>, MqttClientError>>,
	},
	ConnectionId {
		reply: oneshot::Sender<Option<ArcStr>>,
	},
}

struct ActiveSession<S> {
	session: S,
	events: SessionEvents,
	connection_id: ArcStr,
	has_connected: bool,
}

struct PendingConnect {
	reply: ConnectReply,
	deadline: Instant,
	timeout_millis: u64,
}

pub(crate) struct ConnectionManager<C: Connector> {
	connector: C,
	settings: ClientSettings,
	registry: SubscriptionRegistry,
	dispatcher: Dispatcher,
	session: Option<ActiveSession<C::Session>>,
	pending: Option<PendingConnect>,
	state: ConnectionState,
	state_tx: watch::Sender<ConnectionState>,
	command_rx: Receiver<Command<C::Session>>,
	shutdown_rx: oneshot::Receiver<()>,
}

/// Shutdown side of the manager, held by `MqttConnection`
pub(crate) struct ManagerController {
	pub(crate) shutdown_tx: oneshot::Sender<()>,
	pub(crate) join_handle: JoinHandle<()>,
}

/// Caller side of the manager, held by every `MqttClient` clone
pub(crate) struct ManagerHandle<S> {
	pub(crate) command_tx: Sender<Command<S>>,
	pub(crate) state_rx: watch::Receiver<ConnectionState>,
}

impl<C: Connector> ConnectionManager<C> {
	pub(crate) fn spawn(
		connector: C,
		settings: ClientSettings,
	) -> (ManagerController, ManagerHandle<C::Session>) {
		let (command_tx, command_rx) = channel(settings.command_channel_capacity.max(1));
		let (shutdown_tx, shutdown_rx) = oneshot::channel();
		let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
		let manager = Self {
			connector,
			registry: SubscriptionRegistry::new(settings.multi_level_wildcard),
			settings,
			dispatcher: Dispatcher::new(),
			session: None,
			pending: None,
			state: ConnectionState::Disconnected,
			state_tx,
			command_rx,
			shutdown_rx,
		};
		let join_handle = tokio::spawn(async move { manager.run().await });
		(
			ManagerController {
				shutdown_tx,
				join_handle,
			},
			ManagerHandle {
				command_tx,
				state_rx,
			},
		)
	}

	async fn run(mut self) {
		let mut commands_open = true;
		loop {
			let deadline = self.pending.as_ref().map(|pending| pending.deadline);
			tokio::select! {
				_ = &mut self.shutdown_rx => {
					info!("ConnectionManager: Shutdown signal received");
					break;
				}
				event = next_event(&mut self.session) => {
					self.handle_event(event).await;
				}
				_ = wait_for(deadline) => {
					self.handle_connect_timeout();
				}
				cmd = self.command_rx.recv(), if commands_open => {
					match cmd {
						| Some(cmd) => self.handle_command(cmd).await,
						| None => {
							debug!("ConnectionManager: All client handles dropped");
							commands_open = false;
						}
					}
				}
			}
		}
		self.shutdown().await;
		info!("ConnectionManager: Exiting run loop");
	}

	async fn handle_command(&mut self, cmd: Command<C::Session>) {
		match cmd {
			| Command::Connect {
				config,
				connection_id,
				reply,
			} => self.handle_connect(config, connection_id, reply),
			| Command::Register {
				filter,
				callback,
				reply,
			} => {
				self.handle_register(filter, callback).await;
				let _ = reply.send(());
			}
			| Command::Publish { reply } => {
				let permit = match (&self.session, self.state) {
					| (Some(active), ConnectionState::Connected) => Ok(PublishPermit {
						session: active.session.clone(),
						connection_id: active.connection_id.clone(),
					}),
					| _ => Err(MqttClientError::NotConnected),
				};
				let _ = reply.send(permit);
			}
			| Command::ConnectionId { reply } => {
				let _ = reply.send(
					self.session.as_ref().map(|active| active.connection_id.clone()),
				);
			}
		}
	}

	fn handle_connect(
		&mut self,
		config: ClientConfig,
		connection_id: ArcStr,
		reply: ConnectReply,
	) {
		if let Some(previous) = self.pending.take() {
			let _ = previous.reply.send(Err(ConnectionEstablishmentError::Superseded));
		}
		self.terminate_session("replaced by a new connect");

		info!(
			broker = %config.broker_url(),
			connection_id = %connection_id,
			"Connecting to MQTT broker"
		);
		self.set_state(ConnectionState::Connecting);
		let options = SessionOptions::new(&config, connection_id.clone(), &self.settings);
		match self.connector.open(options) {
			| Ok((session, events)) => {
				self.session = Some(ActiveSession {
					session,
					events,
					connection_id,
					has_connected: false,
				});
				self.pending = Some(PendingConnect {
					reply,
					deadline: Instant::now() + config.connection_timeout(),
					timeout_millis: config.connection_timeout_millis,
				});
			}
			| Err(err) => {
				error!(error = %err, "Failed to open MQTT session");
				self.set_state(ConnectionState::Disconnected);
				let _ = reply.send(Err(ConnectionEstablishmentError::Transport(err)));
			}
		}
	}

	async fn handle_register(&mut self, filter: TopicFilter, callback: MessageCallback) {
		info!(topic = %filter, "Trying to subscribe to topic");
		let subscription = self.registry.register(filter, callback);
		let Some(active) = self.session.as_ref() else {
			return;
		};
		if self.state != ConnectionState::Connected {
			return;
		}
		match subscribe(&active.session, subscription.original_topic()).await {
			| Ok(()) => info!(topic = %subscription.original_topic(), "Subscribed to topic"),
			| Err(err) => error!(error = %err, "Failed to subscribe to topic"),
		}
	}

	async fn handle_event(&mut self, event: Option<SessionEvent>) {
		match event {
			| Some(SessionEvent::ConnAck { session_present }) => {
				self.handle_connack(session_present).await
			}
			| Some(SessionEvent::Message(message)) => {
				self.dispatcher.dispatch(&self.registry, &message);
			}
			| Some(SessionEvent::Reconnecting) => {
				info!("MQTT reconnecting...");
				self.set_state(ConnectionState::Connecting);
			}
			| Some(SessionEvent::Closed) => {
				info!("MQTT connection closed");
				self.set_state(ConnectionState::Disconnected);
			}
			| Some(SessionEvent::Error(err)) => self.handle_session_error(err),
			| Some(SessionEvent::Ended) | None => {
				info!("MQTT connection ended");
				self.session = None;
				self.set_state(ConnectionState::Disconnected);
				self.fail_pending(ConnectionEstablishmentError::Transport(SessionError::Closed));
			}
		}
	}

	async fn handle_connack(&mut self, session_present: bool) {
		let Some(active) = self.session.as_mut() else {
			return;
		};
		let reconnect = active.has_connected;
		active.has_connected = true;
		info!(session_present, reconnect, "MQTT connected");
		self.set_state(ConnectionState::Connected);

		if let Some(active) = self.session.as_ref() {
			let report = self.registry.replay_all(&active.session).await;
			if !report.is_complete() {
				warn!(
					failed = report.failures.len(),
					"Some subscriptions were not replayed"
				);
			}
		}
		if let Some(pending) = self.pending.take() {
			let _ = pending.reply.send(Ok(()));
		}
	}

	fn handle_session_error(&mut self, err: SessionError) {
		let connected_before = self
			.session
			.as_ref()
			.is_some_and(|active| active.has_connected);
		if connected_before {
			error!(error = %err, "MQTT connection error");
			return;
		}
		error!(error = %err, "MQTT connection error before CONNACK");
		self.terminate_session("transport error before CONNACK");
		self.set_state(ConnectionState::Disconnected);
		self.fail_pending(ConnectionEstablishmentError::Transport(err));
	}

	fn handle_connect_timeout(&mut self) {
		let Some(pending) = self.pending.take() else {
			return;
		};
		error!(timeout_millis = pending.timeout_millis, "MQTT connect timeout");
		self.terminate_session("connect timeout");
		self.set_state(ConnectionState::Disconnected);
		let _ = pending.reply.send(Err(ConnectionEstablishmentError::Timeout {
			timeout_millis: pending.timeout_millis,
		}));
	}

	fn fail_pending(&mut self, err: ConnectionEstablishmentError) {
		if let Some(pending) = self.pending.take() {
			let _ = pending.reply.send(Err(err));
		}
	}

	fn terminate_session(&mut self, reason: &str) {
		if let Some(active) = self.session.take() {
			warn!(connection_id = %active.connection_id, reason, "Terminating MQTT session");
			active.session.terminate();
		}
	}

	fn set_state(&mut self, state: ConnectionState) {
		if self.state != state {
			debug!(from = %self.state, to = %state, "Connection state changed");
			self.state = state;
			self.state_tx.send_replace(state);
		}
	}

	/// Graceful close: DISCONNECT if connected, wait briefly for the
	/// transport to confirm, then tear the session down.
	async fn shutdown(&mut self) {
		self.fail_pending(ConnectionEstablishmentError::Shutdown);
		let Some(mut active) = self.session.take() else {
			self.set_state(ConnectionState::Disconnected);
			return;
		};
		if self.state == ConnectionState::Connected {
			match active.session.disconnect().await {
				| Ok(()) => {
					let drained = timeout(self.settings.shutdown_timeout, async {
						while let Some(event) = active.events.recv().await {
							if event == SessionEvent::Ended {
								break;
							}
						}
					})
					.await;
					if drained.is_err() {
						warn!(
							timeout_ms = self.settings.shutdown_timeout.as_millis() as u64,
							"Disconnect not confirmed before shutdown timeout"
						);
					}
				}
				| Err(err) => warn!(error = %err, "Failed to disconnect MQTT client"),
			}
		}
		active.session.terminate();
		self.set_state(ConnectionState::Disconnected);
		info!(
			messages = self.dispatcher.messages(),
			deliveries = self.dispatcher.deliveries(),
			"MQTT session closed"
		);
	}
}

async fn next_event<S>(session: &mut Option<ActiveSession<S>>) -> Option<SessionEvent> {
	match session {
		| Some(active) => active.events.recv().await,
		| None => pending().await,
	}
}

async fn wait_for(deadline: Option<Instant>) {
	match deadline {
		| Some(deadline) => sleep_until(deadline).await,
		| None => pending().await,
	}
}
