use std::sync::Arc;

use arcstr::ArcStr;
use bytes::Bytes;
use tokio::sync::{oneshot, watch};

use super::config::{ClientConfig, ClientSettings};
use super::connection_manager::{Command, ConnectionManager, ConnectionState, ManagerHandle};
use super::error::MqttClientError;
use super::session::{Connector, PublishRequest, RumqttcConnector};
use crate::QoS;
use crate::connection::MqttConnection;
use crate::message_serializer::{JsonSerializer, MessageSerializer};
use crate::routing::{DeliveryMetadata, MessageCallback};
use crate::topic::TopicFilter;

/// Per-publish delivery options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOptions {
	/// Delivery QoS, `AtMostOnce` by default.
	///
	/// Publishes resolve when handed to the transport, so QoS 1 and 2
	/// acknowledgments are never awaited by this client.
	pub qos: QoS,
	/// Retain flag, off by default
	pub retain: bool,
}

impl Default for PublishOptions {
	fn default() -> Self {
		Self {
			qos: QoS::AtMostOnce,
			retain: false,
		}
	}
}

impl PublishOptions {
	/// Sets the retain flag
	pub fn with_retain(mut self, retain: bool) -> Self {
		self.retain = retain;
		self
	}

	/// Sets the delivery QoS.
	///
	/// Piano topics are published at QoS 0. Higher levels are passed to
	/// rumqttc as is; their broker acknowledgments are outside what
	/// [`MqttClient::publish_with_options`] reports.
	pub fn with_qos(mut self, qos: QoS) -> Self {
		self.qos = qos;
		self
	}
}

/// MQTT client context with callback-based subscriptions.
///
/// Cheap to clone; all clones talk to the same connection manager task.
/// The connection lifecycle is managed separately via [`MqttConnection`].
pub struct MqttClient<C: Connector = RumqttcConnector> {
	command_tx: tokio::sync::mpsc::Sender<Command<C::Session>>,
	state_rx: watch::Receiver<ConnectionState>,
}

impl<C: Connector> Clone for MqttClient<C> {
	fn clone(&self) -> Self {
		Self {
			command_tx: self.command_tx.clone(),
			state_rx: self.state_rx.clone(),
		}
	}
}

impl<C: Connector> std::fmt::Debug for MqttClient<C> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MqttClient")
			.field("state", &*self.state_rx.borrow())
			.finish()
	}
}

impl MqttClient<RumqttcConnector> {
	/// Client over rumqttc with default settings, not yet connected
	pub fn with_defaults() -> (Self, MqttConnection) {
		Self::new(RumqttcConnector, ClientSettings::default())
	}
}

impl<C: Connector> MqttClient<C> {
	/// Starts the connection manager task.
	///
	/// The client starts Disconnected. Register subscriptions, then call
	/// [`connect`](Self::connect); registrations made before connecting are
	/// sent with the first CONNACK. Must be called inside a tokio runtime.
	pub fn new(connector: C, settings: ClientSettings) -> (Self, MqttConnection) {
		let (controller, ManagerHandle {
			command_tx,
			state_rx,
		}) = ConnectionManager::spawn(connector, settings);
		(
			Self {
				command_tx,
				state_rx,
			},
			MqttConnection::new(controller),
		)
	}

	/// Opens a session and waits for CONNACK or the configured timeout.
	///
	/// Any live session is torn down first. On success every registered
	/// subscription has been re-issued to the broker.
	pub async fn connect(
		&self,
		config: ClientConfig,
		connection_id: impl Into<ArcStr>,
	) -> Result<(), MqttClientError> {
		let (reply, response) = oneshot::channel();
		self.send(Command::Connect {
			config,
			connection_id: connection_id.into(),
			reply,
		})
		.await?;
		response
			.await
			.map_err(|_| MqttClientError::ResponseLost)?
			.map_err(MqttClientError::from)
	}

	/// Registers a callback for a filter.
	///
	/// `$share/{group}/` filters are sent to the broker as given and matched
	/// locally without the group prefix. When already connected the broker
	/// subscribe is issued right away; a failure there is logged only.
	pub async fn subscribe<F>(
		&self,
		topic: impl Into<ArcStr>,
		callback: F,
	) -> Result<(), MqttClientError>
	where
		F: Fn(&str, &Bytes, &DeliveryMetadata) + Send + Sync + 'static,
	{
		self.subscribe_callback(topic, Arc::new(callback)).await
	}

	/// Same as [`subscribe`](Self::subscribe) with a shared callback
	pub async fn subscribe_callback(
		&self,
		topic: impl Into<ArcStr>,
		callback: MessageCallback,
	) -> Result<(), MqttClientError> {
		let filter = TopicFilter::parse(topic)?;
		let (reply, response) = oneshot::channel();
		self.send(Command::Register {
			filter,
			callback,
			reply,
		})
		.await?;
		response.await.map_err(|_| MqttClientError::ResponseLost)
	}

	/// Publishes bytes or text with QoS 0 and no retain
	pub async fn publish(
		&self,
		topic: impl Into<ArcStr>,
		payload: impl Into<Bytes>,
	) -> Result<(), MqttClientError> {
		self.publish_with_options(topic, payload, PublishOptions::default())
			.await
	}

	/// Publishes bytes or text.
	///
	/// Fails with [`MqttClientError::NotConnected`] unless the client is
	/// connected; nothing is queued. `Ok` means the publish was handed to
	/// the transport, not that the broker received it. At QoS 0 no broker
	/// acknowledgment exists.
	pub async fn publish_with_options(
		&self,
		topic: impl Into<ArcStr>,
		payload: impl Into<Bytes>,
		options: PublishOptions,
	) -> Result<(), MqttClientError> {
		let (reply, response) = oneshot::channel();
		self.send(Command::Publish { reply }).await?;
		let permit = response.await.map_err(|_| MqttClientError::ResponseLost)??;
		permit
			.publish(PublishRequest {
				topic: topic.into(),
				payload: payload.into(),
				qos: options.qos,
				retain: options.retain,
				user_properties: Vec::new(),
			})
			.await
	}

	/// Publishes a value in its JSON form
	pub async fn publish_json<T>(
		&self,
		topic: impl Into<ArcStr>,
		data: &T,
		options: PublishOptions,
	) -> Result<(), MqttClientError>
	where
		JsonSerializer: MessageSerializer<T>,
	{
		self.publish_serialized(topic, data, &JsonSerializer, options)
			.await
	}

	/// Publishes a value encoded by the given serializer
	pub async fn publish_serialized<T, F>(
		&self,
		topic: impl Into<ArcStr>,
		data: &T,
		serializer: &F,
		options: PublishOptions,
	) -> Result<(), MqttClientError>
	where
		F: MessageSerializer<T>,
	{
		let payload = serializer
			.serialize(data)
			.map_err(|e| MqttClientError::Serialization(format!("{e:?}")))?;
		self.publish_with_options(topic, payload, options).await
	}

	/// Current connection state
	pub fn state(&self) -> ConnectionState {
		*self.state_rx.borrow()
	}

	/// True while a session is connected
	pub fn is_connected(&self) -> bool {
		self.state() == ConnectionState::Connected
	}

	/// Watch receiver for connection state changes
	pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
		self.state_rx.clone()
	}

	/// Identifier of the current session, if any
	pub async fn connection_id(&self) -> Result<Option<ArcStr>, MqttClientError> {
		let (reply, response) = oneshot::channel();
		self.send(Command::ConnectionId { reply }).await?;
		response.await.map_err(|_| MqttClientError::ResponseLost)
	}

	async fn send(&self, command: Command<C::Session>) -> Result<(), MqttClientError> {
		self.command_tx
			.send(command)
			.await
			.map_err(|_| MqttClientError::ChannelClosed)
	}
}
