//! MQTT connection management module
//!
//! Lifecycle handle for the connection manager task, kept separate from the
//! client interface so that clients can be cloned freely while shutdown
//! happens exactly once.

use tracing::{error, warn};

use crate::client::connection_manager::ManagerController;

/// MQTT connection handle for lifecycle management
///
/// Keep it alive for the duration of the MQTT session: dropping it stops
/// the connection manager, and with it message delivery.
pub struct MqttConnection {
	controller: Option<ManagerController>,
}

impl MqttConnection {
	/// Create a new connection handle
	pub(crate) fn new(controller: ManagerController) -> Self {
		Self {
			controller: Some(controller),
		}
	}

	/// Gracefully shutdown the MQTT connection by:
	/// 1. Signalling the connection manager to stop
	/// 2. Letting it send DISCONNECT when a session is connected
	/// 3. Waiting for the manager task to finish
	pub async fn shutdown(mut self) -> Result<(), crate::MqttClientError> {
		let Some(controller) = self.controller.take() else {
			warn!("No connection manager controller available for shutdown");
			return Ok(());
		};
		if controller.shutdown_tx.send(()).is_err() {
			warn!("Connection manager already stopped");
		}
		if let Err(e) = controller.join_handle.await {
			warn!(error = %e, "Connection manager task failed");
		}
		Ok(())
	}
}

impl std::fmt::Debug for MqttConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MqttConnection")
			.field("active", &self.controller.is_some())
			.finish()
	}
}

impl Drop for MqttConnection {
	fn drop(&mut self) {
		if self.controller.is_some() {
			error!(
				"MqttConnection dropped without calling shutdown(). Please \
				 call shutdown() and await its completion before dropping."
			);
		}
	}
}
