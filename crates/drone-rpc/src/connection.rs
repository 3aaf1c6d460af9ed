//! Server connection.
//!
//! Owns the gRPC channel to the drone RPC server and the plugin handles
//! built on top of it.

use std::time::Duration;

use tokio::runtime::Handle;
use tonic::transport::{Channel, Endpoint};
use tracing::{info, warn};

use drone_rpc_core::{ClientConfig, RetryPolicy, SubscriptionBuilder};

use crate::calibration::Calibration;
use crate::failure::Failure;
use crate::geofence::Geofence;
use crate::info::Info;
use crate::manual_control::ManualControl;
use crate::rtk::Rtk;
use crate::transponder::Transponder;

/// Keep-alive ping timeout on the channel.
const KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(10);

/// What every plugin needs from the connection.
#[derive(Debug, Clone)]
pub struct PluginContext {
    channel: Channel,
    request_timeout: Duration,
    retry: RetryPolicy,
    stream_buffer: usize,
    runtime: Option<Handle>,
}

impl PluginContext {
    pub fn new(channel: Channel, config: &ClientConfig) -> Self {
        Self {
            channel,
            request_timeout: config.request_timeout(),
            retry: config.retry.clone(),
            stream_buffer: config.stream_buffer,
            runtime: None,
        }
    }

    /// Run stream calls on `runtime` instead of the caller's runtime.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub(crate) fn channel(&self) -> Channel {
        self.channel.clone()
    }

    pub(crate) const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Subscription builder carrying this connection's stream settings.
    pub(crate) fn subscription(&self, method: &'static str) -> SubscriptionBuilder {
        let builder = SubscriptionBuilder::new(method)
            .retry(self.retry.clone())
            .buffer(self.stream_buffer);
        match &self.runtime {
            Some(runtime) => builder.runtime(runtime.clone()),
            None => builder,
        }
    }
}

/// Connection errors.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Connection failed: {0}")]
    ConnectFailed(String),
}

/// A connected drone RPC server and its plugins.
///
/// Stream subscriptions spawn their call on the ambient tokio runtime, so
/// subscribing outside a runtime panics unless the plugins were built with
/// [`PluginContext::with_runtime`] and [`Drone::from_context`].
#[derive(Debug)]
pub struct Drone {
    config: ClientConfig,
    calibration: Calibration,
    failure: Failure,
    geofence: Geofence,
    info: Info,
    manual_control: ManualControl,
    rtk: Rtk,
    transponder: Transponder,
}

impl Drone {
    /// Connect eagerly, failing if the server cannot be reached.
    pub async fn connect(config: ClientConfig) -> Result<Self, ConnectionError> {
        let channel = endpoint(&config)?.connect().await.map_err(|e| {
            warn!(addr = %config.endpoint_uri(), error = %e, "Connection failed");
            ConnectionError::ConnectFailed(e.to_string())
        })?;
        info!(addr = %config.endpoint_uri(), "Connected");
        Ok(Self::from_channel(channel, config))
    }

    /// Build the channel without connecting. The first call connects, and
    /// an unreachable server surfaces as a transport fault on that call.
    pub fn connect_lazy(config: ClientConfig) -> Result<Self, ConnectionError> {
        let channel = endpoint(&config)?.connect_lazy();
        Ok(Self::from_channel(channel, config))
    }

    /// Wrap an existing channel.
    pub fn from_channel(channel: Channel, config: ClientConfig) -> Self {
        let context = PluginContext::new(channel, &config);
        Self::from_context(&context, config)
    }

    /// Build every plugin from `context`.
    pub fn from_context(context: &PluginContext, config: ClientConfig) -> Self {
        Self {
            config,
            calibration: Calibration::new(context),
            failure: Failure::new(context),
            geofence: Geofence::new(context),
            info: Info::new(context),
            manual_control: ManualControl::new(context),
            rtk: Rtk::new(context),
            transponder: Transponder::new(context),
        }
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub const fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub const fn failure(&self) -> &Failure {
        &self.failure
    }

    pub const fn geofence(&self) -> &Geofence {
        &self.geofence
    }

    pub const fn info(&self) -> &Info {
        &self.info
    }

    pub const fn manual_control(&self) -> &ManualControl {
        &self.manual_control
    }

    pub const fn rtk(&self) -> &Rtk {
        &self.rtk
    }

    pub const fn transponder(&self) -> &Transponder {
        &self.transponder
    }
}

fn endpoint(config: &ClientConfig) -> Result<Endpoint, ConnectionError> {
    Ok(Endpoint::from_shared(config.endpoint_uri())
        .map_err(|e| ConnectionError::InvalidAddress(e.to_string()))?
        .connect_timeout(config.connect_timeout())
        .http2_keep_alive_interval(config.keep_alive_interval())
        .keep_alive_timeout(KEEP_ALIVE_TIMEOUT))
}
