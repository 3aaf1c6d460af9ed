//! drone-rpc client library
//!
//! Async bindings for the drone RPC server's plugin services. Connect with
//! [`Drone::connect`] and reach each plugin through its accessor:
//!
//! - [`calibration`]: sensor calibration progress streams
//! - [`geofence`]: geofence upload and clearing
//! - [`failure`]: simulated failure injection
//! - [`manual_control`]: joystick-style flight control
//! - [`rtk`]: RTK correction forwarding
//! - [`transponder`]: ADS-B traffic stream
//! - [`info`]: vehicle version and product information
//!
//! Streams are shared: concurrent subscribers to the same plugin stream ride
//! on one server call, and the call is cancelled when the last of them is
//! dropped.

pub mod calibration;
pub mod connection;
pub mod failure;
pub mod geofence;
pub mod info;
pub mod manual_control;
pub mod rtk;
pub mod transponder;

pub use connection::{ConnectionError, Drone, PluginContext};
pub use drone_rpc_core::config::load_config;
pub use drone_rpc_core::tracing_init::init_tracing;
pub use drone_rpc_core::{ClientConfig, Error, RetryPolicy, Subscription};
