//! Drone RPC Protocol Buffers
//!
//! Generated protobuf code for the drone server's plugin services.
//!
//! This crate contains one module per plugin service:
//! - `CalibrationService` for sensor calibration streams
//! - `GeofenceService` for fence upload and clearing
//! - `FailureService` for failure injection
//! - `ManualControlService` for joystick-style input
//! - `RtkService` for RTK correction forwarding
//! - `TransponderService` for ADS-B traffic
//! - `InfoService` for autopilot version and product data
//!
//! Package names follow the server's `mavsdk.rpc.*` schema so the generated
//! paths stay wire compatible.

#![allow(clippy::derive_partial_eq_without_eq)]
#![allow(clippy::pedantic, clippy::nursery)]

pub mod methods;

/// Sensor calibration.
pub mod calibration {
    tonic::include_proto!("mavsdk.rpc.calibration");
}

/// Geofence upload.
pub mod geofence {
    tonic::include_proto!("mavsdk.rpc.geofence");
}

/// Failure injection.
pub mod failure {
    tonic::include_proto!("mavsdk.rpc.failure");
}

/// Manual control input.
pub mod manual_control {
    tonic::include_proto!("mavsdk.rpc.manual_control");
}

/// RTK corrections.
pub mod rtk {
    tonic::include_proto!("mavsdk.rpc.rtk");
}

/// ADS-B transponder.
pub mod transponder {
    tonic::include_proto!("mavsdk.rpc.transponder");
}

/// Autopilot information.
pub mod info {
    tonic::include_proto!("mavsdk.rpc.info");
}
