//! Named constants for gRPC method strings.
//!
//! Used as the `method` field on tracing events emitted by the adapters so
//! that log lines can be correlated with server-side logs without repeating
//! string literals in every plugin.

// ---------------------------------------------------------------------------
// CalibrationService
// ---------------------------------------------------------------------------

/// `CalibrationService/SubscribeCalibrateGyro`
pub const METHOD_CALIBRATE_GYRO: &str = "CalibrationService/SubscribeCalibrateGyro";

/// `CalibrationService/SubscribeCalibrateAccelerometer`
pub const METHOD_CALIBRATE_ACCELEROMETER: &str =
    "CalibrationService/SubscribeCalibrateAccelerometer";

/// `CalibrationService/SubscribeCalibrateMagnetometer`
pub const METHOD_CALIBRATE_MAGNETOMETER: &str =
    "CalibrationService/SubscribeCalibrateMagnetometer";

/// `CalibrationService/SubscribeCalibrateLevelHorizon`
pub const METHOD_CALIBRATE_LEVEL_HORIZON: &str =
    "CalibrationService/SubscribeCalibrateLevelHorizon";

/// `CalibrationService/SubscribeCalibrateGimbalAccelerometer`
pub const METHOD_CALIBRATE_GIMBAL_ACCELEROMETER: &str =
    "CalibrationService/SubscribeCalibrateGimbalAccelerometer";

/// `CalibrationService/Cancel`
pub const METHOD_CALIBRATION_CANCEL: &str = "CalibrationService/Cancel";

// ---------------------------------------------------------------------------
// GeofenceService
// ---------------------------------------------------------------------------

/// `GeofenceService/UploadGeofence`
pub const METHOD_UPLOAD_GEOFENCE: &str = "GeofenceService/UploadGeofence";

/// `GeofenceService/ClearGeofence`
pub const METHOD_CLEAR_GEOFENCE: &str = "GeofenceService/ClearGeofence";

// ---------------------------------------------------------------------------
// FailureService
// ---------------------------------------------------------------------------

/// `FailureService/Inject`
pub const METHOD_INJECT_FAILURE: &str = "FailureService/Inject";

// ---------------------------------------------------------------------------
// ManualControlService
// ---------------------------------------------------------------------------

/// `ManualControlService/StartPositionControl`
pub const METHOD_START_POSITION_CONTROL: &str = "ManualControlService/StartPositionControl";

/// `ManualControlService/StartAltitudeControl`
pub const METHOD_START_ALTITUDE_CONTROL: &str = "ManualControlService/StartAltitudeControl";

/// `ManualControlService/SetManualControlInput`
pub const METHOD_SET_MANUAL_CONTROL_INPUT: &str = "ManualControlService/SetManualControlInput";

// ---------------------------------------------------------------------------
// RtkService
// ---------------------------------------------------------------------------

/// `RtkService/SendRtkData`
pub const METHOD_SEND_RTK_DATA: &str = "RtkService/SendRtkData";

// ---------------------------------------------------------------------------
// TransponderService
// ---------------------------------------------------------------------------

/// `TransponderService/SubscribeTransponder`
pub const METHOD_SUBSCRIBE_TRANSPONDER: &str = "TransponderService/SubscribeTransponder";

/// `TransponderService/SetRateTransponder`
pub const METHOD_SET_RATE_TRANSPONDER: &str = "TransponderService/SetRateTransponder";

// ---------------------------------------------------------------------------
// InfoService
// ---------------------------------------------------------------------------

/// `InfoService/GetVersion`
pub const METHOD_GET_VERSION: &str = "InfoService/GetVersion";

/// `InfoService/GetProduct`
pub const METHOD_GET_PRODUCT: &str = "InfoService/GetProduct";

/// `InfoService/GetSpeedFactor`
pub const METHOD_GET_SPEED_FACTOR: &str = "InfoService/GetSpeedFactor";
