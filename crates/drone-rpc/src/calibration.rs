//! Calibration plugin.
//!
//! Each sensor calibration is a progress stream: zero or more progress
//! frames followed by success, or a single failure. Concurrent callers of
//! the same calibration share one server call.

use std::time::Duration;

use tonic::transport::Channel;

use drone_rpc_core::{
    Error, ReportedResult, SharedSubscription, Step, Subscription, result_code, unary,
};
use drone_rpc_proto::calibration as rpc;
use drone_rpc_proto::calibration::calibration_service_client::CalibrationServiceClient;
use drone_rpc_proto::methods::{
    METHOD_CALIBRATE_ACCELEROMETER, METHOD_CALIBRATE_GIMBAL_ACCELEROMETER, METHOD_CALIBRATE_GYRO,
    METHOD_CALIBRATE_LEVEL_HORIZON, METHOD_CALIBRATE_MAGNETOMETER, METHOD_CALIBRATION_CANCEL,
};

use crate::connection::PluginContext;

result_code! {
    /// Possible results returned by the calibration service.
    pub enum CalibrationResult {
        service: "calibration",
        success: Success,
        next: [Next],
        codes: {
            Unknown = 0,
            Success = 1,
            Next = 2,
            Failed = 3,
            NoSystem = 4,
            ConnectionError = 5,
            Busy = 6,
            CommandDenied = 7,
            Timeout = 8,
            Cancelled = 9,
            FailedArmed = 10,
            Unsupported = 11,
        }
    }
}

pub type CalibrationError = Error<CalibrationResult>;

/// Progress of a running calibration: a completion value, an instruction
/// for the operator, or both.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressData {
    /// Progress in percent.
    pub progress: Option<f32>,
    pub status_text: Option<String>,
}

impl From<rpc::ProgressData> for ProgressData {
    fn from(data: rpc::ProgressData) -> Self {
        Self {
            progress: data.has_progress.then_some(data.progress),
            status_text: data.has_status_text.then_some(data.status_text),
        }
    }
}

impl From<ProgressData> for rpc::ProgressData {
    fn from(data: ProgressData) -> Self {
        Self {
            has_progress: data.progress.is_some(),
            progress: data.progress.unwrap_or_default(),
            has_status_text: data.status_text.is_some(),
            status_text: data.status_text.unwrap_or_default(),
        }
    }
}

fn reported(result: Option<&rpc::CalibrationResult>) -> Option<ReportedResult> {
    result.map(|r| ReportedResult::new(r.result, r.result_str.clone()))
}

/// Common shape of the per-sensor calibration frames.
trait CalibrationFrame: Send + 'static {
    fn into_parts(self) -> (Option<rpc::CalibrationResult>, Option<rpc::ProgressData>);
}

macro_rules! calibration_frame {
    ($($frame:ty),+ $(,)?) => {
        $(
            impl CalibrationFrame for $frame {
                fn into_parts(self) -> (Option<rpc::CalibrationResult>, Option<rpc::ProgressData>) {
                    (self.calibration_result, self.progress_data)
                }
            }
        )+
    };
}

calibration_frame!(
    rpc::CalibrateGyroResponse,
    rpc::CalibrateAccelerometerResponse,
    rpc::CalibrateMagnetometerResponse,
    rpc::CalibrateLevelHorizonResponse,
    rpc::CalibrateGimbalAccelerometerResponse,
);

fn classify<F: CalibrationFrame>(
    method: &'static str,
) -> impl Fn(F) -> Result<Step<ProgressData>, CalibrationError> + Send + Sync + 'static {
    move |frame| {
        let (result, progress) = frame.into_parts();
        Step::classify(method, reported(result.as_ref()), || {
            Ok(progress.map(ProgressData::from).unwrap_or_default())
        })
    }
}

/// Build the shared adapter for one calibration stream.
macro_rules! calibration_stream {
    ($context:expr, $client:expr, $method:expr, $call:ident, $request:ident, $frame:ty) => {{
        let client = $client.clone();
        $context.subscription($method).build(
            move || {
                let mut client = client.clone();
                async move { client.$call(rpc::$request {}).await }
            },
            classify::<$frame>($method),
        )
    }};
}

/// Sensor calibration.
#[derive(Debug, Clone)]
pub struct Calibration {
    client: CalibrationServiceClient<Channel>,
    request_timeout: Duration,
    gyro: SharedSubscription<ProgressData, CalibrationResult>,
    accelerometer: SharedSubscription<ProgressData, CalibrationResult>,
    magnetometer: SharedSubscription<ProgressData, CalibrationResult>,
    level_horizon: SharedSubscription<ProgressData, CalibrationResult>,
    gimbal_accelerometer: SharedSubscription<ProgressData, CalibrationResult>,
}

impl Calibration {
    pub fn new(context: &PluginContext) -> Self {
        let client = CalibrationServiceClient::new(context.channel());
        Self {
            gyro: calibration_stream!(
                context,
                client,
                METHOD_CALIBRATE_GYRO,
                subscribe_calibrate_gyro,
                SubscribeCalibrateGyroRequest,
                rpc::CalibrateGyroResponse
            ),
            accelerometer: calibration_stream!(
                context,
                client,
                METHOD_CALIBRATE_ACCELEROMETER,
                subscribe_calibrate_accelerometer,
                SubscribeCalibrateAccelerometerRequest,
                rpc::CalibrateAccelerometerResponse
            ),
            magnetometer: calibration_stream!(
                context,
                client,
                METHOD_CALIBRATE_MAGNETOMETER,
                subscribe_calibrate_magnetometer,
                SubscribeCalibrateMagnetometerRequest,
                rpc::CalibrateMagnetometerResponse
            ),
            level_horizon: calibration_stream!(
                context,
                client,
                METHOD_CALIBRATE_LEVEL_HORIZON,
                subscribe_calibrate_level_horizon,
                SubscribeCalibrateLevelHorizonRequest,
                rpc::CalibrateLevelHorizonResponse
            ),
            gimbal_accelerometer: calibration_stream!(
                context,
                client,
                METHOD_CALIBRATE_GIMBAL_ACCELEROMETER,
                subscribe_calibrate_gimbal_accelerometer,
                SubscribeCalibrateGimbalAccelerometerRequest,
                rpc::CalibrateGimbalAccelerometerResponse
            ),
            client,
            request_timeout: context.request_timeout(),
        }
    }

    /// Calibrate the gyro.
    ///
    /// # Panics
    ///
    /// Panics outside a tokio runtime unless the plugin was built from a
    /// [`PluginContext::with_runtime`] context.
    pub fn calibrate_gyro(&self) -> Subscription<ProgressData, CalibrationResult> {
        self.gyro.subscribe()
    }

    /// Calibrate the accelerometer.
    ///
    /// # Panics
    ///
    /// Panics outside a tokio runtime unless the plugin was built from a
    /// [`PluginContext::with_runtime`] context.
    pub fn calibrate_accelerometer(&self) -> Subscription<ProgressData, CalibrationResult> {
        self.accelerometer.subscribe()
    }

    /// Calibrate the magnetometer.
    ///
    /// # Panics
    ///
    /// Panics outside a tokio runtime unless the plugin was built from a
    /// [`PluginContext::with_runtime`] context.
    pub fn calibrate_magnetometer(&self) -> Subscription<ProgressData, CalibrationResult> {
        self.magnetometer.subscribe()
    }

    /// Perform a board level horizon calibration.
    ///
    /// # Panics
    ///
    /// Panics outside a tokio runtime unless the plugin was built from a
    /// [`PluginContext::with_runtime`] context.
    pub fn calibrate_level_horizon(&self) -> Subscription<ProgressData, CalibrationResult> {
        self.level_horizon.subscribe()
    }

    /// Calibrate the gimbal accelerometer.
    ///
    /// # Panics
    ///
    /// Panics outside a tokio runtime unless the plugin was built from a
    /// [`PluginContext::with_runtime`] context.
    pub fn calibrate_gimbal_accelerometer(
        &self,
    ) -> Subscription<ProgressData, CalibrationResult> {
        self.gimbal_accelerometer.subscribe()
    }

    /// Cancel the calibration currently running on the vehicle.
    ///
    /// Streams still attached receive the server's terminal frame for the
    /// cancelled calibration.
    pub async fn cancel(&self) -> Result<(), CalibrationError> {
        let mut client = self.client.clone();
        unary::command(
            METHOD_CALIBRATION_CANCEL,
            self.request_timeout,
            client.cancel(rpc::CancelRequest {}),
            |r: &rpc::CancelResponse| reported(r.calibration_result.as_ref()),
        )
        .await
    }
}
