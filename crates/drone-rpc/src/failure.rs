//! Failure injection plugin.
//!
//! Injects simulated sensor and system failures, for testing failsafe
//! behaviour in simulation.

use std::time::Duration;

use tonic::transport::Channel;

use drone_rpc_core::{Error, ReportedResult, result_code, unary};
use drone_rpc_proto::failure as rpc;
use drone_rpc_proto::failure::failure_service_client::FailureServiceClient;
use drone_rpc_proto::methods::METHOD_INJECT_FAILURE;

use crate::connection::PluginContext;

result_code! {
    /// Possible results returned by the failure service.
    pub enum FailureResult {
        service: "failure",
        success: Success,
        next: [],
        codes: {
            Unknown = 0,
            Success = 1,
            NoSystem = 2,
            ConnectionError = 3,
            Unsupported = 4,
            Denied = 5,
            Disabled = 6,
            Timeout = 7,
        }
    }
}

pub type FailureError = Error<FailureResult>;

/// The component to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureUnit {
    SensorGyro,
    SensorAccel,
    SensorMag,
    SensorBaro,
    SensorGps,
    SensorOpticalFlow,
    SensorVio,
    SensorDistanceSensor,
    SensorAirspeed,
    SystemBattery,
    SystemMotor,
    SystemServo,
    SystemAvoidance,
    SystemRcSignal,
    SystemMavlinkSignal,
}

impl From<FailureUnit> for rpc::FailureUnit {
    fn from(unit: FailureUnit) -> Self {
        match unit {
            FailureUnit::SensorGyro => Self::SensorGyro,
            FailureUnit::SensorAccel => Self::SensorAccel,
            FailureUnit::SensorMag => Self::SensorMag,
            FailureUnit::SensorBaro => Self::SensorBaro,
            FailureUnit::SensorGps => Self::SensorGps,
            FailureUnit::SensorOpticalFlow => Self::SensorOpticalFlow,
            FailureUnit::SensorVio => Self::SensorVio,
            FailureUnit::SensorDistanceSensor => Self::SensorDistanceSensor,
            FailureUnit::SensorAirspeed => Self::SensorAirspeed,
            FailureUnit::SystemBattery => Self::SystemBattery,
            FailureUnit::SystemMotor => Self::SystemMotor,
            FailureUnit::SystemServo => Self::SystemServo,
            FailureUnit::SystemAvoidance => Self::SystemAvoidance,
            FailureUnit::SystemRcSignal => Self::SystemRcSignal,
            FailureUnit::SystemMavlinkSignal => Self::SystemMavlinkSignal,
        }
    }
}

/// How the component fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureType {
    /// No failure; restores normal operation.
    Ok,
    Off,
    Stuck,
    Garbage,
    Wrong,
    Slow,
    Delayed,
    Intermittent,
}

impl From<FailureType> for rpc::FailureType {
    fn from(failure_type: FailureType) -> Self {
        match failure_type {
            FailureType::Ok => Self::Ok,
            FailureType::Off => Self::Off,
            FailureType::Stuck => Self::Stuck,
            FailureType::Garbage => Self::Garbage,
            FailureType::Wrong => Self::Wrong,
            FailureType::Slow => Self::Slow,
            FailureType::Delayed => Self::Delayed,
            FailureType::Intermittent => Self::Intermittent,
        }
    }
}

/// Failure injection.
#[derive(Debug, Clone)]
pub struct Failure {
    client: FailureServiceClient<Channel>,
    request_timeout: Duration,
}

impl Failure {
    pub fn new(context: &PluginContext) -> Self {
        Self {
            client: FailureServiceClient::new(context.channel()),
            request_timeout: context.request_timeout(),
        }
    }

    /// Inject `failure_type` into `instance` of `unit`. Instance 0 targets
    /// every instance.
    pub async fn inject(
        &self,
        unit: FailureUnit,
        failure_type: FailureType,
        instance: i32,
    ) -> Result<(), FailureError> {
        let mut client = self.client.clone();
        let request = rpc::InjectRequest {
            failure_unit: rpc::FailureUnit::from(unit).into(),
            failure_type: rpc::FailureType::from(failure_type).into(),
            instance,
        };
        unary::command(
            METHOD_INJECT_FAILURE,
            self.request_timeout,
            client.inject(request),
            |r: &rpc::InjectResponse| {
                r.failure_result
                    .as_ref()
                    .map(|f| ReportedResult::new(f.result, f.result_str.clone()))
            },
        )
        .await
    }
}
