//! Manual control plugin.
//!
//! Position and altitude control modes driven by joystick-style input. A
//! mode can only be started once input is flowing, so callers send
//! [`ManualControl::set_manual_control_input`] at a steady rate before and
//! after starting a mode.

use std::time::Duration;

use tonic::transport::Channel;

use drone_rpc_core::{Error, ReportedResult, result_code, unary};
use drone_rpc_proto::manual_control as rpc;
use drone_rpc_proto::manual_control::manual_control_service_client::ManualControlServiceClient;
use drone_rpc_proto::methods::{
    METHOD_SET_MANUAL_CONTROL_INPUT, METHOD_START_ALTITUDE_CONTROL, METHOD_START_POSITION_CONTROL,
};

use crate::connection::PluginContext;

result_code! {
    /// Possible results returned by the manual control service.
    pub enum ManualControlResult {
        service: "manual_control",
        success: Success,
        next: [],
        codes: {
            Unknown = 0,
            Success = 1,
            NoSystem = 2,
            ConnectionError = 3,
            Busy = 4,
            CommandDenied = 5,
            Timeout = 6,
            InputOutOfRange = 7,
            InputNotSet = 8,
        }
    }
}

pub type ManualControlError = Error<ManualControlResult>;

/// One sample of stick input, each axis in `-1.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ManualControlInput {
    /// Pitch: negative backwards, positive forwards.
    pub x: f32,
    /// Roll: negative left, positive right.
    pub y: f32,
    /// Thrust: negative down, positive up. Multicopters expect `0.0..=1.0`.
    pub z: f32,
    /// Yaw: negative anti-clockwise, positive clockwise.
    pub r: f32,
}

fn reported(result: Option<&rpc::ManualControlResult>) -> Option<ReportedResult> {
    result.map(|r| ReportedResult::new(r.result, r.result_str.clone()))
}

/// Manual flight control.
#[derive(Debug, Clone)]
pub struct ManualControl {
    client: ManualControlServiceClient<Channel>,
    request_timeout: Duration,
}

impl ManualControl {
    pub fn new(context: &PluginContext) -> Self {
        Self {
            client: ManualControlServiceClient::new(context.channel()),
            request_timeout: context.request_timeout(),
        }
    }

    /// Switch to position control: the vehicle holds position when the
    /// sticks are centred.
    pub async fn start_position_control(&self) -> Result<(), ManualControlError> {
        let mut client = self.client.clone();
        unary::command(
            METHOD_START_POSITION_CONTROL,
            self.request_timeout,
            client.start_position_control(rpc::StartPositionControlRequest {}),
            |r: &rpc::StartPositionControlResponse| reported(r.manual_control_result.as_ref()),
        )
        .await
    }

    /// Switch to altitude control: the vehicle holds altitude but drifts
    /// with the wind when the sticks are centred.
    pub async fn start_altitude_control(&self) -> Result<(), ManualControlError> {
        let mut client = self.client.clone();
        unary::command(
            METHOD_START_ALTITUDE_CONTROL,
            self.request_timeout,
            client.start_altitude_control(rpc::StartAltitudeControlRequest {}),
            |r: &rpc::StartAltitudeControlResponse| reported(r.manual_control_result.as_ref()),
        )
        .await
    }

    /// Send one input sample.
    pub async fn set_manual_control_input(
        &self,
        input: ManualControlInput,
    ) -> Result<(), ManualControlError> {
        let mut client = self.client.clone();
        let request = rpc::SetManualControlInputRequest {
            x: input.x,
            y: input.y,
            z: input.z,
            r: input.r,
        };
        unary::command(
            METHOD_SET_MANUAL_CONTROL_INPUT,
            self.request_timeout,
            client.set_manual_control_input(request),
            |r: &rpc::SetManualControlInputResponse| reported(r.manual_control_result.as_ref()),
        )
        .await
    }
}
