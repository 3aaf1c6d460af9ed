//! RTK corrections plugin.

use std::time::Duration;

use tonic::transport::Channel;

use drone_rpc_core::{Error, ReportedResult, result_code, unary};
use drone_rpc_proto::methods::METHOD_SEND_RTK_DATA;
use drone_rpc_proto::rtk as rpc;
use drone_rpc_proto::rtk::rtk_service_client::RtkServiceClient;

use crate::connection::PluginContext;

result_code! {
    /// Possible results returned by the RTK service.
    pub enum RtkResult {
        service: "rtk",
        success: Success,
        next: [],
        codes: {
            Unknown = 0,
            Success = 1,
            TooLong = 2,
            NoSystem = 5,
            ConnectionError = 6,
        }
    }
}

pub type RtkError = Error<RtkResult>;

/// One chunk of RTCM correction data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RtkData {
    /// Base64 encoded RTCM bytes.
    pub data_base64: String,
}

impl RtkData {
    pub fn new(data_base64: impl Into<String>) -> Self {
        Self {
            data_base64: data_base64.into(),
        }
    }
}

/// RTK correction forwarding.
#[derive(Debug, Clone)]
pub struct Rtk {
    client: RtkServiceClient<Channel>,
    request_timeout: Duration,
}

impl Rtk {
    pub fn new(context: &PluginContext) -> Self {
        Self {
            client: RtkServiceClient::new(context.channel()),
            request_timeout: context.request_timeout(),
        }
    }

    /// Forward correction data to the vehicle.
    pub async fn send_rtk_data(&self, data: RtkData) -> Result<(), RtkError> {
        let mut client = self.client.clone();
        let request = rpc::SendRtkDataRequest {
            rtk_data: Some(rpc::RtkData {
                data_base64: data.data_base64,
            }),
        };
        unary::command(
            METHOD_SEND_RTK_DATA,
            self.request_timeout,
            client.send_rtk_data(request),
            |r: &rpc::SendRtkDataResponse| {
                r.rtk_result
                    .as_ref()
                    .map(|res| ReportedResult::new(res.result, res.result_str.clone()))
            },
        )
        .await
    }
}
