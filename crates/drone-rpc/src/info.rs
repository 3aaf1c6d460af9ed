//! Vehicle information plugin.

use std::time::Duration;

use tonic::transport::Channel;

use drone_rpc_core::{Error, ReportedResult, result_code, unary};
use drone_rpc_proto::info as rpc;
use drone_rpc_proto::info::info_service_client::InfoServiceClient;
use drone_rpc_proto::methods::{METHOD_GET_PRODUCT, METHOD_GET_SPEED_FACTOR, METHOD_GET_VERSION};

use crate::connection::PluginContext;

result_code! {
    /// Possible results returned by the info service.
    pub enum InfoResult {
        service: "info",
        success: Success,
        next: [],
        codes: {
            Unknown = 0,
            Success = 1,
            InformationNotReceivedYet = 2,
            NoSystem = 3,
        }
    }
}

pub type InfoError = Error<InfoResult>;

/// Software versions running on the vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Version {
    pub flight_sw_major: i32,
    pub flight_sw_minor: i32,
    pub flight_sw_patch: i32,
    pub flight_sw_vendor_major: i32,
    pub flight_sw_vendor_minor: i32,
    pub flight_sw_vendor_patch: i32,
    pub os_sw_major: i32,
    pub os_sw_minor: i32,
    pub os_sw_patch: i32,
    pub flight_sw_git_hash: String,
    pub os_sw_git_hash: String,
}

impl From<rpc::Version> for Version {
    fn from(v: rpc::Version) -> Self {
        Self {
            flight_sw_major: v.flight_sw_major,
            flight_sw_minor: v.flight_sw_minor,
            flight_sw_patch: v.flight_sw_patch,
            flight_sw_vendor_major: v.flight_sw_vendor_major,
            flight_sw_vendor_minor: v.flight_sw_vendor_minor,
            flight_sw_vendor_patch: v.flight_sw_vendor_patch,
            os_sw_major: v.os_sw_major,
            os_sw_minor: v.os_sw_minor,
            os_sw_patch: v.os_sw_patch,
            flight_sw_git_hash: v.flight_sw_git_hash,
            os_sw_git_hash: v.os_sw_git_hash,
        }
    }
}

/// Autopilot hardware identification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Product {
    pub vendor_id: i32,
    pub vendor_name: String,
    pub product_id: i32,
    pub product_name: String,
}

impl From<rpc::Product> for Product {
    fn from(p: rpc::Product) -> Self {
        Self {
            vendor_id: p.vendor_id,
            vendor_name: p.vendor_name,
            product_id: p.product_id,
            product_name: p.product_name,
        }
    }
}

fn reported(result: Option<&rpc::InfoResult>) -> Option<ReportedResult> {
    result.map(|r| ReportedResult::new(r.result, r.result_str.clone()))
}

fn missing(method: &str, field: &str) -> InfoError {
    Error::Internal(format!("{method} succeeded without {field}"))
}

/// Vehicle information queries.
#[derive(Debug, Clone)]
pub struct Info {
    client: InfoServiceClient<Channel>,
    request_timeout: Duration,
}

impl Info {
    pub fn new(context: &PluginContext) -> Self {
        Self {
            client: InfoServiceClient::new(context.channel()),
            request_timeout: context.request_timeout(),
        }
    }

    /// Software version information.
    pub async fn get_version(&self) -> Result<Version, InfoError> {
        let mut client = self.client.clone();
        unary::query(
            METHOD_GET_VERSION,
            self.request_timeout,
            client.get_version(rpc::GetVersionRequest {}),
            |r: &rpc::GetVersionResponse| reported(r.info_result.as_ref()),
            |r| {
                r.version
                    .map(Version::from)
                    .ok_or_else(|| missing(METHOD_GET_VERSION, "version"))
            },
        )
        .await
    }

    /// Hardware identification.
    pub async fn get_product(&self) -> Result<Product, InfoError> {
        let mut client = self.client.clone();
        unary::query(
            METHOD_GET_PRODUCT,
            self.request_timeout,
            client.get_product(rpc::GetProductRequest {}),
            |r: &rpc::GetProductResponse| reported(r.info_result.as_ref()),
            |r| {
                r.product
                    .map(Product::from)
                    .ok_or_else(|| missing(METHOD_GET_PRODUCT, "product"))
            },
        )
        .await
    }

    /// Simulation speed factor; 1.0 outside simulation.
    pub async fn get_speed_factor(&self) -> Result<f64, InfoError> {
        let mut client = self.client.clone();
        unary::query(
            METHOD_GET_SPEED_FACTOR,
            self.request_timeout,
            client.get_speed_factor(rpc::GetSpeedFactorRequest {}),
            |r: &rpc::GetSpeedFactorResponse| reported(r.info_result.as_ref()),
            |r| Ok(r.speed_factor),
        )
        .await
    }
}
