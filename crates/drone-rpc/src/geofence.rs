//! Geofence plugin.

use std::time::Duration;

use tonic::transport::Channel;

use drone_rpc_core::{Error, ReportedResult, result_code, unary};
use drone_rpc_proto::geofence as rpc;
use drone_rpc_proto::geofence::geofence_service_client::GeofenceServiceClient;
use drone_rpc_proto::methods::{METHOD_CLEAR_GEOFENCE, METHOD_UPLOAD_GEOFENCE};

use crate::connection::PluginContext;

result_code! {
    /// Possible results returned by the geofence service.
    pub enum GeofenceResult {
        service: "geofence",
        success: Success,
        next: [],
        codes: {
            Unknown = 0,
            Success = 1,
            Error = 2,
            TooManyGeofenceItems = 3,
            Busy = 4,
            Timeout = 5,
            InvalidArgument = 6,
            NoSystem = 7,
        }
    }
}

pub type GeofenceError = Error<GeofenceResult>;

/// A geographic vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
}

impl Point {
    pub const fn new(latitude_deg: f64, longitude_deg: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
        }
    }
}

/// Whether the vehicle must stay inside or outside a polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FenceType {
    #[default]
    Inclusion,
    Exclusion,
}

/// A closed fence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub points: Vec<Point>,
    pub fence_type: FenceType,
}

impl From<Point> for rpc::Point {
    fn from(point: Point) -> Self {
        Self {
            latitude_deg: point.latitude_deg,
            longitude_deg: point.longitude_deg,
        }
    }
}

impl From<FenceType> for rpc::polygon::FenceType {
    fn from(fence_type: FenceType) -> Self {
        match fence_type {
            FenceType::Inclusion => Self::Inclusion,
            FenceType::Exclusion => Self::Exclusion,
        }
    }
}

impl From<Polygon> for rpc::Polygon {
    fn from(polygon: Polygon) -> Self {
        Self {
            points: polygon.points.into_iter().map(rpc::Point::from).collect(),
            fence_type: rpc::polygon::FenceType::from(polygon.fence_type).into(),
        }
    }
}

fn reported(result: Option<&rpc::GeofenceResult>) -> Option<ReportedResult> {
    result.map(|r| ReportedResult::new(r.result, r.result_str.clone()))
}

/// Geofence management.
#[derive(Debug, Clone)]
pub struct Geofence {
    client: GeofenceServiceClient<Channel>,
    request_timeout: Duration,
}

impl Geofence {
    pub fn new(context: &PluginContext) -> Self {
        Self {
            client: GeofenceServiceClient::new(context.channel()),
            request_timeout: context.request_timeout(),
        }
    }

    /// Replace the vehicle's geofence with `polygons`.
    pub async fn upload_geofence(&self, polygons: Vec<Polygon>) -> Result<(), GeofenceError> {
        let mut client = self.client.clone();
        let request = rpc::UploadGeofenceRequest {
            polygons: polygons.into_iter().map(rpc::Polygon::from).collect(),
        };
        unary::command(
            METHOD_UPLOAD_GEOFENCE,
            self.request_timeout,
            client.upload_geofence(request),
            |r: &rpc::UploadGeofenceResponse| reported(r.geofence_result.as_ref()),
        )
        .await
    }

    /// Remove every geofence from the vehicle.
    pub async fn clear_geofence(&self) -> Result<(), GeofenceError> {
        let mut client = self.client.clone();
        unary::command(
            METHOD_CLEAR_GEOFENCE,
            self.request_timeout,
            client.clear_geofence(rpc::ClearGeofenceRequest {}),
            |r: &rpc::ClearGeofenceResponse| reported(r.geofence_result.as_ref()),
        )
        .await
    }
}
