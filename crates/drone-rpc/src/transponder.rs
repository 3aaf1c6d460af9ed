//! Transponder plugin.
//!
//! ADS-B traffic reported by the vehicle's transponder. The traffic stream
//! is telemetry: it carries no result code and runs until the server closes
//! it or the last subscriber drops.

use std::time::Duration;

use tonic::transport::Channel;

use drone_rpc_core::{
    Error, ReportedResult, SharedSubscription, Step, Subscription, result_code, unary,
};
use drone_rpc_proto::methods::{METHOD_SET_RATE_TRANSPONDER, METHOD_SUBSCRIBE_TRANSPONDER};
use drone_rpc_proto::transponder as rpc;
use drone_rpc_proto::transponder::transponder_service_client::TransponderServiceClient;

use crate::connection::PluginContext;

result_code! {
    /// Possible results returned by the transponder service.
    pub enum TransponderResult {
        service: "transponder",
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
        }
    }
}

pub type TransponderError = Error<TransponderResult>;

/// Enumeration received from the vehicle; unknown values are kept.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $( $variant:ident = $value:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $variant, )+
            Unrecognized(i32),
        }

        impl From<i32> for $name {
            fn from(value: i32) -> Self {
                match value {
                    $( $value => Self::$variant, )+
                    other => Self::Unrecognized(other),
                }
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> Self {
                match value {
                    $( $name::$variant => $value, )+
                    $name::Unrecognized(other) => other,
                }
            }
        }
    };
}

wire_enum! {
    /// ADS-B emitter category of the reporting vehicle.
    pub enum AdsbEmitterType {
        NoInfo = 0,
        Light = 1,
        Small = 2,
        Large = 3,
        HighVortexLarge = 4,
        Heavy = 5,
        HighlyManeuverable = 6,
        Rotorcraft = 7,
        Unassigned = 8,
        Glider = 9,
        LighterAir = 10,
        Parachute = 11,
        UltraLight = 12,
        Unassigned2 = 13,
        Uav = 14,
        Space = 15,
        Unassigned3 = 16,
        EmergencySurface = 17,
        ServiceSurface = 18,
        PointObstacle = 19,
    }
}

wire_enum! {
    /// Reference of [`AdsbVehicle::absolute_altitude_m`].
    pub enum AdsbAltitudeType {
        PressureQnh = 0,
        Geometric = 1,
    }
}

/// One ADS-B traffic report.
#[derive(Debug, Clone, PartialEq)]
pub struct AdsbVehicle {
    pub icao_address: u32,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_type: AdsbAltitudeType,
    pub absolute_altitude_m: f32,
    pub heading_deg: f32,
    pub horizontal_velocity_m_s: f32,
    pub vertical_velocity_m_s: f32,
    pub callsign: String,
    pub emitter_type: AdsbEmitterType,
    pub squawk: u32,
    /// Seconds since the last communication.
    pub tslc_s: u32,
}

impl From<rpc::AdsbVehicle> for AdsbVehicle {
    fn from(v: rpc::AdsbVehicle) -> Self {
        Self {
            icao_address: v.icao_address,
            latitude_deg: v.latitude_deg,
            longitude_deg: v.longitude_deg,
            altitude_type: v.altitude_type.into(),
            absolute_altitude_m: v.absolute_altitude_m,
            heading_deg: v.heading_deg,
            horizontal_velocity_m_s: v.horizontal_velocity_m_s,
            vertical_velocity_m_s: v.vertical_velocity_m_s,
            callsign: v.callsign,
            emitter_type: v.emitter_type.into(),
            squawk: v.squawk,
            tslc_s: v.tslc_s,
        }
    }
}

impl From<AdsbVehicle> for rpc::AdsbVehicle {
    fn from(v: AdsbVehicle) -> Self {
        Self {
            icao_address: v.icao_address,
            latitude_deg: v.latitude_deg,
            longitude_deg: v.longitude_deg,
            altitude_type: v.altitude_type.into(),
            absolute_altitude_m: v.absolute_altitude_m,
            heading_deg: v.heading_deg,
            horizontal_velocity_m_s: v.horizontal_velocity_m_s,
            vertical_velocity_m_s: v.vertical_velocity_m_s,
            callsign: v.callsign,
            emitter_type: v.emitter_type.into(),
            squawk: v.squawk,
            tslc_s: v.tslc_s,
        }
    }
}

fn classify(frame: rpc::TransponderResponse) -> Result<Step<AdsbVehicle>, TransponderError> {
    frame
        .transponder
        .map(|vehicle| Step::Next(vehicle.into()))
        .ok_or_else(|| {
            Error::Internal(format!(
                "{METHOD_SUBSCRIBE_TRANSPONDER} frame carried no vehicle"
            ))
        })
}

/// ADS-B traffic.
#[derive(Debug, Clone)]
pub struct Transponder {
    client: TransponderServiceClient<Channel>,
    request_timeout: Duration,
    traffic: SharedSubscription<AdsbVehicle, TransponderResult>,
}

impl Transponder {
    pub fn new(context: &PluginContext) -> Self {
        let client = TransponderServiceClient::new(context.channel());
        let stream_client = client.clone();
        let traffic = context
            .subscription(METHOD_SUBSCRIBE_TRANSPONDER)
            .completes_on_end(true)
            .build(
                move || {
                    let mut client = stream_client.clone();
                    async move {
                        client
                            .subscribe_transponder(rpc::SubscribeTransponderRequest {})
                            .await
                    }
                },
                classify,
            );
        Self {
            client,
            request_timeout: context.request_timeout(),
            traffic,
        }
    }

    /// Subscribe to traffic reports.
    ///
    /// # Panics
    ///
    /// Panics outside a tokio runtime unless the plugin was built from a
    /// [`PluginContext::with_runtime`] context.
    pub fn transponder(&self) -> Subscription<AdsbVehicle, TransponderResult> {
        self.traffic.subscribe()
    }

    /// Whether the traffic stream is currently open.
    pub fn is_streaming(&self) -> bool {
        self.traffic.is_active()
    }

    /// Set the rate at which the vehicle reports traffic.
    pub async fn set_rate_transponder(&self, rate_hz: f64) -> Result<(), TransponderError> {
        let mut client = self.client.clone();
        unary::command(
            METHOD_SET_RATE_TRANSPONDER,
            self.request_timeout,
            client.set_rate_transponder(rpc::SetRateTransponderRequest { rate_hz }),
            |r: &rpc::SetRateTransponderResponse| {
                r.transponder_result
                    .as_ref()
                    .map(|res| ReportedResult::new(res.result, res.result_str.clone()))
            },
        )
        .await
    }
}
