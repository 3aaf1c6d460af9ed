//! Build script for drone-rpc-proto
//!
//! Compiles the plugin protobuf definitions using tonic-prost-build.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_root = "proto";

    let protos = [
        "mavsdk/calibration.proto",
        "mavsdk/geofence.proto",
        "mavsdk/failure.proto",
        "mavsdk/manual_control.proto",
        "mavsdk/rtk.proto",
        "mavsdk/transponder.proto",
        "mavsdk/info.proto",
    ];

    let proto_paths: Vec<_> = protos
        .iter()
        .map(|p| format!("{proto_root}/{p}"))
        .collect();

    for path in &proto_paths {
        println!("cargo:rerun-if-changed={path}");
    }

    // Servers are generated too so tests can stand up in-process fakes.
    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&proto_paths, &[proto_root.to_string()])?;

    Ok(())
}
