//! Generates the gRPC clients for the runtime services from `proto/`.

const PROTOS: &[&str] = &[
    "proto/iam/runtime/authentication.proto",
    "proto/iam/runtime/authorization.proto",
    "proto/iam/runtime/identity.proto",
    "proto/grpc/health/v1/health.proto",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto");

    // Only clients are needed; servers live in the runtime.
    tonic_prost_build::configure()
        .build_server(false)
        .compile_protos(PROTOS, &["proto"])?;

    Ok(())
}
