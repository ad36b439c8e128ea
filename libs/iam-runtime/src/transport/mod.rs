//! gRPC transport for the runtime capabilities.
//!
//! [`GrpcRuntime`] speaks to the runtime over TCP or a Unix domain socket;
//! [`GrpcRuntime::connect`] turns a [`RuntimeConfig`](crate::RuntimeConfig)
//! into a ready [`RuntimeHandle`](crate::RuntimeHandle).

mod connect;
mod grpc;

pub use connect::{Target, channel};
pub use grpc::GrpcRuntime;
