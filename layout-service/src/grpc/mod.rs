//! gRPC binding of the health endpoints (`health.v1.HealthService`)
//!
//! Served on its own port next to the HTTP server, with the same semantics:
//! readiness failures become `UNAVAILABLE`, caller cancellation `CANCELLED`
//! and an expired `grpc-timeout` `DEADLINE_EXCEEDED`.

pub mod health;
pub mod interceptors;
pub mod server;

/// Generated protobuf types and service stubs
pub mod proto {
    tonic::include_proto!("health.v1");
}

pub use health::{parse_grpc_timeout, HealthGrpcService};
pub use interceptors::request_id_interceptor;
pub use server::GrpcServer;
