//! Protocol types for the `platformhealth.v1` gRPC surface.
//!
//! The module body is the `tonic-build` output for
//! `proto/platformhealth.proto`, checked in so that building the workspace
//! does not require a system `protoc`. Regenerate with `tonic-build` after
//! editing the proto file.

pub mod v1 {
    include!("platformhealth.v1.rs");
}
