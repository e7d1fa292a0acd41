pub mod config;
pub mod grpc_client;
pub mod source_loop;

pub use config::RuntimeConfig;
pub use grpc_client::{
    build_subscribe_request, ClientError, GeyserUpdateSource, Transport, UpdateSource, UpdateStream,
};
pub use source_loop::{extract_event_id, run_source, SourceError};
