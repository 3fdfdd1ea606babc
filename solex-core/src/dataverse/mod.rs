//! Dataverse gateway: URL validation, Web API client, export artifacts.
//!
//! Everything network-facing lives behind the [`SolutionSource`] trait so the
//! orchestration flow can be tested against a fake.

mod artifact;
mod client;
mod types;
mod url;

pub use artifact::{
    artifact_file_name, ensure_directory_exists, write_artifact, ArtifactError, ArtifactInfo,
};
pub use client::{
    connect, DataverseConnection, GatewayError, HttpDataverseClient, SolutionSource,
};
pub use types::SolutionRecord;
pub use url::{normalize_server_url, organization_host, validate_server_url};
