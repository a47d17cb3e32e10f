//! # Platform Client
//!
//! Interfaces to the services of the content platform (content storage,
//! settings, schema validation, ingestion) and an HTTP implementation of them.
//!
//! Migration logic depends only on the traits in [`collaborators`]; the
//! [`HttpPlatform`] adapter is wired in by the command line tool, and tests
//! substitute in-memory fakes.

pub mod collaborators;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod tenant;

pub use collaborators::{
    find_named, ContentStore, IngestRequest, PageCursor, Publisher, RedirectEntry, RedirectPage,
    SchemaValidator, SettingsService, SharedEntityKind, ValidationOutcome,
};
pub use endpoints::{Endpoints, DEFAULT_API_HOST, DEFAULT_VIDEO_HOST};
pub use error::{PlatformError, Result};
pub use http::HttpPlatform;
pub use tenant::{Credential, Environment, TenantContext};
