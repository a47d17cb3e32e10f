//! Error types for migration runs

use content::ContentError;
use platform_client::PlatformError;
use thiserror::Error;

/// Why a migration run stopped
///
/// Entity resolution failures are deliberately absent: an unresolved
/// distributor or restriction leaves its reference empty and surfaces as a
/// [`MigrationError::Validation`] instead.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// The source object could not be read
    #[error("Failed to fetch {kind} {id} from {tenant}: {reason}")]
    Fetch {
        kind: String,
        id: String,
        tenant: String,
        reason: String,
    },

    /// The object is already present in the destination
    #[error("{kind} {id} already exists in {tenant}, not migrated")]
    AlreadyExists {
        kind: String,
        id: String,
        tenant: String,
    },

    /// The source object holds nothing the destination could be given
    #[error("There are no {items} in {kind} {id} from {tenant}; nothing was migrated")]
    NothingToMigrate {
        kind: String,
        id: String,
        tenant: String,
        items: String,
    },

    /// Validation failed in the way a freshly created distributor makes it fail
    #[error("A shared entity was created for the first time during this run; run the migration again unchanged. Full error: {body}")]
    FirstTimeEntityCreation { body: String },

    /// The destination schema rejected the transformed document
    #[error("Validation failed with status {status}: {body}")]
    Validation { status: u16, body: String },

    /// The destination refused the transformed object
    #[error("Failed to post {kind} {id}: {reason}")]
    Post {
        kind: String,
        id: String,
        reason: String,
    },

    /// A redirect could not be created
    #[error("Failed to create redirect {url}: {reason}")]
    Redirect { url: String, reason: String },

    /// Invalid invocation, such as a missing destination website
    #[error("Invalid migration request: {0}")]
    Request(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Content(#[from] ContentError),
}

pub type Result<T> = std::result::Result<T, MigrationError>;
