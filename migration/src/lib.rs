//! # Migration Crate
//!
//! Moves content objects from one tenant of the content platform to another,
//! or from a production organization into its sandbox.
//!
//! One run takes one object through a fixed pipeline:
//!
//! ```text
//! FETCHED -> TRANSFORMED -> VALIDATED -> POSTED -> SIDE_EFFECTS_APPLIED
//! ```
//!
//! The per-kind work inside each stage lives in [`kinds`]; shared entities
//! (distributors, restrictions) are found or created by [`resolver`]; the
//! bulk drivers in [`bulk`] loop the pipeline over author listings and
//! redirect scans.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use migration::{Collaborators, ContentKind, MigrationRequest, MigrationVariant, Pipeline};
//! use platform_client::{Credential, Endpoints, HttpPlatform, TenantContext};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> migration::Result<()> {
//! let platform = Arc::new(HttpPlatform::new(Endpoints::default(), Duration::from_secs(30))?);
//! let pipeline = Pipeline::new(Collaborators::from_platform(platform));
//! let request = MigrationRequest::new(
//!     TenantContext::new("from-org", Credential::new("source-token")),
//!     TenantContext::new("to-org", Credential::new("destination-token")),
//!     MigrationVariant::production(),
//! )
//! .with_website("to-website")
//! .with_dry_run(true);
//!
//! let report = pipeline.migrate(ContentKind::Story, &request, "STORYID").await?;
//! println!("{:?}", report.final_stage());
//! # Ok(())
//! # }
//! ```

pub mod bulk;
pub mod error;
pub mod kinds;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod scanner;
pub mod validation;

#[cfg(test)]
mod testing;

pub use bulk::{migrate_authors, migrate_redirects, RedirectScan, RedirectTarget};
pub use error::{MigrationError, Result};
pub use pipeline::{
    Collaborators, ContentKind, KindStrategy, MigrationRequest, MigrationRun, MigrationVariant, Pipeline,
    SchemaVersions, Stage, Target,
};
pub use report::{BulkItem, BulkReport, MigrationReport, RedirectOutcome, RedirectsReport, ReferenceEntries, ReferenceReport};
pub use resolver::{EntityResolver, DRY_RUN_SENTINEL};
pub use scanner::{PhotoMappings, PhotoReferences, ReferenceScanner};
pub use validation::{ExactMessagesPolicy, FirstTimeCreationPolicy, FIRST_TIME_CREATION_MESSAGES};
