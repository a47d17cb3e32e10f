//! # Content Crate
//!
//! The pure, network-free part of content migration. Everything here operates
//! on a single [`ContentDocument`] held in memory:
//!
//! - Deterministic identifier generation for a destination tenant
//! - Scanning a document for references to other entities
//! - Rewriting those references through identifier mappings
//! - Rewriting circulation and taxonomy for a destination website
//!
//! ## Usage
//!
//! ```rust
//! use content::{rewrite, scan, ContentDocument, EntityKind, IdentifierMapping};
//! use serde_json::json;
//!
//! let mut doc = ContentDocument::new(json!({
//!     "_id": "STORY1",
//!     "content_elements": [{"_id": "IMG1", "type": "image"}]
//! }));
//!
//! let images = scan(&doc, EntityKind::Image);
//! let mapping = IdentifierMapping::regenerate(EntityKind::Image, &images, "destination");
//! assert_eq!(rewrite(&mut doc, &mapping), 1);
//! ```

pub mod circulation;
pub mod document;
pub mod error;
pub mod ids;
pub mod references;

pub use circulation::{
    normalize_taxonomy, rewrite_websites, transform_embedded_taxonomy, transform_story_circulation,
    CirculationAudit, CirculationPolicy, CirculationTarget, SectionPlacement, WebsitesLayout,
};
pub use document::ContentDocument;
pub use error::ContentError;
pub use ids::{generate_id, ID_LENGTH};
pub use references::{
    reference_value, rewrite, rewrite_all, scan, scan_references, EntityKind, IdentifierMapping,
    Location, Portability, PortabilityTable, Reference,
};

/// Result type for content operations
pub type Result<T> = std::result::Result<T, ContentError>;
