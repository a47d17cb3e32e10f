//! Photo reference discovery across a document and the galleries it embeds

use crate::report::{ReferenceEntries, ReportHeader};
use content::{scan, ContentDocument, EntityKind, IdentifierMapping, PortabilityTable};
use platform_client::{ContentStore, TenantContext};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Image and gallery ids a document depends on
///
/// `images` includes the images found inside every referenced gallery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoReferences {
    pub images: BTreeSet<String>,
    pub galleries: BTreeSet<String>,
}

/// Identifier mappings for the photo references of one run
///
/// Both are empty when photo ids are portable to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoMappings {
    pub images: IdentifierMapping,
    pub galleries: IdentifierMapping,
}

impl PhotoMappings {
    /// Regenerate the ids of every kind `portability` does not carry over
    pub fn build(references: &PhotoReferences, portability: &PortabilityTable, destination_tenant: &str) -> Self {
        let mapping = |kind: EntityKind, ids: &BTreeSet<String>| {
            if portability.regenerates(kind) {
                IdentifierMapping::regenerate(kind, ids, destination_tenant)
            } else {
                IdentifierMapping::new(kind)
            }
        };
        Self {
            images: mapping(EntityKind::Image, &references.images),
            galleries: mapping(EntityKind::Gallery, &references.galleries),
        }
    }

    pub fn all(&self) -> [&IdentifierMapping; 2] {
        [&self.images, &self.galleries]
    }

    /// Report entries: mappings when ids were regenerated, plain lists otherwise
    pub fn report(
        &self,
        references: &PhotoReferences,
        header: &ReportHeader,
    ) -> (Option<ReferenceEntries>, Option<ReferenceEntries>) {
        let entries = |mapping: &IdentifierMapping, ids: &BTreeSet<String>| {
            if ids.is_empty() {
                None
            } else if mapping.is_empty() {
                Some(ReferenceEntries::listed(ids))
            } else {
                Some(ReferenceEntries::Mapped(header.mapping(mapping)))
            }
        };
        (
            entries(&self.images, &references.images),
            entries(&self.galleries, &references.galleries),
        )
    }
}

/// Scans documents for photo references, following galleries into the source tenant
pub struct ReferenceScanner<'a> {
    store: &'a dyn ContentStore,
    source: &'a TenantContext,
}

impl<'a> ReferenceScanner<'a> {
    pub fn new(store: &'a dyn ContentStore, source: &'a TenantContext) -> Self {
        Self { store, source }
    }

    /// Collect image and gallery references, including images inside galleries
    ///
    /// A gallery that cannot be fetched contributes no images; the run goes on
    /// and validation catches anything left dangling.
    pub async fn photo_references(&self, doc: &ContentDocument) -> PhotoReferences {
        let mut images = scan(doc, EntityKind::Image);
        let galleries = scan(doc, EntityKind::Gallery);

        for gallery_id in &galleries {
            match self.store.gallery(self.source, gallery_id).await {
                Ok(gallery) => {
                    let inner = scan(&ContentDocument::new(gallery), EntityKind::Image);
                    debug!(gallery = %gallery_id, images = inner.len(), "Scanned gallery images");
                    images.extend(inner);
                }
                Err(e) => {
                    warn!(gallery = %gallery_id, tenant = %self.source.tenant, error = %e, "Failed to fetch gallery for image references");
                }
            }
        }

        PhotoReferences { images, galleries }
    }
}
