//! Per-kind strategies plugged into the pipeline
//!
//! Each strategy knows where its kind is read from, which fields must change
//! before the destination accepts it, and how it is written.

mod author;
mod collection;
mod gallery;
mod image;
mod lightbox;
mod story;
mod video;

pub use author::AuthorStrategy;
pub use collection::CollectionStrategy;
pub use gallery::GalleryStrategy;
pub use image::ImageStrategy;
pub use lightbox::LightboxStrategy;
pub use story::StoryStrategy;
pub use video::VideoStrategy;

use crate::error::MigrationError;
use crate::pipeline::{ContentKind, KindStrategy, MigrationRun, Target};
use crate::report::{RedirectOutcome, ReferenceEntries};
use content::{ContentDocument, EntityKind, IdentifierMapping};
use platform_client::PlatformError;
use serde_json::{json, Value};
use tracing::{info, warn};

pub fn strategy_for(kind: ContentKind) -> Box<dyn KindStrategy> {
    match kind {
        ContentKind::Story => Box::new(StoryStrategy),
        ContentKind::Video => Box::new(VideoStrategy),
        ContentKind::Gallery => Box::new(GalleryStrategy),
        ContentKind::Image => Box::new(ImageStrategy),
        ContentKind::Author => Box::new(AuthorStrategy),
        ContentKind::Collection => Box::new(CollectionStrategy),
        ContentKind::Lightbox => Box::new(LightboxStrategy),
    }
}

/// A fetched object counts as absent when it holds no data
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

/// Common header edits: owner, version and provenance
fn stamp_document(run: &mut MigrationRun<'_>, version: Option<&str>) {
    let destination = run.request.destination.tenant.clone();
    if run.document.get("/owner").is_some_and(Value::is_object) {
        run.document.set("/owner/id", json!(destination));
    }
    if let Some(version) = version {
        run.document.set("/version", json!(version));
    }
    let method = run.request.ingestion_method();
    run.document
        .set("/additional_properties/ingestionMethod", json!(method));
}

/// Record where the object came from when its id changes
fn stamp_original_id(run: &mut MigrationRun<'_>) {
    if run.ingest_id != run.source_id {
        let original = json!({
            "org": run.request.source.tenant,
            "_id": run.source_id,
        });
        run.document
            .set("/additional_properties/arcOriginalId", original);
    }
}

/// Drop `credits.by[*].version` and return the author reference ids
///
/// Inline authors carry a version that no longer matches the document's.
fn strip_author_versions(doc: &mut ContentDocument) -> Vec<String> {
    let authors: Vec<String> = doc
        .get("/credits/by")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|author| author.pointer("/referent/id").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    if let Some(by) = doc.array_mut("/credits/by") {
        for author in by.iter_mut().filter_map(Value::as_object_mut) {
            author.remove("version");
        }
    }
    authors
}

/// Website restrictions and redirects are tied to in the destination
///
/// Sandbox copies keep the document's own website.
fn destination_website(run: &MigrationRun<'_>) -> String {
    match run.request.variant.target {
        Target::Production => run.request.website.clone(),
        Target::Sandbox => run
            .document
            .get_str("/canonical_website")
            .map(str::to_string)
            .or_else(|| run.request.website.clone()),
    }
    .unwrap_or_default()
}

async fn resolve_distributor(run: &mut MigrationRun<'_>) -> bool {
    let website = destination_website(run);
    let (request, collaborators) = (run.request, run.collaborators);
    let resolver = request.resolver(collaborators.settings.as_ref());
    match resolver.resolve_distributor(&mut run.document, &website).await {
        Some(resolved) => {
            run.references.distributor = Some(request.header().shared_entities(&resolved));
            true
        }
        None => false,
    }
}

async fn resolve_geo_restrictions(run: &mut MigrationRun<'_>) {
    let (request, collaborators) = (run.request, run.collaborators);
    let resolver = request.resolver(collaborators.settings.as_ref());
    if let Some(resolved) = resolver.resolve_geo_restrictions(&mut run.document).await {
        run.references.geo_restrictions = Some(request.header().shared_entities(&resolved));
    }
}

/// Rebuild a photo element as an image reference under its destination id
///
/// Regenerated ids keep the source id in `original_arc_id`.
fn image_reference(old_id: &str, mapping: &IdentifierMapping) -> Value {
    match mapping.get(old_id) {
        Some(new_id) => json!({
            "type": "reference",
            "_id": new_id,
            "referent": {
                "id": new_id,
                "type": EntityKind::Image.referent_type(),
                "referent_properties": {
                    "additional_properties": { "original_arc_id": old_id }
                }
            }
        }),
        None => json!({
            "type": "reference",
            "_id": old_id,
            "referent": { "id": old_id, "type": EntityKind::Image.referent_type() }
        }),
    }
}

fn image_entries(run: &MigrationRun<'_>, mapping: &IdentifierMapping, ids: &[String]) -> Option<ReferenceEntries> {
    if ids.is_empty() {
        None
    } else if mapping.is_empty() {
        Some(ReferenceEntries::Listed(ids.to_vec()))
    } else {
        Some(ReferenceEntries::Mapped(run.request.header().mapping(mapping)))
    }
}

/// The redirect service's own message when it gives one
fn redirect_service_message(err: &PlatformError) -> String {
    err.body_json()
        .and_then(|body| body.get("error_message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| err.to_string())
}

pub(crate) fn redirect_failure(url: &str, err: &PlatformError) -> MigrationError {
    MigrationError::Redirect {
        url: url.to_string(),
        reason: redirect_service_message(err),
    }
}

/// Register each redirect URL for `document_id`, one call per URL
///
/// A failed redirect is recorded and the rest are still attempted.
async fn recreate_redirects(run: &MigrationRun<'_>, website: &str, urls: &[String], document_id: &str) -> Vec<RedirectOutcome> {
    let mut outcomes = Vec::with_capacity(urls.len());
    for url in urls {
        let result = run
            .collaborators
            .publisher
            .create_redirect(&run.request.destination, website, url, document_id)
            .await;
        let outcome = match result {
            Ok(_) => {
                info!(url = %url, website, document_id, "Redirect created");
                RedirectOutcome {
                    url: url.clone(),
                    created: true,
                    message: None,
                }
            }
            Err(e) => {
                warn!(website, error = %redirect_failure(url, &e), "Redirect not created");
                RedirectOutcome {
                    url: url.clone(),
                    created: false,
                    message: Some(redirect_service_message(&e)),
                }
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}
