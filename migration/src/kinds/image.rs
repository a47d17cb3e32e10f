use super::{resolve_distributor, stamp_document, stamp_original_id};
use crate::error::Result;
use crate::pipeline::{ContentKind, KindStrategy, MigrationRequest, MigrationRun};
use async_trait::async_trait;
use content::{generate_id, scan, ContentDocument, EntityKind};
use platform_client::IngestRequest;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Photo-service fields that are not valid ANS; hidden during validation
const PARKED_FIELDS: [&str; 3] = ["usage_instructions", "photographer", "creditIPTC"];

/// Fields the image validator rejects outright
const DROPPED_FIELDS: [&str; 4] = ["/auth", "/source/edit_url", "/imageId", "/ingestImageToAnglerfish"];

pub struct ImageStrategy;

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

impl ImageStrategy {
    /// Move photo-service fields under `additional_properties`
    fn park_fields(run: &mut MigrationRun<'_>) {
        for field in PARKED_FIELDS {
            let Some(value) = run.document.remove(&format!("/{}", field)) else {
                continue;
            };
            if is_truthy(&value) {
                run.document
                    .set(&format!("/additional_properties/{}", field), value.clone());
                run.parked.insert(field.to_string(), value);
            }
        }
    }
}

#[async_trait]
impl KindStrategy for ImageStrategy {
    fn kind(&self) -> ContentKind {
        ContentKind::Image
    }

    async fn fetch(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        if run.request.variant.portability.regenerates(EntityKind::Image) {
            run.ingest_id = generate_id(&run.source_id, &run.request.destination.tenant);
        }
        let photo = run
            .collaborators
            .store
            .photo(&run.request.source, &run.source_id)
            .await
            .map_err(|e| run.fetch_error(ContentKind::Image, e))?;
        info!(id = %run.source_id, ingest_id = %run.ingest_id, "Fetched image");
        run.document = ContentDocument::new(photo);
        Ok(())
    }

    async fn transform(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        let request = run.request;

        let ingest_id = run.ingest_id.clone();
        run.document.set_id(&ingest_id);
        stamp_document(run, Some(&request.versions.story));
        run.document.remove("/additional_properties/version");
        run.document.remove("/additional_properties/galleries");
        stamp_original_id(run);
        for pointer in DROPPED_FIELDS {
            run.document.remove(pointer);
        }
        Self::park_fields(run);

        let authors = scan(&run.document, EntityKind::Author);
        run.references.authors = Some(authors.into_iter().collect());
        resolve_distributor(run).await;
        Ok(())
    }

    fn schema_version(&self, request: &MigrationRequest) -> Option<String> {
        Some(request.versions.story.clone())
    }

    fn after_validation(&self, run: &mut MigrationRun<'_>) {
        let parked = std::mem::take(&mut run.parked);
        for (field, value) in parked {
            run.document
                .remove(&format!("/additional_properties/{}", field));
            run.document.set(&format!("/{}", field), value);
        }
        debug!(id = %run.ingest_id, "Restored photo-service fields");
    }

    async fn post(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        let ingest = IngestRequest::new(
            &run.ingest_id,
            ContentKind::Image.as_str(),
            run.document.as_value().clone(),
            json!({}),
        );
        run.collaborators
            .publisher
            .ingest(&run.request.destination, &ingest)
            .await
            .map_err(|e| run.post_error(ContentKind::Image, e))?;
        Ok(())
    }
}
