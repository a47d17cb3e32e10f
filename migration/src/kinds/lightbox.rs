use super::image_entries;
use crate::error::{MigrationError, Result};
use crate::pipeline::{ContentKind, KindStrategy, MigrationRequest, MigrationRun};
use async_trait::async_trait;
use content::{ContentDocument, EntityKind, IdentifierMapping};
use serde_json::{json, Value};
use tracing::info;

/// Lightboxes: created empty, then filled with the destination photo ids
pub struct LightboxStrategy;

fn photo_ids(doc: &ContentDocument) -> Vec<String> {
    doc.get("/photos")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|photo| photo.get("_id").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl KindStrategy for LightboxStrategy {
    fn kind(&self) -> ContentKind {
        ContentKind::Lightbox
    }

    async fn fetch(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        let lightbox = run
            .collaborators
            .store
            .lightbox(&run.request.source, &run.source_id)
            .await
            .map_err(|e| run.fetch_error(ContentKind::Lightbox, e))?;
        info!(id = %run.source_id, "Fetched lightbox");
        run.document = ContentDocument::new(lightbox);
        Ok(())
    }

    async fn transform(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        run.document.remove("/id");
        run.document.remove("/created_date");

        let ids = photo_ids(&run.document);
        if ids.is_empty() {
            return Err(MigrationError::NothingToMigrate {
                kind: ContentKind::Lightbox.to_string(),
                id: run.source_id.clone(),
                tenant: run.request.source.tenant.clone(),
                items: "photos".to_string(),
            });
        }

        let mapping = if run.request.variant.portability.regenerates(EntityKind::Image) {
            IdentifierMapping::regenerate(EntityKind::Image, &ids, &run.request.destination.tenant)
        } else {
            IdentifierMapping::new(EntityKind::Image)
        };
        if let Some(photos) = run.document.array_mut("/photos") {
            for photo in photos.iter_mut() {
                let new_id = photo
                    .get("_id")
                    .and_then(Value::as_str)
                    .and_then(|id| mapping.get(id))
                    .map(str::to_string);
                if let Some(new_id) = new_id {
                    photo["_id"] = json!(new_id);
                }
            }
        }

        let entries = image_entries(run, &mapping, &ids);
        run.references.images = entries;
        Ok(())
    }

    fn schema_version(&self, _request: &MigrationRequest) -> Option<String> {
        None
    }

    async fn post(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        let destination = &run.request.destination;
        let publisher = run.collaborators.publisher.as_ref();

        let lightbox_id = publisher
            .create_lightbox(destination, run.document.as_value())
            .await
            .map_err(|e| run.post_error(ContentKind::Lightbox, e))?;
        info!(id = %run.source_id, new_id = %lightbox_id, "Lightbox created");

        let photos = photo_ids(&run.document);
        publisher
            .add_lightbox_photos(destination, &lightbox_id, &photos)
            .await
            .map_err(|e| run.post_error(ContentKind::Lightbox, e))?;
        run.references.created_id = Some(lightbox_id.clone());
        run.ingest_id = lightbox_id;
        Ok(())
    }
}
