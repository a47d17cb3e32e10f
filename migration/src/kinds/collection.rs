use super::destination_website;
use crate::error::{MigrationError, Result};
use crate::pipeline::{ContentKind, KindStrategy, MigrationRequest, MigrationRun, Target};
use async_trait::async_trait;
use content::ContentDocument;
use serde_json::{json, Value};
use tracing::info;

/// Collections are recreated through the collections service; their stories are not moved
pub struct CollectionStrategy;

#[async_trait]
impl KindStrategy for CollectionStrategy {
    fn kind(&self) -> ContentKind {
        ContentKind::Collection
    }

    async fn fetch(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        let collection = run
            .collaborators
            .store
            .collection(&run.request.source, &run.source_id)
            .await
            .map_err(|e| run.fetch_error(ContentKind::Collection, e))?;
        info!(id = %run.source_id, "Fetched collection");
        run.document = ContentDocument::new(collection);
        Ok(())
    }

    async fn transform(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        for field in ["/id", "/published_revision", "/current_revision"] {
            run.document.remove(field);
        }

        let website = match run.request.variant.target {
            Target::Production => run.request.destination_website()?.to_string(),
            Target::Sandbox => destination_website(run),
        };
        run.document.set("/canonical_website", json!(website));
        run.document.set("/document/canonical_website", json!(website));

        let stories: Vec<String> = run
            .document
            .get("/document/content_elements")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|element| element.pointer("/referent/id").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        if stories.is_empty() {
            return Err(MigrationError::NothingToMigrate {
                kind: ContentKind::Collection.to_string(),
                id: run.source_id.clone(),
                tenant: run.request.source.tenant.clone(),
                items: "stories".to_string(),
            });
        }
        run.references.stories = Some(stories);
        Ok(())
    }

    fn schema_version(&self, _request: &MigrationRequest) -> Option<String> {
        None
    }

    async fn post(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        let created = run
            .collaborators
            .publisher
            .create_collection(&run.request.destination, run.document.as_value())
            .await
            .map_err(|e| run.post_error(ContentKind::Collection, e))?;
        let new_id = created.pointer("/data/id").and_then(Value::as_str).map(str::to_string);
        info!(id = %run.source_id, new_id = ?new_id, "Collection created");
        run.references.created_id = new_id;
        Ok(())
    }
}
