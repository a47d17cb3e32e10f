use super::is_blank;
use crate::error::{MigrationError, Result};
use crate::pipeline::{ContentKind, KindStrategy, MigrationRequest, MigrationRun};
use async_trait::async_trait;
use content::ContentDocument;
use tracing::{debug, info};

/// Authors are copied verbatim through the author service
pub struct AuthorStrategy;

#[async_trait]
impl KindStrategy for AuthorStrategy {
    fn kind(&self) -> ContentKind {
        ContentKind::Author
    }

    async fn fetch(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        let store = run.collaborators.store.as_ref();
        let destination = &run.request.destination;

        match store.author(destination, &run.source_id).await {
            Ok(existing) if !is_blank(&existing) => {
                return Err(MigrationError::AlreadyExists {
                    kind: ContentKind::Author.to_string(),
                    id: run.source_id.clone(),
                    tenant: destination.tenant.clone(),
                });
            }
            Ok(_) => {}
            Err(e) => debug!(id = %run.source_id, error = %e, "Author not found in destination"),
        }

        let author = store
            .author(&run.request.source, &run.source_id)
            .await
            .map_err(|e| run.fetch_error(ContentKind::Author, e))?;
        info!(id = %run.source_id, "Fetched author");
        run.document = ContentDocument::new(author);
        Ok(())
    }

    async fn transform(&self, _run: &mut MigrationRun<'_>) -> Result<()> {
        Ok(())
    }

    /// The author service has no schema to validate against
    fn schema_version(&self, _request: &MigrationRequest) -> Option<String> {
        None
    }

    async fn post(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        run.collaborators
            .publisher
            .create_author(&run.request.destination, run.document.as_value())
            .await
            .map_err(|e| run.post_error(ContentKind::Author, e))?;
        Ok(())
    }
}
