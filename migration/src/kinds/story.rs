use super::{recreate_redirects, resolve_distributor, stamp_document, strip_author_versions};
use crate::error::{MigrationError, Result};
use crate::pipeline::{ContentKind, KindStrategy, MigrationRequest, MigrationRun, Target};
use crate::report::RedirectsReport;
use crate::scanner::PhotoMappings;
use async_trait::async_trait;
use content::{
    rewrite_all, scan, scan_references, transform_story_circulation, ContentDocument, EntityKind, Location,
};
use platform_client::IngestRequest;
use serde_json::{json, Value};
use tracing::{info, warn};

const REDIRECTS_NOT_EVALUATED: &str = "Story Redirects will not be evaluated during a dry run";

/// Stories: draft revision plus a separate circulation array
pub struct StoryStrategy;

#[async_trait]
impl KindStrategy for StoryStrategy {
    fn kind(&self) -> ContentKind {
        ContentKind::Story
    }

    async fn fetch(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        let store = run.collaborators.store.as_ref();
        let source = &run.request.source;
        let id = run.source_id.clone();

        let revision = store
            .story_revision_id(source, &id)
            .await
            .map_err(|e| run.fetch_error(ContentKind::Story, e))?;
        let ans = store
            .story(source, &id, &revision)
            .await
            .map_err(|e| run.fetch_error(ContentKind::Story, e))?;
        let circulations = store
            .story_circulations(source, &id)
            .await
            .map_err(|e| run.fetch_error(ContentKind::Story, e))?;

        if super::is_blank(&ans) {
            return Err(MigrationError::Fetch {
                kind: ContentKind::Story.to_string(),
                id,
                tenant: source.tenant.clone(),
                reason: format!("revision {} holds no document", revision),
            });
        }
        info!(id = %id, revision = %revision, "Fetched story");

        run.document = ContentDocument::new(ans);
        run.circulations = Some(circulations);
        if run.request.dry_run {
            run.references.redirects = Some(RedirectsReport::NotEvaluated(REDIRECTS_NOT_EVALUATED.to_string()));
        }
        Ok(())
    }

    async fn transform(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        let request = run.request;
        let id = run.source_id.clone();

        run.document.set_id(&id);
        stamp_document(run, Some(&request.versions.story));
        run.document.remove("/revision");
        if request.variant.target == Target::Production {
            let website = request.destination_website()?;
            run.document.set("/canonical_website", json!(website));
        }

        resolve_distributor(run).await;

        let scanner = request.scanner(run.collaborators.store.as_ref());
        let photos = scanner.photo_references(&run.document).await;
        let mappings = PhotoMappings::build(&photos, &request.variant.portability, &request.destination.tenant);
        rewrite_all(&mut run.document, &mappings.all());
        let (images, galleries) = mappings.report(&photos, &request.header());
        run.references.images = images;
        run.references.galleries = galleries;

        let related: Vec<String> = scan_references(&run.document, EntityKind::Story)
            .into_iter()
            .filter(|reference| matches!(reference.location, Location::RelatedContent { .. }))
            .map(|reference| reference.id)
            .collect();
        run.references.related_stories = Some(related);
        run.references.authors = Some(strip_author_versions(&mut run.document));
        let videos = scan(&run.document, EntityKind::Video);
        if !videos.is_empty() {
            run.references.videos = Some(videos.into_iter().collect());
        }

        if request.variant.transform_circulation {
            let target = request.circulation_target()?;
            let circulations = run.circulations.get_or_insert(Value::Array(Vec::new()));
            let audit = transform_story_circulation(circulations, &id, &target)?;
            run.source_website = audit.source_website().map(str::to_string);
            run.references.circulation = Some(audit);
        } else {
            run.source_website = run.document.get_str("/canonical_website").map(str::to_string);
        }
        Ok(())
    }

    fn schema_version(&self, request: &MigrationRequest) -> Option<String> {
        Some(request.versions.story.clone())
    }

    async fn post(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        let ingest = IngestRequest::new(
            &run.ingest_id,
            ContentKind::Story.as_str(),
            run.document.as_value().clone(),
            json!({ "story": { "publish": true } }),
        )
        .with_circulations(run.circulations.clone().unwrap_or_else(|| json!([])));

        run.collaborators
            .publisher
            .ingest(&run.request.destination, &ingest)
            .await
            .map_err(|e| run.post_error(ContentKind::Story, e))?;
        Ok(())
    }

    async fn side_effects(&self, run: &mut MigrationRun<'_>) {
        let Some(source_website) = run.source_website.clone() else {
            warn!(id = %run.source_id, "Source website unknown, redirects not recreated");
            return;
        };
        let website = match run.request.variant.target {
            Target::Production => run.request.website.clone().unwrap_or_else(|| source_website.clone()),
            Target::Sandbox => source_website.clone(),
        };

        let urls = match run
            .collaborators
            .store
            .story_redirects(&run.request.source, &run.source_id, &source_website)
            .await
        {
            Ok(urls) => urls,
            Err(e) => {
                warn!(id = %run.source_id, error = %e, "Failed to read story redirects");
                Vec::new()
            }
        };

        let outcomes = recreate_redirects(run, &website, &urls, &run.source_id).await;
        run.references.redirects = Some(RedirectsReport::Outcomes(outcomes));
    }
}
