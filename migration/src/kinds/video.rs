use super::{is_blank, resolve_distributor, resolve_geo_restrictions, stamp_document};
use crate::error::{MigrationError, Result};
use crate::pipeline::{ContentKind, KindStrategy, MigrationRequest, MigrationRun, Target};
use async_trait::async_trait;
use content::{normalize_taxonomy, rewrite_websites, transform_embedded_taxonomy, WebsitesLayout};
use platform_client::{IngestRequest, PlatformError};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Videos: published video documents with embedded taxonomy
pub struct VideoStrategy;

impl VideoStrategy {
    /// A thumbnail clipped from the video is re-imported from its url
    fn rebuild_promo(run: &mut MigrationRun<'_>) {
        let doc = &mut run.document;
        if let Some(key) = doc
            .get_str("/additional_properties/anglerfisharc_id")
            .map(str::to_string)
        {
            if let Some(properties) = doc.object_mut("/additional_properties") {
                properties.remove(&key);
                properties.remove("anglerfisharc_id");
            }
        }

        match doc.get_str("/promo_image/url").map(str::to_string) {
            Some(url) if !url.is_empty() => {
                let version = run.request.versions.video.clone();
                doc.set(
                    "/promo_items",
                    json!({ "basic": { "type": "image", "url": url, "version": version } }),
                );
            }
            _ => {
                doc.remove("/promo_items");
            }
        }
        doc.remove("/promo_image");
    }

    /// Sandbox copies stay on their websites; only the taxonomy shape changes
    fn sandbox_taxonomy(run: &mut MigrationRun<'_>) {
        let doc = &mut run.document;
        normalize_taxonomy(doc);
        if doc.get("/taxonomy/primary_section").is_some_and(Value::is_object) {
            doc.set(
                "/taxonomy/primary_section/referent/referent_properties/additional_properties/primary",
                json!(true),
            );
        }
        doc.remove("/taxonomy/primary_site");
        doc.remove("/taxonomy/sites");
        if let Some(websites) = doc.object_mut("/websites") {
            for website in websites.values_mut().filter_map(Value::as_object_mut) {
                website.remove("website_section");
            }
        }
    }
}

#[async_trait]
impl KindStrategy for VideoStrategy {
    fn kind(&self) -> ContentKind {
        ContentKind::Video
    }

    async fn fetch(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        let store = run.collaborators.store.as_ref();
        let id = run.source_id.clone();

        if !run.request.dry_run {
            match store.video(&run.request.destination, &id).await {
                Ok(existing) if !is_blank(&existing) => {
                    return Err(MigrationError::AlreadyExists {
                        kind: ContentKind::Video.to_string(),
                        id,
                        tenant: run.request.destination.tenant.clone(),
                    });
                }
                Ok(_) | Err(PlatformError::NotFound(_)) => {}
                Err(e) => debug!(id = %id, error = %e, "Destination precheck failed, continuing"),
            }
        }

        let video = store
            .video(&run.request.source, &id)
            .await
            .map_err(|e| run.fetch_error(ContentKind::Video, e))?;
        info!(id = %id, "Fetched video");
        run.document = content::ContentDocument::new(video);
        Ok(())
    }

    async fn transform(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        let request = run.request;
        let id = run.source_id.clone();

        run.document.set_id(&id);
        stamp_document(run, Some(&request.versions.video));
        run.document.remove("/embed_html");
        run.document.remove("/source/edit_url");

        match request.variant.target {
            Target::Production => {
                let target = request.circulation_target()?;
                let audit = transform_embedded_taxonomy(&mut run.document, &target, true)?;
                rewrite_websites(&mut run.document, &target.website, WebsitesLayout::KeepCanonicalUrl);
                run.references.circulation = Some(audit);
            }
            Target::Sandbox => Self::sandbox_taxonomy(run),
        }

        Self::rebuild_promo(run);

        if resolve_distributor(run).await {
            if let Some(credits) = run.document.object_mut("/credits") {
                credits.remove("affiliation");
            }
        }
        resolve_geo_restrictions(run).await;

        let related: Vec<Value> = run
            .document
            .get("/related_content/basic")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(|item| {
                json!({
                    "id": item.get("_id").cloned().unwrap_or(Value::Null),
                    "type": item.pointer("/referent/type").cloned().unwrap_or(Value::Null),
                })
            })
            .collect();
        if !related.is_empty() {
            run.references.related_content = Some(related);
        }
        Ok(())
    }

    fn schema_version(&self, request: &MigrationRequest) -> Option<String> {
        Some(request.versions.video.clone())
    }

    async fn post(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        let ingest = IngestRequest::new(
            &run.ingest_id,
            ContentKind::Video.as_str(),
            run.document.as_value().clone(),
            json!({ "video": { "transcoding": false, "useLastUpdated": true } }),
        );
        run.collaborators
            .publisher
            .ingest(&run.request.destination, &ingest)
            .await
            .map_err(|e| run.post_error(ContentKind::Video, e))?;
        Ok(())
    }
}
