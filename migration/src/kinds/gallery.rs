use super::{
    destination_website, image_entries, image_reference, is_blank, recreate_redirects, resolve_distributor,
    stamp_document, stamp_original_id, strip_author_versions,
};
use crate::error::{MigrationError, Result};
use crate::pipeline::{ContentKind, KindStrategy, MigrationRequest, MigrationRun, Target};
use crate::report::RedirectsReport;
use async_trait::async_trait;
use content::{
    generate_id, rewrite_websites, transform_embedded_taxonomy, ContentDocument, EntityKind, IdentifierMapping,
    WebsitesLayout,
};
use platform_client::IngestRequest;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Galleries: a photo-service document whose elements are images
pub struct GalleryStrategy;

fn image_id(element: &Value) -> Option<&str> {
    let kind = element
        .pointer("/referent/type")
        .or_else(|| element.get("type"))
        .and_then(Value::as_str)?;
    if kind != EntityKind::Image.referent_type() {
        return None;
    }
    element
        .pointer("/referent/id")
        .or_else(|| element.get("_id"))
        .and_then(Value::as_str)
}

impl GalleryStrategy {
    async fn ensure_absent(run: &MigrationRun<'_>, id: &str) -> Result<()> {
        let destination = &run.request.destination;
        match run.collaborators.store.gallery(destination, id).await {
            Ok(existing) if !is_blank(&existing) => Err(MigrationError::AlreadyExists {
                kind: ContentKind::Gallery.to_string(),
                id: id.to_string(),
                tenant: destination.tenant.clone(),
            }),
            Ok(_) => Ok(()),
            Err(e) => {
                debug!(id, error = %e, "Gallery not found in destination");
                Ok(())
            }
        }
    }

    /// Turn every image element, and the basic promo item, into an image reference
    fn rewrite_images(run: &mut MigrationRun<'_>) {
        let mut ids: Vec<String> = run
            .document
            .get("/content_elements")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(image_id)
            .map(str::to_string)
            .collect();
        let promo = run
            .document
            .get("/promo_items/basic")
            .and_then(image_id)
            .map(str::to_string);
        if let Some(promo) = &promo {
            if !ids.contains(promo) {
                ids.push(promo.clone());
            }
        }

        let mapping = if run.request.variant.portability.regenerates(EntityKind::Image) {
            IdentifierMapping::regenerate(EntityKind::Image, &ids, &run.request.destination.tenant)
        } else {
            IdentifierMapping::new(EntityKind::Image)
        };

        if let Some(elements) = run.document.array_mut("/content_elements") {
            for element in elements.iter_mut() {
                if let Some(old_id) = image_id(element).map(str::to_string) {
                    *element = image_reference(&old_id, &mapping);
                }
            }
        }
        if let Some(old_id) = promo {
            run.document
                .set("/promo_items/basic", image_reference(&old_id, &mapping));
        }

        let entries = image_entries(run, &mapping, &ids);
        run.references.images = entries;
    }
}

#[async_trait]
impl KindStrategy for GalleryStrategy {
    fn kind(&self) -> ContentKind {
        ContentKind::Gallery
    }

    async fn fetch(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        if run.request.variant.portability.regenerates(EntityKind::Gallery) {
            run.ingest_id = generate_id(&run.source_id, &run.request.destination.tenant);
        }

        Self::ensure_absent(run, &run.source_id).await?;
        if run.ingest_id != run.source_id {
            Self::ensure_absent(run, &run.ingest_id).await?;
        }

        let gallery = run
            .collaborators
            .store
            .gallery(&run.request.source, &run.source_id)
            .await
            .map_err(|e| run.fetch_error(ContentKind::Gallery, e))?;
        info!(id = %run.source_id, ingest_id = %run.ingest_id, "Fetched gallery");
        run.document = ContentDocument::new(gallery);
        Ok(())
    }

    async fn transform(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        let request = run.request;

        let ingest_id = run.ingest_id.clone();
        run.document.set_id(&ingest_id);
        stamp_document(run, Some(&request.versions.story));
        run.document.remove("/additional_properties/version");
        stamp_original_id(run);

        run.references.authors = Some(strip_author_versions(&mut run.document));
        Self::rewrite_images(run);
        resolve_distributor(run).await;

        if request.variant.target == Target::Production {
            let target = request.circulation_target()?;
            let audit = transform_embedded_taxonomy(&mut run.document, &target, false)?;
            rewrite_websites(&mut run.document, &target.website, WebsitesLayout::MoveCanonicalUrl);
            run.references.circulation = Some(audit);
        }
        Ok(())
    }

    fn schema_version(&self, request: &MigrationRequest) -> Option<String> {
        Some(request.versions.story.clone())
    }

    async fn post(&self, run: &mut MigrationRun<'_>) -> Result<()> {
        let ingest = IngestRequest::new(
            &run.ingest_id,
            ContentKind::Gallery.as_str(),
            run.document.as_value().clone(),
            json!({}),
        );
        run.collaborators
            .publisher
            .ingest(&run.request.destination, &ingest)
            .await
            .map_err(|e| run.post_error(ContentKind::Gallery, e))?;
        Ok(())
    }

    /// Gallery redirects cannot be looked up, so only the ones given are recreated
    async fn side_effects(&self, run: &mut MigrationRun<'_>) {
        if run.request.redirect_urls.is_empty() {
            return;
        }
        let website = destination_website(run);
        let outcomes = recreate_redirects(run, &website, &run.request.redirect_urls, &run.ingest_id).await;
        run.references.redirects = Some(RedirectsReport::Outcomes(outcomes));
    }
}
