//! Sequential drivers that run many migrations from one listing
//!
//! A failing item is recorded in the [`BulkReport`] and the run moves on;
//! only a failure to read the listing itself stops a bulk run.

use crate::error::{MigrationError, Result};
use crate::kinds::redirect_failure;
use crate::pipeline::{Collaborators, ContentKind, MigrationRequest, Pipeline};
use crate::report::BulkReport;
use platform_client::{PageCursor, RedirectEntry};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

/// Marks redirect ids that were registered by hand rather than by a document
const VANITY_MARKER: &str = "vanity_redirect";

fn cap_reached(cap: Option<usize>, processed: usize) -> bool {
    cap.is_some_and(|cap| processed >= cap)
}

/// Migrate every author of the source tenant, up to `cap` of them
pub async fn migrate_authors(pipeline: &Pipeline, request: &MigrationRequest, cap: Option<usize>) -> Result<BulkReport> {
    let authors = pipeline
        .collaborators()
        .store
        .authors(&request.source)
        .await
        .map_err(|e| MigrationError::Fetch {
            kind: "author list".to_string(),
            id: "*".to_string(),
            tenant: request.source.tenant.clone(),
            reason: e.to_string(),
        })?;
    info!(tenant = %request.source.tenant, count = authors.len(), cap = ?cap, "Listed source authors");

    let mut report = BulkReport::default();
    for author in &authors {
        if cap_reached(cap, report.processed()) {
            break;
        }
        let Some(id) = author.get("_id").and_then(Value::as_str) else {
            warn!("Skipping author record without an _id");
            continue;
        };
        match pipeline.migrate(ContentKind::Author, request, id).await {
            Ok(migrated) => {
                let stage = migrated.final_stage().map(|stage| stage.to_string()).unwrap_or_default();
                report.push_success(id, stage);
            }
            Err(e) => report.push_failure(id, e.to_string()),
        }
    }
    Ok(report)
}

/// What a scanned redirect points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    Story,
    Video,
    Gallery,
}

impl fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RedirectTarget::Story => "story",
            RedirectTarget::Video => "video",
            RedirectTarget::Gallery => "gallery",
        };
        f.write_str(name)
    }
}

/// Parameters of a bulk redirect scan
#[derive(Debug, Clone, Default)]
pub struct RedirectScan {
    pub source_website: String,
    pub destination_website: String,
    /// URL substring that marks video redirects, such as `/video`
    pub video_marker: Option<String>,
    /// URL substring that marks gallery redirects
    pub gallery_marker: Option<String>,
    /// Most redirects to process; `None` scans them all
    pub cap: Option<usize>,
}

impl RedirectScan {
    /// Guess the redirect's object kind from its URL and id
    ///
    /// Redirect documents do not say what they point at. Markers are checked
    /// first; vanity redirects without a marker are assumed to be videos.
    pub fn classify(&self, entry: &RedirectEntry) -> RedirectTarget {
        let marked = |marker: &Option<String>| {
            marker
                .as_deref()
                .is_some_and(|marker| !marker.is_empty() && entry.redirect.contains(marker))
        };
        if marked(&self.video_marker) {
            RedirectTarget::Video
        } else if marked(&self.gallery_marker) {
            RedirectTarget::Gallery
        } else if entry.id.contains(VANITY_MARKER) {
            RedirectTarget::Video
        } else {
            RedirectTarget::Story
        }
    }
}

/// Document id of a story redirect: the part of its id before the first `_`
fn story_document_id(entry: &RedirectEntry) -> &str {
    entry.id.split('_').next().unwrap_or(&entry.id)
}

/// Recreate the story redirects of one source website in the destination
///
/// Video and gallery redirects are classified and listed but not created,
/// since their documents cannot be resolved from the redirect alone.
pub async fn migrate_redirects(
    collaborators: &Collaborators,
    request: &MigrationRequest,
    scan: &RedirectScan,
) -> Result<BulkReport> {
    let mut report = BulkReport::default();
    let mut cursor = PageCursor::Start;

    'pages: loop {
        let page = match collaborators
            .store
            .scan_redirects(&request.source, &scan.source_website, &cursor)
            .await
        {
            Ok(page) => page,
            Err(e) if cursor == PageCursor::Start => {
                return Err(MigrationError::Fetch {
                    kind: "redirect list".to_string(),
                    id: scan.source_website.clone(),
                    tenant: request.source.tenant.clone(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                warn!(cursor = ?cursor, error = %e, "Redirect scan stopped early");
                break;
            }
        };
        debug!(cursor = ?cursor, count = page.redirects.len(), "Scanned redirect page");
        if page.redirects.is_empty() {
            break;
        }

        for entry in &page.redirects {
            if cap_reached(scan.cap, report.processed()) {
                break 'pages;
            }
            let target = scan.classify(entry);
            if target != RedirectTarget::Story {
                report.push_success(&entry.id, format!("skipped {} redirect {}", target, entry.redirect));
                continue;
            }

            let document_id = story_document_id(entry);
            if request.dry_run {
                report.push_success(&entry.id, format!("dry run: story redirect {} not created", entry.redirect));
                continue;
            }
            match collaborators
                .publisher
                .create_redirect(&request.destination, &scan.destination_website, &entry.redirect, document_id)
                .await
            {
                Ok(_) => {
                    info!(url = %entry.redirect, document_id, "Story redirect created");
                    report.push_success(&entry.id, format!("created story redirect {}", entry.redirect));
                }
                Err(e) => {
                    let failure = redirect_failure(&entry.redirect, &e);
                    warn!(document_id, error = %failure, "Story redirect not created");
                    report.push_failure(&entry.id, failure.to_string());
                }
            }
        }

        match page.next {
            Some(next) => cursor = next,
            None => break,
        }
    }

    info!(processed = report.processed(), failures = report.failures(), "Redirect scan finished");
    Ok(report)
}
