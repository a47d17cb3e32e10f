//! The single-object migration pipeline
//!
//! Every content kind goes through the same linear sequence:
//!
//! ```text
//! FETCHED -> TRANSFORMED -> VALIDATED -> POSTED -> SIDE_EFFECTS_APPLIED
//! ```
//!
//! A failed fetch or validation aborts the run; a failed post marks it as
//! failed. A dry run stops after validation. What happens inside each stage is
//! decided by the [`KindStrategy`] of the content kind.

use crate::error::{MigrationError, Result};
use crate::kinds;
use crate::report::{MigrationReport, ReferenceReport, ReportHeader};
use crate::resolver::EntityResolver;
use crate::scanner::ReferenceScanner;
use crate::validation::{classify, ExactMessagesPolicy, FirstTimeCreationPolicy};
use async_trait::async_trait;
use content::{CirculationPolicy, CirculationTarget, ContentDocument, PortabilityTable};
use platform_client::{
    ContentStore, PlatformError, Publisher, SchemaValidator, SettingsService, TenantContext,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// The kinds of object a single migration can move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Story,
    Video,
    Gallery,
    Image,
    Author,
    Collection,
    Lightbox,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Story => "story",
            ContentKind::Video => "video",
            ContentKind::Gallery => "gallery",
            ContentKind::Image => "image",
            ContentKind::Author => "author",
            ContentKind::Collection => "collection",
            ContentKind::Lightbox => "lightbox",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Fetched,
    Transformed,
    Validated,
    Posted,
    SideEffectsApplied,
    Aborted,
    Failed,
}

impl Stage {
    /// Terminal stage of a run that stopped with `err`
    pub fn of_error(err: &MigrationError) -> Stage {
        match err {
            MigrationError::Post { .. } => Stage::Failed,
            _ => Stage::Aborted,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetched => "FETCHED",
            Stage::Transformed => "TRANSFORMED",
            Stage::Validated => "VALIDATED",
            Stage::Posted => "POSTED",
            Stage::SideEffectsApplied => "SIDE_EFFECTS_APPLIED",
            Stage::Aborted => "ABORTED",
            Stage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Where the migrated object goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Another organization's production environment
    Production,
    /// The sandbox environment of the source organization
    Sandbox,
}

/// Which steps apply when moving content to one kind of destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationVariant {
    pub target: Target,
    pub portability: PortabilityTable,
    /// Rewrite circulation and taxonomy for the destination website
    pub transform_circulation: bool,
}

impl MigrationVariant {
    pub fn production() -> Self {
        Self {
            target: Target::Production,
            portability: PortabilityTable::cross_tenant(),
            transform_circulation: true,
        }
    }

    pub fn sandbox() -> Self {
        Self {
            target: Target::Sandbox,
            portability: PortabilityTable::same_tenant(),
            transform_circulation: false,
        }
    }

    pub fn for_target(target: Target) -> Self {
        match target {
            Target::Production => Self::production(),
            Target::Sandbox => Self::sandbox(),
        }
    }

    /// First entry of every mapping in a report
    pub fn report_header(&self, source: &TenantContext, destination: &TenantContext) -> ReportHeader {
        match self.target {
            Target::Production => ReportHeader::new(&source.tenant, &destination.tenant),
            Target::Sandbox => ReportHeader::new("production", "sandbox"),
        }
    }

    /// Provenance note stamped into `additional_properties.ingestionMethod`
    pub fn ingestion_method(&self, source: &str, destination: &str) -> String {
        match self.target {
            Target::Production => format!("moved orgs from {} to {}", source, destination),
            Target::Sandbox => format!("copied from production {} to {}", source, destination),
        }
    }
}

/// Schema versions documents are stamped with and validated against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersions {
    pub story: String,
    pub video: String,
}

impl Default for SchemaVersions {
    fn default() -> Self {
        Self {
            story: "0.10.9".to_string(),
            video: "0.8.0".to_string(),
        }
    }
}

/// Everything one invocation asks for
#[derive(Debug, Clone)]
pub struct MigrationRequest {
    pub source: TenantContext,
    pub destination: TenantContext,
    pub website: Option<String>,
    pub section: Option<String>,
    pub dry_run: bool,
    /// Redirect URLs to recreate for kinds whose redirects cannot be looked up
    pub redirect_urls: Vec<String>,
    pub variant: MigrationVariant,
    pub versions: SchemaVersions,
}

impl MigrationRequest {
    pub fn new(source: TenantContext, destination: TenantContext, variant: MigrationVariant) -> Self {
        Self {
            source,
            destination,
            website: None,
            section: None,
            dry_run: false,
            redirect_urls: Vec::new(),
            variant,
            versions: SchemaVersions::default(),
        }
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn with_section(mut self, section: Option<String>) -> Self {
        self.section = section;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_redirect_urls(mut self, urls: Vec<String>) -> Self {
        self.redirect_urls = urls;
        self
    }

    pub fn with_versions(mut self, versions: SchemaVersions) -> Self {
        self.versions = versions;
        self
    }

    /// The destination website; required whenever circulation is rewritten
    pub fn destination_website(&self) -> Result<&str> {
        self.website
            .as_deref()
            .filter(|website| !website.trim().is_empty())
            .ok_or_else(|| MigrationError::Request("a destination website is required".to_string()))
    }

    pub fn circulation_target(&self) -> Result<CirculationTarget> {
        Ok(CirculationTarget {
            source_tenant: self.source.tenant.clone(),
            destination_tenant: self.destination.tenant.clone(),
            website: self.destination_website()?.to_string(),
            policy: CirculationPolicy::from_section(self.section.as_deref()),
        })
    }

    pub fn header(&self) -> ReportHeader {
        self.variant.report_header(&self.source, &self.destination)
    }

    pub fn ingestion_method(&self) -> String {
        self.variant
            .ingestion_method(&self.source.tenant, &self.destination.tenant)
    }

    pub fn resolver<'a>(&'a self, settings: &'a dyn SettingsService) -> EntityResolver<'a> {
        EntityResolver::new(settings, &self.source, &self.destination, self.dry_run)
    }

    pub fn scanner<'a>(&'a self, store: &'a dyn ContentStore) -> ReferenceScanner<'a> {
        ReferenceScanner::new(store, &self.source)
    }
}

/// The external services a migration talks to
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ContentStore>,
    pub settings: Arc<dyn SettingsService>,
    pub validator: Arc<dyn SchemaValidator>,
    pub publisher: Arc<dyn Publisher>,
    pub policy: Arc<dyn FirstTimeCreationPolicy>,
}

impl Collaborators {
    pub fn new(
        store: Arc<dyn ContentStore>,
        settings: Arc<dyn SettingsService>,
        validator: Arc<dyn SchemaValidator>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            store,
            settings,
            validator,
            publisher,
            policy: Arc::new(ExactMessagesPolicy::default()),
        }
    }

    /// Use one value for all four services
    pub fn from_platform<P>(platform: Arc<P>) -> Self
    where
        P: ContentStore + SettingsService + SchemaValidator + Publisher + 'static,
    {
        Self::new(platform.clone(), platform.clone(), platform.clone(), platform)
    }

    pub fn with_policy(mut self, policy: Arc<dyn FirstTimeCreationPolicy>) -> Self {
        self.policy = policy;
        self
    }
}

/// Working state of one run, handed from stage to stage
pub struct MigrationRun<'a> {
    pub request: &'a MigrationRequest,
    pub collaborators: &'a Collaborators,
    /// Id of the object in the source tenant
    pub source_id: String,
    /// Id the object is ingested under in the destination
    pub ingest_id: String,
    pub document: ContentDocument,
    pub circulations: Option<Value>,
    pub references: ReferenceReport,
    /// Website the object is published on in the source tenant
    pub source_website: Option<String>,
    /// Fields moved aside for validation and restored afterwards
    pub parked: Map<String, Value>,
}

impl<'a> MigrationRun<'a> {
    pub fn new(request: &'a MigrationRequest, collaborators: &'a Collaborators, id: &str) -> Self {
        Self {
            request,
            collaborators,
            source_id: id.to_string(),
            ingest_id: id.to_string(),
            document: ContentDocument::default(),
            circulations: None,
            references: ReferenceReport::default(),
            source_website: None,
            parked: Map::new(),
        }
    }

    /// A fetch failure for this run's object
    pub fn fetch_error(&self, kind: ContentKind, err: PlatformError) -> MigrationError {
        let reason = match err {
            PlatformError::NotFound(_) if kind == ContentKind::Video => "is not a published video".to_string(),
            other => other.to_string(),
        };
        MigrationError::Fetch {
            kind: kind.to_string(),
            id: self.source_id.clone(),
            tenant: self.request.source.tenant.clone(),
            reason,
        }
    }

    /// A post failure for this run's object
    pub fn post_error(&self, kind: ContentKind, err: PlatformError) -> MigrationError {
        MigrationError::Post {
            kind: kind.to_string(),
            id: self.ingest_id.clone(),
            reason: err.to_string(),
        }
    }

    fn into_report(self, kind: ContentKind, stages: Vec<Stage>) -> MigrationReport {
        MigrationReport {
            kind,
            id: self.source_id,
            dry_run: self.request.dry_run,
            stages,
            references: self.references,
            document: self.document.into_value(),
            circulation: self.circulations,
        }
    }
}

/// What one content kind does inside each pipeline stage
#[async_trait]
pub trait KindStrategy: Send + Sync {
    fn kind(&self) -> ContentKind;

    /// Prechecks and source reads; fills `run.document`
    async fn fetch(&self, run: &mut MigrationRun<'_>) -> Result<()>;

    /// Reshape the document for the destination
    async fn transform(&self, run: &mut MigrationRun<'_>) -> Result<()>;

    /// Schema version to validate against; `None` skips validation
    fn schema_version(&self, request: &MigrationRequest) -> Option<String>;

    /// Undo temporary changes made only to pass validation
    fn after_validation(&self, _run: &mut MigrationRun<'_>) {}

    async fn post(&self, run: &mut MigrationRun<'_>) -> Result<()>;

    /// Follow-up writes; failures are recorded in the report, never raised
    async fn side_effects(&self, _run: &mut MigrationRun<'_>) {}
}

/// Runs migrations against one set of collaborators
pub struct Pipeline {
    collaborators: Collaborators,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Migrate one object of `kind`
    pub async fn migrate(&self, kind: ContentKind, request: &MigrationRequest, id: &str) -> Result<MigrationReport> {
        let strategy = kinds::strategy_for(kind);
        self.run(strategy.as_ref(), request, id).await
    }

    pub async fn run(
        &self,
        strategy: &dyn KindStrategy,
        request: &MigrationRequest,
        id: &str,
    ) -> Result<MigrationReport> {
        let kind = strategy.kind();
        info!(kind = %kind, id, source = %request.source.tenant, destination = %request.destination.tenant, dry_run = request.dry_run, "Starting migration");
        if request.dry_run {
            info!("Dry run: nothing will be created in the destination");
        }

        let mut run = MigrationRun::new(request, &self.collaborators, id);
        let result = self.stages(strategy, &mut run).await;
        match result {
            Ok(stages) => {
                info!(kind = %kind, id, stage = %stages.last().copied().unwrap_or(Stage::Fetched), "Migration finished");
                Ok(run.into_report(kind, stages))
            }
            Err(e) => {
                warn!(kind = %kind, id, stage = %Stage::of_error(&e), error = %e, "Migration stopped");
                Err(e)
            }
        }
    }

    async fn stages(&self, strategy: &dyn KindStrategy, run: &mut MigrationRun<'_>) -> Result<Vec<Stage>> {
        let mut stages = Vec::new();

        strategy.fetch(run).await?;
        stages.push(Stage::Fetched);

        strategy.transform(run).await?;
        stages.push(Stage::Transformed);

        if let Some(version) = strategy.schema_version(run.request) {
            let outcome = self
                .collaborators
                .validator
                .validate(&run.request.destination, &version, run.document.as_value())
                .await?;
            classify(&outcome, self.collaborators.policy.as_ref())?;
            info!(kind = %strategy.kind(), id = %run.source_id, version = %version, "Document is valid");
            strategy.after_validation(run);
            stages.push(Stage::Validated);
        }

        if run.request.dry_run {
            return Ok(stages);
        }

        strategy.post(run).await?;
        info!(kind = %strategy.kind(), id = %run.ingest_id, tenant = %run.request.destination.tenant, "Posted to destination");
        stages.push(Stage::Posted);

        strategy.side_effects(run).await;
        stages.push(Stage::SideEffectsApplied);

        Ok(stages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakePlatform};
    use crate::validation::FIRST_TIME_CREATION_MESSAGES;
    use platform_client::{Credential, ValidationOutcome};
    use serde_json::json;

    fn request(dry_run: bool) -> MigrationRequest {
        MigrationRequest::new(
            TenantContext::new("from1", Credential::new("s")),
            TenantContext::new("to1", Credential::new("t")),
            MigrationVariant::production(),
        )
        .with_website("site")
        .with_dry_run(dry_run)
    }

    fn platform_with_image() -> Arc<FakePlatform> {
        let platform = Arc::new(FakePlatform::new());
        platform.add_photo("from1", "img1", json!({"_id": "img1", "type": "image", "additional_properties": {}}));
        platform
    }

    #[tokio::test]
    async fn test_stages_in_order() {
        let platform = platform_with_image();
        let pipeline = Pipeline::new(Collaborators::from_platform(platform.clone()));

        let report = pipeline.migrate(ContentKind::Image, &request(false), "img1").await.unwrap();
        assert_eq!(
            report.stages,
            vec![Stage::Fetched, Stage::Transformed, Stage::Validated, Stage::Posted, Stage::SideEffectsApplied]
        );
        assert_eq!(report.final_stage(), Some(Stage::SideEffectsApplied));
    }

    #[tokio::test]
    async fn test_dry_run_stops_after_validation() {
        let platform = platform_with_image();
        let pipeline = Pipeline::new(Collaborators::from_platform(platform.clone()));

        let report = pipeline.migrate(ContentKind::Image, &request(true), "img1").await.unwrap();
        assert_eq!(report.final_stage(), Some(Stage::Validated));
        assert!(platform.ingests().is_empty());
    }

    #[tokio::test]
    async fn test_missing_source_aborts_before_validation() {
        let platform = Arc::new(FakePlatform::new());
        let pipeline = Pipeline::new(Collaborators::from_platform(platform.clone()));

        let err = pipeline.migrate(ContentKind::Image, &request(false), "nope").await.unwrap_err();
        assert!(matches!(err, MigrationError::Fetch { .. }));
        assert_eq!(Stage::of_error(&err), Stage::Aborted);
        assert!(!platform.calls().iter().any(|call| matches!(call, Call::Validate { .. })));
    }

    #[tokio::test]
    async fn test_first_time_creation_is_reported_distinctly() {
        let platform = platform_with_image();
        platform.queue_validation(400, &FIRST_TIME_CREATION_MESSAGES);
        let pipeline = Pipeline::new(Collaborators::from_platform(platform.clone()));

        let err = pipeline.migrate(ContentKind::Image, &request(false), "img1").await.unwrap_err();
        assert!(matches!(err, MigrationError::FirstTimeEntityCreation { .. }));
        assert!(platform.ingests().is_empty());
    }

    #[tokio::test]
    async fn test_other_validation_failure() {
        let platform = platform_with_image();
        platform.queue_validation(400, &["should have required property 'type'"]);
        let pipeline = Pipeline::new(Collaborators::from_platform(platform.clone()));

        let err = pipeline.migrate(ContentKind::Image, &request(false), "img1").await.unwrap_err();
        assert!(matches!(err, MigrationError::Validation { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_injected_policy_is_used() {
        struct NeverFirstTime;
        impl FirstTimeCreationPolicy for NeverFirstTime {
            fn matches(&self, _outcome: &ValidationOutcome) -> bool {
                false
            }
        }

        let platform = platform_with_image();
        platform.queue_validation(400, &FIRST_TIME_CREATION_MESSAGES);
        let collaborators = Collaborators::from_platform(platform.clone()).with_policy(Arc::new(NeverFirstTime));

        let err = Pipeline::new(collaborators)
            .migrate(ContentKind::Image, &request(false), "img1")
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Validation { .. }));
    }

    #[test]
    fn test_missing_website_is_a_request_error() {
        let request = MigrationRequest::new(
            TenantContext::new("from1", Credential::new("s")),
            TenantContext::new("to1", Credential::new("t")),
            MigrationVariant::production(),
        );
        assert!(matches!(request.destination_website(), Err(MigrationError::Request(_))));
        assert!(request.clone().with_website("  ").destination_website().is_err());
    }

    #[test]
    fn test_variant_headers() {
        let request = request(false);
        assert_eq!(request.header(), ReportHeader::new("from1", "to1"));
        assert_eq!(request.ingestion_method(), "moved orgs from from1 to to1");

        let sandbox = MigrationVariant::sandbox();
        assert_eq!(
            sandbox.report_header(&request.source, &request.destination),
            ReportHeader::new("production", "sandbox")
        );
        assert!(!sandbox.portability.regenerates(content::EntityKind::Image));
    }
}
