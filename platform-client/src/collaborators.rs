//! The platform services a migration talks to
//!
//! Each trait is one external collaborator. Every call receives the
//! [`TenantContext`] it acts on, so source and destination credentials travel
//! explicitly with the request instead of living in shared state.

use crate::error::Result;
use crate::tenant::TenantContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Read access to content documents and their metadata
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Current draft revision id of a story
    async fn story_revision_id(&self, ctx: &TenantContext, id: &str) -> Result<String>;

    /// The document stored for one story revision
    async fn story(&self, ctx: &TenantContext, id: &str, revision: &str) -> Result<Value>;

    /// The circulation array of a story
    async fn story_circulations(&self, ctx: &TenantContext, id: &str) -> Result<Value>;

    /// URLs of the document redirects pointing at a story on one website
    async fn story_redirects(&self, ctx: &TenantContext, id: &str, website: &str) -> Result<Vec<String>>;

    /// A published video; `NotFound` when the uuid is unknown
    async fn video(&self, ctx: &TenantContext, id: &str) -> Result<Value>;

    async fn gallery(&self, ctx: &TenantContext, id: &str) -> Result<Value>;

    async fn photo(&self, ctx: &TenantContext, id: &str) -> Result<Value>;

    async fn author(&self, ctx: &TenantContext, id: &str) -> Result<Value>;

    /// Every author record of the tenant
    async fn authors(&self, ctx: &TenantContext) -> Result<Vec<Value>>;

    async fn collection(&self, ctx: &TenantContext, id: &str) -> Result<Value>;

    async fn lightbox(&self, ctx: &TenantContext, id: &str) -> Result<Value>;

    /// One page of redirect documents published on `website`
    async fn scan_redirects(
        &self,
        ctx: &TenantContext,
        website: &str,
        cursor: &PageCursor,
    ) -> Result<RedirectPage>;
}

/// Tenant-scoped named entities of the settings service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharedEntityKind {
    Distributor,
    Restriction,
    GeoRestriction,
}

impl SharedEntityKind {
    pub fn path_segment(&self) -> &'static str {
        match self {
            SharedEntityKind::Distributor => "distributor",
            SharedEntityKind::Restriction => "restriction",
            SharedEntityKind::GeoRestriction => "geo-restriction",
        }
    }
}

impl fmt::Display for SharedEntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Read and create access to distributors and restrictions
#[async_trait]
pub trait SettingsService: Send + Sync {
    async fn get(&self, ctx: &TenantContext, kind: SharedEntityKind, id: &str) -> Result<Value>;

    /// Every entity of one kind in the tenant
    async fn list(&self, ctx: &TenantContext, kind: SharedEntityKind) -> Result<Vec<Value>>;

    /// Id of the entity carrying `name`, if the tenant has one
    async fn find_by_name(
        &self,
        ctx: &TenantContext,
        kind: SharedEntityKind,
        name: &str,
    ) -> Result<Option<String>> {
        let entities = self.list(ctx, kind).await?;
        Ok(find_named(&entities, name))
    }

    /// Create an entity and return the id the tenant assigned to it
    async fn create(&self, ctx: &TenantContext, kind: SharedEntityKind, definition: &Value) -> Result<String>;
}

/// Id of the first entity in `entities` whose `name` equals `name`
pub fn find_named(entities: &[Value], name: &str) -> Option<String> {
    entities
        .iter()
        .find(|entity| entity.get("name").and_then(Value::as_str) == Some(name))
        .and_then(|entity| entity.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Result of submitting a document to the schema validation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub status: u16,
    pub messages: Vec<String>,
    pub body: String,
}

impl ValidationOutcome {
    /// Build an outcome from a raw response, collecting `[*].message`
    pub fn from_response(status: u16, body: String) -> Self {
        let messages = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| value.as_array().cloned())
            .unwrap_or_default()
            .iter()
            .filter_map(|error| error.get("message").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        Self {
            status,
            messages,
            body,
        }
    }

    pub fn is_valid(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait SchemaValidator: Send + Sync {
    /// Validate `document` against one schema version in the tenant
    async fn validate(&self, ctx: &TenantContext, version: &str, document: &Value) -> Result<ValidationOutcome>;
}

/// A document submitted to the ingestion service
#[derive(Debug, Clone, PartialEq)]
pub struct IngestRequest {
    pub id: String,
    pub kind: String,
    pub document: Value,
    pub circulations: Option<Value>,
    pub options: Value,
}

impl IngestRequest {
    pub fn new(id: &str, kind: &str, document: Value, options: Value) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            document,
            circulations: None,
            options,
        }
    }

    pub fn with_circulations(mut self, circulations: Value) -> Self {
        self.circulations = Some(circulations);
        self
    }

    /// Request body expected by the ingestion endpoint
    pub fn envelope(&self) -> Value {
        let mut envelope = json!({
            "ANS": self.document,
            "arcAdditionalProperties": self.options,
        });
        if let Some(circulations) = &self.circulations {
            envelope["circulations"] = circulations.clone();
        }
        envelope
    }
}

/// Write access: ingestion and the services that create objects directly
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn ingest(&self, ctx: &TenantContext, request: &IngestRequest) -> Result<Value>;

    /// Register `url` on `website` as a redirect to `document_id`
    async fn create_redirect(&self, ctx: &TenantContext, website: &str, url: &str, document_id: &str) -> Result<Value>;

    async fn create_author(&self, ctx: &TenantContext, author: &Value) -> Result<Value>;

    async fn create_collection(&self, ctx: &TenantContext, collection: &Value) -> Result<Value>;

    /// Create a lightbox and return its new id
    async fn create_lightbox(&self, ctx: &TenantContext, lightbox: &Value) -> Result<String>;

    async fn add_lightbox_photos(&self, ctx: &TenantContext, lightbox_id: &str, photo_ids: &[String]) -> Result<Value>;
}

/// Position in a paginated redirect scan
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageCursor {
    #[default]
    Start,
    Offset(u64),
    Scroll(String),
}

impl PageCursor {
    /// Interpret a `next` token: numbers are offsets, strings scroll ids
    pub fn from_next(next: &Value) -> Option<Self> {
        match next {
            Value::Number(number) => number.as_u64().map(PageCursor::Offset),
            Value::String(token) if !token.is_empty() => Some(PageCursor::Scroll(token.clone())),
            _ => None,
        }
    }
}

/// One redirect document found by a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectEntry {
    pub id: String,
    /// Where the redirect points
    pub arc_url: Option<String>,
    /// The redirect's own URL
    pub redirect: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RedirectPage {
    pub redirects: Vec<RedirectEntry>,
    pub next: Option<PageCursor>,
}

impl RedirectPage {
    /// Parse a scan response (`content_elements` plus `next`)
    pub fn from_scan(body: &Value) -> Self {
        let redirects: Vec<RedirectEntry> = body
            .get("content_elements")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|element| {
                Some(RedirectEntry {
                    id: element.get("_id")?.as_str()?.to_string(),
                    arc_url: element
                        .get("redirect_url")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    redirect: element
                        .get("canonical_url")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
            })
            .collect();

        let next = if redirects.is_empty() {
            None
        } else {
            body.get("next").and_then(PageCursor::from_next)
        };

        Self { redirects, next }
    }
}
