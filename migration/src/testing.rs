//! In-memory fakes of the platform collaborators
//!
//! [`FakePlatform`] implements every collaborator trait over plain maps keyed
//! by tenant, and records each call it receives so tests can count reads and
//! writes.

use async_trait::async_trait;
use platform_client::{
    ContentStore, IngestRequest, PageCursor, PlatformError, Publisher, RedirectPage, Result,
    SchemaValidator, SettingsService, SharedEntityKind, TenantContext, ValidationOutcome,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// One recorded collaborator call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Read { tenant: String, what: String },
    Create { tenant: String, kind: SharedEntityKind, definition: Value },
    Validate { tenant: String, version: String },
    Ingest { tenant: String, id: String, kind: String, envelope: Value },
    Redirect { tenant: String, website: String, url: String, document_id: String },
    CreateAuthor { tenant: String },
    CreateCollection { tenant: String, collection: Value },
    CreateLightbox { tenant: String, lightbox: Value },
    AddLightboxPhotos { tenant: String, lightbox_id: String, photo_ids: Vec<String> },
}

impl Call {
    /// Whether the call changes state in a tenant
    pub fn is_write(&self) -> bool {
        !matches!(self, Call::Read { .. } | Call::Validate { .. })
    }
}

type Key = (String, String);

#[derive(Default)]
struct State {
    objects: HashMap<(String, &'static str, String), Value>,
    settings: HashMap<(String, SharedEntityKind), Vec<Value>>,
    failing_creates: Vec<SharedEntityKind>,
    validations: VecDeque<ValidationOutcome>,
    redirect_pages: Vec<(PageCursor, RedirectPage)>,
    existing_redirects: Vec<Key>,
    next_id: usize,
    calls: Vec<Call>,
}

#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<State>,
}

fn key(tenant: &str, kind: &'static str, id: &str) -> (String, &'static str, String) {
    (tenant.to_string(), kind, id.to_string())
}

fn missing(what: String) -> PlatformError {
    PlatformError::NotFound(what)
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn put(&self, tenant: &str, kind: &'static str, id: &str, value: Value) {
        self.state().objects.insert(key(tenant, kind, id), value);
    }

    fn read(&self, tenant: &str, kind: &'static str, id: &str) -> Result<Value> {
        let mut state = self.state();
        state.calls.push(Call::Read {
            tenant: tenant.to_string(),
            what: format!("{} {}", kind, id),
        });
        state
            .objects
            .get(&key(tenant, kind, id))
            .cloned()
            .ok_or_else(|| missing(format!("{} {}", kind, id)))
    }

    pub fn add_story(&self, tenant: &str, id: &str, ans: Value, circulations: Value) {
        self.put(tenant, "story", id, ans);
        self.put(tenant, "circulation", id, circulations);
    }

    pub fn add_story_redirects(&self, tenant: &str, id: &str, urls: &[&str]) {
        self.put(tenant, "story_redirects", id, json!(urls));
    }

    pub fn add_video(&self, tenant: &str, id: &str, video: Value) {
        self.put(tenant, "video", id, video);
    }

    pub fn add_gallery(&self, tenant: &str, id: &str, gallery: Value) {
        self.put(tenant, "gallery", id, gallery);
    }

    pub fn add_photo(&self, tenant: &str, id: &str, photo: Value) {
        self.put(tenant, "photo", id, photo);
    }

    pub fn add_author(&self, tenant: &str, id: &str, author: Value) {
        self.put(tenant, "author", id, author);
    }

    pub fn add_collection(&self, tenant: &str, id: &str, collection: Value) {
        self.put(tenant, "collection", id, collection);
    }

    pub fn add_lightbox(&self, tenant: &str, id: &str, lightbox: Value) {
        self.put(tenant, "lightbox", id, lightbox);
    }

    pub fn add_setting(&self, tenant: &str, kind: SharedEntityKind, entity: Value) {
        self.state()
            .settings
            .entry((tenant.to_string(), kind))
            .or_default()
            .push(entity);
    }

    pub fn settings_of(&self, tenant: &str, kind: SharedEntityKind) -> Vec<Value> {
        self.state()
            .settings
            .get(&(tenant.to_string(), kind))
            .cloned()
            .unwrap_or_default()
    }

    /// Make every create of `kind` fail, as if a concurrent run won the race
    pub fn fail_creates(&self, kind: SharedEntityKind) {
        self.state().failing_creates.push(kind);
    }

    /// Queue the response of the next validation call
    pub fn queue_validation(&self, status: u16, messages: &[&str]) {
        let body: Vec<Value> = messages.iter().map(|m| json!({ "message": m })).collect();
        self.state()
            .validations
            .push_back(ValidationOutcome::from_response(status, json!(body).to_string()));
    }

    pub fn add_redirect_page(&self, cursor: PageCursor, page: RedirectPage) {
        self.state().redirect_pages.push((cursor, page));
    }

    /// Redirect URL that already exists on a destination website
    pub fn add_existing_redirect(&self, website: &str, url: &str) {
        self.state()
            .existing_redirects
            .push((website.to_string(), url.to_string()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn creates_of(&self, kind: SharedEntityKind) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Create { kind: k, .. } if *k == kind))
            .count()
    }

    pub fn ingests(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Ingest { .. }))
            .collect()
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }
}

#[async_trait]
impl ContentStore for FakePlatform {
    async fn story_revision_id(&self, ctx: &TenantContext, id: &str) -> Result<String> {
        self.read(&ctx.tenant, "story", id)?;
        Ok(format!("REV-{}", id))
    }

    async fn story(&self, ctx: &TenantContext, id: &str, revision: &str) -> Result<Value> {
        if revision != format!("REV-{}", id) {
            return Err(missing(format!("revision {}", revision)));
        }
        self.read(&ctx.tenant, "story", id)
    }

    async fn story_circulations(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        self.read(&ctx.tenant, "circulation", id)
    }

    async fn story_redirects(&self, ctx: &TenantContext, id: &str, _website: &str) -> Result<Vec<String>> {
        let urls = self.read(&ctx.tenant, "story_redirects", id).unwrap_or(json!([]));
        Ok(urls
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    async fn video(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        self.read(&ctx.tenant, "video", id)
    }

    async fn gallery(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        self.read(&ctx.tenant, "gallery", id)
    }

    async fn photo(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        self.read(&ctx.tenant, "photo", id)
    }

    async fn author(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        self.read(&ctx.tenant, "author", id)
    }

    async fn authors(&self, ctx: &TenantContext) -> Result<Vec<Value>> {
        let state = self.state();
        let mut authors: Vec<Value> = state
            .objects
            .iter()
            .filter(|((tenant, kind, _), _)| tenant == &ctx.tenant && *kind == "author")
            .map(|(_, author)| author.clone())
            .collect();
        authors.sort_by(|a, b| a["_id"].as_str().cmp(&b["_id"].as_str()));
        Ok(authors)
    }

    async fn collection(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        self.read(&ctx.tenant, "collection", id)
    }

    async fn lightbox(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        self.read(&ctx.tenant, "lightbox", id)
    }

    async fn scan_redirects(
        &self,
        _ctx: &TenantContext,
        _website: &str,
        cursor: &PageCursor,
    ) -> Result<RedirectPage> {
        let state = self.state();
        Ok(state
            .redirect_pages
            .iter()
            .find(|(page_cursor, _)| page_cursor == cursor)
            .map(|(_, page)| page.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl SettingsService for FakePlatform {
    async fn get(&self, ctx: &TenantContext, kind: SharedEntityKind, id: &str) -> Result<Value> {
        self.record(Call::Read {
            tenant: ctx.tenant.clone(),
            what: format!("{} {}", kind, id),
        });
        self.settings_of(&ctx.tenant, kind)
            .into_iter()
            .find(|entity| entity["id"] == id)
            .ok_or_else(|| missing(format!("{} {}", kind, id)))
    }

    async fn list(&self, ctx: &TenantContext, kind: SharedEntityKind) -> Result<Vec<Value>> {
        self.record(Call::Read {
            tenant: ctx.tenant.clone(),
            what: format!("{} list", kind),
        });
        Ok(self.settings_of(&ctx.tenant, kind))
    }

    async fn create(&self, ctx: &TenantContext, kind: SharedEntityKind, definition: &Value) -> Result<String> {
        self.record(Call::Create {
            tenant: ctx.tenant.clone(),
            kind,
            definition: definition.clone(),
        });

        let existing = self
            .settings_of(&ctx.tenant, kind)
            .into_iter()
            .find(|entity| entity["name"] == definition["name"]);
        let failing = self.state().failing_creates.contains(&kind);
        if failing || existing.is_some() {
            let conflicting = existing.map(|entity| entity["id"].clone()).unwrap_or(Value::Null);
            return Err(PlatformError::Api {
                status: 400,
                body: json!({ "context": { "distributor": { "id": conflicting } } }).to_string(),
            });
        }

        let id = {
            let mut state = self.state();
            state.next_id += 1;
            format!("{}-{}", kind, state.next_id)
        };
        let mut entity = definition.clone();
        entity["id"] = json!(id);
        self.add_setting(&ctx.tenant, kind, entity);
        Ok(id)
    }
}

#[async_trait]
impl SchemaValidator for FakePlatform {
    async fn validate(&self, ctx: &TenantContext, version: &str, _document: &Value) -> Result<ValidationOutcome> {
        self.record(Call::Validate {
            tenant: ctx.tenant.clone(),
            version: version.to_string(),
        });
        Ok(self
            .state()
            .validations
            .pop_front()
            .unwrap_or_else(|| ValidationOutcome::from_response(200, "{}".to_string())))
    }
}

#[async_trait]
impl Publisher for FakePlatform {
    async fn ingest(&self, ctx: &TenantContext, request: &IngestRequest) -> Result<Value> {
        self.record(Call::Ingest {
            tenant: ctx.tenant.clone(),
            id: request.id.clone(),
            kind: request.kind.clone(),
            envelope: request.envelope(),
        });
        Ok(json!({ "status": "queued" }))
    }

    async fn create_redirect(&self, ctx: &TenantContext, website: &str, url: &str, document_id: &str) -> Result<Value> {
        self.record(Call::Redirect {
            tenant: ctx.tenant.clone(),
            website: website.to_string(),
            url: url.to_string(),
            document_id: document_id.to_string(),
        });
        let exists = self
            .state()
            .existing_redirects
            .contains(&(website.to_string(), url.to_string()));
        if exists {
            return Err(PlatformError::Api {
                status: 400,
                body: json!({ "error_message": "redirect already exists" }).to_string(),
            });
        }
        Ok(json!({ "document_id": document_id }))
    }

    async fn create_author(&self, ctx: &TenantContext, author: &Value) -> Result<Value> {
        self.record(Call::CreateAuthor {
            tenant: ctx.tenant.clone(),
        });
        Ok(author.clone())
    }

    async fn create_collection(&self, ctx: &TenantContext, collection: &Value) -> Result<Value> {
        self.record(Call::CreateCollection {
            tenant: ctx.tenant.clone(),
            collection: collection.clone(),
        });
        Ok(json!({ "data": { "id": "COLLECTION-NEW" } }))
    }

    async fn create_lightbox(&self, ctx: &TenantContext, lightbox: &Value) -> Result<String> {
        self.record(Call::CreateLightbox {
            tenant: ctx.tenant.clone(),
            lightbox: lightbox.clone(),
        });
        Ok("LIGHTBOX-NEW".to_string())
    }

    async fn add_lightbox_photos(&self, ctx: &TenantContext, lightbox_id: &str, photo_ids: &[String]) -> Result<Value> {
        self.record(Call::AddLightboxPhotos {
            tenant: ctx.tenant.clone(),
            lightbox_id: lightbox_id.to_string(),
            photo_ids: photo_ids.to_vec(),
        });
        Ok(json!({}))
    }
}
