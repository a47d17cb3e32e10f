//! reqwest-backed implementation of every collaborator trait

use crate::collaborators::{
    find_named, ContentStore, IngestRequest, PageCursor, Publisher, RedirectPage, SchemaValidator,
    SettingsService, SharedEntityKind, ValidationOutcome,
};
use crate::endpoints::Endpoints;
use crate::error::{PlatformError, Result};
use crate::tenant::TenantContext;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Page size used when scanning for redirects
pub const REDIRECT_PAGE_SIZE: u32 = 100;

/// HTTP client for the platform APIs
pub struct HttpPlatform {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl HttpPlatform {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoints })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn http_get(&self, ctx: &TenantContext, url: &str) -> RequestBuilder {
        debug!(tenant = %ctx.tenant, url, "GET");
        self.client.get(url).bearer_auth(ctx.credential.expose())
    }

    fn http_post(&self, ctx: &TenantContext, url: &str) -> RequestBuilder {
        debug!(tenant = %ctx.tenant, url, "POST");
        self.client.post(url).bearer_auth(ctx.credential.expose())
    }

    async fn fetch(&self, ctx: &TenantContext, url: &str, what: &str) -> Result<Value> {
        let resp = self.http_get(ctx, url).send().await?;
        read_json(resp, what).await
    }
}

/// Turn a response into JSON, mapping failure statuses onto [`PlatformError`]
async fn read_json(resp: Response, what: &str) -> Result<Value> {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return Err(PlatformError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(PlatformError::Api {
            status: status.as_u16(),
            body,
        });
    }

    let text = resp.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

fn field(value: &Value, pointer: &str, what: &str) -> Result<Value> {
    value
        .pointer(pointer)
        .cloned()
        .ok_or_else(|| PlatformError::Parse(format!("{} response has no {}", what, pointer)))
}

fn string_field(value: &Value, pointer: &str, what: &str) -> Result<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PlatformError::Parse(format!("{} response has no {}", what, pointer)))
}

fn array_field(value: &Value, key: &str) -> Vec<Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

#[async_trait]
impl ContentStore for HttpPlatform {
    async fn story_revision_id(&self, ctx: &TenantContext, id: &str) -> Result<String> {
        let url = self.endpoints.story(ctx, id);
        let body = self.fetch(ctx, &url, &format!("story {}", id)).await?;
        string_field(&body, "/draft_revision_id", "story")
    }

    async fn story(&self, ctx: &TenantContext, id: &str, revision: &str) -> Result<Value> {
        let url = self.endpoints.story_revision(ctx, id, revision);
        let body = self.fetch(ctx, &url, &format!("story {} revision {}", id, revision)).await?;
        field(&body, "/ans", "story revision")
    }

    async fn story_circulations(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        let url = self.endpoints.story_circulation(ctx, id);
        let body = self.fetch(ctx, &url, &format!("circulation of story {}", id)).await?;
        Ok(Value::Array(array_field(&body, "circulations")))
    }

    async fn story_redirects(&self, ctx: &TenantContext, id: &str, website: &str) -> Result<Vec<String>> {
        let url = self.endpoints.story_redirects(ctx, id, website);
        let body = self.fetch(ctx, &url, &format!("redirects of story {}", id)).await?;
        Ok(array_field(&body, "redirects")
            .iter()
            .filter_map(|redirect| redirect.get("website_url").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    async fn video(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        let url = self.endpoints.video_by_uuid(ctx);
        let resp = self
            .http_get(ctx, &url)
            .query(&[("uuid", id)])
            .send()
            .await?;
        let what = format!("video {}", id);
        match read_json(resp, &what).await? {
            Value::Array(mut videos) if !videos.is_empty() => Ok(videos.swap_remove(0)),
            Value::Array(_) | Value::Null => Err(PlatformError::NotFound(what)),
            other => Ok(other),
        }
    }

    async fn gallery(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        let url = self.endpoints.gallery(ctx, id);
        self.fetch(ctx, &url, &format!("gallery {}", id)).await
    }

    async fn photo(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        let url = self.endpoints.photo(ctx, id);
        self.fetch(ctx, &url, &format!("photo {}", id)).await
    }

    async fn author(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        let url = self.endpoints.author_service(ctx, "v1");
        let resp = self.http_get(ctx, &url).query(&[("_id", id)]).send().await?;
        read_json(resp, &format!("author {}", id)).await
    }

    async fn authors(&self, ctx: &TenantContext) -> Result<Vec<Value>> {
        let url = self.endpoints.authors(ctx);
        let body = self.fetch(ctx, &url, "authors").await?;
        Ok(array_field(&body, "q_results"))
    }

    async fn collection(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        let url = self.endpoints.collection(ctx, id);
        let body = self.fetch(ctx, &url, &format!("collection {}", id)).await?;
        field(&body, "/data", "collection")
    }

    async fn lightbox(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        let url = self.endpoints.lightbox(ctx, id);
        self.fetch(ctx, &url, &format!("lightbox {}", id)).await
    }

    async fn scan_redirects(
        &self,
        ctx: &TenantContext,
        website: &str,
        cursor: &PageCursor,
    ) -> Result<RedirectPage> {
        let url = self.endpoints.content_scan(ctx);
        let mut params = vec![
            ("website", website.to_string()),
            ("q", "type:redirect".to_string()),
            ("size", REDIRECT_PAGE_SIZE.to_string()),
        ];
        match cursor {
            PageCursor::Start => {}
            PageCursor::Offset(from) => params.push(("from", from.to_string())),
            PageCursor::Scroll(token) => params.push(("scrollId", token.clone())),
        }

        let resp = self.http_get(ctx, &url).query(&params).send().await?;
        let body = read_json(resp, "redirect scan").await?;
        Ok(RedirectPage::from_scan(&body))
    }
}

#[async_trait]
impl SettingsService for HttpPlatform {
    async fn get(&self, ctx: &TenantContext, kind: SharedEntityKind, id: &str) -> Result<Value> {
        let url = self.endpoints.settings(ctx, kind, Some(id));
        self.fetch(ctx, &url, &format!("{} {}", kind, id)).await
    }

    async fn list(&self, ctx: &TenantContext, kind: SharedEntityKind) -> Result<Vec<Value>> {
        let url = self.endpoints.settings(ctx, kind, None);
        let body = self.fetch(ctx, &url, &format!("{} list", kind)).await?;
        let rows = array_field(&body, "rows");
        if rows.is_empty() {
            return Ok(array_field(&body, "data"));
        }
        Ok(rows)
    }

    async fn find_by_name(
        &self,
        ctx: &TenantContext,
        kind: SharedEntityKind,
        name: &str,
    ) -> Result<Option<String>> {
        if kind != SharedEntityKind::GeoRestriction {
            let entities = SettingsService::list(self, ctx, kind).await?;
            return Ok(find_named(&entities, name));
        }

        // The geo restriction service filters by name itself
        let url = self.endpoints.settings(ctx, kind, None);
        let resp = self
            .http_get(ctx, &url)
            .query(&[("name", name), ("limit", "1")])
            .send()
            .await?;
        let body = read_json(resp, &format!("{} {}", kind, name)).await?;
        Ok(body
            .pointer("/data/0/id")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn create(&self, ctx: &TenantContext, kind: SharedEntityKind, definition: &Value) -> Result<String> {
        let url = self.endpoints.settings(ctx, kind, None);
        let resp = self.http_post(ctx, &url).json(definition).send().await?;
        let body = read_json(resp, &format!("new {}", kind)).await?;
        body.pointer("/data/id")
            .or_else(|| body.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PlatformError::Parse(format!("created {} has no id", kind)))
    }
}

#[async_trait]
impl SchemaValidator for HttpPlatform {
    async fn validate(&self, ctx: &TenantContext, version: &str, document: &Value) -> Result<ValidationOutcome> {
        let url = self.endpoints.validate(ctx, version);
        let resp = self.http_post(ctx, &url).json(document).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(ValidationOutcome::from_response(status, body))
    }
}

#[async_trait]
impl Publisher for HttpPlatform {
    async fn ingest(&self, ctx: &TenantContext, request: &IngestRequest) -> Result<Value> {
        let url = self.endpoints.ingest(ctx);
        let resp = self
            .http_post(ctx, &url)
            .query(&[("ansId", request.id.as_str()), ("ansType", request.kind.as_str())])
            .json(&request.envelope())
            .send()
            .await?;
        read_json(resp, &format!("{} {}", request.kind, request.id)).await
    }

    async fn create_redirect(&self, ctx: &TenantContext, website: &str, url: &str, document_id: &str) -> Result<Value> {
        let endpoint = self.endpoints.redirect(ctx, website, url);
        let resp = self
            .http_post(ctx, &endpoint)
            .json(&json!({ "document_id": document_id }))
            .send()
            .await?;
        read_json(resp, &format!("redirect {}", url)).await
    }

    async fn create_author(&self, ctx: &TenantContext, author: &Value) -> Result<Value> {
        let url = self.endpoints.author_service(ctx, "v2");
        let resp = self.http_post(ctx, &url).json(author).send().await?;
        read_json(resp, "new author").await
    }

    async fn create_collection(&self, ctx: &TenantContext, collection: &Value) -> Result<Value> {
        let url = self.endpoints.collections(ctx);
        let resp = self.http_post(ctx, &url).json(collection).send().await?;
        read_json(resp, "new collection").await
    }

    async fn create_lightbox(&self, ctx: &TenantContext, lightbox: &Value) -> Result<String> {
        let url = self.endpoints.lightboxes(ctx);
        let resp = self.http_post(ctx, &url).json(lightbox).send().await?;
        let body = read_json(resp, "new lightbox").await?;
        string_field(&body, "/id", "lightbox")
    }

    async fn add_lightbox_photos(&self, ctx: &TenantContext, lightbox_id: &str, photo_ids: &[String]) -> Result<Value> {
        let url = self.endpoints.lightbox_photos(ctx, lightbox_id);
        let resp = self.http_post(ctx, &url).json(photo_ids).send().await?;
        read_json(resp, &format!("photos of lightbox {}", lightbox_id)).await
    }
}
