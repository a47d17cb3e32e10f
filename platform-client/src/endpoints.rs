//! URL construction for the platform APIs
//!
//! Hosts are templates so the whole client can be pointed at another domain
//! (or a local mock server) from configuration. `{org}` is replaced with the
//! tenant's organisation and `{env}` with the video environment.

use crate::collaborators::SharedEntityKind;
use crate::tenant::TenantContext;

pub const DEFAULT_API_HOST: &str = "https://api.{org}.arcpublishing.com";
pub const DEFAULT_VIDEO_HOST: &str = "https://{org}-{env}.video-api.arcpublishing.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    api_host: String,
    video_host: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_API_HOST, DEFAULT_VIDEO_HOST)
    }
}

impl Endpoints {
    pub fn new(api_host: &str, video_host: &str) -> Self {
        Self {
            api_host: api_host.trim_end_matches('/').to_string(),
            video_host: video_host.trim_end_matches('/').to_string(),
        }
    }

    fn api(&self, ctx: &TenantContext) -> String {
        self.api_host.replace("{org}", &ctx.tenant)
    }

    pub fn story(&self, ctx: &TenantContext, id: &str) -> String {
        format!("{}/draft/v1/story/{}", self.api(ctx), id)
    }

    pub fn story_revision(&self, ctx: &TenantContext, id: &str, revision: &str) -> String {
        format!("{}/draft/v1/story/{}/revision/{}", self.api(ctx), id, revision)
    }

    pub fn story_circulation(&self, ctx: &TenantContext, id: &str) -> String {
        format!("{}/draft/v1/story/{}/circulation", self.api(ctx), id)
    }

    pub fn story_redirects(&self, ctx: &TenantContext, id: &str, website: &str) -> String {
        format!("{}/draft/v1/story/{}/redirect/{}", self.api(ctx), id, website)
    }

    pub fn redirect(&self, ctx: &TenantContext, website: &str, url: &str) -> String {
        format!("{}/draft/v1/redirect/{}/{}/", self.api(ctx), website, url)
    }

    pub fn ingest(&self, ctx: &TenantContext) -> String {
        format!("{}/migrations/v3/content/ans", self.api(ctx))
    }

    pub fn validate(&self, ctx: &TenantContext, version: &str) -> String {
        format!("{}/ans/validate/{}", self.api(ctx), version)
    }

    pub fn gallery(&self, ctx: &TenantContext, id: &str) -> String {
        format!("{}/photo/api/v2/galleries/{}/", self.api(ctx), id)
    }

    pub fn photo(&self, ctx: &TenantContext, id: &str) -> String {
        format!("{}/photo/api/v2/photos/{}/", self.api(ctx), id)
    }

    pub fn lightboxes(&self, ctx: &TenantContext) -> String {
        format!("{}/photo/api/v2/lightboxes/", self.api(ctx))
    }

    pub fn lightbox(&self, ctx: &TenantContext, id: &str) -> String {
        format!("{}/photo/api/v2/lightboxes/{}", self.api(ctx), id)
    }

    pub fn lightbox_photos(&self, ctx: &TenantContext, id: &str) -> String {
        format!("{}/photo/api/v2/lightboxes/{}/photos", self.api(ctx), id)
    }

    /// Author service; `v1` for reads, `v2` for creation
    pub fn author_service(&self, ctx: &TenantContext, version: &str) -> String {
        format!("{}/author/{}/author-service/", self.api(ctx), version)
    }

    pub fn authors(&self, ctx: &TenantContext) -> String {
        format!("{}/author/v1/", self.api(ctx))
    }

    pub fn collections(&self, ctx: &TenantContext) -> String {
        format!("{}/websked/collections/v1/collections/", self.api(ctx))
    }

    pub fn collection(&self, ctx: &TenantContext, id: &str) -> String {
        format!("{}/websked/collections/v1/collections/{}", self.api(ctx), id)
    }

    pub fn content_scan(&self, ctx: &TenantContext) -> String {
        format!("{}/content/v4/scan", self.api(ctx))
    }

    /// Collection URL of a settings entity kind, or one entity when `id` is given
    pub fn settings(&self, ctx: &TenantContext, kind: SharedEntityKind, id: Option<&str>) -> String {
        let base = format!("{}/settings/v1/{}/", self.api(ctx), kind.path_segment());
        match id {
            Some(id) => format!("{}{}", base, id),
            None => base,
        }
    }

    pub fn video_by_uuid(&self, ctx: &TenantContext) -> String {
        let host = self
            .video_host
            .replace("{org}", ctx.organization())
            .replace("{env}", ctx.environment.video_segment());
        format!("{}/api/v1/ansvideos/findByUuid", host)
    }
}
