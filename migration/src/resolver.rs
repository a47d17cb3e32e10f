//! Cross-tenant resolution of distributors and geographic restrictions
//!
//! Shared entities are tenant-local: the destination tenant must hold its own
//! copy, found by name or created from the source definition. Nothing here
//! returns an error. An entity that cannot be resolved leaves its reference
//! null and schema validation reports it.

use content::ContentDocument;
use platform_client::{SettingsService, SharedEntityKind, TenantContext};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Value written in place of a shared-entity id during a dry run
pub const DRY_RUN_SENTINEL: &str = "new distributors and geo restrictions not created during a dry run";

/// Source id to destination id; `None` when resolution failed
pub type ResolvedEntities = BTreeMap<String, Option<String>>;

const AUDIT_FIELDS: [&str; 5] = ["id", "createdAt", "createdBy", "modifiedAt", "modifiedBy"];
const TENANT_FIELDS: [&str; 3] = ["organizationId", "organization_id", "organization"];

/// Finds or creates shared entities in the destination tenant
pub struct EntityResolver<'a> {
    settings: &'a dyn SettingsService,
    source: &'a TenantContext,
    destination: &'a TenantContext,
    dry_run: bool,
}

impl<'a> EntityResolver<'a> {
    pub fn new(
        settings: &'a dyn SettingsService,
        source: &'a TenantContext,
        destination: &'a TenantContext,
        dry_run: bool,
    ) -> Self {
        Self {
            settings,
            source,
            destination,
            dry_run,
        }
    }

    /// Resolve `distributor.reference_id` and write the destination id back
    ///
    /// Restrictions created along the way are tied to `website`. Returns
    /// `None` when the document names no distributor.
    pub async fn resolve_distributor(
        &self,
        doc: &mut ContentDocument,
        website: &str,
    ) -> Option<ResolvedEntities> {
        let source_id = doc.get_str("/distributor/reference_id")?.to_string();
        let mut resolved = ResolvedEntities::new();

        if self.dry_run {
            doc.set("/distributor/reference_id", json!(DRY_RUN_SENTINEL));
            resolved.insert(source_id, Some(DRY_RUN_SENTINEL.to_string()));
            return Some(resolved);
        }

        let destination_id = self.distributor_id(&source_id, website).await;
        match &destination_id {
            Some(id) => {
                info!(source_id = %source_id, destination_id = %id, "Resolved distributor");
                doc.set("/distributor/reference_id", json!(id));
            }
            None => {
                warn!(source_id = %source_id, tenant = %self.destination.tenant, "Distributor could not be resolved");
                doc.set("/distributor/reference_id", Value::Null);
            }
        }
        resolved.insert(source_id, destination_id);
        Some(resolved)
    }

    /// Resolve every `content_restrictions.geo.restrictions[*].restriction_id`
    ///
    /// The restriction list is replaced with the destination ids in the same
    /// order. Returns `None` when the document has no geographic restrictions.
    pub async fn resolve_geo_restrictions(&self, doc: &mut ContentDocument) -> Option<ResolvedEntities> {
        let source_ids: Vec<String> = doc
            .get("/content_restrictions/geo/restrictions")?
            .as_array()?
            .iter()
            .filter_map(|entry| entry.get("restriction_id").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        if source_ids.is_empty() {
            return None;
        }

        let mut resolved = ResolvedEntities::new();
        let mut restrictions = Vec::with_capacity(source_ids.len());
        for source_id in source_ids {
            let destination_id = if self.dry_run {
                Some(DRY_RUN_SENTINEL.to_string())
            } else {
                self.geo_restriction_id(&source_id).await
            };
            if destination_id.is_none() {
                warn!(source_id = %source_id, "Geographic restriction could not be resolved");
            }
            restrictions.push(json!({ "restriction_id": destination_id }));
            resolved.insert(source_id, destination_id);
        }

        doc.set("/content_restrictions/geo/restrictions", Value::Array(restrictions));
        Some(resolved)
    }

    async fn distributor_id(&self, source_id: &str, website: &str) -> Option<String> {
        let kind = SharedEntityKind::Distributor;
        let mut definition = self.source_definition(kind, source_id).await?;
        let name = entity_name(&definition)?;

        if let Some(existing) = self.find_in_destination(kind, &name).await {
            return Some(existing);
        }

        let restrictions = definition
            .remove("restrictions")
            .and_then(|value| match value {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .unwrap_or_default();
        let mut restriction_ids = Vec::new();
        for restriction in restrictions {
            if let Some(id) = self.restriction_id(restriction, website).await {
                restriction_ids.push(json!({ "id": id }));
            }
        }

        strip(&mut definition, &AUDIT_FIELDS);
        strip(&mut definition, &TENANT_FIELDS);
        definition.insert("restrictions".to_string(), Value::Array(restriction_ids));

        match self
            .settings
            .create(self.destination, kind, &Value::Object(definition))
            .await
        {
            Ok(id) => {
                info!(name = %name, id = %id, tenant = %self.destination.tenant, "Created distributor");
                Some(id)
            }
            Err(e) => {
                debug!(error = %e, "Distributor create failed, looking for the conflicting id");
                e.conflicting_id("/context/distributor/id")
            }
        }
    }

    /// Create one nested restriction, falling back to the one already named alike
    async fn restriction_id(&self, restriction: Value, website: &str) -> Option<String> {
        let Value::Object(mut restriction) = restriction else {
            return None;
        };
        strip(&mut restriction, &AUDIT_FIELDS);
        for site in restriction
            .get_mut("websites")
            .and_then(Value::as_array_mut)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object_mut)
        {
            site.insert("siteId".to_string(), json!(website));
        }
        let name = entity_name(&restriction);

        let kind = SharedEntityKind::Restriction;
        match self
            .settings
            .create(self.destination, kind, &Value::Object(restriction))
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                debug!(error = %e, "Restriction create failed, looking it up by name");
                self.find_in_destination(kind, &name?).await
            }
        }
    }

    async fn geo_restriction_id(&self, source_id: &str) -> Option<String> {
        let kind = SharedEntityKind::GeoRestriction;
        let mut definition = self.source_definition(kind, source_id).await?;
        let name = entity_name(&definition)?;

        if let Some(existing) = self.find_in_destination(kind, &name).await {
            return Some(existing);
        }

        strip(&mut definition, &AUDIT_FIELDS);
        match self
            .settings
            .create(self.destination, kind, &Value::Object(definition))
            .await
        {
            Ok(id) => {
                info!(name = %name, id = %id, tenant = %self.destination.tenant, "Created geographic restriction");
                Some(id)
            }
            Err(e) => {
                debug!(error = %e, "Geographic restriction create failed, looking it up by name");
                self.find_in_destination(kind, &name).await
            }
        }
    }

    async fn source_definition(&self, kind: SharedEntityKind, id: &str) -> Option<Map<String, Value>> {
        match self.settings.get(self.source, kind, id).await {
            Ok(Value::Object(definition)) => Some(definition),
            Ok(_) => {
                warn!(kind = %kind, id, "Source entity is not an object");
                None
            }
            Err(e) => {
                warn!(kind = %kind, id, error = %e, "Failed to read source entity");
                None
            }
        }
    }

    async fn find_in_destination(&self, kind: SharedEntityKind, name: &str) -> Option<String> {
        match self.settings.find_by_name(self.destination, kind, name).await {
            Ok(found) => found,
            Err(e) => {
                warn!(kind = %kind, name, error = %e, "Lookup by name failed");
                None
            }
        }
    }
}

fn entity_name(entity: &Map<String, Value>) -> Option<String> {
    entity.get("name").and_then(Value::as_str).map(str::to_string)
}

fn strip(entity: &mut Map<String, Value>, fields: &[&str]) {
    for field in fields {
        entity.remove(*field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePlatform;
    use platform_client::Credential;

    fn tenants() -> (TenantContext, TenantContext) {
        (
            TenantContext::new("from1", Credential::new("s")),
            TenantContext::new("to1", Credential::new("t")),
        )
    }

    fn platform_with_source_distributor() -> FakePlatform {
        let platform = FakePlatform::new();
        platform.add_setting(
            "from1",
            SharedEntityKind::Distributor,
            json!({
                "id": "d1",
                "name": "Wire Service",
                "organizationId": "from1",
                "createdAt": "2020-01-01",
                "restrictions": [
                    {"id": "r1", "name": "Wire only", "createdBy": "someone", "websites": [{"siteId": "old-site"}]}
                ]
            }),
        );
        platform
    }

    fn story_with_distributor() -> ContentDocument {
        ContentDocument::new(json!({"_id": "S1", "distributor": {"reference_id": "d1", "category": "wires"}}))
    }

    #[tokio::test]
    async fn test_no_distributor_is_not_an_error() {
        let platform = FakePlatform::new();
        let (source, destination) = tenants();
        let resolver = EntityResolver::new(&platform, &source, &destination, false);

        let mut doc = ContentDocument::new(json!({"_id": "S1"}));
        assert!(resolver.resolve_distributor(&mut doc, "site").await.is_none());
        assert!(resolver.resolve_geo_restrictions(&mut doc).await.is_none());
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_existing_distributor_is_found_by_name() {
        let platform = platform_with_source_distributor();
        platform.add_setting("to1", SharedEntityKind::Distributor, json!({"id": "D9", "name": "Wire Service"}));
        let (source, destination) = tenants();
        let resolver = EntityResolver::new(&platform, &source, &destination, false);

        let mut doc = story_with_distributor();
        let resolved = resolver.resolve_distributor(&mut doc, "site").await.unwrap();

        assert_eq!(resolved.get("d1"), Some(&Some("D9".to_string())));
        assert_eq!(doc.get_str("/distributor/reference_id"), Some("D9"));
        assert_eq!(platform.creates_of(SharedEntityKind::Distributor), 0);
    }

    #[tokio::test]
    async fn test_missing_distributor_is_created_with_restrictions() {
        let platform = platform_with_source_distributor();
        let (source, destination) = tenants();
        let resolver = EntityResolver::new(&platform, &source, &destination, false);

        let mut doc = story_with_distributor();
        let resolved = resolver.resolve_distributor(&mut doc, "site").await.unwrap();

        let created = platform.settings_of("to1", SharedEntityKind::Distributor);
        assert_eq!(created.len(), 1);
        let distributor = &created[0];
        assert!(distributor.get("organizationId").is_none());
        assert!(distributor.get("createdAt").is_none());

        let restriction = &platform.settings_of("to1", SharedEntityKind::Restriction)[0];
        assert_eq!(restriction["websites"][0]["siteId"], "site");
        assert!(restriction.get("createdBy").is_none());
        assert_eq!(distributor["restrictions"], json!([{"id": restriction["id"]}]));

        let new_id = distributor["id"].as_str().unwrap();
        assert_eq!(resolved.get("d1"), Some(&Some(new_id.to_string())));
        assert_eq!(doc.get_str("/distributor/reference_id"), Some(new_id));
    }

    #[tokio::test]
    async fn test_restriction_websites_skip_malformed_entries() {
        let platform = FakePlatform::new();
        platform.add_setting(
            "from1",
            SharedEntityKind::Distributor,
            json!({
                "id": "d1",
                "name": "Wire Service",
                "restrictions": [{"id": "r1", "name": "Wire only", "websites": ["old-site", {"siteId": "old-site"}]}]
            }),
        );
        let (source, destination) = tenants();
        let resolver = EntityResolver::new(&platform, &source, &destination, false);

        let mut doc = story_with_distributor();
        assert!(resolver.resolve_distributor(&mut doc, "site").await.is_some());

        let restriction = &platform.settings_of("to1", SharedEntityKind::Restriction)[0];
        assert_eq!(restriction["websites"], json!(["old-site", {"siteId": "site"}]));
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let platform = platform_with_source_distributor();
        let (source, destination) = tenants();
        let resolver = EntityResolver::new(&platform, &source, &destination, false);

        let mut first = story_with_distributor();
        let mut second = story_with_distributor();
        let first_ids = resolver.resolve_distributor(&mut first, "site").await.unwrap();
        let second_ids = resolver.resolve_distributor(&mut second, "site").await.unwrap();

        assert_eq!(first_ids, second_ids);
        assert_eq!(platform.creates_of(SharedEntityKind::Distributor), 1);
        assert_eq!(platform.settings_of("to1", SharedEntityKind::Distributor).len(), 1);
    }

    #[tokio::test]
    async fn test_existing_restriction_is_reused_when_create_fails() {
        let platform = platform_with_source_distributor();
        platform.add_setting("to1", SharedEntityKind::Restriction, json!({"id": "R7", "name": "Wire only"}));
        let (source, destination) = tenants();
        let resolver = EntityResolver::new(&platform, &source, &destination, false);

        let mut doc = story_with_distributor();
        resolver.resolve_distributor(&mut doc, "site").await.unwrap();

        let distributor = &platform.settings_of("to1", SharedEntityKind::Distributor)[0];
        assert_eq!(distributor["restrictions"], json!([{"id": "R7"}]));
    }

    #[tokio::test]
    async fn test_failed_distributor_leaves_null_reference() {
        let platform = platform_with_source_distributor();
        platform.fail_creates(SharedEntityKind::Distributor);
        let (source, destination) = tenants();
        let resolver = EntityResolver::new(&platform, &source, &destination, false);

        let mut doc = story_with_distributor();
        let resolved = resolver.resolve_distributor(&mut doc, "site").await.unwrap();

        assert_eq!(resolved.get("d1"), Some(&None));
        assert_eq!(doc.get("/distributor/reference_id"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_dry_run_creates_nothing() {
        let platform = platform_with_source_distributor();
        platform.add_setting("from1", SharedEntityKind::GeoRestriction, json!({"id": "g1", "name": "EU only"}));
        let (source, destination) = tenants();
        let resolver = EntityResolver::new(&platform, &source, &destination, true);

        let mut doc = story_with_distributor();
        doc.set("/content_restrictions/geo/restrictions", json!([{"restriction_id": "g1"}]));

        let distributor = resolver.resolve_distributor(&mut doc, "site").await.unwrap();
        let geo = resolver.resolve_geo_restrictions(&mut doc).await.unwrap();

        assert_eq!(distributor.get("d1"), Some(&Some(DRY_RUN_SENTINEL.to_string())));
        assert_eq!(geo.get("g1"), Some(&Some(DRY_RUN_SENTINEL.to_string())));
        assert_eq!(doc.get_str("/distributor/reference_id"), Some(DRY_RUN_SENTINEL));
        assert!(platform.writes().is_empty());
    }

    #[tokio::test]
    async fn test_geo_restrictions_are_created_then_reused() {
        let platform = FakePlatform::new();
        platform.add_setting(
            "from1",
            SharedEntityKind::GeoRestriction,
            json!({"id": "g1", "name": "EU only", "modifiedBy": "x", "allow": ["DE"]}),
        );
        let (source, destination) = tenants();
        let resolver = EntityResolver::new(&platform, &source, &destination, false);

        let mut doc = ContentDocument::new(json!({
            "content_restrictions": {"geo": {"restrictions": [{"restriction_id": "g1"}]}}
        }));
        let first = resolver.resolve_geo_restrictions(&mut doc).await.unwrap();
        let new_id = first["g1"].clone().unwrap();
        assert_eq!(
            doc.get("/content_restrictions/geo/restrictions"),
            Some(&json!([{"restriction_id": new_id}]))
        );
        let created = &platform.settings_of("to1", SharedEntityKind::GeoRestriction)[0];
        assert!(created.get("modifiedBy").is_none());

        let mut again = ContentDocument::new(json!({
            "content_restrictions": {"geo": {"restrictions": [{"restriction_id": "g1"}]}}
        }));
        let second = resolver.resolve_geo_restrictions(&mut again).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(platform.creates_of(SharedEntityKind::GeoRestriction), 1);
    }
}
