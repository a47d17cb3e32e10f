//! Discovery and rewriting of embedded references inside a content document
//!
//! References to other content objects live in a fixed set of places: the
//! content elements sequence, the promotional items mapping, the related
//! content collection, the credits, and the taxonomy. Each place is addressed
//! as a [`Slot`]; scanning and rewriting walk the exact same slot list, so a
//! location that can be scanned can always be rewritten.
//!
//! A slot holds either a reference shape (`{_id?, type: "reference",
//! referent: {id, type, website?}}`) or a bare object carrying its own `_id`
//! and `type` (gallery images come back from the photo service that way).

use crate::document::ContentDocument;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The kinds of entity a document can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Image,
    Gallery,
    Video,
    Story,
    Author,
    Section,
    Distributor,
    GeoRestriction,
}

impl EntityKind {
    /// The `referent.type` value used for this kind
    pub fn referent_type(&self) -> &'static str {
        match self {
            EntityKind::Image => "image",
            EntityKind::Gallery => "gallery",
            EntityKind::Video => "video",
            EntityKind::Story => "story",
            EntityKind::Author => "author",
            EntityKind::Section => "section",
            EntityKind::Distributor => "distributor",
            EntityKind::GeoRestriction => "geo_restriction",
        }
    }

    /// Promotional item roles that may hold this kind
    ///
    /// Featured images sit under `basic`, featured galleries under `lead_art`,
    /// and featured videos under either.
    pub fn promo_roles(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Image => &["basic"],
            EntityKind::Gallery => &["lead_art"],
            EntityKind::Video => &["basic", "lead_art"],
            _ => &[],
        }
    }

    fn scans(&self, location: &Location) -> bool {
        match (self, location) {
            (
                EntityKind::Image | EntityKind::Gallery | EntityKind::Video | EntityKind::Story,
                Location::ContentElements | Location::RelatedContent { .. },
            ) => true,
            (_, Location::PromoItems { role }) => self.promo_roles().contains(&role.as_str()),
            (EntityKind::Author, Location::Credits) => true,
            (EntityKind::Section, Location::Taxonomy) => true,
            _ => false,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.referent_type())
    }
}

/// How an identifier of a given kind travels to another tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Portability {
    /// The identifier is tenant-scoped and must be regenerated
    Regenerate,
    /// The identifier is valid as-is in the destination
    Copy,
    /// The identifier names a tenant-local entity found or created by name
    Resolve,
}

/// Per-kind portability rules for one migration variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortabilityTable {
    entries: BTreeMap<EntityKind, Portability>,
}

impl PortabilityTable {
    /// Rules for copying into a different organization
    pub fn cross_tenant() -> Self {
        Self::from_entries([
            (EntityKind::Image, Portability::Regenerate),
            (EntityKind::Gallery, Portability::Regenerate),
            (EntityKind::Video, Portability::Copy),
            (EntityKind::Story, Portability::Copy),
            (EntityKind::Author, Portability::Copy),
            (EntityKind::Section, Portability::Copy),
            (EntityKind::Distributor, Portability::Resolve),
            (EntityKind::GeoRestriction, Portability::Resolve),
        ])
    }

    /// Rules for copying between environments of the same organization
    pub fn same_tenant() -> Self {
        let mut table = Self::cross_tenant();
        table.set(EntityKind::Image, Portability::Copy);
        table.set(EntityKind::Gallery, Portability::Copy);
        table
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (EntityKind, Portability)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn set(&mut self, kind: EntityKind, portability: Portability) {
        self.entries.insert(kind, portability);
    }

    /// Unlisted kinds are treated as portable
    pub fn portability(&self, kind: EntityKind) -> Portability {
        self.entries.get(&kind).copied().unwrap_or(Portability::Copy)
    }

    pub fn regenerates(&self, kind: EntityKind) -> bool {
        self.portability(kind) == Portability::Regenerate
    }
}

/// Where in a document a reference was found
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "location", rename_all = "snake_case")]
pub enum Location {
    ContentElements,
    PromoItems { role: String },
    RelatedContent { role: Option<String> },
    Credits,
    Taxonomy,
}

/// A reference discovered by the scanner
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Reference {
    pub id: String,
    pub kind: EntityKind,
    #[serde(flatten)]
    pub location: Location,
}

/// A place inside the document that may hold one reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub location: Location,
    pub pointer: String,
}

/// Enumerate every reference slot present in the document
///
/// Missing top-level keys contribute no slots.
pub fn slots(doc: &ContentDocument) -> Vec<Slot> {
    let mut found = Vec::new();

    if let Some(elements) = doc.get("/content_elements").and_then(Value::as_array) {
        for index in 0..elements.len() {
            found.push(Slot {
                location: Location::ContentElements,
                pointer: format!("/content_elements/{}", index),
            });
        }
    }

    if let Some(promo) = doc.get("/promo_items").and_then(Value::as_object) {
        for (role, item) in promo {
            if item.is_object() {
                found.push(Slot {
                    location: Location::PromoItems { role: role.clone() },
                    pointer: format!("/promo_items/{}", escape(role)),
                });
            }
        }
    }

    match doc.get("/related_content") {
        Some(Value::Array(items)) => {
            for index in 0..items.len() {
                found.push(Slot {
                    location: Location::RelatedContent { role: None },
                    pointer: format!("/related_content/{}", index),
                });
            }
        }
        Some(Value::Object(roles)) => {
            for (role, items) in roles {
                if let Some(items) = items.as_array() {
                    for index in 0..items.len() {
                        found.push(Slot {
                            location: Location::RelatedContent {
                                role: Some(role.clone()),
                            },
                            pointer: format!("/related_content/{}/{}", escape(role), index),
                        });
                    }
                }
            }
        }
        _ => {}
    }

    if let Some(by) = doc.get("/credits/by").and_then(Value::as_array) {
        for index in 0..by.len() {
            found.push(Slot {
                location: Location::Credits,
                pointer: format!("/credits/by/{}", index),
            });
        }
    }

    if doc
        .get("/taxonomy/primary_section")
        .is_some_and(Value::is_object)
    {
        found.push(Slot {
            location: Location::Taxonomy,
            pointer: "/taxonomy/primary_section".to_string(),
        });
    }
    if let Some(sections) = doc.get("/taxonomy/sections").and_then(Value::as_array) {
        for index in 0..sections.len() {
            found.push(Slot {
                location: Location::Taxonomy,
                pointer: format!("/taxonomy/sections/{}", index),
            });
        }
    }

    found
}

/// The entity type a slot points at, for either shape
fn slot_type(slot: &Value) -> Option<&str> {
    match slot.pointer("/referent/type").and_then(Value::as_str) {
        Some(kind) => Some(kind),
        None => slot.get("type").and_then(Value::as_str),
    }
}

/// The identifier a slot points at, preferring the referent
fn slot_id(slot: &Value) -> Option<&str> {
    slot.pointer("/referent/id")
        .and_then(Value::as_str)
        .or_else(|| slot.get("_id").and_then(Value::as_str))
}

/// Find every reference of `kind` together with its location
pub fn scan_references(doc: &ContentDocument, kind: EntityKind) -> Vec<Reference> {
    let wanted = kind.referent_type();
    let mut references = Vec::new();

    for slot in slots(doc) {
        if !kind.scans(&slot.location) {
            continue;
        }
        let Some(value) = doc.get(&slot.pointer) else {
            continue;
        };
        // credits and taxonomy entries may omit the referent type
        let type_matches = match slot_type(value) {
            Some(found) => found == wanted,
            None => matches!(slot.location, Location::Credits | Location::Taxonomy),
        };
        if !type_matches {
            continue;
        }
        if let Some(id) = slot_id(value) {
            references.push(Reference {
                id: id.to_string(),
                kind,
                location: slot.location,
            });
        }
    }

    references
}

/// De-duplicated identifiers of every `kind` reference in the document
pub fn scan(doc: &ContentDocument, kind: EntityKind) -> BTreeSet<String> {
    scan_references(doc, kind)
        .into_iter()
        .map(|reference| reference.id)
        .collect()
}

/// Old-to-new identifier mapping for one entity kind within one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifierMapping {
    #[serde(skip)]
    kind: EntityKind,
    #[serde(flatten)]
    entries: BTreeMap<String, String>,
}

impl IdentifierMapping {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Build a mapping that regenerates every id for `destination_tenant`
    pub fn regenerate<I, S>(kind: EntityKind, ids: I, destination_tenant: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mapping = Self::new(kind);
        for id in ids {
            let id = id.as_ref();
            mapping.insert(id, &crate::ids::generate_id(id, destination_tenant));
        }
        mapping
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn insert(&mut self, old_id: &str, new_id: &str) {
        self.entries.insert(old_id.to_string(), new_id.to_string());
    }

    /// Merge entries from another mapping; existing entries win
    pub fn extend(&mut self, other: &IdentifierMapping) {
        for (old_id, new_id) in &other.entries {
            self.entries
                .entry(old_id.clone())
                .or_insert_with(|| new_id.clone());
        }
    }

    pub fn get(&self, old_id: &str) -> Option<&str> {
        self.entries.get(old_id).map(String::as_str)
    }

    pub fn contains(&self, old_id: &str) -> bool {
        self.entries.contains_key(old_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The mapping as a plain JSON object, for reports
    pub fn to_json(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }
}

/// Replace every occurrence of a mapped identifier, in a single pass
///
/// Each slot whose identifier is mapped has its `_id` and `referent.id`
/// rewritten together; `referent.type` is never touched. The document's own
/// `_id` is rewritten as well when it is mapped. Returns the number of
/// rewritten occurrences.
pub fn rewrite(doc: &mut ContentDocument, mapping: &IdentifierMapping) -> usize {
    rewrite_all(doc, &[mapping])
}

/// [`rewrite`] for several mappings at once
pub fn rewrite_all(doc: &mut ContentDocument, mappings: &[&IdentifierMapping]) -> usize {
    if mappings.iter().all(|mapping| mapping.is_empty()) {
        return 0;
    }

    let lookup = |id: &str| mappings.iter().find_map(|mapping| mapping.get(id));
    let mut rewritten = 0;

    for slot in slots(doc) {
        let Some(value) = doc.get_mut(&slot.pointer) else {
            continue;
        };
        let Some(new_id) = slot_id(value).and_then(|id| lookup(id)).map(str::to_string) else {
            continue;
        };
        if rewrite_slot(value, &new_id) {
            rewritten += 1;
        }
    }

    if let Some(new_id) = doc.id().and_then(|id| lookup(id)).map(str::to_string) {
        doc.set_id(&new_id);
        rewritten += 1;
    }

    tracing::debug!(rewritten, "Rewrote document references");
    rewritten
}

fn rewrite_slot(slot: &mut Value, new_id: &str) -> bool {
    let Some(object) = slot.as_object_mut() else {
        return false;
    };

    let mut touched = false;
    if let Some(referent) = object.get_mut("referent").and_then(Value::as_object_mut) {
        referent.insert("id".to_string(), Value::String(new_id.to_string()));
        touched = true;
    }
    if object.contains_key("_id") || !touched {
        object.insert("_id".to_string(), Value::String(new_id.to_string()));
        touched = true;
    }
    touched
}

/// Build a reference shape pointing at `id`
pub fn reference_value(id: &str, kind: EntityKind, website: Option<&str>) -> Value {
    let mut referent = json!({
        "id": id,
        "type": kind.referent_type(),
    });
    if let Some(website) = website {
        referent["website"] = Value::String(website.to_string());
    }
    json!({
        "type": "reference",
        "referent": referent,
    })
}

fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::generate_id;
    use serde_json::json;

    fn story() -> ContentDocument {
        ContentDocument::new(json!({
            "_id": "STORY1",
            "type": "story",
            "content_elements": [
                {"type": "text", "_id": "TEXT1", "content": "hello"},
                {"type": "reference", "_id": "img1", "referent": {"id": "img1", "type": "image"}},
                {"type": "reference", "_id": "gal1", "referent": {"id": "gal1", "type": "gallery"}},
                {"type": "reference", "_id": "vid1", "referent": {"id": "vid1", "type": "video"}},
                {"type": "reference", "_id": "img1", "referent": {"id": "img1", "type": "image"}}
            ],
            "promo_items": {
                "basic": {"type": "reference", "_id": "img3", "referent": {"id": "img3", "type": "image"}},
                "lead_art": {"type": "reference", "referent": {"id": "gal2", "type": "gallery"}}
            },
            "related_content": {
                "basic": [
                    {"type": "reference", "_id": "story2", "referent": {"id": "story2", "type": "story"}},
                    {"type": "reference", "_id": "img4", "referent": {"id": "img4", "type": "image"}}
                ]
            },
            "credits": {
                "by": [
                    {"type": "reference", "referent": {"id": "kilgore", "type": "author"}},
                    {"type": "author", "name": "Guest Writer", "version": "0.10.9"}
                ]
            }
        }))
    }

    #[test]
    fn test_scan_images_across_locations() {
        let images = scan(&story(), EntityKind::Image);
        let expected: BTreeSet<String> = ["img1", "img3", "img4"].iter().map(|s| s.to_string()).collect();
        assert_eq!(images, expected);
    }

    #[test]
    fn test_scan_galleries_uses_lead_art_role() {
        let galleries = scan(&story(), EntityKind::Gallery);
        assert!(galleries.contains("gal1"));
        assert!(galleries.contains("gal2"));
        assert_eq!(galleries.len(), 2);
    }

    #[test]
    fn test_scan_authors_and_stories() {
        let doc = story();
        assert_eq!(
            scan(&doc, EntityKind::Author).into_iter().collect::<Vec<_>>(),
            vec!["kilgore".to_string()]
        );
        assert_eq!(
            scan(&doc, EntityKind::Story).into_iter().collect::<Vec<_>>(),
            vec!["story2".to_string()]
        );
    }

    #[test]
    fn test_scan_missing_locations_is_empty() {
        let doc = ContentDocument::new(json!({"_id": "X"}));
        assert!(scan(&doc, EntityKind::Image).is_empty());
        assert!(scan_references(&doc, EntityKind::Video).is_empty());
    }

    #[test]
    fn test_scan_bare_gallery_images() {
        let gallery = ContentDocument::new(json!({
            "_id": "gal1",
            "content_elements": [
                {"_id": "img2", "type": "image", "url": "https://example.com/a.jpg"},
                {"_id": "img5", "type": "image", "url": "https://example.com/b.jpg"}
            ]
        }));
        assert_eq!(scan(&gallery, EntityKind::Image).len(), 2);
    }

    #[test]
    fn test_scan_reports_locations() {
        let references = scan_references(&story(), EntityKind::Image);
        assert!(references
            .iter()
            .any(|r| r.id == "img3" && r.location == Location::PromoItems { role: "basic".into() }));
        assert!(references.iter().any(|r| r.id == "img4"
            && r.location == Location::RelatedContent { role: Some("basic".into()) }));
    }

    #[test]
    fn test_rewrite_round_trip() {
        let mut doc = story();
        let before = scan_references(&doc, EntityKind::Image).len();
        let old_ids = scan(&doc, EntityKind::Image);
        let mapping = IdentifierMapping::regenerate(EntityKind::Image, &old_ids, "to1");

        rewrite(&mut doc, &mapping);

        let after = scan(&doc, EntityKind::Image);
        assert!(after.is_disjoint(&old_ids));
        let new_ids: BTreeSet<String> = old_ids.iter().map(|id| generate_id(id, "to1")).collect();
        assert_eq!(after, new_ids);
        assert_eq!(scan_references(&doc, EntityKind::Image).len(), before);
    }

    #[test]
    fn test_rewrite_updates_id_and_referent_together() {
        let mut doc = story();
        let mut mapping = IdentifierMapping::new(EntityKind::Image);
        mapping.insert("img1", "NEW1");
        rewrite(&mut doc, &mapping);

        let element = doc.get("/content_elements/1").unwrap();
        assert_eq!(element["_id"], "NEW1");
        assert_eq!(element["referent"]["id"], "NEW1");
        assert_eq!(element["referent"]["type"], "image");
        let duplicate = doc.get("/content_elements/4").unwrap();
        assert_eq!(duplicate["_id"], "NEW1");
    }

    #[test]
    fn test_rewrite_does_not_add_id_to_referent_only_shape() {
        let mut doc = story();
        let mut mapping = IdentifierMapping::new(EntityKind::Gallery);
        mapping.insert("gal2", "NEWGAL");
        rewrite(&mut doc, &mapping);

        let lead_art = doc.get("/promo_items/lead_art").unwrap();
        assert_eq!(lead_art["referent"]["id"], "NEWGAL");
        assert!(lead_art.get("_id").is_none());
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let mut once = story();
        let mapping = IdentifierMapping::regenerate(
            EntityKind::Image,
            scan(&once, EntityKind::Image),
            "to1",
        );
        rewrite(&mut once, &mapping);
        let mut twice = once.clone();
        rewrite(&mut twice, &mapping);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_rewrite_empty_mapping_is_noop() {
        let mut doc = story();
        let original = doc.clone();
        assert_eq!(rewrite(&mut doc, &IdentifierMapping::new(EntityKind::Image)), 0);
        assert_eq!(doc, original);
    }

    #[test]
    fn test_rewrite_top_level_id() {
        let mut doc = ContentDocument::new(json!({"_id": "gal1", "content_elements": []}));
        let mut mapping = IdentifierMapping::new(EntityKind::Gallery);
        mapping.insert("gal1", "GALNEW");
        assert_eq!(rewrite(&mut doc, &mapping), 1);
        assert_eq!(doc.id(), Some("GALNEW"));
    }

    #[test]
    fn test_portability_tables() {
        let cross = PortabilityTable::cross_tenant();
        assert!(cross.regenerates(EntityKind::Image));
        assert!(cross.regenerates(EntityKind::Gallery));
        assert_eq!(cross.portability(EntityKind::Video), Portability::Copy);
        assert_eq!(cross.portability(EntityKind::Distributor), Portability::Resolve);

        let same = PortabilityTable::same_tenant();
        assert!(!same.regenerates(EntityKind::Image));
        assert_eq!(same.portability(EntityKind::GeoRestriction), Portability::Resolve);
    }

    #[test]
    fn test_reference_value_shape() {
        let value = reference_value("/news", EntityKind::Section, Some("site"));
        assert_eq!(
            value,
            json!({"type": "reference", "referent": {"id": "/news", "type": "section", "website": "site"}})
        );
    }
}
