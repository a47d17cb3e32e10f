//! Circulation and taxonomy rewriting for a destination website
//!
//! Stories keep their placements in a separate circulation array; videos and
//! galleries embed them in `taxonomy`, and come back from their services in an
//! embedded (non-reference) shape that ingestion does not accept. Both forms
//! are rewritten to one destination website, either keeping the original
//! section ids or collapsing to a single destination section.

use crate::document::ContentDocument;
use crate::error::ContentError;
use crate::references::{reference_value, EntityKind};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// One (website, section) placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPlacement {
    pub section: String,
    pub website: String,
}

impl SectionPlacement {
    pub fn new(section: &str, website: &str) -> Self {
        Self {
            section: section.to_string(),
            website: website.to_string(),
        }
    }
}

/// How sections are carried over to the destination website
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CirculationPolicy {
    /// Replace every placement with one destination section
    Collapse { section: String },
    /// Keep the original section ids, moved onto the destination website
    Preserve,
}

impl CirculationPolicy {
    /// An absent or blank section means the original sections are kept
    pub fn from_section(section: Option<&str>) -> Self {
        match section.map(str::trim) {
            Some(section) if !section.is_empty() => CirculationPolicy::Collapse {
                section: section.to_string(),
            },
            _ => CirculationPolicy::Preserve,
        }
    }
}

/// Destination of a circulation transform
#[derive(Debug, Clone)]
pub struct CirculationTarget {
    pub source_tenant: String,
    pub destination_tenant: String,
    pub website: String,
    pub policy: CirculationPolicy,
}

/// Placements recorded for one tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantPlacements {
    pub tenant: String,
    pub placements: Vec<SectionPlacement>,
}

/// Before and after snapshots of one circulation transform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CirculationAudit {
    pub source: TenantPlacements,
    pub destination: TenantPlacements,
}

impl CirculationAudit {
    /// Website of the first source placement, used to look up redirects
    pub fn source_website(&self) -> Option<&str> {
        self.source
            .placements
            .first()
            .map(|placement| placement.website.as_str())
    }
}

/// Placements listed in a story circulation array
pub fn placements_from_circulations(circulations: &Value) -> Vec<SectionPlacement> {
    let mut placements = Vec::new();
    for circulation in circulations.as_array().into_iter().flatten() {
        for section in circulation
            .get("website_sections")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if let Some(placement) = referent_placement(section) {
                placements.push(placement);
            }
        }
    }
    placements
}

/// Placements listed in `taxonomy.sections`, in either shape
pub fn placements_from_taxonomy(doc: &ContentDocument) -> Vec<SectionPlacement> {
    doc.get("/taxonomy/sections")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|section| referent_placement(section).or_else(|| embedded_placement(section)))
        .collect()
}

fn referent_placement(section: &Value) -> Option<SectionPlacement> {
    let id = section.pointer("/referent/id")?.as_str()?;
    let website = section
        .pointer("/referent/website")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Some(SectionPlacement::new(id, website))
}

fn embedded_placement(section: &Value) -> Option<SectionPlacement> {
    let id = section.get("_id")?.as_str()?;
    let website = section
        .get("_website")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Some(SectionPlacement::new(id, website))
}

/// Rewrite a story's circulation array for the destination website
///
/// With [`CirculationPolicy::Collapse`] exactly one circulation record
/// survives, holding the destination section as both primary and sole
/// section. With [`CirculationPolicy::Preserve`] every record and section is
/// kept and only its website changes.
pub fn transform_story_circulation(
    circulations: &mut Value,
    document_id: &str,
    target: &CirculationTarget,
) -> Result<CirculationAudit> {
    if circulations.is_null() {
        *circulations = Value::Array(Vec::new());
    }
    let before = placements_from_circulations(circulations);
    let records = circulations
        .as_array_mut()
        .ok_or_else(|| ContentError::UnexpectedShape {
            field: "circulations".to_string(),
            expected: "array",
        })?;

    match &target.policy {
        CirculationPolicy::Collapse { section } => {
            records.truncate(1);
            if records.is_empty() {
                tracing::warn!(document_id, "Story has no circulation, creating one");
                records.push(json!({ "document_id": document_id }));
            }
            let record = circulation_record(&mut records[0])?;
            let primary = reference_value(section, EntityKind::Section, Some(&target.website));
            record.insert("website_id".to_string(), Value::String(target.website.clone()));
            record.insert("website_primary_section".to_string(), primary.clone());
            record.insert("website_sections".to_string(), Value::Array(vec![primary]));
        }
        CirculationPolicy::Preserve => {
            for record in records.iter_mut() {
                let record = circulation_record(record)?;
                record.insert("website_id".to_string(), Value::String(target.website.clone()));
                if let Some(primary) = record
                    .get_mut("website_primary_section")
                    .and_then(|primary| primary.get_mut("referent"))
                    .and_then(Value::as_object_mut)
                {
                    primary.insert("website".to_string(), Value::String(target.website.clone()));
                }
                for section in record
                    .get_mut("website_sections")
                    .and_then(Value::as_array_mut)
                    .into_iter()
                    .flatten()
                {
                    if let Some(referent) = section.get_mut("referent").and_then(Value::as_object_mut) {
                        referent.insert("website".to_string(), Value::String(target.website.clone()));
                    }
                }
            }
        }
    }

    let after = placements_from_circulations(circulations);
    Ok(audit(target, before, after))
}

fn circulation_record(record: &mut Value) -> Result<&mut Map<String, Value>> {
    record.as_object_mut().ok_or_else(|| ContentError::UnexpectedShape {
        field: "circulations".to_string(),
        expected: "object",
    })
}

/// Convert embedded taxonomy sections into reference shape
///
/// Sections already in reference shape are left alone. The website of each
/// section is kept; [`transform_embedded_taxonomy`] moves it afterwards.
pub fn normalize_taxonomy(doc: &mut ContentDocument) {
    if let Some(primary) = doc.get("/taxonomy/primary_section").cloned() {
        if let Some(placement) = embedded_placement(&primary) {
            doc.set(
                "/taxonomy/primary_section",
                reference_value(&placement.section, EntityKind::Section, Some(&placement.website)),
            );
        }
    }

    if let Some(sections) = doc.array_mut("/taxonomy/sections") {
        for section in sections.iter_mut() {
            if referent_placement(section).is_some() {
                continue;
            }
            if let Some(placement) = embedded_placement(section) {
                *section =
                    reference_value(&placement.section, EntityKind::Section, Some(&placement.website));
            }
        }
    }
}

/// Rewrite an embedded taxonomy (video, gallery) for the destination website
///
/// `flag_primary` marks the primary section reference with
/// `referent_properties.additional_properties.primary = true`, which video
/// ingestion expects.
pub fn transform_embedded_taxonomy(
    doc: &mut ContentDocument,
    target: &CirculationTarget,
    flag_primary: bool,
) -> Result<CirculationAudit> {
    let before = placements_from_taxonomy(doc);
    let original_primary = primary_section_id(doc);
    normalize_taxonomy(doc);

    let website = Some(target.website.as_str());
    match &target.policy {
        CirculationPolicy::Collapse { section } => {
            let mut primary = reference_value(section, EntityKind::Section, website);
            if flag_primary {
                mark_primary(&mut primary);
            }
            doc.set("/taxonomy/primary_section", primary.clone());
            doc.set("/taxonomy/sections", Value::Array(vec![primary]));
        }
        CirculationPolicy::Preserve => {
            let primary_id = original_primary
                .or_else(|| before.first().map(|placement| placement.section.clone()))
                .ok_or_else(|| {
                    ContentError::Circulation(
                        "document has no primary section and no sections to keep".to_string(),
                    )
                })?;
            let mut primary = reference_value(&primary_id, EntityKind::Section, website);
            if flag_primary {
                mark_primary(&mut primary);
            }
            doc.set("/taxonomy/primary_section", primary);

            let sections: Vec<Value> = before
                .iter()
                .map(|placement| reference_value(&placement.section, EntityKind::Section, website))
                .collect();
            doc.set("/taxonomy/sections", Value::Array(sections));
        }
    }

    let after = placements_from_taxonomy(doc);
    Ok(audit(target, before, after))
}

/// How `websites` and `canonical_url` are rebuilt for one destination website
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebsitesLayout {
    /// Keep `canonical_url` and list it as the website url (video)
    KeepCanonicalUrl,
    /// Move `canonical_url` under the website with its primary section (gallery)
    MoveCanonicalUrl,
}

/// Point `canonical_website` and `websites` at the destination website
pub fn rewrite_websites(doc: &mut ContentDocument, website: &str, layout: WebsitesLayout) {
    let canonical_url = doc
        .get_str("/canonical_url")
        .unwrap_or_default()
        .to_string();

    let mut entry = json!({ "website_url": canonical_url });
    if layout == WebsitesLayout::MoveCanonicalUrl {
        if let Some(primary) = doc.get("/taxonomy/primary_section").cloned() {
            entry["website_section"] = primary;
        }
        doc.remove("/canonical_url");
    }

    doc.set("/canonical_website", Value::String(website.to_string()));
    doc.set("/websites", json!({ website: entry }));
    doc.remove("/taxonomy/primary_site");
    doc.remove("/taxonomy/sites");
}

fn primary_section_id(doc: &ContentDocument) -> Option<String> {
    doc.get_str("/taxonomy/primary_section/_id")
        .or_else(|| doc.get_str("/taxonomy/primary_section/referent/id"))
        .or_else(|| doc.get_str("/taxonomy/primary_site/_id"))
        .map(str::to_string)
}

fn mark_primary(reference: &mut Value) {
    reference["referent"]["referent_properties"] =
        json!({ "additional_properties": { "primary": true } });
}

fn audit(
    target: &CirculationTarget,
    before: Vec<SectionPlacement>,
    after: Vec<SectionPlacement>,
) -> CirculationAudit {
    CirculationAudit {
        source: TenantPlacements {
            tenant: target.source_tenant.clone(),
            placements: before,
        },
        destination: TenantPlacements {
            tenant: target.destination_tenant.clone(),
            placements: after,
        },
    }
}
