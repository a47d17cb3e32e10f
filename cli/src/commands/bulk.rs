use super::{build_request, cap, collaborators};
use crate::config::MigrateConfig;
use crate::output::{print_bulk, OutputFormat};
use crate::TenantArgs;
use anyhow::Result;
use migration::{migrate_authors, migrate_redirects, Pipeline, RedirectScan};

pub async fn authors(tenants: TenantArgs, limit: usize, config: &MigrateConfig, format: OutputFormat) -> Result<()> {
    let request = build_request(&tenants, config)?;
    let pipeline = Pipeline::new(collaborators(config)?);
    let report = migrate_authors(&pipeline, &request, cap(limit)).await?;
    print_bulk("authors", &report, format)
}

pub async fn redirects(tenants: TenantArgs, scan: RedirectScan, config: &MigrateConfig, format: OutputFormat) -> Result<()> {
    let request = build_request(&tenants, config)?;
    let collaborators = collaborators(config)?;
    let report = migrate_redirects(&collaborators, &request, &scan).await?;
    print_bulk("redirects", &report, format)
}
