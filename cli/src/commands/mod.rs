pub mod bulk;
pub mod migrate;

use crate::config::MigrateConfig;
use crate::{TargetArg, TenantArgs};
use anyhow::{bail, Result};
use migration::{Collaborators, MigrationRequest, MigrationVariant, Target};
use platform_client::{Credential, Environment, HttpPlatform, TenantContext};
use std::sync::Arc;

/// A CLI limit of 0 means no limit
pub fn cap(limit: usize) -> Option<usize> {
    (limit > 0).then_some(limit)
}

/// Build the request shared by every command from the tenant arguments
pub fn build_request(tenants: &TenantArgs, config: &MigrateConfig) -> Result<MigrationRequest> {
    let target = match tenants.target {
        TargetArg::Production => Target::Production,
        TargetArg::Sandbox => Target::Sandbox,
    };

    let source = TenantContext::new(&tenants.from_org, Credential::new(&tenants.from_token));
    let destination = match (target, tenants.to_org.as_deref()) {
        (Target::Production, Some(to_org)) if !to_org.trim().is_empty() => {
            TenantContext::new(to_org, Credential::new(&tenants.to_token))
        }
        (Target::Production, _) => bail!("--to-org is required for production targets"),
        (Target::Sandbox, to_org) => {
            let tenant = to_org
                .filter(|org| !org.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| TenantContext::sandbox_tenant(&tenants.from_org));
            TenantContext::new(tenant, Credential::new(&tenants.to_token)).with_environment(Environment::Sandbox)
        }
    };

    Ok(MigrationRequest::new(source, destination, MigrationVariant::for_target(target))
        .with_dry_run(tenants.dry_run)
        .with_versions(config.versions.clone()))
}

pub fn collaborators(config: &MigrateConfig) -> Result<Collaborators> {
    let platform = HttpPlatform::new(config.endpoints(), config.request_timeout)?;
    Ok(Collaborators::from_platform(Arc::new(platform)))
}
