//! Tenant identity and credentials passed with every collaborator call

use std::fmt;

/// A bearer token for one tenant
///
/// The token never appears in `Debug` output, so contexts can be logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Platform environment a tenant lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

impl Environment {
    /// Environment segment used by the video API host
    pub fn video_segment(&self) -> &'static str {
        match self {
            Environment::Production => "prod",
            Environment::Sandbox => "sandbox",
        }
    }
}

const SANDBOX_PREFIX: &str = "sandbox.";

/// One tenant organisation together with the credential used to reach it
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant: String,
    pub credential: Credential,
    pub environment: Environment,
}

impl TenantContext {
    pub fn new(tenant: impl Into<String>, credential: Credential) -> Self {
        Self {
            tenant: tenant.into(),
            credential,
            environment: Environment::Production,
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Organisation name without the `sandbox.` prefix
    ///
    /// The video API addresses sandboxes by environment rather than by a
    /// prefixed organisation name.
    pub fn organization(&self) -> &str {
        self.tenant
            .strip_prefix(SANDBOX_PREFIX)
            .unwrap_or(&self.tenant)
    }

    /// Tenant name of the sandbox belonging to `org`
    pub fn sandbox_tenant(org: &str) -> String {
        if org.starts_with(SANDBOX_PREFIX) {
            org.to_string()
        } else {
            format!("{}{}", SANDBOX_PREFIX, org)
        }
    }
}
