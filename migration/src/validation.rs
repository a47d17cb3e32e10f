//! Classification of schema validation results

use crate::error::{MigrationError, Result};
use platform_client::ValidationOutcome;

/// Messages the validation service returns when a distributor created during
/// the same run is not yet usable in the document
pub const FIRST_TIME_CREATION_MESSAGES: [&str; 4] = [
    "should NOT have additional properties",
    "should be equal to one of values",
    "should be string",
    "should match exactly one schema in oneOf",
];

/// Recognises validation failures caused by first-time entity creation
///
/// The remedy for these is running the migration again unchanged, so they are
/// reported apart from genuine schema problems.
pub trait FirstTimeCreationPolicy: Send + Sync {
    fn matches(&self, outcome: &ValidationOutcome) -> bool;
}

/// Matches one status code together with an exact, ordered message list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactMessagesPolicy {
    status: u16,
    messages: Vec<String>,
}

impl ExactMessagesPolicy {
    pub fn new(status: u16, messages: &[&str]) -> Self {
        Self {
            status,
            messages: messages.iter().map(|message| message.to_string()).collect(),
        }
    }
}

impl Default for ExactMessagesPolicy {
    fn default() -> Self {
        Self::new(400, &FIRST_TIME_CREATION_MESSAGES)
    }
}

impl FirstTimeCreationPolicy for ExactMessagesPolicy {
    fn matches(&self, outcome: &ValidationOutcome) -> bool {
        outcome.status == self.status && outcome.messages == self.messages
    }
}

/// Turn a validation outcome into `Ok` or the matching error
pub fn classify(outcome: &ValidationOutcome, policy: &dyn FirstTimeCreationPolicy) -> Result<()> {
    if outcome.is_valid() {
        return Ok(());
    }
    if policy.matches(outcome) {
        return Err(MigrationError::FirstTimeEntityCreation {
            body: outcome.body.clone(),
        });
    }
    Err(MigrationError::Validation {
        status: outcome.status,
        body: outcome.body.clone(),
    })
}
