//! Resolver configuration.

use crate::batch::MAX_BATCH_COMMANDS;
use crate::error::{Error, Result};
use std::time::Duration;

/// Tunables for one [`crate::OwnershipResolver`] instance.
///
/// The candidate fields are an ordered list of company fields that may hold
/// the INN; they are probed in declared order and the first field yielding a
/// non-empty row wins. Kept data-driven so deployments with differently
/// provisioned custom fields only change configuration.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// Company fields probed for the INN value, in priority order.
    pub candidate_fields: Vec<String>,
    /// Company field carrying the raw color code.
    pub color_field: String,
    /// Enum entity the color table is resolved against.
    pub enum_field: String,
    /// Maximum commands per upstream batch call (1..=50).
    pub batch_cap: usize,
    /// TTL of assembled per-INN results. Short: assignment and color change
    /// frequently.
    pub company_ttl: Duration,
    /// TTL of resolved user display names. Identity rarely changes.
    pub user_ttl: Duration,
    /// TTL of the color enum table. Field schema rarely changes.
    pub enum_ttl: Duration,
    /// Budget for the whole pipeline, checked before each external call.
    pub request_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            candidate_fields: vec!["UF_CRM_INN".to_string(), "RQ_INN".to_string()],
            color_field: "UF_CRM_COLOR".to_string(),
            enum_field: "COMPANY_COLOR".to_string(),
            batch_cap: MAX_BATCH_COMMANDS,
            company_ttl: Duration::from_secs(60),
            user_ttl: Duration::from_secs(600),
            enum_ttl: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ResolverConfig {
    /// Validates the configuration, returning the first violation found.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] when the candidate field list is empty, the
    /// batch cap is outside `1..=50`, or the request timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.candidate_fields.is_empty() {
            return Err(Error::InvalidConfig {
                reason: "candidate_fields must not be empty".to_string(),
            });
        }
        if self.batch_cap == 0 || self.batch_cap > MAX_BATCH_COMMANDS {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "batch_cap must be within 1..={MAX_BATCH_COMMANDS}, got {}",
                    self.batch_cap
                ),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidConfig {
                reason: "request_timeout must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
