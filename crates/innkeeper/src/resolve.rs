//! Top-level resolution workflow.
//!
//! The pipeline is linear: normalize input, partition against the
//! company-result cache, fetch the enum table once, run the chunked company
//! lookup for the misses, resolve assignee names, assemble one item per
//! input INN in first-seen order, and write fresh matches back into the
//! cache.
//!
//! Partial upstream failures degrade the output: the first chunk failure (or
//! an enum-stale fallback) is reported as a single warning on an otherwise
//! successful response. The request as a whole fails only when the enum
//! table is unavailable with no cached fallback.

use crate::batch::{CommandSeq, execute_chunks, plan_company_lookup};
use crate::cache::TtlCache;
use crate::config::ResolverConfig;
use crate::enums::EnumResolver;
use crate::error::Result;
use crate::model::{
    CompanyMatch, DebugEcho, Resolution, ResolutionItem, ResolutionRequest, ResolutionWarning,
    WarningCode,
};
use crate::port::BatchPort;
use crate::users::UserNameResolver;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Resolves batches of INNs to company ownership metadata.
///
/// Holds the three cache tiers and the transport port; one instance lives
/// for the whole service process and is shared across concurrent requests.
pub struct OwnershipResolver {
    config: ResolverConfig,
    port: Arc<dyn BatchPort>,
    companies: TtlCache<String, ResolutionItem>,
    users: UserNameResolver,
    enums: EnumResolver,
}

impl OwnershipResolver {
    /// Builds a resolver over `port`, validating the configuration.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidConfig`] when the configuration is rejected.
    pub fn new(config: ResolverConfig, port: Arc<dyn BatchPort>) -> Result<Self> {
        config.validate()?;
        let companies = TtlCache::new(config.company_ttl);
        let users = UserNameResolver::new(config.user_ttl);
        let enums = EnumResolver::new(config.enum_field.clone(), config.enum_ttl);
        Ok(Self {
            config,
            port,
            companies,
            users,
            enums,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Runs the full resolution pipeline for one request.
    ///
    /// Output order matches first-seen input order after normalization
    /// (trim, drop empties, dedupe). An empty normalized input
    /// short-circuits to an empty successful result.
    ///
    /// # Errors
    ///
    /// [`crate::Error::EnumUnavailable`] when the color table cannot be
    /// fetched and was never cached. All other upstream failures degrade the
    /// response instead.
    pub async fn resolve(&self, request: ResolutionRequest) -> Result<Resolution> {
        let inns = normalize(&request.inns);
        if inns.is_empty() {
            return Ok(Resolution {
                items: Vec::new(),
                warning: None,
                debug: request.debug.then(|| self.debug_echo(Vec::new())),
            });
        }

        let deadline = Instant::now() + self.config.request_timeout;

        let mut cached = HashMap::new();
        let mut misses = Vec::new();
        for inn in &inns {
            match self.companies.get(inn) {
                Some(item) => {
                    cached.insert(inn.clone(), item);
                }
                None => misses.push(inn.clone()),
            }
        }
        tracing::debug!(
            total = inns.len(),
            hits = cached.len(),
            misses = misses.len(),
            "partitioned request against company cache"
        );

        // Fully served from cache: no RPC at all, not even the enum fetch.
        if misses.is_empty() {
            let items = inns
                .iter()
                .map(|inn| cached[inn].clone())
                .collect::<Vec<_>>();
            return Ok(Resolution {
                items,
                warning: None,
                debug: request.debug.then(|| self.debug_echo(Vec::new())),
            });
        }

        // One enum fetch shared across the whole request. Fatal only when
        // nothing was ever cached for the field.
        let enum_outcome = self.enums.resolve(self.port.as_ref(), deadline).await?;

        let mut seq = CommandSeq::new();
        let plan = plan_company_lookup(
            &misses,
            &self.config.candidate_fields,
            &self.config.color_field,
            &mut seq,
            self.config.batch_cap,
        );
        let previews = plan.previews();

        let (buckets, mut first_error) =
            execute_chunks(self.port.as_ref(), &plan.chunks, deadline).await;

        // De-multiplex: per INN, first candidate field yielding a row that
        // parses wins; later matches for the same INN are ignored.
        let mut matches: HashMap<String, CompanyMatch> = HashMap::new();
        for (inn, keys) in &plan.keys_by_inn {
            for key in keys {
                let Some(row) = buckets.get(key).and_then(|rows| rows.first()) else {
                    continue;
                };
                if let Some(m) = CompanyMatch::from_row(row, &self.config.color_field) {
                    matches.insert(inn.clone(), m);
                    break;
                }
            }
        }

        let assignees = distinct_assignees(&misses, &matches);
        let (names, user_error) = self
            .users
            .resolve_names(
                self.port.as_ref(),
                &assignees,
                &mut seq,
                self.config.batch_cap,
                deadline,
            )
            .await;
        if let Some(err) = user_error {
            first_error.get_or_insert(err);
        }

        let mut items = Vec::with_capacity(inns.len());
        for inn in &inns {
            if let Some(item) = cached.get(inn) {
                items.push(item.clone());
                continue;
            }
            let mut item = ResolutionItem::unresolved(inn.clone());
            if let Some(m) = matches.get(inn) {
                item.company_id = Some(m.company_id.clone());
                item.assigned_user_id = m.assigned_user_id;
                item.assigned_name = m.assigned_user_id.and_then(|id| names.get(&id).cloned());
                if let Some(entry) = m
                    .raw_color_code
                    .and_then(|code| enum_outcome.map.get(&code))
                {
                    item.color_id = Some(entry.id);
                    item.color_label = Some(entry.label.clone());
                    item.color_external_code = entry.external_code.clone();
                }
                // Unmatched INNs are deliberately not cached, so a later
                // retry re-checks instead of remembering "not found".
                self.companies.set(inn.clone(), item.clone());
            }
            items.push(item);
        }

        // One warning per response, first-encountered event wins: the enum
        // fallback happens before any chunk is dispatched.
        let warning = if enum_outcome.stale {
            Some(ResolutionWarning {
                code: WarningCode::EnumStale,
                message: format!(
                    "enum table refresh failed for {}; served last known mapping",
                    self.config.enum_field
                ),
            })
        } else {
            first_error.map(|err| ResolutionWarning {
                code: WarningCode::ChunkFailed,
                message: err.to_string(),
            })
        };

        Ok(Resolution {
            items,
            warning,
            debug: request.debug.then(|| self.debug_echo(previews)),
        })
    }

    fn debug_echo(&self, command_previews: Vec<String>) -> DebugEcho {
        DebugEcho {
            command_previews,
            enum_field: self.config.enum_field.clone(),
        }
    }
}

/// Trims, drops empties, and dedupes by value, preserving first-seen order.
fn normalize(inns: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for inn in inns {
        let trimmed = inn.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            out.push(trimmed.to_string());
        }
    }
    out
}

/// Distinct assignee ids from fresh matches, in miss order.
fn distinct_assignees(misses: &[String], matches: &HashMap<String, CompanyMatch>) -> Vec<i64> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for inn in misses {
        if let Some(id) = matches.get(inn).and_then(|m| m.assigned_user_id) {
            if seen.insert(id) {
                out.push(id);
            }
        }
    }
    out
}
