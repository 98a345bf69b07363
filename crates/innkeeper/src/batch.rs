//! Planning and execution of bounded-size command batches.
//!
//! The external API has no native batching semantics of its own beyond "at
//! most 50 named commands per call", so lookups are planned up front: one
//! command per (INN, candidate field) pair, filled into chunks in generation
//! order, with the per-INN command keys retained so results can be
//! de-multiplexed afterwards.
//!
//! Chunks are executed sequentially. A chunk that fails at the transport
//! level is logged and skipped; the first such error is kept sticky so the
//! caller can surface exactly one warning for the whole request. Degraded
//! partial results beat an all-or-nothing failure for a multi-INN request.

use crate::port::{BatchCommands, BatchPort, BatchResults, TransportError};
use std::time::Instant;

/// Hard cap on commands per upstream batch call.
pub const MAX_BATCH_COMMANDS: usize = 50;

/// Request-scoped generator of command keys.
///
/// Keys are unique across the whole batch sequence of one resolution run,
/// not just within one chunk, and are zero-padded so lexicographic order
/// matches generation order.
#[derive(Debug, Default)]
pub struct CommandSeq {
    next: u64,
}

impl CommandSeq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next unique command key (`q0000`, `q0001`, ...).
    pub fn next_key(&mut self) -> String {
        let key = format!("q{:04}", self.next);
        self.next += 1;
        key
    }
}

/// Renders the list command probing one candidate field for one INN.
///
/// Kept in one place so dispatched commands and debug previews agree.
pub fn company_lookup_command(field: &str, inn: &str, color_field: &str) -> String {
    format!(
        "crm.company.list?filter[{field}]={inn}&select[]=ID&select[]=ASSIGNED_BY_ID&select[]={color_field}"
    )
}

/// Renders the command resolving one user id.
pub fn user_lookup_command(user_id: i64) -> String {
    format!("user.get?ID={user_id}")
}

/// A planned company lookup: chunked commands plus the key bookkeeping
/// needed to merge results back per INN.
#[derive(Debug)]
pub struct LookupPlan {
    /// Command chunks in dispatch order, each at most `cap` commands.
    pub chunks: Vec<BatchCommands>,
    /// Per INN (input order), the generated command keys in declared
    /// candidate-field order.
    pub keys_by_inn: Vec<(String, Vec<String>)>,
}

impl LookupPlan {
    /// `key: command` preview lines in generation order, for debug echo.
    pub fn previews(&self) -> Vec<String> {
        self.chunks
            .iter()
            .flat_map(|chunk| chunk.iter().map(|(key, cmd)| format!("{key}: {cmd}")))
            .collect()
    }
}

/// A planned user lookup: chunked commands plus one key per user id.
#[derive(Debug)]
pub struct UserPlan {
    pub chunks: Vec<BatchCommands>,
    pub key_by_user: Vec<(i64, String)>,
}

/// Plans the chunked company lookup for `inns`.
///
/// One command is generated per candidate field, so a single INN may occupy
/// several command slots and may straddle a chunk boundary; the association
/// between keys and the originating INN is what makes that safe.
pub fn plan_company_lookup(
    inns: &[String],
    candidate_fields: &[String],
    color_field: &str,
    seq: &mut CommandSeq,
    cap: usize,
) -> LookupPlan {
    let mut chunks = Vec::new();
    let mut current = BatchCommands::new();
    let mut keys_by_inn = Vec::with_capacity(inns.len());

    for inn in inns {
        let mut keys = Vec::with_capacity(candidate_fields.len());
        for field in candidate_fields {
            if current.len() == cap {
                chunks.push(std::mem::take(&mut current));
            }
            let key = seq.next_key();
            current.insert(key.clone(), company_lookup_command(field, inn, color_field));
            keys.push(key);
        }
        keys_by_inn.push((inn.clone(), keys));
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    LookupPlan {
        chunks,
        keys_by_inn,
    }
}

/// Plans the chunked user lookup, one command per user id.
pub fn plan_user_lookup(user_ids: &[i64], seq: &mut CommandSeq, cap: usize) -> UserPlan {
    let mut chunks = Vec::new();
    let mut current = BatchCommands::new();
    let mut key_by_user = Vec::with_capacity(user_ids.len());

    for &user_id in user_ids {
        if current.len() == cap {
            chunks.push(std::mem::take(&mut current));
        }
        let key = seq.next_key();
        current.insert(key.clone(), user_lookup_command(user_id));
        key_by_user.push((user_id, key));
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    UserPlan {
        chunks,
        key_by_user,
    }
}

/// Executes `chunks` sequentially against the port, merging result buckets.
///
/// The deadline is checked before each call; once it elapses the remaining
/// chunks are skipped. Returns the merged buckets plus the first error
/// encountered (transport failure or deadline), if any. Processing always
/// continues past a failed chunk.
pub async fn execute_chunks(
    port: &dyn BatchPort,
    chunks: &[BatchCommands],
    deadline: Instant,
) -> (BatchResults, Option<TransportError>) {
    let mut buckets = BatchResults::new();
    let mut first_error: Option<TransportError> = None;

    for (index, chunk) in chunks.iter().enumerate() {
        if Instant::now() >= deadline {
            tracing::warn!(chunk = index, "request deadline reached, skipping remaining chunks");
            first_error.get_or_insert(TransportError::DeadlineExceeded);
            break;
        }
        tracing::debug!(chunk = index, commands = chunk.len(), "dispatching batch chunk");
        match port.call_batch(chunk).await {
            Ok(results) => buckets.extend(results),
            Err(err) => {
                tracing::warn!(chunk = index, error = %err, "batch chunk failed, continuing");
                first_error.get_or_insert(err);
            }
        }
    }

    (buckets, first_error)
}
