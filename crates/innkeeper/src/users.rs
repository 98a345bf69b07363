//! Resolution of CRM user ids to display names, cached.
//!
//! Name resolution rides the same chunking discipline as the company lookup:
//! one command per user id, chunks capped at the batch limit, sequential
//! dispatch, continue past failed chunks. Ids whose chunk failed simply stay
//! unresolved; the first transport error is handed back so the orchestrator
//! can fold it into its sticky first-error bookkeeping.

use crate::batch::{CommandSeq, plan_user_lookup};
use crate::cache::TtlCache;
use crate::model::UserDisplayName;
use crate::port::{BatchPort, TransportError};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Owns the user-name cache tier.
pub struct UserNameResolver {
    cache: TtlCache<i64, String>,
}

impl UserNameResolver {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: TtlCache::new(ttl),
        }
    }

    /// Resolves `user_ids` to display names, serving cache hits locally and
    /// batching the misses.
    ///
    /// Returns whatever could be resolved plus the first transport error
    /// encountered, if any. Freshly resolved names are written back to the
    /// cache.
    pub async fn resolve_names(
        &self,
        port: &dyn BatchPort,
        user_ids: &[i64],
        seq: &mut CommandSeq,
        cap: usize,
        deadline: Instant,
    ) -> (HashMap<i64, String>, Option<TransportError>) {
        let mut names = HashMap::with_capacity(user_ids.len());
        let mut misses = Vec::new();

        for &user_id in user_ids {
            match self.cache.get(&user_id) {
                Some(name) => {
                    names.insert(user_id, name);
                }
                None => misses.push(user_id),
            }
        }
        if misses.is_empty() {
            return (names, None);
        }

        let plan = plan_user_lookup(&misses, seq, cap);
        let (buckets, first_error) =
            crate::batch::execute_chunks(port, &plan.chunks, deadline).await;

        for (user_id, key) in &plan.key_by_user {
            let Some(rows) = buckets.get(key) else {
                continue;
            };
            let Some(user) = rows.first().and_then(UserDisplayName::from_row) else {
                continue;
            };
            self.cache.set(*user_id, user.name.clone());
            names.insert(*user_id, user.name);
        }

        (names, first_error)
    }
}
