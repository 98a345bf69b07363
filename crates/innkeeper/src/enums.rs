//! Resolution of the color enum table for a single categorical field.
//!
//! The table maps the field's internal numeric id to its human label and
//! external code. It is fetched with one RPC call and cached under the long
//! TTL tier; one fetch is shared across a whole resolution run no matter how
//! many INNs missed the company cache.
//!
//! Failure policy: when the fetch fails but any previously stored mapping
//! exists (even an expired one), the stale mapping is returned and the event
//! is reported as a soft warning by the caller. Only a fetch failure with no
//! cached mapping at all is fatal for the enclosing request.

use crate::cache::TtlCache;
use crate::error::{Error, Result};
use crate::model::ColorEnumEntry;
use crate::port::{BatchPort, TransportError, coerce_rows};
use serde_json::json;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Outcome of one enum resolution: the mapping plus whether it was served
/// stale after a failed refresh.
#[derive(Clone, Debug)]
pub struct EnumOutcome {
    pub map: HashMap<i64, ColorEnumEntry>,
    pub stale: bool,
}

/// Owns the enum-map cache tier for one field definition.
pub struct EnumResolver {
    field: String,
    cache: TtlCache<String, HashMap<i64, ColorEnumEntry>>,
}

impl EnumResolver {
    pub fn new(field: impl Into<String>, ttl: Duration) -> Self {
        Self {
            field: field.into(),
            cache: TtlCache::new(ttl),
        }
    }

    /// The enum entity this resolver serves.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the id → entry mapping, fetching it when the cached copy is
    /// missing or expired.
    ///
    /// # Errors
    ///
    /// [`Error::EnumUnavailable`] when the fetch fails (or the deadline has
    /// already elapsed) and nothing was ever cached for this field.
    pub async fn resolve(&self, port: &dyn BatchPort, deadline: Instant) -> Result<EnumOutcome> {
        if let Some(map) = self.cache.get(&self.field) {
            return Ok(EnumOutcome { map, stale: false });
        }

        let fetched = if Instant::now() >= deadline {
            Err(TransportError::DeadlineExceeded)
        } else {
            port.call(
                "crm.status.list",
                json!({"filter": {"ENTITY_ID": self.field}}),
            )
            .await
        };

        match fetched {
            Ok(value) => {
                let map = parse_entries(value);
                self.cache.set(self.field.clone(), map.clone());
                Ok(EnumOutcome { map, stale: false })
            }
            Err(err) => match self.cache.get_stale(&self.field) {
                Some(map) => {
                    tracing::warn!(
                        field = %self.field,
                        error = %err,
                        "enum fetch failed, serving stale mapping"
                    );
                    Ok(EnumOutcome { map, stale: true })
                }
                None => Err(Error::EnumUnavailable { source: err }),
            },
        }
    }
}

fn parse_entries(value: serde_json::Value) -> HashMap<i64, ColorEnumEntry> {
    coerce_rows(value)
        .iter()
        .filter_map(ColorEnumEntry::from_row)
        .map(|entry| (entry.id, entry))
        .collect()
}
