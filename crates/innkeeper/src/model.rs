//! Domain records and the strict parsing boundary for upstream rows.
//!
//! The CRM returns loosely typed rows: identifiers arrive as JSON numbers or
//! numeric strings depending on the endpoint, and optional fields may be
//! missing, `null`, empty, or `"0"`. Everything the resolver consumes is
//! normalized here, once, into strict shapes; a row that cannot be
//! normalized reads as "no match" rather than an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input to one resolution run.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ResolutionRequest {
    /// Raw INN strings as received; normalized (trimmed, deduplicated) by
    /// the orchestrator.
    pub inns: Vec<String>,
    /// When set, the response echoes generated command previews and the
    /// enum field name. Purely diagnostic.
    #[serde(default)]
    pub debug: bool,
}

/// One company row matched for an INN.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompanyMatch {
    pub company_id: String,
    pub assigned_user_id: Option<i64>,
    pub raw_color_code: Option<i64>,
}

impl CompanyMatch {
    /// Normalizes an untyped company row.
    ///
    /// Returns `None` when the row has no usable `ID`, which the caller
    /// treats as "no match" for the originating command. `color_field` names
    /// the custom field carrying the raw color code.
    pub fn from_row(row: &Value, color_field: &str) -> Option<Self> {
        let company_id = field_as_string(row, "ID")?;
        Some(Self {
            company_id,
            assigned_user_id: field_as_i64(row, "ASSIGNED_BY_ID"),
            raw_color_code: field_as_i64(row, color_field),
        })
    }
}

/// A resolved display name for a CRM user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserDisplayName {
    pub user_id: i64,
    pub name: String,
}

impl UserDisplayName {
    /// Normalizes an untyped user row, assembling the display name from its
    /// name parts.
    ///
    /// The name is `LAST_NAME NAME SECOND_NAME` with empty parts skipped and
    /// the result trimmed; when all parts are empty it falls back to the
    /// first name, then the login, then the stringified user id, first
    /// non-empty wins.
    pub fn from_row(row: &Value) -> Option<Self> {
        let user_id = field_as_i64(row, "ID")?;

        let last = field_as_trimmed(row, "LAST_NAME");
        let first = field_as_trimmed(row, "NAME");
        let middle = field_as_trimmed(row, "SECOND_NAME");

        let joined = [last, first.clone(), middle]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");

        let name = if !joined.is_empty() {
            joined
        } else if let Some(first) = first {
            first
        } else if let Some(login) = field_as_trimmed(row, "LOGIN") {
            login
        } else {
            user_id.to_string()
        };

        Some(Self { user_id, name })
    }
}

/// One entry of the field-wide color enum table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorEnumEntry {
    pub id: i64,
    pub label: String,
    pub external_code: Option<String>,
}

impl ColorEnumEntry {
    /// Normalizes one untyped enum list row; rows without a numeric id are
    /// skipped.
    pub fn from_row(row: &Value) -> Option<Self> {
        let id = field_as_i64(row, "ID")?;
        let label = field_as_trimmed(row, "VALUE")
            .or_else(|| field_as_trimmed(row, "NAME"))
            .unwrap_or_else(|| id.to_string());
        Some(Self {
            id,
            label,
            external_code: field_as_trimmed(row, "XML_ID"),
        })
    }
}

/// Warning category attached to a degraded (but successful) response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    /// At least one lookup chunk failed; results are partial.
    ChunkFailed,
    /// The enum table fetch failed and an expired cached mapping was used.
    EnumStale,
}

/// Non-fatal degradation report carried on a successful response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionWarning {
    pub code: WarningCode,
    pub message: String,
}

/// Output unit: exactly one per requested INN, in first-seen input order.
///
/// All optional fields are absent when unresolved.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionItem {
    pub inn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_external_code: Option<String>,
}

impl ResolutionItem {
    /// An item carrying only the INN, for inputs that matched nothing.
    pub fn unresolved(inn: impl Into<String>) -> Self {
        Self {
            inn: inn.into(),
            ..Self::default()
        }
    }
}

/// Diagnostic echo returned only when the caller requested debug mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugEcho {
    /// `key: command` previews for every generated lookup command.
    pub command_previews: Vec<String>,
    /// The enum field the color table was resolved against.
    pub enum_field: String,
}

/// Full result of one resolution run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resolution {
    pub items: Vec<ResolutionItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<ResolutionWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugEcho>,
}

/// Reads `row[key]` as an integer, accepting numbers and numeric strings.
fn field_as_i64(row: &Value, key: &str) -> Option<i64> {
    match row.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads `row[key]` as a non-empty string, stringifying numbers.
fn field_as_string(row: &Value, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        _ => None,
    }
}

/// Reads `row[key]` as a trimmed non-empty string.
fn field_as_trimmed(row: &Value, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn company_row_accepts_string_and_number_ids() {
        let row = json!({"ID": "1041", "ASSIGNED_BY_ID": 7, "UF_COLOR": "3"});
        let m = CompanyMatch::from_row(&row, "UF_COLOR").unwrap();
        assert_eq!(m.company_id, "1041");
        assert_eq!(m.assigned_user_id, Some(7));
        assert_eq!(m.raw_color_code, Some(3));
    }

    #[test]
    fn company_row_without_id_is_no_match() {
        let row = json!({"ASSIGNED_BY_ID": 7});
        assert!(CompanyMatch::from_row(&row, "UF_COLOR").is_none());
    }

    #[test]
    fn company_row_tolerates_missing_optionals() {
        let row = json!({"ID": 12});
        let m = CompanyMatch::from_row(&row, "UF_COLOR").unwrap();
        assert_eq!(m.company_id, "12");
        assert_eq!(m.assigned_user_id, None);
        assert_eq!(m.raw_color_code, None);
    }

    #[test]
    fn display_name_joins_name_parts() {
        let row = json!({
            "ID": "7",
            "LAST_NAME": "Иванов",
            "NAME": "Пётр",
            "SECOND_NAME": "Сергеевич",
        });
        let u = UserDisplayName::from_row(&row).unwrap();
        assert_eq!(u.name, "Иванов Пётр Сергеевич");
    }

    #[test]
    fn display_name_skips_empty_parts() {
        let row = json!({"ID": 7, "LAST_NAME": "  ", "NAME": "Пётр", "SECOND_NAME": ""});
        let u = UserDisplayName::from_row(&row).unwrap();
        assert_eq!(u.name, "Пётр");
    }

    #[test]
    fn display_name_falls_back_to_login_then_id() {
        let row = json!({"ID": 7, "LOGIN": "p.ivanov"});
        assert_eq!(UserDisplayName::from_row(&row).unwrap().name, "p.ivanov");

        let row = json!({"ID": 7});
        assert_eq!(UserDisplayName::from_row(&row).unwrap().name, "7");
    }

    #[test]
    fn enum_row_prefers_value_over_name() {
        let row = json!({"ID": "3", "VALUE": "Красный", "NAME": "red", "XML_ID": "RED"});
        let e = ColorEnumEntry::from_row(&row).unwrap();
        assert_eq!(e.label, "Красный");
        assert_eq!(e.external_code.as_deref(), Some("RED"));
    }

    #[test]
    fn unresolved_item_serializes_to_inn_only() {
        let item = ResolutionItem::unresolved("1234567890");
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v, json!({"inn": "1234567890"}));
    }
}
