//! End-to-end tests of the resolution pipeline over a scripted transport.

use async_trait::async_trait;
use innkeeper::batch::{company_lookup_command, user_lookup_command};
use innkeeper::{
    BatchCommands, BatchPort, BatchResults, Error, OwnershipResolver, ResolutionRequest,
    ResolverConfig, TransportError, WarningCode,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

const COLOR_FIELD: &str = "UF_COLOR";
const INN_FIELD: &str = "UF_CRM_INN";

/// Transport double: serves batch commands from a fixed table, pops enum
/// responses from a script, and can be told to fail specific batch calls.
struct MockPort {
    buckets: HashMap<String, Vec<Value>>,
    enum_script: Mutex<Vec<Option<Value>>>,
    fail_batch_calls: HashSet<usize>,
    batch_calls: Mutex<usize>,
    single_calls: Mutex<usize>,
}

impl MockPort {
    fn new(enum_script: Vec<Option<Value>>) -> Self {
        Self {
            buckets: HashMap::new(),
            enum_script: Mutex::new(enum_script),
            fail_batch_calls: HashSet::new(),
            batch_calls: Mutex::new(0),
            single_calls: Mutex::new(0),
        }
    }

    fn with_company(mut self, field: &str, inn: &str, row: Value) -> Self {
        self.buckets
            .insert(company_lookup_command(field, inn, COLOR_FIELD), vec![row]);
        self
    }

    fn with_user(mut self, user_id: i64, row: Value) -> Self {
        self.buckets.insert(user_lookup_command(user_id), vec![row]);
        self
    }

    fn failing_batch_call(mut self, index: usize) -> Self {
        self.fail_batch_calls.insert(index);
        self
    }

    fn batch_calls(&self) -> usize {
        *self.batch_calls.lock()
    }

    fn single_calls(&self) -> usize {
        *self.single_calls.lock()
    }
}

#[async_trait]
impl BatchPort for MockPort {
    async fn call(
        &self,
        _method: &str,
        _params: Value,
    ) -> core::result::Result<Value, TransportError> {
        *self.single_calls.lock() += 1;
        let mut script = self.enum_script.lock();
        assert!(!script.is_empty(), "unexpected enum fetch");
        match script.remove(0) {
            Some(value) => Ok(value),
            None => Err(TransportError::Http {
                message: "connection reset".to_string(),
            }),
        }
    }

    async fn call_batch(
        &self,
        commands: &BatchCommands,
    ) -> core::result::Result<BatchResults, TransportError> {
        let index = {
            let mut calls = self.batch_calls.lock();
            let index = *calls;
            *calls += 1;
            index
        };
        if self.fail_batch_calls.contains(&index) {
            return Err(TransportError::Status {
                code: 503,
                message: "service unavailable".to_string(),
            });
        }
        let mut out = BatchResults::new();
        for (key, command) in commands {
            if let Some(rows) = self.buckets.get(command) {
                out.insert(key.clone(), rows.clone());
            }
        }
        Ok(out)
    }
}

fn config() -> ResolverConfig {
    ResolverConfig {
        candidate_fields: vec![INN_FIELD.to_string()],
        color_field: COLOR_FIELD.to_string(),
        ..ResolverConfig::default()
    }
}

fn enum_rows() -> Value {
    json!([
        {"ID": "3", "VALUE": "Красный", "XML_ID": "RED"},
        {"ID": "4", "VALUE": "Зелёный", "XML_ID": "GREEN"},
    ])
}

fn company_row(id: &str, assignee: i64, color: i64) -> Value {
    json!({"ID": id, "ASSIGNED_BY_ID": assignee, (COLOR_FIELD): color.to_string()})
}

fn request(inns: &[&str]) -> ResolutionRequest {
    ResolutionRequest {
        inns: inns.iter().map(ToString::to_string).collect(),
        debug: false,
    }
}

fn resolver(port: MockPort) -> (OwnershipResolver, Arc<MockPort>) {
    let port = Arc::new(port);
    let resolver = OwnershipResolver::new(config(), port.clone()).unwrap();
    (resolver, port)
}

#[tokio::test]
async fn resolves_a_full_item() {
    let port = MockPort::new(vec![Some(enum_rows())])
        .with_company(INN_FIELD, "7701234567", company_row("1041", 7, 3))
        .with_user(7, json!({"ID": "7", "LAST_NAME": "Иванов", "NAME": "Пётр"}));
    let (resolver, _) = resolver(port);

    let res = resolver.resolve(request(&["7701234567"])).await.unwrap();
    assert!(res.warning.is_none());
    assert_eq!(res.items.len(), 1);

    let item = &res.items[0];
    assert_eq!(item.company_id.as_deref(), Some("1041"));
    assert_eq!(item.assigned_user_id, Some(7));
    assert_eq!(item.assigned_name.as_deref(), Some("Иванов Пётр"));
    assert_eq!(item.color_id, Some(3));
    assert_eq!(item.color_label.as_deref(), Some("Красный"));
    assert_eq!(item.color_external_code.as_deref(), Some("RED"));
}

#[tokio::test]
async fn output_preserves_first_seen_order_and_dedupes() {
    let port = MockPort::new(vec![Some(enum_rows())])
        .with_company(INN_FIELD, "1234567890", company_row("1", 7, 3))
        .with_user(7, json!({"ID": 7, "NAME": "Пётр"}));
    let (resolver, _) = resolver(port);

    let res = resolver
        .resolve(request(&["1234567890", "1234567890", " ", "9999999999"]))
        .await
        .unwrap();

    let inns: Vec<&str> = res.items.iter().map(|i| i.inn.as_str()).collect();
    assert_eq!(inns, vec!["1234567890", "9999999999"]);

    // Unmatched INN carries nothing but the INN itself.
    let unmatched = &res.items[1];
    assert_eq!(
        serde_json::to_value(unmatched).unwrap(),
        json!({"inn": "9999999999"})
    );
}

#[tokio::test]
async fn empty_input_short_circuits_without_rpc() {
    let (resolver, port) = resolver(MockPort::new(vec![]));

    let res = resolver.resolve(request(&[" ", ""])).await.unwrap();
    assert!(res.items.is_empty());
    assert!(res.warning.is_none());
    assert_eq!(port.batch_calls(), 0);
    assert_eq!(port.single_calls(), 0);
}

#[tokio::test]
async fn cache_hit_returns_identical_item_without_rpc() {
    let port = MockPort::new(vec![Some(enum_rows())])
        .with_company(INN_FIELD, "7701234567", company_row("1041", 7, 3))
        .with_user(7, json!({"ID": 7, "NAME": "Пётр"}));
    let (resolver, port) = resolver(port);

    let first = resolver.resolve(request(&["7701234567"])).await.unwrap();
    let batch_calls = port.batch_calls();
    let single_calls = port.single_calls();

    let second = resolver.resolve(request(&["7701234567"])).await.unwrap();
    assert_eq!(first.items, second.items);
    assert_eq!(
        serde_json::to_string(&first.items).unwrap(),
        serde_json::to_string(&second.items).unwrap()
    );
    // No new RPC of any kind, including the enum fetch.
    assert_eq!(port.batch_calls(), batch_calls);
    assert_eq!(port.single_calls(), single_calls);
}

#[tokio::test]
async fn processing_continues_past_a_failed_chunk() {
    // 120 INNs with one candidate field each: exactly 3 chunks (50/50/20).
    let inns: Vec<String> = (0..120).map(|i| format!("77{i:08}")).collect();
    let mut port = MockPort::new(vec![Some(enum_rows())]).failing_batch_call(0);
    for inn in &inns {
        let id = format!("c{inn}");
        port = port.with_company(INN_FIELD, inn, company_row(&id, 7, 3));
    }
    port = port.with_user(7, json!({"ID": 7, "NAME": "Пётр"}));
    let (resolver, port) = resolver(port);

    let refs: Vec<&str> = inns.iter().map(String::as_str).collect();
    let res = resolver.resolve(request(&refs)).await.unwrap();

    assert_eq!(res.items.len(), 120);
    let warning = res.warning.expect("chunk failure must surface a warning");
    assert_eq!(warning.code, WarningCode::ChunkFailed);

    // Chunk one (first 50 INNs) failed; chunks two and three resolved.
    assert!(res.items[..50].iter().all(|i| i.company_id.is_none()));
    assert!(res.items[50..].iter().all(|i| i.company_id.is_some()));

    // 3 company chunks + 1 user chunk.
    assert_eq!(port.batch_calls(), 4);
}

#[tokio::test]
async fn unknown_color_code_omits_color_fields_only() {
    let port = MockPort::new(vec![Some(enum_rows())])
        .with_company(INN_FIELD, "7701234567", company_row("1041", 7, 77))
        .with_user(7, json!({"ID": 7, "NAME": "Пётр"}));
    let (resolver, _) = resolver(port);

    let res = resolver.resolve(request(&["7701234567"])).await.unwrap();
    let item = &res.items[0];
    assert_eq!(item.company_id.as_deref(), Some("1041"));
    assert_eq!(item.assigned_user_id, Some(7));
    assert!(item.color_id.is_none());
    assert!(item.color_label.is_none());
    assert!(item.color_external_code.is_none());
}

#[tokio::test]
async fn first_candidate_field_wins() {
    let fields = vec!["UF_CRM_INN".to_string(), "RQ_INN".to_string()];
    let port = MockPort::new(vec![Some(enum_rows())])
        .with_company("UF_CRM_INN", "7701234567", company_row("first", 7, 3))
        .with_company("RQ_INN", "7701234567", company_row("second", 8, 4))
        .with_user(7, json!({"ID": 7, "NAME": "Пётр"}));
    let port = Arc::new(port);
    let config = ResolverConfig {
        candidate_fields: fields,
        color_field: COLOR_FIELD.to_string(),
        ..ResolverConfig::default()
    };
    let resolver = OwnershipResolver::new(config, port).unwrap();

    let res = resolver.resolve(request(&["7701234567"])).await.unwrap();
    assert_eq!(res.items[0].company_id.as_deref(), Some("first"));
}

#[tokio::test]
async fn stale_enum_mapping_degrades_with_warning() {
    // Zero enum TTL: the mapping expires immediately, forcing a refresh on
    // the second request, which the script then fails.
    let port = Arc::new(
        MockPort::new(vec![Some(enum_rows()), None])
            .with_company(INN_FIELD, "7701234567", company_row("1041", 7, 3))
            .with_user(7, json!({"ID": 7, "NAME": "Пётр"})),
    );
    let config = ResolverConfig {
        candidate_fields: vec![INN_FIELD.to_string()],
        color_field: COLOR_FIELD.to_string(),
        company_ttl: Duration::ZERO,
        enum_ttl: Duration::ZERO,
        ..ResolverConfig::default()
    };
    let resolver = OwnershipResolver::new(config, port).unwrap();

    resolver.resolve(request(&["7701234567"])).await.unwrap();
    let res = resolver.resolve(request(&["7701234567"])).await.unwrap();

    let warning = res.warning.expect("stale fallback must surface a warning");
    assert_eq!(warning.code, WarningCode::EnumStale);
    // The stale mapping still labels the color.
    assert_eq!(res.items[0].color_label.as_deref(), Some("Красный"));
}

#[tokio::test]
async fn enum_failure_with_no_cache_fails_the_request() {
    let port = MockPort::new(vec![None]).with_company(
        INN_FIELD,
        "7701234567",
        company_row("1041", 7, 3),
    );
    let (resolver, _) = resolver(port);

    let err = resolver.resolve(request(&["7701234567"])).await.unwrap_err();
    assert!(matches!(err, Error::EnumUnavailable { .. }));
}

#[tokio::test]
async fn debug_mode_echoes_previews_and_enum_field() {
    let port = MockPort::new(vec![Some(enum_rows())])
        .with_company(INN_FIELD, "7701234567", company_row("1041", 7, 3))
        .with_user(7, json!({"ID": 7, "NAME": "Пётр"}));
    let (resolver, _) = resolver(port);

    let res = resolver
        .resolve(ResolutionRequest {
            inns: vec!["7701234567".to_string()],
            debug: true,
        })
        .await
        .unwrap();

    let echo = res.debug.expect("debug echo requested");
    assert_eq!(echo.enum_field, "COMPANY_COLOR");
    assert_eq!(echo.command_previews.len(), 1);
    assert!(echo.command_previews[0].contains("filter[UF_CRM_INN]=7701234567"));
}
