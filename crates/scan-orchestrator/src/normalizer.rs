//! 결과 엔드포인트 응답을 하나의 [`ScanResult`]로 정규화
//!
//! 서비스는 두 가지 형태로 응답합니다:
//!
//! ```text
//! flat:    { "status": "infected", "signature": "EICAR", "meta": {..} }
//! nested:  { "details": { "status": "infected", "signature": "EICAR", "meta": {..} } }
//! ```
//!
//! 각 필드는 독립적으로 결정됩니다: `details.<field>`가 있으면 그 값,
//! 없으면 최상위 `<field>`, 그것도 없으면 기본값. null이 아니고
//! 문자열이면 비어 있지 않을 때 값이 있다고 봅니다. [`normalize`]는 실패하지 않습니다.

use serde_json::{Map, Value};

use scanpost_core::types::{ResultMeta, ScanResult, Verdict};

type Object = Map<String, Value>;

/// 원본 결과를 정규화합니다. 모든 JSON 값에 대해 결과를 반환합니다.
pub fn normalize(raw: &Value) -> ScanResult {
    let Some(root) = raw.as_object() else {
        return ScanResult::default();
    };
    let details = root.get("details").and_then(Value::as_object);

    let status = pick(details, root, "status")
        .and_then(Value::as_str)
        .and_then(Verdict::from_str_loose)
        .unwrap_or(Verdict::Error);

    let nested_meta = details.and_then(|d| d.get("meta")).and_then(Value::as_object);
    let flat_meta = root.get("meta").and_then(Value::as_object);
    let meta = nested_meta.or(flat_meta).cloned().unwrap_or_default();

    let signature = if status == Verdict::Infected {
        pick(details, root, "signature").and_then(text)
    } else {
        None
    };

    let message = pick(details, root, "message").and_then(text);

    let scanned_at = pick(details, root, "scannedAt")
        .or_else(|| nested_meta.and_then(|m| present(m.get("scannedAt"))))
        .or_else(|| flat_meta.and_then(|m| present(m.get("scannedAt"))))
        .and_then(text);

    ScanResult {
        status,
        meta: ResultMeta::new(meta),
        signature,
        message,
        scanned_at,
    }
}

fn pick<'a>(details: Option<&'a Object>, root: &'a Object, key: &str) -> Option<&'a Value> {
    details
        .and_then(|d| present(d.get(key)))
        .or_else(|| present(root.get(key)))
}

fn present(value: Option<&Value>) -> Option<&Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(v) => Some(v),
    }
}

/// 문자열은 그대로, 숫자는 문자열로 변환하고 나머지는 버립니다.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flat_and_nested_shapes_are_equivalent() {
        let flat = normalize(&json!({
            "status": "infected",
            "signature": "EICAR",
            "meta": { "size": 10 }
        }));
        let nested = normalize(&json!({
            "details": {
                "status": "infected",
                "signature": "EICAR",
                "meta": { "size": 10 }
            }
        }));
        assert_eq!(flat, nested);
        assert_eq!(flat.status, Verdict::Infected);
        assert_eq!(flat.signature.as_deref(), Some("EICAR"));
        assert_eq!(flat.meta.size(), Some(10));
    }

    #[test]
    fn empty_object_yields_defaults() {
        let result = normalize(&json!({}));
        assert_eq!(result.status, Verdict::Error);
        assert!(result.meta.is_empty());
        assert!(result.signature.is_none());
        assert!(result.message.is_none());
        assert!(result.scanned_at.is_none());
    }

    #[test]
    fn non_object_inputs_yield_defaults() {
        for raw in [json!(null), json!([1, 2]), json!("clean"), json!(42)] {
            assert_eq!(normalize(&raw), ScanResult::default());
        }
    }

    #[test]
    fn nested_wins_over_flat() {
        let result = normalize(&json!({
            "status": "clean",
            "meta": { "originalName": "outer.pdf" },
            "details": {
                "status": "infected",
                "signature": "Trojan.Generic",
                "meta": { "originalName": "inner.pdf" }
            }
        }));
        assert_eq!(result.status, Verdict::Infected);
        assert_eq!(result.meta.original_name(), Some("inner.pdf"));
        assert_eq!(result.signature.as_deref(), Some("Trojan.Generic"));
    }

    #[test]
    fn falls_back_field_by_field() {
        // details에는 status만 있고 나머지는 최상위에서 가져옴
        let result = normalize(&json!({
            "details": { "status": "infected" },
            "signature": "EICAR",
            "meta": { "mimetype": "application/pdf" },
            "message": "found one"
        }));
        assert_eq!(result.status, Verdict::Infected);
        assert_eq!(result.signature.as_deref(), Some("EICAR"));
        assert_eq!(result.meta.mimetype(), Some("application/pdf"));
        assert_eq!(result.message.as_deref(), Some("found one"));
    }

    #[test]
    fn null_and_blank_values_are_absent() {
        let result = normalize(&json!({
            "details": { "status": null, "signature": "" },
            "status": "infected",
            "signature": "EICAR"
        }));
        assert_eq!(result.status, Verdict::Infected);
        assert_eq!(result.signature.as_deref(), Some("EICAR"));
    }

    #[test]
    fn signature_dropped_unless_infected() {
        let result = normalize(&json!({ "status": "clean", "signature": "EICAR" }));
        assert_eq!(result.status, Verdict::Clean);
        assert!(result.signature.is_none());
    }

    #[test]
    fn unknown_status_degrades_to_error() {
        assert_eq!(normalize(&json!({ "status": "suspicious" })).status, Verdict::Error);
        assert_eq!(normalize(&json!({ "status": 3 })).status, Verdict::Error);
    }

    #[test]
    fn status_is_case_insensitive() {
        assert_eq!(normalize(&json!({ "status": "CLEAN" })).status, Verdict::Clean);
    }

    #[test]
    fn non_object_meta_is_ignored() {
        let result = normalize(&json!({
            "status": "clean",
            "details": { "meta": "oops" },
            "meta": { "size": 5 }
        }));
        assert_eq!(result.meta.size(), Some(5));

        let result = normalize(&json!({ "status": "clean", "meta": [1, 2] }));
        assert!(result.meta.is_empty());
    }

    #[test]
    fn error_result_keeps_message() {
        let result = normalize(&json!({
            "status": "error",
            "message": "engine unavailable"
        }));
        assert_eq!(result.status, Verdict::Error);
        assert_eq!(result.message.as_deref(), Some("engine unavailable"));
    }

    #[test]
    fn scanned_at_precedence() {
        let nested = normalize(&json!({
            "scannedAt": "flat",
            "details": { "scannedAt": "nested" }
        }));
        assert_eq!(nested.scanned_at.as_deref(), Some("nested"));

        let flat = normalize(&json!({ "scannedAt": "flat", "meta": { "scannedAt": "meta" } }));
        assert_eq!(flat.scanned_at.as_deref(), Some("flat"));
    }

    #[test]
    fn scanned_at_falls_back_to_meta() {
        let result = normalize(&json!({
            "status": "clean",
            "meta": { "scannedAt": "2025-03-01T10:00:00Z" }
        }));
        assert_eq!(result.scanned_at.as_deref(), Some("2025-03-01T10:00:00Z"));

        let result = normalize(&json!({
            "meta": { "scannedAt": "flat-meta" },
            "details": { "meta": { "scannedAt": "nested-meta" } }
        }));
        assert_eq!(result.scanned_at.as_deref(), Some("nested-meta"));
    }

    #[test]
    fn numeric_scanned_at_is_rendered() {
        let result = normalize(&json!({ "status": "clean", "scannedAt": 1_700_000_000 }));
        assert_eq!(result.scanned_at.as_deref(), Some("1700000000"));
    }
}
