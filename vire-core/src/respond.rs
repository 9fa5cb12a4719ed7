//! # Response / Helper Layer
//!
//! The envelope every handler writes through: JSON success/error bodies,
//! body decoding with a size cap, the array-or-stringified-array unwrapping
//! helper needed for a particular upstream proxy quirk, and prefix/suffix
//! path-segment extraction for the hand-rolled hierarchical routes in the
//! route mux.
//!
//! Method gating itself (`RequireMethod`) lives with the mux, since "what
//! methods are allowed" is a per-route fact the mux already knows; this
//! module only supplies the [`crate::errors::ApiError::MethodNotAllowed`]
//! constructor callers reach for when the gate fails.

use actix_web::HttpResponse;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::ApiError;

/// `{"status":"ok","data":<value>}` — the success envelope for
/// authenticated endpoints.
pub fn write_json<T: Serialize>(status: actix_web::http::StatusCode, value: &T) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({ "status": "ok", "data": value }))
}

/// `{"error": message}`.
pub fn write_error(status: actix_web::http::StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({ "error": message }))
}

/// `{"error": message, "code": code}`.
pub fn write_error_with_code(
    status: actix_web::http::StatusCode,
    message: &str,
    code: &str,
) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({ "error": message, "code": code }))
}

/// One mebibyte — the cap `decode_json` enforces on request bodies.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Decodes a JSON body into `T`. An empty body is a `BadInput`, as is a
/// body larger than [`MAX_BODY_BYTES`] or one that fails to parse.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadInput("request body required".into()));
    }
    if body.len() > MAX_BODY_BYTES {
        return Err(ApiError::BadInput("request body too large".into()));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadInput(format!("Invalid JSON: {e}")))
}

/// Accepts either a native JSON array of objects, or a JSON array whose
/// elements are themselves JSON-encoded strings of an object — the shape a
/// proxy upstream produces when it re-encodes array items. Tries the
/// native form first and falls back to unwrapping strings.
pub fn unmarshal_array_param<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, ApiError> {
    if let Ok(native) = serde_json::from_str::<Vec<T>>(raw) {
        return Ok(native);
    }

    let as_strings: Vec<String> = serde_json::from_str(raw)
        .map_err(|e| ApiError::BadInput(format!("Invalid JSON: {e}")))?;

    as_strings
        .into_iter()
        .map(|s| serde_json::from_str::<T>(&s).map_err(|e| ApiError::BadInput(format!("Invalid JSON: {e}"))))
        .collect()
}

/// Extracts the segment between a fixed `prefix` and either `suffix` (if
/// given) or the next `/`. Returns `None` when `path` does not start with
/// `prefix` or when `suffix` is given but absent.
pub fn path_param<'a>(path: &'a str, prefix: &str, suffix: Option<&str>) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    match suffix {
        Some(suf) => rest.strip_suffix(suf),
        None => Some(rest.split('/').next().unwrap_or(rest)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize, PartialEq, Debug)]
    struct Item {
        name: String,
    }

    #[test]
    fn decode_json_rejects_empty_body() {
        assert!(decode_json::<Item>(b"").is_err());
    }

    #[test]
    fn decode_json_rejects_oversized_body() {
        let big = vec![b'a'; MAX_BODY_BYTES + 1];
        assert!(decode_json::<Item>(&big).is_err());
    }

    #[test]
    fn unmarshal_array_param_accepts_native_array() {
        let raw = r#"[{"name":"a"},{"name":"b"}]"#;
        let items: Vec<Item> = unmarshal_array_param(raw).unwrap();
        assert_eq!(items, vec![Item { name: "a".into() }, Item { name: "b".into() }]);
    }

    #[test]
    fn unmarshal_array_param_accepts_stringified_array() {
        let raw = r#"["{\"name\":\"a\"}","{\"name\":\"b\"}"]"#;
        let items: Vec<Item> = unmarshal_array_param(raw).unwrap();
        assert_eq!(items, vec![Item { name: "a".into() }, Item { name: "b".into() }]);
    }

    #[test]
    fn path_param_extracts_between_prefix_and_slash() {
        assert_eq!(path_param("/api/portfolios/main/review", "/api/portfolios/", None), Some("main"));
    }

    #[test]
    fn path_param_extracts_between_prefix_and_suffix() {
        assert_eq!(path_param("/api/admin/jobs/42/cancel", "/api/admin/jobs/", Some("/cancel")), Some("42"));
    }

    #[test]
    fn path_param_missing_prefix_is_none() {
        assert_eq!(path_param("/api/other", "/api/portfolios/", None), None);
    }
}
