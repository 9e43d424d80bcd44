use serde_json::{Map, Number, Value};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{Date, OffsetDateTime};

const SENSITIVE_KEYS: &[&str] = &["password", "salt"];

/// Builds a safe-to-serialize copy of `value` with `password` and `salt`
/// removed at every nesting level. `false` fields are kept; `null`, empty
/// strings and zero numbers are dropped; date strings pass through verbatim;
/// arrays are sanitized element-wise. The input is never mutated and the
/// function is idempotent.
pub fn sanitize_response(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(sanitize_response).collect()),
        Value::Object(map) => sanitize_object(map),
        scalar => scalar.clone(),
    }
}

fn sanitize_object(map: &Map<String, Value>) -> Value {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        if SENSITIVE_KEYS.contains(&key.as_str()) {
            continue;
        }
        match value {
            // `false` survives; every other falsy value below is dropped.
            Value::Bool(_) => {
                out.insert(key.clone(), value.clone());
            }
            Value::Null => {}
            Value::String(s) if s.is_empty() => {}
            Value::Number(n) if is_zero(n) => {}
            Value::String(s) if parses_as_date(s) => {
                out.insert(key.clone(), value.clone());
            }
            Value::Array(items) => {
                out.insert(
                    key.clone(),
                    Value::Array(items.iter().map(sanitize_response).collect()),
                );
            }
            Value::Object(inner) => {
                out.insert(key.clone(), sanitize_object(inner));
            }
            scalar => {
                out.insert(key.clone(), scalar.clone());
            }
        }
    }
    Value::Object(out)
}

fn is_zero(n: &Number) -> bool {
    n.as_f64().map(|f| f == 0.0).unwrap_or(false)
}

/// RFC 3339 timestamps and plain ISO 8601 dates count as date values; they
/// are kept verbatim and never recursed into.
fn parses_as_date(s: &str) -> bool {
    OffsetDateTime::parse(s, &Rfc3339).is_ok() || Date::parse(s, &Iso8601::DEFAULT).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_password_and_salt_at_top_level() {
        let input = json!({
            "id": "42",
            "username": "ada",
            "password": "$argon2id$v=19$m=19456,t=2,p=1$abc$def",
            "salt": "abc",
        });
        let out = sanitize_response(&input);
        assert_eq!(out, json!({"id": "42", "username": "ada"}));
    }

    #[test]
    fn strips_sensitive_keys_at_every_depth() {
        let input = json!({
            "name": "Ada",
            "account": {
                "password": "x",
                "salt": "y",
                "profile": {"salt": "z", "city": "London"}
            },
            "friends": [
                {"password": "p", "name": "Grace"},
                {"nested": [{"salt": "s", "ok": true}]}
            ]
        });
        let out = sanitize_response(&input);
        assert_eq!(
            out,
            json!({
                "name": "Ada",
                "account": {"profile": {"city": "London"}},
                "friends": [
                    {"name": "Grace"},
                    {"nested": [{"ok": true}]}
                ]
            })
        );
    }

    #[test]
    fn keeps_false_drops_null_and_empty_string() {
        let input = json!({"a": false, "b": null, "c": ""});
        assert_eq!(sanitize_response(&input), json!({"a": false}));
    }

    #[test]
    fn keeps_true_and_nonzero_numbers_drops_zero() {
        let input = json!({"verified": true, "count": 3, "zero": 0, "zero_f": 0.0});
        assert_eq!(
            sanitize_response(&input),
            json!({"verified": true, "count": 3})
        );
    }

    #[test]
    fn date_strings_pass_through_unmodified() {
        let input = json!({
            "created_at": "2023-01-01T00:00:00Z",
            "birthday": "1990-06-15"
        });
        let out = sanitize_response(&input);
        assert_eq!(out["created_at"], json!("2023-01-01T00:00:00Z"));
        assert_eq!(out["birthday"], json!("1990-06-15"));
    }

    #[test]
    fn arrays_map_elementwise() {
        let input = json!([{"password": "x", "n": 1}]);
        assert_eq!(sanitize_response(&input), json!([{"n": 1}]));
    }

    #[test]
    fn array_elements_are_never_dropped() {
        // Dropping applies to object keys only; array elements stay in place.
        let input = json!({"values": [null, "", 0, false, "kept"]});
        assert_eq!(
            sanitize_response(&input),
            json!({"values": [null, "", 0, false, "kept"]})
        );
    }

    #[test]
    fn empty_nested_objects_are_kept() {
        let input = json!({"profile": {}});
        assert_eq!(sanitize_response(&input), json!({"profile": {}}));
    }

    #[test]
    fn top_level_scalars_return_as_is() {
        assert_eq!(sanitize_response(&json!("hello")), json!("hello"));
        assert_eq!(sanitize_response(&json!(false)), json!(false));
        assert_eq!(sanitize_response(&json!(null)), json!(null));
    }

    #[test]
    fn relations_are_sanitized_as_opaque_nested_objects() {
        let input = json!({
            "id": "u1",
            "email": "ada@example.com",
            "password": "hash",
            "salt": "salt",
            "email_verified": false,
            "bio": null,
            "addresses": [
                {"street": "1 Main St", "city": "London", "postal_code": ""}
            ],
            "roles": [{"name": "admin"}]
        });
        let out = sanitize_response(&input);
        assert_eq!(
            out,
            json!({
                "id": "u1",
                "email": "ada@example.com",
                "email_verified": false,
                "addresses": [{"street": "1 Main St", "city": "London"}],
                "roles": [{"name": "admin"}]
            })
        );
    }

    #[test]
    fn sanitize_is_idempotent() {
        let input = json!({
            "a": false,
            "b": null,
            "password": "x",
            "nested": {"salt": "y", "d": "2023-01-01T00:00:00Z", "n": 0},
            "list": [{"password": "z", "v": 1}]
        });
        let once = sanitize_response(&input);
        let twice = sanitize_response(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn input_is_not_mutated() {
        let input = json!({"password": "x", "keep": "v"});
        let snapshot = input.clone();
        let _ = sanitize_response(&input);
        assert_eq!(input, snapshot);
    }
}
