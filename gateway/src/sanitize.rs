//! Payload sanitation run before any payload leaves for a provider.
//!
//! Pure function, deliberately conservative: strip control characters,
//! bound string length, and redact credential-looking material so a caller
//! cannot smuggle raw secrets into provider logs. Deeper content policy
//! belongs to the providers themselves.

use serde_json::Value;

/// Strings longer than this are truncated before forwarding.
const MAX_STRING_LEN: usize = 8 * 1024;

/// Object keys (and inline `key=` prefixes) whose values get redacted.
const SENSITIVE_KEYS: &[&str] = &["api_key", "apikey", "authorization", "password", "secret", "token"];

const REDACTED: &str = "[redacted]";

/// Sanitize a payload for forwarding. Structure is preserved; only string
/// content and sensitive values change.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(clean_string(s)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String(REDACTED.into()))
                    } else {
                        (key.clone(), sanitize(val))
                    }
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|k| lower.ends_with(k))
}

fn clean_string(s: &str) -> String {
    let mut out: String = s
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    if out.len() > MAX_STRING_LEN {
        // Truncate on a char boundary.
        let mut cut = MAX_STRING_LEN;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
    }
    redact_inline(&out)
}

/// Redact `key=value` runs for sensitive key names inside free text.
fn redact_inline(s: &str) -> String {
    let lower = s.to_ascii_lowercase();
    let mut spans: Vec<(usize, usize)> = Vec::new();

    for key in SENSITIVE_KEYS {
        let needle = format!("{key}=");
        let mut from = 0;
        while let Some(pos) = lower[from..].find(&needle) {
            let value_start = from + pos + needle.len();
            let value_end = s[value_start..]
                .find(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == '&')
                .map(|i| value_start + i)
                .unwrap_or(s.len());
            if value_end > value_start {
                spans.push((value_start, value_end));
            }
            from = value_start;
        }
    }

    if spans.is_empty() {
        return s.to_string();
    }
    spans.sort_unstable();

    let mut out = String::with_capacity(s.len());
    let mut cursor = 0;
    for (start, end) in spans {
        if start < cursor {
            continue;
        }
        out.push_str(&s[cursor..start]);
        out.push_str(REDACTED);
        cursor = end;
    }
    out.push_str(&s[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_payloads_pass_through() {
        let payload = json!({"prompt": "summarize this", "max_tokens": 128});
        assert_eq!(sanitize(&payload), payload);
    }

    #[test]
    fn control_characters_are_stripped() {
        let payload = json!({"prompt": "hel\u{0000}lo\u{0007} wor\nld"});
        assert_eq!(sanitize(&payload), json!({"prompt": "hello wor\nld"}));
    }

    #[test]
    fn sensitive_object_keys_are_redacted() {
        let payload = json!({"prompt": "hi", "api_key": "sk-12345", "nested": {"my_token": "t"}});
        let clean = sanitize(&payload);
        assert_eq!(clean["api_key"], "[redacted]");
        assert_eq!(clean["nested"]["my_token"], "[redacted]");
        assert_eq!(clean["prompt"], "hi");
    }

    #[test]
    fn inline_secrets_are_redacted() {
        let payload = json!({"prompt": "use token=abc123 to call password=hunter2 now"});
        let clean = sanitize(&payload);
        assert_eq!(
            clean["prompt"],
            "use token=[redacted] to call password=[redacted] now"
        );
    }

    #[test]
    fn oversized_strings_are_truncated() {
        let big = "a".repeat(MAX_STRING_LEN + 100);
        let clean = sanitize(&json!({ "prompt": big }));
        assert_eq!(clean["prompt"].as_str().unwrap().len(), MAX_STRING_LEN);
    }

    #[test]
    fn arrays_are_sanitized_elementwise() {
        let payload = json!(["ok", {"secret": "s"}]);
        let clean = sanitize(&payload);
        assert_eq!(clean[0], "ok");
        assert_eq!(clean[1]["secret"], "[redacted]");
    }
}
