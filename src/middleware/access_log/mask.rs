use serde_json::{Map, Value};

/// Replaces the value of every listed key present at the top level of
/// `fields` with `text`. Keys that are not present are skipped; key order is
/// preserved.
pub fn mask<I, K>(mut fields: Map<String, Value>, keys: I, text: &str) -> Map<String, Value>
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    for key in keys {
        if let Some(value) = fields.get_mut(key.as_ref()) {
            *value = Value::String(text.to_owned());
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn masks_listed_keys_only() {
        let body = object(json!({"username": "a", "password": "secret", "token": 7}));
        let masked = mask(body, ["password"], "********");
        assert_eq!(Value::Object(masked.clone()), json!({
            "username": "a",
            "password": "********",
            "token": 7,
        }));
        let keys: Vec<_> = masked.keys().map(String::as_str).collect();
        assert_eq!(keys, ["username", "password", "token"]);
    }

    #[test]
    fn absent_keys_are_skipped() {
        let body = object(json!({"username": "a"}));
        let masked = mask(body.clone(), ["password", "new_password"], "***");
        assert_eq!(masked, body);
    }

    #[test]
    fn masking_is_idempotent_and_order_independent() {
        let body = object(json!({"password": "p", "current_password": {"nested": true}, "q": "x"}));
        let keys = ["password", "current_password"];

        let once = mask(body.clone(), keys, "#");
        let twice = mask(once.clone(), keys, "#");
        let reversed = mask(body, keys.iter().rev(), "#");

        assert_eq!(once, twice);
        assert_eq!(once, reversed);
        assert_eq!(once["current_password"], "#");
    }
}
