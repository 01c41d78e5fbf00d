use serde_json::Value;

/// Masks credentials and account identifiers in JSON payloads before they are logged.
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = match sensitivity(key) {
                    Sensitivity::Secret => Value::String("****".to_string()),
                    Sensitivity::Identifier => mask_value(val),
                    Sensitivity::None => sanitize_json(val),
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

enum Sensitivity {
    Secret,
    Identifier,
    None,
}

fn sensitivity(key: &str) -> Sensitivity {
    let key = key.to_ascii_lowercase().replace(['_', '-'], "");
    match key.as_str() {
        "password" | "currentpassword" | "newpassword" | "passwordhash" | "secret" | "token"
        | "accesstoken" | "refreshtoken" | "authorization" => Sensitivity::Secret,
        "accountnumber" | "withdrawaladdress" | "playersiteid" | "phone" => Sensitivity::Identifier,
        _ => Sensitivity::None,
    }
}

fn mask_value(value: &Value) -> Value {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return Value::String("****".to_string()),
    };
    let chars: Vec<char> = text.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        Value::String(format!("{head}****{tail}"))
    } else {
        Value::String("****".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credentials_fully_masked() {
        let input = json!({
            "login": "ops1",
            "password": "correct horse battery",
            "refreshToken": "abcdef0123456789"
        });

        let sanitized = sanitize_json(&input);
        assert_eq!(sanitized["password"], "****");
        assert_eq!(sanitized["refreshToken"], "****");
        assert_eq!(sanitized["login"], "ops1");
    }

    #[test]
    fn test_identifiers_partially_masked() {
        let input = json!({
            "withdrawalAddress": "ET-1000123456789",
            "amount": "100.00",
            "bank": { "account_number": 100012345678u64, "bankName": "CBE" }
        });

        let sanitized = sanitize_json(&input);
        assert_eq!(sanitized["withdrawalAddress"], "ET****6789");
        assert_eq!(sanitized["amount"], "100.00");
        assert_eq!(sanitized["bank"]["account_number"], "10****5678");
        assert_eq!(sanitized["bank"]["bankName"], "CBE");
    }

    #[test]
    fn test_multibyte_values_do_not_split_chars() {
        let sanitized = sanitize_json(&json!({ "playerSiteId": "ሰላምሰላምሰላምሰላም" }));
        assert!(sanitized["playerSiteId"].as_str().unwrap().contains("****"));
    }
}
