use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};
use serde_json::{from_str, Error as SerdeError, Map, Value};

pub fn parse_and_extract_json_map_value(value: &str) -> Result<Map<String, Value>, SerdeError> {
  let parsed_json = from_str::<Value>(value);

  match parsed_json {
    Ok(Value::Object(v)) => Ok(v),
    Ok(_) => Err(DeError::custom("expected object")),
    Err(e) => Err(e),
  }
}

/// Accepts a JSON object, a JSON-encoded object inside a string, or `null`.
pub fn deserialize_json_map_or_string<'de, D>(
  deserializer: D,
) -> Result<Option<Map<String, Value>>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<Value>::deserialize(deserializer)? {
    None | Some(Value::Null) => Ok(None),
    Some(Value::Object(map)) => Ok(Some(map)),
    Some(Value::String(raw)) if raw.trim().is_empty() => Ok(None),
    Some(Value::String(raw)) => parse_and_extract_json_map_value(&raw)
      .map(Some)
      .map_err(D::Error::custom),
    Some(other) => Err(D::Error::custom(format!(
      "expected object or JSON-encoded string, got {}",
      other
    ))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[derive(Deserialize, Debug)]
  struct Holder {
    #[serde(default, deserialize_with = "deserialize_json_map_or_string")]
    field: Option<Map<String, Value>>,
  }

  #[test]
  fn accepts_objects_and_encoded_strings() {
    let object: Holder = serde_json::from_value(json!({ "field": { "id": "2" } })).unwrap();
    assert_eq!(object.field.unwrap().get("id"), Some(&json!("2")));

    let encoded: Holder = serde_json::from_value(json!({ "field": "{\"id\": \"1\"}" })).unwrap();
    assert_eq!(encoded.field.unwrap().get("id"), Some(&json!("1")));

    let missing: Holder = serde_json::from_value(json!({})).unwrap();
    assert!(missing.field.is_none());

    let null: Holder = serde_json::from_value(json!({ "field": null })).unwrap();
    assert!(null.field.is_none());
  }

  #[test]
  fn rejects_non_object_values() {
    assert!(serde_json::from_value::<Holder>(json!({ "field": [1, 2] })).is_err());
    assert!(serde_json::from_value::<Holder>(json!({ "field": "[1, 2]" })).is_err());
  }
}
