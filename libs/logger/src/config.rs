use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, JsonSchema, PartialEq)]
/// The output format of the gateway logger.
pub enum LoggerConfigFormat {
  /// Single-line records with the essential fields only. Cheap to produce and to store.
  #[serde(rename = "compact")]
  #[schemars(title = "compact")]
  Compact,

  /// Multi-line, human-oriented records including span context and source locations.
  #[serde(rename = "pretty")]
  #[schemars(title = "pretty")]
  Pretty,

  /// One JSON object per record, for log shippers and aggregators.
  #[serde(rename = "json")]
  #[schemars(title = "json")]
  Json,
}

impl Default for LoggerConfigFormat {
  // In development, we wish to see some more details and code locations.
  #[cfg(debug_assertions)]
  fn default() -> Self {
    LoggerConfigFormat::Pretty
  }

  #[cfg(not(debug_assertions))]
  fn default() -> Self {
    if atty::is(atty::Stream::Stdout) {
      LoggerConfigFormat::Compact
    } else {
      LoggerConfigFormat::Json
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn formats_use_lowercase_names() {
    assert_eq!(
      serde_json::from_str::<LoggerConfigFormat>("\"json\"").unwrap(),
      LoggerConfigFormat::Json
    );
    assert_eq!(
      serde_json::to_string(&LoggerConfigFormat::Compact).unwrap(),
      "\"compact\""
    );
  }
}
