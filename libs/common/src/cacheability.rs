use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Cache tags and cache contexts declared by a response.
///
/// Tags are labels that let a cache layer drop every entry sharing them at once.
/// Contexts name the request dimensions (path, query arguments, headers) a response
/// varies by, so a cache layer knows which parts of the request must be part of the key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheabilityMetadata {
  #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
  pub tags: BTreeSet<String>,
  #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
  pub contexts: BTreeSet<String>,
}

impl CacheabilityMetadata {
  pub fn add_cache_tags<I, S>(&mut self, tags: I) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.tags.extend(tags.into_iter().map(Into::into));
    self
  }

  pub fn add_cache_contexts<I, S>(&mut self, contexts: I) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.contexts.extend(contexts.into_iter().map(Into::into));
    self
  }

  pub fn merge(&mut self, other: &CacheabilityMetadata) -> &mut Self {
    self.tags.extend(other.tags.iter().cloned());
    self.contexts.extend(other.contexts.iter().cloned());
    self
  }

  pub fn is_empty(&self) -> bool {
    self.tags.is_empty() && self.contexts.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn merge_unions_tags_and_contexts() {
    let mut left = CacheabilityMetadata::default();
    left
      .add_cache_tags(["apq:1"])
      .add_cache_contexts(["url.path"]);

    let mut right = CacheabilityMetadata::default();
    right
      .add_cache_tags(["apq:1", "apq:2"])
      .add_cache_contexts(["url.query_args:variables"]);

    left.merge(&right);

    assert_eq!(
      left.tags.iter().map(String::as_str).collect::<Vec<_>>(),
      vec!["apq:1", "apq:2"]
    );
    assert_eq!(
      left.contexts.iter().map(String::as_str).collect::<Vec<_>>(),
      vec!["url.path", "url.query_args:variables"]
    );
  }

  #[test]
  fn empty_metadata_is_omitted_from_json() {
    let metadata = CacheabilityMetadata::default();

    assert!(metadata.is_empty());
    assert_eq!(serde_json::to_string(&metadata).unwrap(), "{}");
  }
}
