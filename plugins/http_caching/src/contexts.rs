use std::collections::BTreeSet;

use apq_common::http::GatewayHttpRequest;
use sha2::{Digest, Sha256};
use tracing::warn;

/// A request dimension a cached response varies by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheContext {
  UrlPath,
  QueryArgs,
  QueryArg(String),
  Header(String),
  Unknown(String),
}

impl CacheContext {
  pub fn parse(raw: &str) -> Self {
    match raw.split_once(':') {
      None if raw == "url.path" => CacheContext::UrlPath,
      None if raw == "url.query_args" => CacheContext::QueryArgs,
      Some(("url.query_args", name)) if !name.is_empty() => CacheContext::QueryArg(name.to_string()),
      Some(("headers", name)) if !name.is_empty() => CacheContext::Header(name.to_lowercase()),
      _ => CacheContext::Unknown(raw.to_string()),
    }
  }

  /// The value of this context for a request. Absent values resolve to `None`, which keys
  /// differently from an empty value.
  pub fn resolve(&self, request: &GatewayHttpRequest) -> Option<String> {
    match self {
      CacheContext::UrlPath => Some(request.path().to_string()),
      CacheContext::QueryArgs => Some(request.query_string.clone()),
      CacheContext::QueryArg(name) => request.query_param(name),
      CacheContext::Header(name) => {
        let values = request
          .headers
          .get_all(name.as_str())
          .iter()
          .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
          .collect::<Vec<_>>();

        if values.is_empty() {
          None
        } else {
          Some(values.join(","))
        }
      }
      CacheContext::Unknown(raw) => {
        warn!("unknown cache context {:?}, it does not vary the cache key", raw);

        None
      }
    }
  }
}

/// Builds a cache key from the resolved values of a set of contexts.
pub fn cache_key<'a, I>(contexts: I, request: &GatewayHttpRequest) -> String
where
  I: IntoIterator<Item = &'a String>,
{
  let contexts = contexts.into_iter().collect::<BTreeSet<_>>();
  let mut hasher = Sha256::new();

  for context in contexts {
    let value = CacheContext::parse(context).resolve(request);
    hasher.update(format!("{}={:?}\n", context, value).as_bytes());
  }

  format!("page:{}", hex::encode(hasher.finalize()))
}
