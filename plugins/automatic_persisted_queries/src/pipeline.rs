use std::{collections::BTreeSet, sync::Arc};

use apq_cache::CacheStoreError;
use apq_common::{
  execute::RequestExecutionContext,
  graphql::{persisted_query_hash_from_extensions, GraphQLResponse},
  http::{GatewayHttpResponse, StatusCode},
  json::parse_and_extract_json_map_value,
};
use tracing::{debug, warn};

use crate::{
  hasher,
  invalidator::CacheTagInvalidator,
  policy::{is_persisted_query_not_found, ResponseCachePolicy},
  store::PersistedQueryStore,
};

/// Responses to a hash-addressed operation depend on the variables sent alongside it.
pub const VARIABLES_CACHE_CONTEXT: &str = "url.query_args:variables";

/// The per-request view of an operation before it is executed.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
  pub query: Option<String>,
  pub hash: Option<String>,
  /// Whether the endpoint serving the request has persisted queries turned on.
  pub enabled: bool,
  /// Cache contexts to attach to the eventual response.
  pub cache_contexts: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
  /// Persisted queries are off for this endpoint.
  Disabled,
  /// No hash was declared.
  NotPersisted,
  /// Text and hash matched; the query was stored.
  Registered,
  /// The query text was loaded from the store.
  Resolved,
  /// Unknown hash and no text: the operation stays unresolved and execution answers
  /// with `PersistedQueryNotFound`.
  Unresolved,
}

#[derive(Debug, thiserror::Error)]
pub enum ApqError {
  #[error("Provided sha does not match query")]
  HashMismatch { provided: String, computed: String },
  #[error("persisted query store failure: {0}")]
  Store(#[from] CacheStoreError),
}

impl ApqError {
  pub fn into_response(&self) -> GatewayHttpResponse {
    match self {
      ApqError::HashMismatch { .. } => {
        GraphQLResponse::new_error_with_category(&self.to_string(), "graphql").into()
      }
      ApqError::Store(_) => GraphQLResponse::new_error_with_code(
        "Internal server error",
        StatusCode::INTERNAL_SERVER_ERROR,
      )
      .into(),
    }
  }
}

#[derive(Debug)]
pub struct ApqPipeline {
  store: Arc<dyn PersistedQueryStore>,
  invalidator: Arc<dyn CacheTagInvalidator>,
  policy: ResponseCachePolicy,
}

impl ApqPipeline {
  pub fn new(
    store: Arc<dyn PersistedQueryStore>,
    invalidator: Arc<dyn CacheTagInvalidator>,
    policy: ResponseCachePolicy,
  ) -> Self {
    Self {
      store,
      invalidator,
      policy,
    }
  }

  /// Registers or resolves the operation, before it is executed.
  ///
  /// Registration invalidates the `apq:<hash>` tag before the store is written, so a cached
  /// `PersistedQueryNotFound` for that hash can never be served once the query is known.
  #[tracing::instrument(level = "debug", skip_all, fields(hash = ?operation.hash))]
  pub async fn on_before_operation(
    &self,
    operation: &mut OperationContext,
  ) -> Result<OperationOutcome, ApqError> {
    if !operation.enabled {
      return Ok(OperationOutcome::Disabled);
    }

    let hash = match operation.hash.as_deref() {
      Some(hash) if !hash.is_empty() => hash.to_string(),
      _ => return Ok(OperationOutcome::NotPersisted),
    };

    let outcome = match &operation.query {
      Some(query) => {
        let computed = hasher::hash(query);

        if computed != hash {
          warn!(
            "persisted query hash mismatch, provided {:?} but query hashes to {:?}",
            hash, computed
          );

          return Err(ApqError::HashMismatch {
            provided: hash,
            computed,
          });
        }

        self.invalidator.invalidate(&hash).await?;
        self.store.put(&hash, query).await?;
        debug!("registered persisted query");

        OperationOutcome::Registered
      }
      None => match self.store.get(&hash).await? {
        Some(query) => {
          debug!("resolved persisted query");
          operation.query = Some(query);

          OperationOutcome::Resolved
        }
        None => {
          debug!("persisted query is not known");

          OperationOutcome::Unresolved
        }
      },
    };

    operation
      .cache_contexts
      .insert(VARIABLES_CACHE_CONTEXT.to_string());

    Ok(outcome)
  }

  /// Applies the not-found policy to `PersistedQueryNotFound` responses. Returns whether
  /// the response was one.
  pub fn on_response(
    &self,
    ctx: &mut RequestExecutionContext,
    response: &mut GatewayHttpResponse,
  ) -> bool {
    if !is_persisted_query_not_found(response) {
      return false;
    }

    let hash = response_hash(ctx);
    self.policy.apply(ctx, response, hash.as_deref());

    true
  }
}

/// The hash a response is tagged with: the raw `extensions` query argument wins over the
/// extracted request, so GET responses are tagged even when extraction failed.
fn response_hash(ctx: &RequestExecutionContext) -> Option<String> {
  let from_query_string = ctx
    .downstream_http_request
    .query_param("extensions")
    .and_then(|raw| parse_and_extract_json_map_value(&raw).ok())
    .and_then(|extensions| persisted_query_hash_from_extensions(&extensions).map(String::from));

  from_query_string.or_else(|| {
    ctx
      .downstream_graphql_request
      .as_ref()
      .and_then(|request| request.persisted_query_hash())
      .map(String::from)
  })
}
