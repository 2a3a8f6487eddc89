use apq_common::serde_utils::{
  JsonSchemaExample, JsonSchemaExampleMetadata, JsonSchemaExampleWrapperType,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The `http_get` plugin allows you to execute GraphQL operations over HTTP `GET` requests, using
/// HTTP query parameters, for example:
///
/// `GET /graphql?query=query%20%7B%20__typename%20%7D`
///
/// ### Query Parameters
///
/// - `query`: The GraphQL query to execute. It may be omitted when `extensions` carries a
///   persisted query hash.
///
/// - `variables` (optional): A JSON-encoded string containing the GraphQL variables
///
/// - `operationName` (optional): The name of the GraphQL operation to execute
///
/// - `extensions` (optional): A JSON-encoded string containing the request extensions, for
///   example `{"persistedQuery":{"version":1,"sha256Hash":"..."}}`
///
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
#[schemars(example = "http_get_example_1")]
pub struct HttpGetPluginConfig {}

fn http_get_example_1() -> JsonSchemaExample<HttpGetPluginConfig> {
  JsonSchemaExample {
    metadata: JsonSchemaExampleMetadata::new("Simple", None),
    wrapper: Some(JsonSchemaExampleWrapperType::Plugin {
      name: "http_get".to_string(),
    }),
    example: HttpGetPluginConfig {},
  }
}
