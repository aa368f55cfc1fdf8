use std::path::PathBuf;

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// One schema taking part in the braid. Each source type has its own set of options.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    /// A GraphQL endpoint, queried with one compound query per batch.
    Graphql(GraphQLSourceConfig),
    /// A REST service, queried with one GET request per fetch.
    Rest(RestSourceConfig),
}

impl SourceConfig {
    pub fn namespace(&self) -> &str {
        match self {
            SourceConfig::Graphql(source) => &source.namespace,
            SourceConfig::Rest(source) => &source.namespace,
        }
    }

    pub fn schema(&self) -> &SchemaConfig {
        match self {
            SourceConfig::Graphql(source) => &source.schema,
            SourceConfig::Rest(source) => &source.schema,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GraphQLSourceConfig {
    /// Unique name of the source.
    pub namespace: String,
    pub schema: SchemaConfig,
    /// The URL the compound queries are POSTed to.
    pub endpoint: Url,
    /// Headers sent along with every request to the endpoint.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    /// Limits the query fields exposed through the braid. All fields are exposed when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_level_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkConfig>,
    /// Rewrites the queries sent to the endpoint, per type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub document_mapper: Vec<TypeMapperConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TypeMapperConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub operations: Vec<FieldOperationConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldOperationConfig {
    /// Queries the field `key` as `target` on the endpoint.
    Copy { key: String, target: String },
    /// Leaves the field `key` out of the query and answers it with `value`.
    Put { key: String, value: Value },
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RestSourceConfig {
    /// Unique name of the source.
    pub namespace: String,
    pub schema: SchemaConfig,
    /// Headers sent along with every request.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_level_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkConfig>,
    /// How mapper keys are looked up in the response objects.
    #[serde(default)]
    pub expressions: ExpressionsConfig,
    #[serde(default)]
    pub root_fields: Vec<RestRootFieldConfig>,
}

/// Where the SDL of a source comes from.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SchemaConfig {
    /// Path of an SDL file, relative to the configuration file.
    File(PathBuf),
    /// Inline SDL.
    Sdl(String),
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    pub source_type: String,
    pub source_field: String,
    /// The field holding the join key. Defaults to `source_field`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_field: Option<String>,
    pub target_namespace: String,
    pub target_type: String,
    /// The query field of the target source. Defaults to `source_field`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_field: Option<String>,
    /// The argument of `target_field` receiving the join key. Defaults to `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
    /// The field of the target type matching the join key. Defaults to `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_field: Option<String>,
    #[serde(default)]
    pub nullable: bool,
    /// Removes `from_field` from the source type.
    #[serde(default)]
    pub replace_from_field: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionsConfig {
    /// Keys are looked up as they are.
    #[default]
    Simple,
    /// Keys are paths such as `address.lines[0]` or `meta['created-at']`.
    Path,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RestRootFieldConfig {
    /// The root field of the source schema served by this URI.
    pub field: String,
    /// URI template. `{name}` placeholders are filled with field arguments.
    pub uri: String,
    /// Operations reshaping the JSON response. The response is used as is when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mapper: Vec<MapperOperationConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MapperOperationConfig {
    /// Copies the value at `key` to `target` (or `key`), falling back to `default`.
    Copy {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
    },
    /// Stores a constant.
    Put { key: String, value: Value },
    /// Maps every object of the list at `key`.
    CopyList {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        mapper: Vec<MapperOperationConfig>,
    },
    /// Stores a one element list built from the whole input.
    List {
        key: String,
        mapper: Vec<MapperOperationConfig>,
        /// Applies the operation only when the input has this key.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        if_contains: Option<String>,
    },
    /// Merges an object built from the whole input into the one at `key`.
    Map {
        key: String,
        mapper: Vec<MapperOperationConfig>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        if_contains: Option<String>,
    },
    /// Maps the object at `key`.
    CopyMap {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        mapper: Vec<MapperOperationConfig>,
    },
}
