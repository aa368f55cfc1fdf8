use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use http::{HeaderMap, HeaderValue};
use indexmap::IndexMap;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, error, instrument, trace};
use url::Url;

use crate::context::BraidContext;
use crate::error::{BraidError, FetchError};
use crate::execution::dispatcher::batch_key;
use crate::execution::values::argument_values;
use crate::fetch::{FetchEnvironment, FieldResult};
use crate::link::Link;
use crate::loader::BatchLoader;
use crate::mapper::Mapper;
use crate::namespace::SchemaNamespace;
use crate::planner::JoinKeys;
use crate::response::graphql_error::GraphQLError;
use crate::schema::TypeRegistry;
use crate::source::SchemaSource;

/// Fetches JSON documents from a REST service.
#[async_trait]
pub trait RestRetriever: Send + Sync {
    async fn get(&self, url: Url, context: &BraidContext) -> Result<Value, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpRestRetriever {
    http_client: Client,
    header_map: HeaderMap,
}

impl Default for HttpRestRetriever {
    fn default() -> Self {
        let mut header_map = HeaderMap::new();
        header_map.insert(
            http::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        HttpRestRetriever {
            http_client: Client::new(),
            header_map,
        }
    }
}

impl HttpRestRetriever {
    pub fn with_client(mut self, http_client: Client) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.header_map.extend(headers);
        self
    }
}

#[async_trait]
impl RestRetriever for HttpRestRetriever {
    #[instrument(level = "trace", skip_all, name = "http_rest_get", fields(url = %url))]
    async fn get(&self, url: Url, _context: &BraidContext) -> Result<Value, FetchError> {
        let transport_error = |message: String| FetchError::Transport {
            target: url.to_string(),
            message,
        };
        let response = self
            .http_client
            .get(url.clone())
            .headers(self.header_map.clone())
            .send()
            .await
            .map_err(|e| transport_error(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(transport_error(format!("Unexpected status code {}", status)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| transport_error(format!("Failed to parse response: {}", e)))
    }
}

/// A query field served by one REST endpoint. `{name}` placeholders of the
/// uri are filled with argument values.
#[derive(Clone)]
pub struct RestRootField {
    name: String,
    uri: String,
    mapper: Option<Arc<dyn Mapper>>,
}

impl RestRootField {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> RestRootField {
        RestRootField {
            name: name.into(),
            uri: uri.into(),
            mapper: None,
        }
    }

    pub fn with_mapper(mut self, mapper: Arc<dyn Mapper>) -> RestRootField {
        self.mapper = Some(mapper);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    fn map_response(&self, response: Value) -> Result<Value, FetchError> {
        let Some(mapper) = &self.mapper else {
            return Ok(response);
        };
        Ok(match response {
            Value::Object(object) => Value::Object(mapper.apply(&object)?),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(object) => mapper.apply(&object).map(Value::Object),
                        other => Ok(other),
                    })
                    .collect::<Result<_, _>>()?,
            ),
            other => other,
        })
    }
}

/// A source backed by REST endpoints, one GET per fetch.
pub struct RestSchemaSource {
    namespace: SchemaNamespace,
    schema: TypeRegistry,
    private_schema: TypeRegistry,
    links: Vec<Link>,
    root_fields: Arc<IndexMap<String, RestRootField>>,
    retriever: Arc<dyn RestRetriever>,
}

impl RestSchemaSource {
    pub fn new(
        namespace: impl Into<SchemaNamespace>,
        sdl: &str,
        retriever: impl RestRetriever + 'static,
    ) -> Result<RestSchemaSource, BraidError> {
        let namespace = namespace.into();
        let private_schema = TypeRegistry::parse(sdl)
            .map_err(|error| BraidError::SchemaParse(namespace.clone(), error.to_string()))?;
        Ok(RestSchemaSource {
            namespace,
            schema: private_schema.clone(),
            private_schema,
            links: Vec::new(),
            root_fields: Arc::new(IndexMap::new()),
            retriever: Arc::new(retriever),
        })
    }

    pub fn with_root_fields(mut self, root_fields: impl IntoIterator<Item = RestRootField>) -> Self {
        let fields = Arc::make_mut(&mut self.root_fields);
        for root_field in root_fields {
            fields.insert(root_field.name.clone(), root_field);
        }
        self
    }

    pub fn with_links(mut self, links: impl IntoIterator<Item = Link>) -> Self {
        self.links.extend(links);
        self
    }

    pub fn with_top_level_fields(mut self, fields: &[String]) -> Self {
        self.schema.retain_query_fields(fields);
        self
    }
}

impl SchemaSource for RestSchemaSource {
    fn namespace(&self) -> &SchemaNamespace {
        &self.namespace
    }

    fn schema(&self) -> &TypeRegistry {
        &self.schema
    }

    fn private_schema(&self) -> &TypeRegistry {
        &self.private_schema
    }

    fn links(&self) -> &[Link] {
        &self.links
    }

    fn new_batch_loader(
        &self,
        _source: Arc<dyn SchemaSource>,
        link: Option<Link>,
    ) -> Arc<dyn BatchLoader> {
        Arc::new(RestBatchLoader {
            namespace: self.namespace.clone(),
            root_fields: self.root_fields.clone(),
            retriever: self.retriever.clone(),
            link,
        })
    }
}

struct RestBatchLoader {
    namespace: SchemaNamespace,
    root_fields: Arc<IndexMap<String, RestRootField>>,
    retriever: Arc<dyn RestRetriever>,
    link: Option<Link>,
}

impl RestBatchLoader {
    fn root_field(&self, name: &str) -> Result<&RestRootField, FetchError> {
        self.root_fields
            .get(name)
            .ok_or_else(|| FetchError::MissingRootField {
                namespace: self.namespace.clone(),
                field: name.to_string(),
            })
    }

    async fn get(
        &self,
        root_field: &RestRootField,
        parameters: &Map<String, Value>,
        context: &BraidContext,
    ) -> Result<Value, FetchError> {
        let uri = fill_uri_template(&root_field.uri, parameters);
        let url = Url::parse(&uri).map_err(|_| FetchError::InvalidUri(uri))?;
        trace!(%url, "fetching REST resource");
        root_field.map_response(self.retriever.get(url, context).await?)
    }

    async fn fetch(&self, environment: &FetchEnvironment, context: &BraidContext) -> FieldResult {
        if let Some(link) = &self.link {
            return self.fetch_link(link, environment, context).await;
        }
        let parameters = argument_values(&environment.field, context.variables());
        let outcome = match self.root_field(&environment.field.name) {
            Ok(root_field) => self.get(root_field, &parameters, context).await,
            Err(error) => Err(error),
        };
        match outcome {
            Ok(data) => FieldResult::new(data),
            Err(error) => FieldResult::new(Value::Null).with_errors(vec![self.report(error)]),
        }
    }

    /// One GET per join key. A list of keys resolves to the list of their values.
    async fn fetch_link(
        &self,
        link: &Link,
        environment: &FetchEnvironment,
        context: &BraidContext,
    ) -> FieldResult {
        let keys = JoinKeys::of(link, environment);
        if keys.values.is_empty() {
            return FieldResult::new(keys.empty_value());
        }
        let root_field = match self.root_field(link.target_field()) {
            Ok(root_field) => root_field,
            Err(error) => {
                return FieldResult::new(Value::Null).with_errors(vec![self.report(error)])
            }
        };

        let is_list = keys.is_list;
        let outcomes = join_all(
            keys.values
                .into_iter()
                .map(|key| self.fetch_key(link, root_field, key, context)),
        )
        .await;
        let mut values = Vec::with_capacity(outcomes.len());
        let mut errors = Vec::new();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(value) => values.push(value),
                Err(error) => {
                    values.push(Value::Null);
                    let error = self.report(error);
                    errors.push(if is_list {
                        error.with_path(vec![index.into()])
                    } else {
                        error
                    });
                }
            }
        }
        let data = if is_list {
            Value::Array(values)
        } else {
            values.pop().unwrap_or_default()
        };
        FieldResult::new(data).with_errors(errors)
    }

    async fn fetch_key(
        &self,
        link: &Link,
        root_field: &RestRootField,
        key: Value,
        context: &BraidContext,
    ) -> Result<Value, FetchError> {
        if key.is_null() {
            return if link.is_nullable() {
                Ok(Value::Null)
            } else {
                Err(FetchError::NullJoinKey(batch_key(
                    link.source_type(),
                    link.source_field(),
                )))
            };
        }
        let mut parameters = Map::new();
        parameters.insert(link.argument_name().to_string(), key);
        self.get(root_field, &parameters, context).await
    }

    fn report(&self, error: FetchError) -> GraphQLError {
        error!(
            namespace = %self.namespace,
            error = &error as &dyn std::error::Error,
            "REST fetch failed"
        );
        GraphQLError::from(error.to_string())
    }
}

#[async_trait]
impl BatchLoader for RestBatchLoader {
    #[instrument(level = "trace", skip_all, fields(namespace = %self.namespace))]
    async fn load(
        &self,
        environments: Vec<FetchEnvironment>,
        context: &BraidContext,
    ) -> Result<Vec<FieldResult>, FetchError> {
        debug!(fetches = environments.len(), "querying REST source");
        Ok(join_all(
            environments
                .iter()
                .map(|environment| self.fetch(environment, context)),
        )
        .await)
    }
}

/// Replaces `{name}` placeholders with parameter values. Null values are left out.
pub fn fill_uri_template(template: &str, parameters: &Map<String, Value>) -> String {
    parameters
        .iter()
        .fold(template.to_string(), |uri, (name, value)| {
            let replacement = match value {
                Value::Null => return uri,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            uri.replace(&format!("{{{}}}", name), &replacement)
        })
}
