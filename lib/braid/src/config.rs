//! Builds schema sources from a [`BraidConfig`].

use std::sync::Arc;

use braid_config::sources::{
    ExpressionsConfig, FieldOperationConfig, GraphQLSourceConfig, LinkConfig,
    MapperOperationConfig, RestRootFieldConfig, RestSourceConfig, SchemaConfig, SourceConfig,
    TypeMapperConfig,
};
use braid_config::BraidConfig;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use indexmap::IndexMap;
use tracing::debug;

use crate::braid::Braid;
use crate::document::{FieldOperation, TypeMapper};
use crate::error::BraidError;
use crate::link::Link;
use crate::mapper::{
    input_contains, ExpressionEvaluator, Mapper, OperationMapper, PathExpressionEvaluator,
    SimpleExpressionEvaluator,
};
use crate::namespace::SchemaNamespace;
use crate::source::{
    HttpGraphQLRetriever, HttpRestRetriever, QueryExecutorSchemaSource, RestRootField,
    RestSchemaSource, SchemaSource,
};

impl Braid {
    /// Composes the sources described by `config`, in the order they are listed.
    pub fn from_config(config: &BraidConfig) -> Result<Braid, BraidError> {
        Braid::builder()
            .schema_sources(sources_from_config(config)?)
            .include_statistics(config.dataloader.include_statistics)
            .build()
    }
}

pub fn sources_from_config(config: &BraidConfig) -> Result<Vec<Arc<dyn SchemaSource>>, BraidError> {
    config
        .sources
        .iter()
        .map(|source| {
            debug!(namespace = source.namespace(), "building schema source");
            let sdl = read_schema(config, source)?;
            let source: Arc<dyn SchemaSource> = match source {
                SourceConfig::Graphql(source) => Arc::new(graphql_source(source, &sdl)?),
                SourceConfig::Rest(source) => Arc::new(rest_source(source, &sdl)?),
            };
            Ok(source)
        })
        .collect()
}

fn read_schema(config: &BraidConfig, source: &SourceConfig) -> Result<String, BraidError> {
    match source.schema() {
        SchemaConfig::Sdl(sdl) => Ok(sdl.clone()),
        SchemaConfig::File(path) => {
            let path = config.resolve_path(path);
            std::fs::read_to_string(&path).map_err(|error| {
                BraidError::SourceConfiguration(
                    SchemaNamespace::of(source.namespace()),
                    format!("Failed to read schema file {}: {}", path.display(), error),
                )
            })
        }
    }
}

fn graphql_source(
    config: &GraphQLSourceConfig,
    sdl: &str,
) -> Result<QueryExecutorSchemaSource<HttpGraphQLRetriever>, BraidError> {
    let namespace = SchemaNamespace::of(&config.namespace);
    let retriever = HttpGraphQLRetriever::new(config.endpoint.clone())
        .with_headers(header_map(&namespace, &config.headers)?);
    let mut source = QueryExecutorSchemaSource::new(namespace, sdl, retriever)?
        .with_links(links(&config.links)?);
    if !config.document_mapper.is_empty() {
        source = source.with_document_mapper(type_mappers(&config.document_mapper));
    }
    if let Some(fields) = &config.top_level_fields {
        source = source.with_top_level_fields(fields);
    }
    Ok(source)
}

fn type_mappers(configs: &[TypeMapperConfig]) -> Vec<TypeMapper> {
    configs
        .iter()
        .map(|config| {
            config
                .operations
                .iter()
                .map(|operation| match operation {
                    FieldOperationConfig::Copy { key, target } => FieldOperation::Copy {
                        key: key.clone(),
                        target: target.clone(),
                    },
                    FieldOperationConfig::Put { key, value } => FieldOperation::Put {
                        key: key.clone(),
                        value: value.clone(),
                    },
                })
                .fold(TypeMapper::new(&config.type_name), TypeMapper::with_operation)
        })
        .collect()
}

fn rest_source(config: &RestSourceConfig, sdl: &str) -> Result<RestSchemaSource, BraidError> {
    let namespace = SchemaNamespace::of(&config.namespace);
    let retriever =
        HttpRestRetriever::default().with_headers(header_map(&namespace, &config.headers)?);
    let evaluator: Arc<dyn ExpressionEvaluator> = match config.expressions {
        ExpressionsConfig::Simple => Arc::new(SimpleExpressionEvaluator),
        ExpressionsConfig::Path => Arc::new(PathExpressionEvaluator),
    };
    let root_fields = config
        .root_fields
        .iter()
        .map(|root_field| rest_root_field(root_field, &evaluator));

    let mut source = RestSchemaSource::new(namespace, sdl, retriever)?
        .with_root_fields(root_fields)
        .with_links(links(&config.links)?);
    if let Some(fields) = &config.top_level_fields {
        source = source.with_top_level_fields(fields);
    }
    Ok(source)
}

fn rest_root_field(
    config: &RestRootFieldConfig,
    evaluator: &Arc<dyn ExpressionEvaluator>,
) -> RestRootField {
    let root_field = RestRootField::new(&config.field, &config.uri);
    if config.mapper.is_empty() {
        root_field
    } else {
        root_field.with_mapper(mapper(&config.mapper, evaluator))
    }
}

fn mapper(
    operations: &[MapperOperationConfig],
    evaluator: &Arc<dyn ExpressionEvaluator>,
) -> Arc<dyn Mapper> {
    let nested = |operations: &[MapperOperationConfig]| mapper(operations, evaluator);
    operations
        .iter()
        .fold(OperationMapper::new(evaluator.clone()), |mapper, operation| {
            match operation {
                MapperOperationConfig::Copy {
                    key,
                    target,
                    default: None,
                } => mapper.copy(key, target.as_ref().unwrap_or(key)),
                MapperOperationConfig::Copy {
                    key,
                    target,
                    default: Some(default),
                } => mapper.copy_or(key, target.as_ref().unwrap_or(key), default.clone()),
                MapperOperationConfig::Put { key, value } => mapper.put(key, value.clone()),
                MapperOperationConfig::CopyList {
                    key,
                    target,
                    mapper: operations,
                } => mapper.copy_list(key, target.as_ref().unwrap_or(key), nested(operations)),
                MapperOperationConfig::List {
                    key,
                    mapper: operations,
                    if_contains: None,
                } => mapper.list(key, nested(operations)),
                MapperOperationConfig::List {
                    key,
                    mapper: operations,
                    if_contains: Some(required),
                } => mapper.list_if(key, input_contains(required), nested(operations)),
                MapperOperationConfig::Map {
                    key,
                    mapper: operations,
                    if_contains: None,
                } => mapper.map(key, nested(operations)),
                MapperOperationConfig::Map {
                    key,
                    mapper: operations,
                    if_contains: Some(required),
                } => mapper.map_if(key, input_contains(required), nested(operations)),
                MapperOperationConfig::CopyMap {
                    key,
                    target,
                    mapper: operations,
                } => mapper.copy_map(key, target.as_ref().unwrap_or(key), nested(operations)),
            }
        })
        .into_arc()
}

fn links(configs: &[LinkConfig]) -> Result<Vec<Link>, BraidError> {
    configs
        .iter()
        .map(|config| {
            let mut builder = Link::from(&config.source_type, &config.source_field)
                .to(config.target_namespace.as_str(), &config.target_type);
            if let Some(from_field) = &config.from_field {
                builder = builder.from_field(from_field);
            }
            if let Some(target_field) = &config.target_field {
                builder = builder.target_field(target_field);
            }
            if let Some(argument) = &config.argument {
                builder = builder.target_argument(argument);
            }
            if let Some(variable_field) = &config.variable_field {
                builder = builder.target_variable_query_field(variable_field);
            }
            if config.nullable {
                builder = builder.nullable();
            }
            if config.replace_from_field {
                builder = builder.replace_from_field();
            }
            Ok(builder.build()?)
        })
        .collect()
}

fn header_map(
    namespace: &SchemaNamespace,
    headers: &IndexMap<String, String>,
) -> Result<HeaderMap, BraidError> {
    let invalid = |message: String| BraidError::SourceConfiguration(namespace.clone(), message);
    let mut header_map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|error| invalid(format!("Invalid header name \"{}\": {}", name, error)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|error| invalid(format!("Invalid value of header \"{}\": {}", name, error)))?;
        header_map.insert(header_name, header_value);
    }
    Ok(header_map)
}
