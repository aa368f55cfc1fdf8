use std::future::Future;

use async_graphql::{PathSegment, Response, ServerError, Variables};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::BraidContext;
use crate::error::FetchError;
use crate::response::execution_request::ExecutionRequest;
use crate::response::execution_result::ExecutionResult;
use crate::response::graphql_error::{GraphQLError, GraphQLErrorLocation, GraphQLErrorPathSegment};
use crate::source::QueryFunction;

/// Queries an in-process `async-graphql` schema.
pub struct AsyncGraphQLQueryFunction<E> {
    executor: E,
}

impl<E: async_graphql::Executor> AsyncGraphQLQueryFunction<E> {
    pub fn new(executor: E) -> Self {
        AsyncGraphQLQueryFunction { executor }
    }
}

#[async_trait]
impl<E: async_graphql::Executor> QueryFunction for AsyncGraphQLQueryFunction<E> {
    async fn query(
        &self,
        request: ExecutionRequest,
        _context: &BraidContext,
    ) -> Result<ExecutionResult, FetchError> {
        let response = self.executor.execute(request.into()).await;
        response_to_result(response)
    }
}

impl From<ExecutionRequest> for async_graphql::Request {
    fn from(execution_request: ExecutionRequest) -> Self {
        let mut request = async_graphql::Request::new(execution_request.query);
        if let Some(variables) = execution_request.variables {
            request = request.variables(Variables::from_json(Value::Object(variables)));
        }
        if let Some(operation_name) = execution_request.operation_name {
            request = request.operation_name(operation_name);
        }
        if let Some(extensions) = execution_request.extensions {
            for (key, value) in extensions {
                if let Ok(value) = async_graphql::Value::from_json(value) {
                    request.extensions.insert(key, value);
                }
            }
        }
        request
    }
}

impl From<&ServerError> for GraphQLError {
    fn from(error: &ServerError) -> Self {
        GraphQLError {
            message: error.message.clone(),
            locations: (!error.locations.is_empty()).then(|| {
                error
                    .locations
                    .iter()
                    .map(|location| GraphQLErrorLocation {
                        line: location.line,
                        column: location.column,
                    })
                    .collect()
            }),
            path: (!error.path.is_empty()).then(|| {
                error
                    .path
                    .iter()
                    .map(|segment| match segment {
                        PathSegment::Field(name) => GraphQLErrorPathSegment::String(name.clone()),
                        PathSegment::Index(index) => GraphQLErrorPathSegment::Index(*index),
                    })
                    .collect()
            }),
            extensions: error
                .extensions
                .as_ref()
                .and_then(|extensions| serde_json::to_value(extensions).ok())
                .and_then(|extensions| match extensions {
                    Value::Object(extensions) => Some(extensions),
                    _ => None,
                }),
        }
    }
}

fn response_to_result(response: Response) -> Result<ExecutionResult, FetchError> {
    let local_error = |error: serde_json::Error| FetchError::Transport {
        target: "local schema".to_string(),
        message: error.to_string(),
    };
    let data = response.data.into_json().map_err(local_error)?;
    let errors = response.errors.iter().map(GraphQLError::from).collect();
    let mut extensions = Map::new();
    for (key, value) in response.extensions {
        extensions.insert(key, value.into_json().map_err(local_error)?);
    }
    Ok(ExecutionResult::new(
        Some(data),
        Some(errors),
        Some(extensions),
    ))
}

/// A query function backed by a closure.
pub struct FnQueryFunction<F> {
    function: F,
}

impl<F, Fut> FnQueryFunction<F>
where
    F: Fn(ExecutionRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ExecutionResult, FetchError>> + Send + 'static,
{
    pub fn new(function: F) -> Self {
        FnQueryFunction { function }
    }
}

#[async_trait]
impl<F, Fut> QueryFunction for FnQueryFunction<F>
where
    F: Fn(ExecutionRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ExecutionResult, FetchError>> + Send + 'static,
{
    async fn query(
        &self,
        request: ExecutionRequest,
        _context: &BraidContext,
    ) -> Result<ExecutionResult, FetchError> {
        (self.function)(request).await
    }
}
