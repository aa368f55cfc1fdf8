use std::sync::Arc;

use graphql_parser::query::{parse_query, Definition, OperationDefinition};
use indexmap::IndexMap;
use serde_json::Map;
use tracing::{debug, instrument, warn};

use crate::ast::{FragmentDefinition, QueryDocument, SelectionSet, VariableDefinition};
use crate::compose::BraidSchema;
use crate::context::BraidContext;
use crate::error::{BraidError, RequestError};
use crate::execution::execute_operation;
use crate::execution::values::coerce_variables;
use crate::fetch::OperationKind;
use crate::loader::scheduler::dispatching;
use crate::loader::{BatchLoader, DataLoaderRegistry};
use crate::response::execution_request::ExecutionRequest;
use crate::response::execution_result::ExecutionResult;
use crate::schema::TypeRegistry;
use crate::source::SchemaSource;

/// A client request: query text, operation name, variables and extensions.
pub type GraphQLRequest = ExecutionRequest;

const STATISTICS_EXTENSION: &str = "dataloader";

/// Several sources braided into one schema.
pub struct Braid {
    schema: Arc<TypeRegistry>,
    batch_loaders: IndexMap<String, Arc<dyn BatchLoader>>,
    include_statistics: bool,
}

#[derive(Default)]
pub struct BraidBuilder {
    sources: Vec<Arc<dyn SchemaSource>>,
    include_statistics: bool,
}

impl BraidBuilder {
    pub fn schema_source(mut self, source: impl SchemaSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn schema_sources(mut self, sources: impl IntoIterator<Item = Arc<dyn SchemaSource>>) -> Self {
        self.sources.extend(sources);
        self
    }

    /// Reports loader statistics under `extensions.dataloader` of every result.
    pub fn include_statistics(mut self, include_statistics: bool) -> Self {
        self.include_statistics = include_statistics;
        self
    }

    pub fn build(self) -> Result<Braid, BraidError> {
        let (schema, batch_loaders) = BraidSchema::compose(&self.sources)?.into_parts();
        Ok(Braid {
            schema: Arc::new(schema),
            batch_loaders,
            include_statistics: self.include_statistics,
        })
    }
}

/// The parts of a parsed document needed to run one of its operations.
struct PreparedOperation {
    kind: OperationKind,
    selection_set: SelectionSet,
    variable_definitions: Vec<VariableDefinition>,
    fragments: Vec<FragmentDefinition>,
}

impl Braid {
    pub fn builder() -> BraidBuilder {
        BraidBuilder::default()
    }

    pub fn schema(&self) -> &TypeRegistry {
        &self.schema
    }

    pub fn schema_sdl(&self) -> String {
        self.schema.to_sdl()
    }

    #[instrument(level = "debug", skip_all, fields(operation_name = request.operation_name.as_deref()))]
    pub async fn execute(&self, request: GraphQLRequest) -> ExecutionResult {
        let operation = match self.prepare(&request) {
            Ok(operation) => operation,
            Err(error) => {
                warn!(error = %error, "request rejected");
                return ExecutionResult::from_error_message(error.to_string());
            }
        };
        let variables = match coerce_variables(
            &operation.variable_definitions,
            request.variables.unwrap_or_default(),
        ) {
            Ok(variables) => variables,
            Err(error) => {
                warn!(error = %error, "variables rejected");
                return ExecutionResult::from_error_message(error.to_string());
            }
        };

        let context = BraidContext::new(
            self.schema.clone(),
            DataLoaderRegistry::new(&self.batch_loaders),
        )
        .with_query(request.query)
        .with_variables(variables)
        .with_extensions(request.extensions)
        .with_variable_definitions(operation.variable_definitions)
        .with_fragments(operation.fragments);

        let (data, errors) = dispatching(
            &context,
            execute_operation(&context, operation.kind, &operation.selection_set),
        )
        .await;
        debug!(errors = errors.len(), "operation executed");

        let mut extensions = Map::new();
        if self.include_statistics {
            extensions.insert(
                STATISTICS_EXTENSION.to_string(),
                context.loaders().statistics(),
            );
        }
        ExecutionResult::new(Some(data), Some(errors), Some(extensions))
    }

    fn prepare(&self, request: &GraphQLRequest) -> Result<PreparedOperation, RequestError> {
        let document: QueryDocument = parse_query::<String>(&request.query)
            .map_err(|error| RequestError::Parse(error.to_string()))?
            .into_static();

        let mut operations = Vec::new();
        let mut fragments = Vec::new();
        for definition in document.definitions {
            match definition {
                Definition::Operation(operation) => operations.push(operation),
                Definition::Fragment(fragment) => fragments.push(fragment),
            }
        }

        let operation = match request.operation_name.as_deref() {
            Some(name) => operations
                .into_iter()
                .find(|operation| operation_name(operation) == Some(name))
                .ok_or_else(|| RequestError::UnknownOperation(name.to_string()))?,
            None => {
                if operations.len() > 1 {
                    return Err(RequestError::AmbiguousOperation);
                }
                operations
                    .into_iter()
                    .next()
                    .ok_or(RequestError::MissingOperation)?
            }
        };

        let (kind, selection_set, variable_definitions) = match operation {
            OperationDefinition::SelectionSet(selection_set) => {
                (OperationKind::Query, selection_set, Vec::new())
            }
            OperationDefinition::Query(query) => (
                OperationKind::Query,
                query.selection_set,
                query.variable_definitions,
            ),
            OperationDefinition::Mutation(mutation) => {
                if self.schema.mutation_type().is_none() {
                    return Err(RequestError::MutationNotSupported);
                }
                (
                    OperationKind::Mutation,
                    mutation.selection_set,
                    mutation.variable_definitions,
                )
            }
            OperationDefinition::Subscription(_) => {
                return Err(RequestError::SubscriptionNotSupported)
            }
        };

        Ok(PreparedOperation {
            kind,
            selection_set,
            variable_definitions,
            fragments,
        })
    }
}

fn operation_name<'a>(operation: &'a OperationDefinition<'static, String>) -> Option<&'a str> {
    match operation {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(query) => query.name.as_deref(),
        OperationDefinition::Mutation(mutation) => mutation.name.as_deref(),
        OperationDefinition::Subscription(subscription) => subscription.name.as_deref(),
    }
}
