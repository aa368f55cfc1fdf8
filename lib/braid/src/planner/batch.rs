use std::sync::Arc;

use async_trait::async_trait;
use graphql_parser::query::{Mutation, Query};
use graphql_parser::Pos;
use serde_json::{Map, Value};
use tracing::{debug, instrument, trace};

use crate::ast::{
    named_type, response_key, Definition, Field, FragmentDefinition, OperationDefinition,
    QueryDocument, Selection, SelectionSet, Type, Value as AstValue,
};
use crate::context::BraidContext;
use crate::document::DocumentMapper;
use crate::error::FetchError;
use crate::execution::dispatcher::batch_key;
use crate::fetch::{FetchEnvironment, FieldResult, OperationKind};
use crate::link::Link;
use crate::loader::BatchLoader;
use crate::planner::demux::demultiplex;
use crate::planner::namespacer::{referenced_fragments, CompoundVariables, VariableNamespacer};
use crate::planner::rewriter::SelectionRewriter;
use crate::planner::JoinKeys;
use crate::response::execution_request::ExecutionRequest;
use crate::response::execution_result::ExecutionResult;
use crate::response::graphql_error::GraphQLError;
use crate::source::{QueryFunction, SchemaSource};

/// Counters are incremented before use, so the first alias ends with 100.
const COUNTER_SEED: usize = 99;

/// Where the data of one fetch is found in the compound response.
#[derive(Debug, Default, PartialEq)]
pub struct FetchSlot {
    pub aliases: Vec<String>,
    /// Data known without asking the source, keyed by alias.
    pub short_circuited: Map<String, Value>,
    /// Data of a fetch that has no alias at all.
    pub empty: Value,
    /// Set for links whose parent holds a list of join keys: one value is
    /// collected per alias.
    pub collect: bool,
    /// Errors known without asking the source, relative to the fetched field.
    pub errors: Vec<GraphQLError>,
}

/// The compound query of one batch.
#[derive(Debug)]
pub struct BatchQuery {
    operation_name: String,
    kind: OperationKind,
    selections: Vec<Selection>,
    fragments: Vec<FragmentDefinition>,
    variables: CompoundVariables,
    slots: Vec<FetchSlot>,
}

impl BatchQuery {
    pub fn build(
        environments: &[FetchEnvironment],
        source: &dyn SchemaSource,
        link: Option<&Link>,
        context: &BraidContext,
    ) -> Result<BatchQuery, FetchError> {
        let rewriter =
            SelectionRewriter::new(context.schema(), source.private_schema(), source.links());
        let first = environments.first();
        let mut batch = BatchQuery {
            operation_name: format!(
                "Bulk_{}",
                first.map_or("Query", |environment| named_type(&environment.field_type))
            ),
            kind: first
                .and_then(|environment| environment.parent_operation)
                .unwrap_or(OperationKind::Query),
            selections: Vec::new(),
            fragments: Vec::new(),
            variables: CompoundVariables::default(),
            slots: Vec::with_capacity(environments.len()),
        };

        let mut counter = COUNTER_SEED;
        for environment in environments {
            let mut slot = FetchSlot::default();
            match link {
                None => {
                    counter += 1;
                    let mut field = aliased_field(environment, counter, &rewriter);
                    slot.aliases.push(response_key(&field).to_string());
                    batch.namespace(&mut field, counter, context, &rewriter)?;
                    batch.selections.push(Selection::Field(field));
                }
                Some(link) => {
                    let keys = JoinKeys::of(link, environment);
                    slot.empty = keys.empty_value();
                    slot.collect = keys.is_list;
                    let only_join_key =
                        selects_only(&environment.field, link.target_variable_query_field());
                    for (index, key) in keys.values.into_iter().enumerate() {
                        counter += 1;
                        let mut field = aliased_field(environment, counter, &rewriter);
                        let alias = response_key(&field).to_string();
                        if key.is_null() {
                            slot.short_circuited.insert(alias.clone(), Value::Null);
                            if !link.is_nullable() {
                                let error = GraphQLError::from(
                                    FetchError::NullJoinKey(batch_key(
                                        link.source_type(),
                                        link.source_field(),
                                    ))
                                    .to_string(),
                                );
                                slot.errors.push(if keys.is_list {
                                    error.with_path(vec![index.into()])
                                } else {
                                    error
                                });
                            }
                        } else if only_join_key {
                            let mut object = Map::new();
                            object.insert(link.target_variable_query_field().to_string(), key);
                            slot.short_circuited
                                .insert(alias.clone(), Value::Object(object));
                        } else {
                            field.name = link.target_field().to_string();
                            field.arguments = Vec::new();
                            batch.namespace(&mut field, counter, context, &rewriter)?;
                            let variable = batch.variables.define_fresh(
                                format!("{}{}", link.argument_name(), counter),
                                link_argument_type(source, link)?,
                                key,
                            );
                            field.arguments = vec![(
                                link.argument_name().to_string(),
                                AstValue::Variable(variable),
                            )];
                            batch.selections.push(Selection::Field(field));
                        }
                        slot.aliases.push(alias);
                    }
                }
            }
            batch.slots.push(slot);
        }
        Ok(batch)
    }

    /// True when every fetch was short-circuited and nothing has to be sent.
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub fn slots(&self) -> &[FetchSlot] {
        &self.slots
    }

    pub fn into_slots(self) -> Vec<FetchSlot> {
        self.slots
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables.values
    }

    pub fn to_document(&self) -> QueryDocument {
        let selection_set = SelectionSet {
            span: (Pos::default(), Pos::default()),
            items: self.selections.clone(),
        };
        let name = Some(self.operation_name.clone());
        let variable_definitions = self.variables.definitions.clone();
        let operation = match self.kind {
            OperationKind::Query => OperationDefinition::Query(Query {
                position: Pos::default(),
                name,
                variable_definitions,
                directives: Vec::new(),
                selection_set,
            }),
            OperationKind::Mutation => OperationDefinition::Mutation(Mutation {
                position: Pos::default(),
                name,
                variable_definitions,
                directives: Vec::new(),
                selection_set,
            }),
        };
        let mut definitions = vec![Definition::Operation(operation)];
        definitions.extend(self.fragments.iter().cloned().map(Definition::Fragment));
        QueryDocument { definitions }
    }

    pub fn to_request(&self, document: &QueryDocument) -> ExecutionRequest {
        ExecutionRequest::new(document.to_string())
            .with_operation_name(self.operation_name.clone())
            .with_variables(self.variables.values.clone())
    }

    /// Gives the variables and fragments used by `field` names of their own,
    /// and copies the fragments into the document.
    fn namespace(
        &mut self,
        field: &mut Field,
        counter: usize,
        context: &BraidContext,
        rewriter: &SelectionRewriter,
    ) -> Result<(), FetchError> {
        let namespacer =
            VariableNamespacer::new(counter, context.variable_definitions(), context.variables());
        for fragment in referenced_fragments(&field.selection_set, context.fragments())? {
            let mut copy = fragment.clone();
            rewriter.trim_fragment(&mut copy);
            namespacer.rename_fragment(&mut copy);
            namespacer.namespace_fragment(&mut copy, &mut self.variables)?;
            self.fragments.push(copy);
        }
        namespacer.rename_spreads(&mut field.selection_set);
        namespacer.namespace_field(field, &mut self.variables)
    }
}

fn aliased_field(
    environment: &FetchEnvironment,
    counter: usize,
    rewriter: &SelectionRewriter,
) -> Field {
    let mut field = environment.field.clone();
    field.alias = Some(format!("{}{}", environment.field.name, counter));
    rewriter.trim_field(environment, &mut field);
    field
}

fn selects_only(field: &Field, name: &str) -> bool {
    !field.selection_set.items.is_empty()
        && field
            .selection_set
            .items
            .iter()
            .all(|selection| matches!(selection, Selection::Field(child) if child.name == name))
}

/// Type of the link argument, as declared by the target's private schema.
fn link_argument_type(source: &dyn SchemaSource, link: &Link) -> Result<Type, FetchError> {
    source
        .private_schema()
        .query_type()
        .and_then(|query| {
            query
                .fields
                .iter()
                .find(|field| field.name == link.target_field())
        })
        .and_then(|field| {
            field
                .arguments
                .iter()
                .find(|argument| argument.name == link.argument_name())
        })
        .map(|argument| argument.value_type.clone())
        .ok_or_else(|| FetchError::MissingLinkArgument {
            namespace: source.namespace().clone(),
            field: link.target_field().to_string(),
            argument: link.argument_name().to_string(),
        })
}

/// Batch loader of sources queried with GraphQL: one compound query per batch.
pub struct QueryExecutorBatchLoader {
    source: Arc<dyn SchemaSource>,
    link: Option<Link>,
    query_function: Arc<dyn QueryFunction>,
    document_mapper: Option<Arc<DocumentMapper>>,
}

impl QueryExecutorBatchLoader {
    pub fn new(
        source: Arc<dyn SchemaSource>,
        link: Option<Link>,
        query_function: Arc<dyn QueryFunction>,
    ) -> QueryExecutorBatchLoader {
        QueryExecutorBatchLoader {
            source,
            link,
            query_function,
            document_mapper: None,
        }
    }

    pub fn with_document_mapper(mut self, document_mapper: Option<Arc<DocumentMapper>>) -> Self {
        self.document_mapper = document_mapper;
        self
    }
}

#[async_trait]
impl BatchLoader for QueryExecutorBatchLoader {
    #[instrument(level = "trace", skip_all, fields(namespace = %self.source.namespace()))]
    async fn load(
        &self,
        environments: Vec<FetchEnvironment>,
        context: &BraidContext,
    ) -> Result<Vec<FieldResult>, FetchError> {
        let batch =
            BatchQuery::build(&environments, self.source.as_ref(), self.link.as_ref(), context)?;
        if batch.is_empty() {
            trace!("every fetch was short-circuited");
            return Ok(demultiplex(batch.into_slots(), ExecutionResult::default()));
        }

        let mut document = batch.to_document();
        let mapping = self
            .document_mapper
            .as_ref()
            .map(|mapper| mapper.apply(&mut document));
        let request = batch.to_request(&document);
        debug!(
            operation = %batch.operation_name(),
            fetches = environments.len(),
            "querying source"
        );
        trace!(query = %request.query, "compound query");
        let mut response = self.query_function.query(request, context).await?;
        if let (Some(mapping), Some(data)) = (mapping, response.data.as_mut()) {
            mapping.apply(data);
        }
        Ok(demultiplex(batch.into_slots(), response))
    }
}
