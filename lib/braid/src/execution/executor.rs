use ahash::HashSet;
use futures::future::{join_all, BoxFuture, FutureExt};
use graphql_parser::query::{self, TypeCondition};
use graphql_parser::schema;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::ast::{response_key, Field, SelectionSet, Type, TYPENAME_FIELD};
use crate::context::BraidContext;
use crate::error::FetchError;
use crate::execution::dispatcher::{batch_key, resolve};
use crate::execution::values::should_include;
use crate::fetch::{FetchEnvironment, OperationKind, ResponsePath};
use crate::response::graphql_error::{GraphQLError, GraphQLErrorPathSegment};

/// A null that has to bubble up to the closest nullable position.
#[derive(Debug)]
struct NullPropagation;

type Completion = Result<Value, NullPropagation>;

type CollectedFields = IndexMap<String, Vec<Field>>;

/// Executes one operation against the braided schema and returns its data and errors.
///
/// Fields owned by a source resolve through the loader registered for them;
/// every other field reads its value off the parent object.
pub async fn execute_operation(
    context: &BraidContext,
    kind: OperationKind,
    selection_set: &SelectionSet,
) -> (Value, Vec<GraphQLError>) {
    let executor = Executor {
        context,
        errors: Mutex::new(Vec::new()),
    };
    let data = executor.execute_root(kind, selection_set).await;
    (data, executor.errors.into_inner())
}

struct Executor<'a> {
    context: &'a BraidContext,
    errors: Mutex<Vec<GraphQLError>>,
}

impl Executor<'_> {
    async fn execute_root(&self, kind: OperationKind, selection_set: &SelectionSet) -> Value {
        let schema = self.context.schema();
        let root_type = match kind {
            OperationKind::Query => schema.query_type_name(),
            OperationKind::Mutation => match schema.mutation_type_name() {
                Some(name) => name,
                None => {
                    self.push_error(GraphQLError::from("Schema does not support mutations"));
                    return Value::Null;
                }
            },
        };
        debug!(root = root_type, "executing operation");

        self.context.dispatch_state().enter_fields();
        let mut fields = CollectedFields::new();
        self.collect_fields(root_type, selection_set, &mut fields, &mut HashSet::default());
        let serial = kind == OperationKind::Mutation;
        self.execute_fields(root_type, fields, None, Vec::new(), serial)
            .await
            .unwrap_or(Value::Null)
    }

    fn push_error(&self, error: GraphQLError) {
        self.errors.lock().push(error);
    }

    /// Whether an error was already reported at or below `path`.
    fn has_error_at(&self, path: &[GraphQLErrorPathSegment]) -> bool {
        self.errors.lock().iter().any(|error| {
            error
                .path
                .as_ref()
                .is_some_and(|error_path| error_path.starts_with(path))
        })
    }

    fn operation_of(&self, type_name: &str) -> Option<OperationKind> {
        let schema = self.context.schema();
        if type_name == schema.query_type_name() {
            Some(OperationKind::Query)
        } else if schema.mutation_type_name() == Some(type_name) {
            Some(OperationKind::Mutation)
        } else {
            None
        }
    }

    fn type_condition_applies(&self, condition: &str, type_name: &str) -> bool {
        self.context.schema().is_possible_type(condition, type_name)
    }

    fn collect_fields(
        &self,
        type_name: &str,
        selection_set: &SelectionSet,
        fields: &mut CollectedFields,
        visited_fragments: &mut HashSet<String>,
    ) {
        let variables = self.context.variables();
        for selection in &selection_set.items {
            match selection {
                query::Selection::Field(field) => {
                    if should_include(&field.directives, variables) {
                        fields
                            .entry(response_key(field).to_string())
                            .or_default()
                            .push(field.clone());
                    }
                }
                query::Selection::FragmentSpread(spread) => {
                    if !should_include(&spread.directives, variables)
                        || !visited_fragments.insert(spread.fragment_name.clone())
                    {
                        continue;
                    }
                    let Some(fragment) = self.context.fragments().get(&spread.fragment_name)
                    else {
                        self.push_error(GraphQLError::from(
                            FetchError::UndefinedFragment(spread.fragment_name.clone()).to_string(),
                        ));
                        continue;
                    };
                    let TypeCondition::On(condition) = &fragment.type_condition;
                    if self.type_condition_applies(condition, type_name) {
                        self.collect_fields(
                            type_name,
                            &fragment.selection_set,
                            fields,
                            visited_fragments,
                        );
                    }
                }
                query::Selection::InlineFragment(inline) => {
                    if !should_include(&inline.directives, variables) {
                        continue;
                    }
                    let applies = match &inline.type_condition {
                        None => true,
                        Some(TypeCondition::On(condition)) => {
                            self.type_condition_applies(condition, type_name)
                        }
                    };
                    if applies {
                        self.collect_fields(
                            type_name,
                            &inline.selection_set,
                            fields,
                            visited_fragments,
                        );
                    }
                }
            }
        }
    }

    fn execute_fields<'b>(
        &'b self,
        type_name: &'b str,
        fields: CollectedFields,
        source: Option<&'b Value>,
        path: ResponsePath,
        serial: bool,
    ) -> BoxFuture<'b, Completion> {
        async move {
            let mut object = Map::new();
            let mut propagated = false;
            if serial {
                for (key, nodes) in &fields {
                    let value = self
                        .resolve_field(type_name, nodes, source, child_path(&path, key))
                        .await;
                    match value {
                        Ok(value) => {
                            object.insert(key.clone(), value);
                        }
                        Err(NullPropagation) => propagated = true,
                    }
                }
            } else {
                let values = join_all(fields.iter().map(|(key, nodes)| {
                    self.resolve_field(type_name, nodes, source, child_path(&path, key))
                }))
                .await;
                for (key, value) in fields.keys().zip(values) {
                    match value {
                        Ok(value) => {
                            object.insert(key.clone(), value);
                        }
                        Err(NullPropagation) => propagated = true,
                    }
                }
            }
            if propagated {
                Ok(Value::Null)
            } else {
                Ok(Value::Object(object))
            }
        }
        .boxed()
    }

    fn resolve_field<'b>(
        &'b self,
        parent_type: &'b str,
        nodes: &'b [Field],
        source: Option<&'b Value>,
        path: ResponsePath,
    ) -> BoxFuture<'b, Completion> {
        async move {
            let Some(field) = merge_nodes(nodes) else {
                return Ok(Value::Null);
            };
            if field.name == TYPENAME_FIELD {
                return Ok(Value::String(parent_type.to_string()));
            }
            let Some(definition) = self.context.schema().field(parent_type, &field.name) else {
                self.push_error(
                    GraphQLError::from(format!(
                        "Cannot query field \"{}\" on type \"{}\".",
                        field.name, parent_type
                    ))
                    .with_path(path),
                );
                return Ok(Value::Null);
            };
            let field_type = definition.field_type.clone();

            let key = batch_key(parent_type, &field.name);
            let value = if self.context.loaders().get(&key).is_some() {
                let environment = FetchEnvironment {
                    field: field.clone(),
                    field_type: field_type.clone(),
                    parent_type: parent_type.to_string(),
                    parent_operation: self.operation_of(parent_type),
                    source: source.cloned(),
                    path: path.clone(),
                };
                match resolve(self.context, &key, environment).await {
                    Ok(result) => {
                        for error in result.errors {
                            self.push_error(error.prefixed_with(&path));
                        }
                        result.data
                    }
                    Err(error) => {
                        self.push_error(GraphQLError::from(error.to_string()).with_path(path.clone()));
                        Value::Null
                    }
                }
            } else {
                property(source, &field)
            };

            self.complete_value(parent_type, &field_type, &field, value, path)
                .await
        }
        .boxed()
    }

    fn complete_value<'b>(
        &'b self,
        parent_type: &'b str,
        field_type: &'b Type,
        field: &'b Field,
        value: Value,
        path: ResponsePath,
    ) -> BoxFuture<'b, Completion> {
        async move {
            match field_type {
                query::Type::NonNullType(inner) => {
                    let completed = self
                        .complete_value(parent_type, inner, field, value, path.clone())
                        .await?;
                    if completed.is_null() {
                        if !self.has_error_at(&path) {
                            self.push_error(
                                GraphQLError::from(format!(
                                    "Cannot return null for non-nullable field {}.{}.",
                                    parent_type, field.name
                                ))
                                .with_path(path),
                            );
                        }
                        return Err(NullPropagation);
                    }
                    Ok(completed)
                }
                _ if value.is_null() => Ok(Value::Null),
                query::Type::ListType(inner) => {
                    let Value::Array(items) = value else {
                        self.push_error(
                            GraphQLError::from(format!(
                                "Expected a list value for field {}.{}.",
                                parent_type, field.name
                            ))
                            .with_path(path),
                        );
                        return Ok(Value::Null);
                    };
                    let completions = join_all(items.into_iter().enumerate().map(|(index, item)| {
                        let mut item_path = path.clone();
                        item_path.push(index.into());
                        self.complete_value(parent_type, inner, field, item, item_path)
                    }));
                    let completed = completions.await;
                    if completed.iter().any(Result::is_err) {
                        return Ok(Value::Null);
                    }
                    Ok(Value::Array(completed.into_iter().filter_map(Result::ok).collect()))
                }
                query::Type::NamedType(type_name) => {
                    self.complete_named(type_name, field, value, path).await
                }
            }
        }
        .boxed()
    }

    async fn complete_named(
        &self,
        type_name: &str,
        field: &Field,
        value: Value,
        path: ResponsePath,
    ) -> Completion {
        let concrete = match self.context.schema().get_type(type_name) {
            Some(schema::TypeDefinition::Object(_)) => type_name.to_string(),
            Some(schema::TypeDefinition::Interface(_)) | Some(schema::TypeDefinition::Union(_)) => {
                match self.resolve_abstract_type(type_name, &value) {
                    Some(concrete) => concrete,
                    None => {
                        self.push_error(
                            GraphQLError::from(format!(
                                "Could not resolve the concrete type of \"{}\"",
                                type_name
                            ))
                            .with_path(path),
                        );
                        return Ok(Value::Null);
                    }
                }
            }
            // scalars, enums and built-in types are passed through
            _ => return Ok(value),
        };
        if !value.is_object() {
            self.push_error(
                GraphQLError::from(format!("Expected an object of type \"{}\"", concrete))
                    .with_path(path),
            );
            return Ok(Value::Null);
        }

        let mut fields = CollectedFields::new();
        self.collect_fields(
            &concrete,
            &field.selection_set,
            &mut fields,
            &mut HashSet::default(),
        );
        self.execute_fields(&concrete, fields, Some(&value), path, false)
            .await
    }

    fn resolve_abstract_type(&self, abstract_type: &str, value: &Value) -> Option<String> {
        let schema = self.context.schema();
        if let Some(type_name) = value.get(TYPENAME_FIELD).and_then(Value::as_str) {
            if schema.is_possible_type(abstract_type, type_name) {
                return Some(type_name.to_string());
            }
        }
        match schema.possible_types(abstract_type).as_slice() {
            [single] => Some(single.to_string()),
            _ => None,
        }
    }
}

fn child_path(path: &ResponsePath, key: &str) -> ResponsePath {
    let mut child = path.clone();
    child.push(key.into());
    child
}

/// Fields sharing a response key, with their selections merged into the first one.
fn merge_nodes(nodes: &[Field]) -> Option<Field> {
    let (first, rest) = nodes.split_first()?;
    let mut merged = first.clone();
    for node in rest {
        merged
            .selection_set
            .items
            .extend(node.selection_set.items.iter().cloned());
    }
    Some(merged)
}

/// Reads an aliased field under its alias when present, else under its name.
fn property(source: Option<&Value>, field: &Field) -> Value {
    let Some(object) = source.and_then(Value::as_object) else {
        return Value::Null;
    };
    field
        .alias
        .as_ref()
        .and_then(|alias| object.get(alias))
        .or_else(|| object.get(&field.name))
        .cloned()
        .unwrap_or(Value::Null)
}
