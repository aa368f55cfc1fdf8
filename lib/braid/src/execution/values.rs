use graphql_parser::query::{self, Number};
use serde_json::{Map, Value};

use crate::ast::{Directive, Field, Value as AstValue, VariableDefinition};
use crate::error::RequestError;

/// Converts an AST value to JSON. Undefined variables become null.
pub fn value_from_ast(value: &AstValue, variables: &Map<String, Value>) -> Value {
    match value {
        query::Value::Null => Value::Null,
        query::Value::Boolean(b) => Value::Bool(*b),
        query::Value::String(s) => Value::String(s.clone()),
        query::Value::Enum(e) => Value::String(e.clone()),
        query::Value::Int(n) => int_value(n),
        query::Value::Float(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        query::Value::List(items) => Value::Array(
            items
                .iter()
                .map(|item| value_from_ast(item, variables))
                .collect(),
        ),
        query::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), value_from_ast(value, variables)))
                .collect(),
        ),
        query::Value::Variable(name) => variables.get(name).cloned().unwrap_or(Value::Null),
    }
}

fn int_value(n: &Number) -> Value {
    n.as_i64().map(Value::from).unwrap_or(Value::Null)
}

/// Arguments of a field, with variables substituted.
pub fn argument_values(field: &Field, variables: &Map<String, Value>) -> Map<String, Value> {
    field
        .arguments
        .iter()
        .map(|(name, value)| (name.clone(), value_from_ast(value, variables)))
        .collect()
}

/// Evaluates `@skip` and `@include`.
pub fn should_include(directives: &[Directive], variables: &Map<String, Value>) -> bool {
    let flag = |name: &str| {
        directives
            .iter()
            .find(|directive| directive.name == name)
            .and_then(|directive| {
                directive
                    .arguments
                    .iter()
                    .find(|(argument, _)| argument == "if")
            })
            .map(|(_, value)| value_from_ast(value, variables) == Value::Bool(true))
    };
    flag("skip") != Some(true) && flag("include") != Some(false)
}

/// Applies default values and checks that non-null variables were provided.
pub fn coerce_variables(
    definitions: &[VariableDefinition],
    mut provided: Map<String, Value>,
) -> Result<Map<String, Value>, RequestError> {
    let no_variables = Map::new();
    for definition in definitions {
        if provided.contains_key(&definition.name) {
            continue;
        }
        match &definition.default_value {
            Some(default) => {
                provided.insert(
                    definition.name.clone(),
                    value_from_ast(default, &no_variables),
                );
            }
            None if matches!(definition.var_type, query::Type::NonNullType(_)) => {
                return Err(RequestError::MissingVariable(definition.name.clone()));
            }
            None => {}
        }
    }
    Ok(provided)
}
