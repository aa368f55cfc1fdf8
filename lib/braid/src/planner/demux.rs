use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::fetch::FieldResult;
use crate::planner::batch::FetchSlot;
use crate::response::execution_result::ExecutionResult;
use crate::response::graphql_error::GraphQLError;

/// Splits a compound response into one result per fetch, in fetch order.
///
/// Errors without a path are attached to every fetch. Errors whose path
/// starts with one of a fetch's aliases go to that fetch only, with the alias
/// stripped from their path. Fetches of a list of join keys collect one value
/// per alias, and their errors are indexed by the position of the key.
pub fn demultiplex(slots: Vec<FetchSlot>, mut response: ExecutionResult) -> Vec<FieldResult> {
    let mut data = response.take_data_object();
    let errors = response.take_errors();
    slots
        .into_iter()
        .map(|slot| slice(slot, &mut data, &errors))
        .collect()
}

fn slice(slot: FetchSlot, data: &mut Map<String, Value>, errors: &[GraphQLError]) -> FieldResult {
    let FetchSlot {
        aliases,
        mut short_circuited,
        empty,
        collect,
        errors: mut field_errors,
    } = slot;
    let mut values: Vec<Value> = aliases
        .iter()
        .map(|alias| {
            data.remove(alias)
                .or_else(|| short_circuited.remove(alias))
                .unwrap_or(Value::Null)
        })
        .collect();

    for error in errors {
        if error.is_global() {
            field_errors.push(error.clone());
        } else if let Some(index) = aliases.iter().position(|alias| error.starts_with_key(alias)) {
            let relative = error.relativize();
            if collect {
                field_errors.push(relative.prefixed_with(&[index.into()]));
            } else {
                field_errors.push(relative);
            }
        }
    }

    let data = if values.is_empty() {
        empty
    } else if collect {
        Value::Array(values)
    } else if values.len() == 1 {
        values.pop().unwrap_or_default()
    } else {
        field_errors.push(GraphQLError::from(
            FetchError::MultipleFieldsForSingleValue.to_string(),
        ));
        Value::Null
    };
    FieldResult::new(data).with_errors(field_errors)
}
