//! Turns the fetches of one batch into a single compound query, and the
//! compound response back into one result per fetch.

pub mod batch;
pub mod demux;
pub mod namespacer;
pub mod rewriter;

use serde_json::Value;

use crate::ast::response_key;
use crate::fetch::FetchEnvironment;
use crate::link::Link;

/// Join key values of a linked field, read off its parent value.
#[derive(Debug, PartialEq)]
pub struct JoinKeys {
    pub values: Vec<Value>,
    /// Whether the parent held a list of keys.
    pub is_list: bool,
}

impl JoinKeys {
    pub fn of(link: &Link, environment: &FetchEnvironment) -> JoinKeys {
        let parent = match &environment.source {
            None | Some(Value::Null) => {
                return JoinKeys {
                    values: Vec::new(),
                    is_list: false,
                }
            }
            Some(Value::Object(object)) => {
                let value = if link.has_different_from_field() {
                    object.get(link.source_from_field())
                } else {
                    object
                        .get(response_key(&environment.field))
                        .or_else(|| object.get(&environment.field.name))
                };
                value.cloned().unwrap_or(Value::Null)
            }
            // the parent is the join key itself, as returned by a chained loader
            Some(value) => value.clone(),
        };
        match parent {
            Value::Array(values) => JoinKeys::from_values(values),
            value => JoinKeys {
                values: vec![value],
                is_list: false,
            },
        }
    }

    fn from_values(values: Vec<Value>) -> JoinKeys {
        JoinKeys {
            values,
            is_list: true,
        }
    }

    /// Value of the linked field when there is no key to fetch.
    pub fn empty_value(&self) -> Value {
        if self.is_list {
            Value::Array(Vec::new())
        } else {
            Value::Null
        }
    }
}
