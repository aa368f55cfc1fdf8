//! Reshapes JSON objects, mostly REST payloads, into the shape of GraphQL types.

mod evaluator;

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::MapperError;

pub use evaluator::{ExpressionEvaluator, PathExpressionEvaluator, SimpleExpressionEvaluator};

pub trait Mapper: Send + Sync {
    fn apply(&self, input: &Map<String, Value>) -> Result<Map<String, Value>, MapperError>;
}

/// Decides whether a `list` or `map` operation applies, given the input and the output so far.
pub type Predicate = Arc<dyn Fn(&Map<String, Value>, &Map<String, Value>) -> bool + Send + Sync>;

pub fn input_contains(key: impl Into<String>) -> Predicate {
    let key = key.into();
    Arc::new(move |input, _output| input.contains_key(&key))
}

enum MapperOperation {
    Copy {
        source: String,
        target: String,
        default: Option<Value>,
    },
    Put {
        key: String,
        value: Value,
    },
    CopyList {
        source: String,
        target: String,
        mapper: Arc<dyn Mapper>,
    },
    List {
        key: String,
        predicate: Option<Predicate>,
        mapper: Arc<dyn Mapper>,
    },
    Map {
        key: String,
        predicate: Option<Predicate>,
        mapper: Arc<dyn Mapper>,
    },
    CopyMap {
        source: String,
        target: String,
        mapper: Arc<dyn Mapper>,
    },
}

/// A mapper built from a sequence of operations, applied in order to an
/// initially empty output.
pub struct OperationMapper {
    evaluator: Arc<dyn ExpressionEvaluator>,
    operations: Vec<MapperOperation>,
}

impl Default for OperationMapper {
    fn default() -> Self {
        OperationMapper::new(Arc::new(SimpleExpressionEvaluator))
    }
}

impl OperationMapper {
    pub fn new(evaluator: Arc<dyn ExpressionEvaluator>) -> OperationMapper {
        OperationMapper {
            evaluator,
            operations: Vec::new(),
        }
    }

    pub fn copy(self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.push(MapperOperation::Copy {
            source: source.into(),
            target: target.into(),
            default: None,
        })
    }

    pub fn copy_or(
        self,
        source: impl Into<String>,
        target: impl Into<String>,
        default: Value,
    ) -> Self {
        self.push(MapperOperation::Copy {
            source: source.into(),
            target: target.into(),
            default: Some(default),
        })
    }

    pub fn put(self, key: impl Into<String>, value: Value) -> Self {
        self.push(MapperOperation::Put {
            key: key.into(),
            value,
        })
    }

    pub fn copy_list(
        self,
        source: impl Into<String>,
        target: impl Into<String>,
        mapper: Arc<dyn Mapper>,
    ) -> Self {
        self.push(MapperOperation::CopyList {
            source: source.into(),
            target: target.into(),
            mapper,
        })
    }

    pub fn list(self, key: impl Into<String>, mapper: Arc<dyn Mapper>) -> Self {
        self.push(MapperOperation::List {
            key: key.into(),
            predicate: None,
            mapper,
        })
    }

    pub fn list_if(
        self,
        key: impl Into<String>,
        predicate: Predicate,
        mapper: Arc<dyn Mapper>,
    ) -> Self {
        self.push(MapperOperation::List {
            key: key.into(),
            predicate: Some(predicate),
            mapper,
        })
    }

    pub fn map(self, key: impl Into<String>, mapper: Arc<dyn Mapper>) -> Self {
        self.push(MapperOperation::Map {
            key: key.into(),
            predicate: None,
            mapper,
        })
    }

    pub fn map_if(
        self,
        key: impl Into<String>,
        predicate: Predicate,
        mapper: Arc<dyn Mapper>,
    ) -> Self {
        self.push(MapperOperation::Map {
            key: key.into(),
            predicate: Some(predicate),
            mapper,
        })
    }

    pub fn copy_map(
        self,
        source: impl Into<String>,
        target: impl Into<String>,
        mapper: Arc<dyn Mapper>,
    ) -> Self {
        self.push(MapperOperation::CopyMap {
            source: source.into(),
            target: target.into(),
            mapper,
        })
    }

    pub fn into_arc(self) -> Arc<dyn Mapper> {
        Arc::new(self)
    }

    fn push(mut self, operation: MapperOperation) -> Self {
        self.operations.push(operation);
        self
    }

    fn apply_operation(
        &self,
        operation: &MapperOperation,
        input: &Map<String, Value>,
        output: &mut Map<String, Value>,
    ) -> Result<(), MapperError> {
        match operation {
            MapperOperation::Copy {
                source,
                target,
                default,
            } => {
                let value = self
                    .evaluator
                    .evaluate(input, source)
                    .filter(|value| !value.is_null())
                    .or(default.as_ref());
                if let Some(value) = value.filter(|value| !value.is_null()) {
                    output.insert(target.clone(), value.clone());
                }
            }
            MapperOperation::Put { key, value } => {
                output.insert(key.clone(), value.clone());
            }
            MapperOperation::CopyList {
                source,
                target,
                mapper,
            } => {
                if let Some(Value::Array(items)) = self.evaluator.evaluate(input, source) {
                    let mut mapped = Vec::with_capacity(items.len());
                    for item in items {
                        let object = item
                            .as_object()
                            .ok_or_else(|| MapperError::ExpectedObject(source.clone()))?;
                        mapped.push(Value::Object(mapper.apply(object)?));
                    }
                    output.insert(target.clone(), Value::Array(mapped));
                }
            }
            MapperOperation::List {
                key,
                predicate,
                mapper,
            } => {
                if applies(predicate, input, output) {
                    let item = Value::Object(mapper.apply(input)?);
                    output.insert(key.clone(), Value::Array(vec![item]));
                }
            }
            MapperOperation::Map {
                key,
                predicate,
                mapper,
            } => {
                if applies(predicate, input, output) {
                    let mut merged = match output.remove(key) {
                        None | Some(Value::Null) => Map::new(),
                        Some(Value::Object(existing)) => existing,
                        Some(_) => return Err(MapperError::ExpectedObject(key.clone())),
                    };
                    merge_maps(&mut merged, mapper.apply(input)?, key)?;
                    output.insert(key.clone(), Value::Object(merged));
                }
            }
            MapperOperation::CopyMap {
                source,
                target,
                mapper,
            } => match self.evaluator.evaluate(input, source) {
                None | Some(Value::Null) => {}
                Some(Value::Object(object)) => {
                    output.insert(target.clone(), Value::Object(mapper.apply(object)?));
                }
                Some(_) => return Err(MapperError::ExpectedObject(source.clone())),
            },
        }
        Ok(())
    }
}

fn applies(
    predicate: &Option<Predicate>,
    input: &Map<String, Value>,
    output: &Map<String, Value>,
) -> bool {
    predicate
        .as_ref()
        .map_or(true, |predicate| predicate(input, output))
}

impl Mapper for OperationMapper {
    fn apply(&self, input: &Map<String, Value>) -> Result<Map<String, Value>, MapperError> {
        let mut output = Map::new();
        for operation in &self.operations {
            self.apply_operation(operation, input, &mut output)?;
        }
        Ok(output)
    }
}

/// Applies each mapper to the same input and merges their outputs.
pub struct ListOfMappers {
    mappers: Vec<Arc<dyn Mapper>>,
}

impl ListOfMappers {
    pub fn new(mappers: Vec<Arc<dyn Mapper>>) -> ListOfMappers {
        ListOfMappers { mappers }
    }
}

impl Mapper for ListOfMappers {
    fn apply(&self, input: &Map<String, Value>) -> Result<Map<String, Value>, MapperError> {
        let mut output = Map::new();
        for mapper in &self.mappers {
            merge_maps(&mut output, mapper.apply(input)?, "")?;
        }
        Ok(output)
    }
}

/// Merges `other` into `target`: objects merge recursively and lists are
/// concatenated. Any other clash is an error.
pub fn merge_maps(
    target: &mut Map<String, Value>,
    other: Map<String, Value>,
    path: &str,
) -> Result<(), MapperError> {
    for (key, value) in other {
        let key_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", path, key)
        };
        match (target.get_mut(&key), value) {
            (None, value) => {
                target.insert(key, value);
            }
            (Some(Value::Object(existing)), Value::Object(value)) => {
                merge_maps(existing, value, &key_path)?;
            }
            (Some(Value::Array(existing)), Value::Array(value)) => {
                existing.extend(value);
            }
            (Some(_), _) => return Err(MapperError::NonMergeableValues(key_path)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::{
        input_contains, ListOfMappers, Mapper, OperationMapper, PathExpressionEvaluator,
    };
    use crate::error::MapperError;

    fn apply(mapper: &dyn Mapper, input: Value) -> Result<Value, MapperError> {
        mapper
            .apply(input.as_object().unwrap())
            .map(Value::Object)
    }

    #[test]
    fn copies_and_puts_values() {
        let mapper = OperationMapper::default()
            .copy("id", "id")
            .copy("full_name", "name")
            .copy("missing", "missing")
            .copy_or("nickname", "nickname", json!("none"))
            .put("kind", json!("user"));

        let output = apply(&mapper, json!({ "id": 1, "full_name": "Jane", "nickname": null }));

        assert_eq!(
            output.unwrap(),
            json!({ "id": 1, "name": "Jane", "nickname": "none", "kind": "user" })
        );
    }

    #[test]
    fn maps_nested_lists_and_objects() {
        let item = OperationMapper::default().copy("n", "name").into_arc();
        let mapper = OperationMapper::default()
            .copy_list("items", "entries", item.clone())
            .copy_map("owner", "owner", item.clone())
            .list("single", item.clone())
            .map_if("meta", input_contains("n"), item.clone())
            .map_if("skipped", input_contains("absent"), item);

        let output = apply(
            &mapper,
            json!({ "n": "root", "items": [{ "n": "a" }, { "n": "b" }], "owner": { "n": "o" } }),
        );

        assert_eq!(
            output.unwrap(),
            json!({
                "entries": [{ "name": "a" }, { "name": "b" }],
                "owner": { "name": "o" },
                "single": [{ "name": "root" }],
                "meta": { "name": "root" }
            })
        );
    }

    #[test]
    fn list_of_mappers_merges_outputs() {
        let first = OperationMapper::default()
            .copy("a", "a")
            .list("tags", OperationMapper::default().copy("a", "tag").into_arc())
            .into_arc();
        let second = OperationMapper::default()
            .put("nested", json!({ "x": 1 }))
            .list("tags", OperationMapper::default().copy("b", "tag").into_arc())
            .into_arc();
        let third = OperationMapper::default()
            .put("nested", json!({ "y": 2 }))
            .into_arc();
        let mapper = ListOfMappers::new(vec![first, second, third]);

        let output = apply(&mapper, json!({ "a": "one", "b": "two" }));

        assert_eq!(
            output.unwrap(),
            json!({
                "a": "one",
                "tags": [{ "tag": "one" }, { "tag": "two" }],
                "nested": { "x": 1, "y": 2 }
            })
        );
    }

    #[test]
    fn clashing_values_do_not_merge() {
        let mapper = ListOfMappers::new(vec![
            OperationMapper::default().put("a", json!(1)).into_arc(),
            OperationMapper::default().put("a", json!(2)).into_arc(),
        ]);

        let output = apply(&mapper, json!({}));

        assert_eq!(output, Err(MapperError::NonMergeableValues("a".to_string())));
    }

    #[test]
    fn evaluator_is_injected() {
        let mapper = OperationMapper::new(Arc::new(PathExpressionEvaluator))
            .copy("user.name", "name");

        let output = apply(&mapper, json!({ "user": { "name": "Jane" } }));

        assert_eq!(output.unwrap(), json!({ "name": "Jane" }));
    }
}
