//! Rewrites the documents sent to a source whose fields are named or shaped
//! differently from the schema it declares, and maps the results back.

use ahash::HashSet;
use graphql_parser::query::TypeCondition;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::ast::{
    named_type, new_field, response_key, Definition, Field, OperationDefinition, QueryDocument,
    Selection, SelectionSet, TYPENAME_FIELD,
};
use crate::schema::TypeRegistry;

#[derive(Clone, Debug, PartialEq)]
pub enum FieldOperation {
    /// The declared field `key` is queried as `target` on the source.
    Copy { key: String, target: String },
    /// The declared field `key` is not queried; its value is always `value`.
    Put { key: String, value: Value },
}

impl FieldOperation {
    fn key(&self) -> &str {
        match self {
            FieldOperation::Copy { key, .. } | FieldOperation::Put { key, .. } => key,
        }
    }
}

/// Field operations applied to the selections made on one type.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeMapper {
    type_name: String,
    operations: Vec<FieldOperation>,
}

impl TypeMapper {
    pub fn new(type_name: impl Into<String>) -> TypeMapper {
        TypeMapper {
            type_name: type_name.into(),
            operations: Vec::new(),
        }
    }

    pub fn copy(self, key: impl Into<String>, target: impl Into<String>) -> Self {
        self.with_operation(FieldOperation::Copy {
            key: key.into(),
            target: target.into(),
        })
    }

    pub fn put(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_operation(FieldOperation::Put {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn with_operation(mut self, operation: FieldOperation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    fn operation(&self, field_name: &str) -> Option<&FieldOperation> {
        self.operations
            .iter()
            .find(|operation| operation.key() == field_name)
    }
}

/// Applies [`TypeMapper`]s to query documents. Fields without an operation
/// are sent and returned unchanged.
#[derive(Debug)]
pub struct DocumentMapper {
    schema: TypeRegistry,
    type_mappers: Vec<TypeMapper>,
}

impl DocumentMapper {
    /// `schema` is the schema the source declares, in which documents are written.
    pub fn new(schema: TypeRegistry, type_mappers: Vec<TypeMapper>) -> DocumentMapper {
        DocumentMapper {
            schema,
            type_mappers,
        }
    }

    /// Rewrites `document` in place and returns how to map its result back.
    pub fn apply(&self, document: &mut QueryDocument) -> DocumentMapping {
        let mut mapping = DocumentMapping::default();
        for definition in &mut document.definitions {
            match definition {
                Definition::Operation(operation) => {
                    let (root_type, selection_set) = match operation {
                        OperationDefinition::Query(query) => {
                            (self.schema.query_type_name(), &mut query.selection_set)
                        }
                        OperationDefinition::Mutation(mutation) => (
                            self.schema.mutation_type_name().unwrap_or("Mutation"),
                            &mut mutation.selection_set,
                        ),
                        OperationDefinition::SelectionSet(selection_set) => {
                            (self.schema.query_type_name(), selection_set)
                        }
                        OperationDefinition::Subscription(_) => continue,
                    };
                    let root_type = root_type.to_string();
                    mapping.root = self.map_selection_set(&root_type, selection_set);
                }
                Definition::Fragment(fragment) => {
                    let TypeCondition::On(type_name) = &fragment.type_condition;
                    let type_name = type_name.clone();
                    let result = self.map_selection_set(&type_name, &mut fragment.selection_set);
                    mapping.fragments.insert(
                        fragment.name.clone(),
                        (self.possible_types(&type_name), result),
                    );
                }
            }
        }
        mapping
    }

    fn type_mapper(&self, type_name: &str) -> Option<&TypeMapper> {
        self.type_mappers
            .iter()
            .find(|mapper| mapper.type_name == type_name)
    }

    fn possible_types(&self, type_name: &str) -> HashSet<String> {
        let mut types: HashSet<String> = self
            .schema
            .possible_types(type_name)
            .into_iter()
            .map(str::to_string)
            .collect();
        types.insert(type_name.to_string());
        types
    }

    fn map_selection_set(&self, type_name: &str, selection_set: &mut SelectionSet) -> ResultMapping {
        let type_mapper = self.type_mapper(type_name);
        let mut mapping = ResultMapping::default();
        let mut conditional = false;

        let items = std::mem::take(&mut selection_set.items);
        for selection in items {
            match selection {
                Selection::Field(mut field) => {
                    match type_mapper.and_then(|mapper| mapper.operation(&field.name)) {
                        Some(FieldOperation::Put { value, .. }) => {
                            mapping
                                .puts
                                .push((response_key(&field).to_string(), value.clone()));
                            continue;
                        }
                        Some(FieldOperation::Copy { target, .. }) => {
                            self.map_field(type_name, &mut field, &mut mapping);
                            if field.alias.is_none() {
                                field.alias = Some(field.name.clone());
                            }
                            field.name = target.clone();
                        }
                        None => self.map_field(type_name, &mut field, &mut mapping),
                    }
                    selection_set.items.push(Selection::Field(field));
                }
                Selection::InlineFragment(mut fragment) => {
                    let condition = match &fragment.type_condition {
                        Some(TypeCondition::On(name)) => name.clone(),
                        None => type_name.to_string(),
                    };
                    let result = self.map_selection_set(&condition, &mut fragment.selection_set);
                    if !result.is_empty() {
                        conditional = true;
                        mapping
                            .conditional
                            .push((self.possible_types(&condition), result));
                    }
                    selection_set.items.push(Selection::InlineFragment(fragment));
                }
                Selection::FragmentSpread(spread) => {
                    conditional = true;
                    mapping.spreads.push(spread.fragment_name.clone());
                    selection_set.items.push(Selection::FragmentSpread(spread));
                }
            }
        }

        let has_typename = selection_set.items.iter().any(|selection| {
            matches!(selection, Selection::Field(field) if field.alias.is_none() && field.name == TYPENAME_FIELD)
        });
        if selection_set.items.is_empty() || (conditional && !has_typename) {
            selection_set
                .items
                .push(Selection::Field(new_field(TYPENAME_FIELD)));
        }
        mapping
    }

    fn map_field(&self, parent_type: &str, field: &mut Field, mapping: &mut ResultMapping) {
        if field.selection_set.items.is_empty() {
            return;
        }
        let Some(definition) = self.schema.field(parent_type, &field.name) else {
            return;
        };
        let output_type = named_type(&definition.field_type).to_string();
        let child = self.map_selection_set(&output_type, &mut field.selection_set);
        if !child.is_empty() {
            mapping
                .fields
                .insert(response_key(field).to_string(), child);
        }
    }
}

/// What to change in the result of a selection set.
#[derive(Debug, Default, PartialEq)]
pub struct ResultMapping {
    puts: Vec<(String, Value)>,
    fields: IndexMap<String, ResultMapping>,
    conditional: Vec<(HashSet<String>, ResultMapping)>,
    spreads: Vec<String>,
}

impl ResultMapping {
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty()
            && self.fields.is_empty()
            && self.conditional.is_empty()
            && self.spreads.is_empty()
    }

    fn apply(&self, value: &mut Value, fragments: &Fragments) {
        match value {
            Value::Array(items) => items
                .iter_mut()
                .for_each(|item| self.apply(item, fragments)),
            Value::Object(object) => self.apply_object(object, fragments),
            _ => {}
        }
    }

    fn apply_object(&self, object: &mut Map<String, Value>, fragments: &Fragments) {
        for (key, value) in &self.puts {
            object.insert(key.clone(), value.clone());
        }
        for (key, child) in &self.fields {
            if let Some(value) = object.get_mut(key) {
                child.apply(value, fragments);
            }
        }
        for (types, child) in &self.conditional {
            if has_type_in(object, types) {
                child.apply_object(object, fragments);
            }
        }
        for name in &self.spreads {
            if let Some((types, child)) = fragments.get(name) {
                if has_type_in(object, types) {
                    child.apply_object(object, fragments);
                }
            }
        }
    }
}

type Fragments = IndexMap<String, (HashSet<String>, ResultMapping)>;

fn has_type_in(object: &Map<String, Value>, types: &HashSet<String>) -> bool {
    match object.get(TYPENAME_FIELD).and_then(Value::as_str) {
        Some(type_name) => types.contains(type_name),
        None => true,
    }
}

/// Maps the result of a document rewritten by [`DocumentMapper::apply`] back
/// to the shape of the original document.
#[derive(Debug, Default, PartialEq)]
pub struct DocumentMapping {
    root: ResultMapping,
    fragments: Fragments,
}

impl DocumentMapping {
    pub fn is_empty(&self) -> bool {
        self.root.is_empty() && self.fragments.values().all(|(_, mapping)| mapping.is_empty())
    }

    pub fn apply(&self, data: &mut Value) {
        self.root.apply(data, &self.fragments);
    }
}

#[cfg(test)]
mod tests {
    use graphql_parser::query::parse_query;
    use serde_json::json;

    use super::{DocumentMapper, TypeMapper};
    use crate::ast::QueryDocument;
    use crate::schema::TypeRegistry;

    const SCHEMA: &str = r#"
        type Query { foo(id: String): Foo node: Node }
        interface Node { id: String! }
        type Foo implements Node { id: String! label: String! kind: String! bar: Bar }
        type Bar implements Node { id: String! label: String! }
    "#;

    fn mapper() -> DocumentMapper {
        DocumentMapper::new(
            TypeRegistry::parse(SCHEMA).unwrap(),
            vec![
                TypeMapper::new("Foo").copy("label", "name").put("kind", "foo"),
                TypeMapper::new("Bar").copy("label", "title"),
            ],
        )
    }

    fn document(query: &str) -> QueryDocument {
        parse_query::<String>(query).unwrap().into_static()
    }

    #[test]
    fn renames_copied_fields_and_drops_put_fields() {
        let mut document = document(r#"{ foo100: foo(id: "1") { id label kind bar { l: label } } }"#);

        let mapping = mapper().apply(&mut document);

        insta::assert_snapshot!(document.to_string(), @r###"
        {
          foo100: foo(id: "1") {
            id
            label: name
            bar {
              l: title
            }
          }
        }
        "###);
        let mut data = json!({
            "foo100": { "id": "1", "label": "Foo", "bar": { "l": "Bar" } }
        });
        mapping.apply(&mut data);
        assert_eq!(
            data,
            json!({
                "foo100": { "id": "1", "label": "Foo", "kind": "foo", "bar": { "l": "Bar" } }
            })
        );
    }

    #[test]
    fn puts_into_every_item_of_a_list() {
        let mapper = DocumentMapper::new(
            TypeRegistry::parse("type Query { foos: [Foo] } type Foo { id: String kind: String }")
                .unwrap(),
            vec![TypeMapper::new("Foo").put("kind", "foo")],
        );
        let mut document = document("{ foos { kind } }");

        let mapping = mapper.apply(&mut document);

        assert_eq!(document.to_string(), "{\n  foos {\n    __typename\n  }\n}\n");
        let mut data = json!({ "foos": [{ "__typename": "Foo" }, null, { "__typename": "Foo" }] });
        mapping.apply(&mut data);
        assert_eq!(
            data,
            json!({ "foos": [
                { "__typename": "Foo", "kind": "foo" },
                null,
                { "__typename": "Foo", "kind": "foo" }
            ] })
        );
    }

    #[test]
    fn fragments_apply_by_type_condition() {
        let mut document = document(
            r#"
            query { node { id ...FooFields ... on Bar { label } } }
            fragment FooFields on Foo { kind }
            "#,
        );

        let mapping = mapper().apply(&mut document);

        let query = document.to_string();
        assert!(query.contains("... on Bar {\n      label: title\n    }"));
        assert!(query.contains("fragment FooFields on Foo {\n  __typename\n}"));
        assert!(query.contains("    __typename\n"));

        let mut data = json!({ "node": { "__typename": "Bar", "id": "b", "label": "B" } });
        mapping.apply(&mut data);
        assert_eq!(
            data,
            json!({ "node": { "__typename": "Bar", "id": "b", "label": "B" } })
        );

        let mut data = json!({ "node": { "__typename": "Foo", "id": "f" } });
        mapping.apply(&mut data);
        assert_eq!(
            data,
            json!({ "node": { "__typename": "Foo", "id": "f", "kind": "foo" } })
        );
    }

    #[test]
    fn documents_without_mapped_types_stay_unchanged() {
        let query = "{\n  node {\n    id\n  }\n}\n";
        let mut document = document(query);

        let mapping = mapper().apply(&mut document);

        assert!(mapping.is_empty());
        assert_eq!(document.to_string(), query);
    }
}
