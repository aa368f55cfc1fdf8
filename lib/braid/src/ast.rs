//! Owned `graphql-parser` AST aliases.

use graphql_parser::{query, schema, Pos};

pub type QueryDocument = query::Document<'static, String>;
pub type Definition = query::Definition<'static, String>;
pub type OperationDefinition = query::OperationDefinition<'static, String>;
pub type FragmentDefinition = query::FragmentDefinition<'static, String>;
pub type VariableDefinition = query::VariableDefinition<'static, String>;
pub type SelectionSet = query::SelectionSet<'static, String>;
pub type Selection = query::Selection<'static, String>;
pub type Field = query::Field<'static, String>;
pub type InlineFragment = query::InlineFragment<'static, String>;
pub type FragmentSpread = query::FragmentSpread<'static, String>;
pub type Directive = query::Directive<'static, String>;
pub type Value = query::Value<'static, String>;
pub type Type = query::Type<'static, String>;

pub type SchemaDocument = schema::Document<'static, String>;
pub type TypeDefinition = schema::TypeDefinition<'static, String>;
pub type ObjectType = schema::ObjectType<'static, String>;
pub type FieldDefinition = schema::Field<'static, String>;
pub type InputValue = schema::InputValue<'static, String>;
pub type DirectiveDefinition = schema::DirectiveDefinition<'static, String>;

pub const TYPENAME_FIELD: &str = "__typename";

/// The response key of a field: its alias, or its name.
pub fn response_key(field: &Field) -> &str {
    field.alias.as_deref().unwrap_or(&field.name)
}

pub fn empty_selection_set() -> SelectionSet {
    SelectionSet {
        span: (Pos::default(), Pos::default()),
        items: Vec::new(),
    }
}

/// A bare field selection without alias, arguments or sub-selections.
pub fn new_field(name: &str) -> Field {
    Field {
        position: Pos::default(),
        alias: None,
        name: name.to_string(),
        arguments: Vec::new(),
        directives: Vec::new(),
        selection_set: empty_selection_set(),
    }
}

/// The name of the innermost named type, without list and non-null wrappers.
pub fn named_type(ty: &Type) -> &str {
    match ty {
        query::Type::NamedType(name) => name.as_str(),
        query::Type::ListType(inner) | query::Type::NonNullType(inner) => named_type(inner),
    }
}

/// A list type, possibly wrapped in non-null.
pub fn is_list_type(ty: &Type) -> bool {
    match ty {
        query::Type::ListType(_) => true,
        query::Type::NonNullType(inner) => matches!(inner.as_ref(), query::Type::ListType(_)),
        query::Type::NamedType(_) => false,
    }
}

/// Mirrors the list/non-null wrapping of `shape` around `named`.
pub fn rewrap_type(shape: &Type, named: &str) -> Type {
    match shape {
        query::Type::NamedType(_) => query::Type::NamedType(named.to_string()),
        query::Type::ListType(inner) => query::Type::ListType(Box::new(rewrap_type(inner, named))),
        query::Type::NonNullType(inner) => {
            query::Type::NonNullType(Box::new(rewrap_type(inner, named)))
        }
    }
}

pub fn type_definition_name(definition: &TypeDefinition) -> &str {
    match definition {
        schema::TypeDefinition::Scalar(scalar) => &scalar.name,
        schema::TypeDefinition::Object(object) => &object.name,
        schema::TypeDefinition::Interface(interface) => &interface.name,
        schema::TypeDefinition::Union(union) => &union.name,
        schema::TypeDefinition::Enum(enum_type) => &enum_type.name,
        schema::TypeDefinition::InputObject(input) => &input.name,
    }
}
