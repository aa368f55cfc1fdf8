use graphql_parser::query::TypeCondition;

use crate::ast::{
    named_type, new_field, Field, FragmentDefinition, Selection, SelectionSet, TYPENAME_FIELD,
};
use crate::fetch::FetchEnvironment;
use crate::link::Link;
use crate::schema::TypeRegistry;

/// Trims a client selection down to what one source can answer.
///
/// Types are tracked against the braided schema, while field existence is
/// checked against the private schema of the source receiving the query.
pub struct SelectionRewriter<'a> {
    schema: &'a TypeRegistry,
    source_schema: &'a TypeRegistry,
    links: &'a [Link],
}

impl<'a> SelectionRewriter<'a> {
    pub fn new(
        schema: &'a TypeRegistry,
        source_schema: &'a TypeRegistry,
        links: &'a [Link],
    ) -> SelectionRewriter<'a> {
        SelectionRewriter {
            schema,
            source_schema,
            links,
        }
    }

    pub fn trim_field(&self, environment: &FetchEnvironment, field: &mut Field) {
        if environment.source.is_none() {
            let root_link = self.links.iter().find(|link| {
                link.source_type() == environment.parent_type && link.source_field() == field.name
            });
            if let Some(link) = root_link {
                field.name = link.source_from_field().to_string();
                field.selection_set.items.clear();
                return;
            }
        }
        self.trim_selection_set(named_type(&environment.field_type), &mut field.selection_set);
    }

    pub fn trim_fragment(&self, fragment: &mut FragmentDefinition) {
        let TypeCondition::On(type_condition) = fragment.type_condition.clone();
        self.trim_selection_set(&type_condition, &mut fragment.selection_set);
    }

    fn trim_selection_set(&self, parent_type: &str, selection_set: &mut SelectionSet) {
        for link in self
            .links
            .iter()
            .filter(|link| link.source_type() == parent_type && link.has_different_from_field())
        {
            if !selects_field(selection_set, link.source_field()) {
                continue;
            }
            selection_set.items.retain(|selection| {
                !matches!(selection, Selection::Field(field) if field.name == link.source_field())
            });
            if !selects_field(selection_set, link.source_from_field()) {
                selection_set
                    .items
                    .push(Selection::Field(new_field(link.source_from_field())));
            }
        }

        selection_set
            .items
            .retain_mut(|selection| self.trim_selection(parent_type, selection));

        if self.schema.is_abstract(parent_type)
            && !selection_set.items.is_empty()
            && !selects_field(selection_set, TYPENAME_FIELD)
        {
            selection_set
                .items
                .push(Selection::Field(new_field(TYPENAME_FIELD)));
        }
    }

    /// Returns false when the selection has to be dropped.
    fn trim_selection(&self, parent_type: &str, selection: &mut Selection) -> bool {
        match selection {
            Selection::Field(field) => {
                if field.name == TYPENAME_FIELD {
                    return true;
                }
                let is_join_key = self.links.iter().any(|link| {
                    link.source_type() == parent_type && link.source_from_field() == field.name
                });
                if is_join_key {
                    // the link loader expands this field later on
                    field.selection_set.items.clear();
                    return true;
                }
                if self.source_schema.contains_type(parent_type)
                    && self.source_schema.field(parent_type, &field.name).is_none()
                {
                    return false;
                }
                if !field.selection_set.items.is_empty() {
                    if let Some(definition) = self.schema.field(parent_type, &field.name) {
                        self.trim_selection_set(
                            named_type(&definition.field_type),
                            &mut field.selection_set,
                        );
                    }
                }
                true
            }
            Selection::InlineFragment(fragment) => {
                let fragment_type = match &fragment.type_condition {
                    Some(TypeCondition::On(name)) => name.clone(),
                    None => parent_type.to_string(),
                };
                self.trim_selection_set(&fragment_type, &mut fragment.selection_set);
                !fragment.selection_set.items.is_empty()
            }
            Selection::FragmentSpread(_) => true,
        }
    }
}

fn selects_field(selection_set: &SelectionSet, name: &str) -> bool {
    selection_set
        .items
        .iter()
        .any(|selection| matches!(selection, Selection::Field(field) if field.name == name))
}
