use ahash::HashMap;
use serde_json::{Map, Value as JsonValue};

use crate::ast::{
    Directive, Field, FragmentDefinition, Selection, SelectionSet, Type, Value, VariableDefinition,
};
use crate::error::FetchError;

/// Variable definitions and values of one compound document.
#[derive(Debug, Default)]
pub struct CompoundVariables {
    pub definitions: Vec<VariableDefinition>,
    pub values: Map<String, JsonValue>,
    /// Operation variable each namespaced name stands for.
    origins: HashMap<String, String>,
}

impl CompoundVariables {
    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions
            .iter()
            .any(|definition| definition.name == name)
    }

    /// Defines a variable holding `value`, named `base` or, when taken,
    /// `base` followed by underscores. Returns the name.
    pub fn define_fresh(&mut self, mut base: String, var_type: Type, value: JsonValue) -> String {
        while self.is_defined(&base) {
            base.push('_');
        }
        self.define(&base, var_type);
        self.values.insert(base.clone(), value);
        base
    }

    fn is_namespaced(&self, name: &str) -> bool {
        self.origins.contains_key(name)
    }

    /// Lets `name` stand for the operation variable `original`. False when
    /// `name` already stands for something else.
    fn claim(
        &mut self,
        name: &str,
        original: &str,
        definition: &VariableDefinition,
        value: Option<&JsonValue>,
    ) -> bool {
        if let Some(origin) = self.origins.get(name) {
            return origin == original;
        }
        if self.is_defined(name) {
            return false;
        }
        self.define(name, definition.var_type.clone());
        self.origins.insert(name.to_string(), original.to_string());
        if let Some(value) = value {
            self.values.insert(name.to_string(), value.clone());
        }
        true
    }

    fn define(&mut self, name: &str, var_type: Type) {
        self.definitions.push(VariableDefinition {
            position: Default::default(),
            name: name.to_string(),
            var_type,
            default_value: None,
        });
    }
}

/// Renames the variables and fragments of one fetch by suffixing them with the
/// fetch counter, so that several fetches can share a document.
pub struct VariableNamespacer<'a> {
    suffix: String,
    variable_definitions: &'a [VariableDefinition],
    variables: &'a Map<String, JsonValue>,
}

impl<'a> VariableNamespacer<'a> {
    pub fn new(
        counter: usize,
        variable_definitions: &'a [VariableDefinition],
        variables: &'a Map<String, JsonValue>,
    ) -> VariableNamespacer<'a> {
        VariableNamespacer {
            suffix: counter.to_string(),
            variable_definitions,
            variables,
        }
    }

    pub fn namespace_field(
        &self,
        field: &mut Field,
        compound: &mut CompoundVariables,
    ) -> Result<(), FetchError> {
        for (_, value) in field.arguments.iter_mut() {
            self.namespace_value(value, compound)?;
        }
        self.namespace_directives(&mut field.directives, compound)?;
        self.namespace_selection_set(&mut field.selection_set, compound)
    }

    pub fn namespace_fragment(
        &self,
        fragment: &mut FragmentDefinition,
        compound: &mut CompoundVariables,
    ) -> Result<(), FetchError> {
        self.namespace_directives(&mut fragment.directives, compound)?;
        self.namespace_selection_set(&mut fragment.selection_set, compound)
    }

    /// Gives a copied fragment its per-fetch name, along with the spreads inside it.
    pub fn rename_fragment(&self, fragment: &mut FragmentDefinition) {
        fragment.name.push_str(&self.suffix);
        self.rename_spreads(&mut fragment.selection_set);
    }

    pub fn rename_spreads(&self, selection_set: &mut SelectionSet) {
        for selection in selection_set.items.iter_mut() {
            match selection {
                Selection::Field(field) => self.rename_spreads(&mut field.selection_set),
                Selection::InlineFragment(fragment) => {
                    self.rename_spreads(&mut fragment.selection_set)
                }
                Selection::FragmentSpread(spread) => spread.fragment_name.push_str(&self.suffix),
            }
        }
    }

    fn namespace_selection_set(
        &self,
        selection_set: &mut SelectionSet,
        compound: &mut CompoundVariables,
    ) -> Result<(), FetchError> {
        for selection in selection_set.items.iter_mut() {
            match selection {
                Selection::Field(field) => self.namespace_field(field, compound)?,
                Selection::InlineFragment(fragment) => {
                    self.namespace_directives(&mut fragment.directives, compound)?;
                    self.namespace_selection_set(&mut fragment.selection_set, compound)?;
                }
                Selection::FragmentSpread(spread) => {
                    self.namespace_directives(&mut spread.directives, compound)?;
                }
            }
        }
        Ok(())
    }

    fn namespace_directives(
        &self,
        directives: &mut [Directive],
        compound: &mut CompoundVariables,
    ) -> Result<(), FetchError> {
        for directive in directives.iter_mut() {
            for (_, value) in directive.arguments.iter_mut() {
                self.namespace_value(value, compound)?;
            }
        }
        Ok(())
    }

    fn namespace_value(
        &self,
        value: &mut Value,
        compound: &mut CompoundVariables,
    ) -> Result<(), FetchError> {
        match value {
            Value::Variable(name) => {
                *name = self.namespace_variable(name, compound)?;
            }
            Value::List(items) => {
                for item in items.iter_mut() {
                    self.namespace_value(item, compound)?;
                }
            }
            Value::Object(fields) => {
                for item in fields.values_mut() {
                    self.namespace_value(item, compound)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn namespace_variable(
        &self,
        name: &str,
        compound: &mut CompoundVariables,
    ) -> Result<String, FetchError> {
        if name.ends_with(&self.suffix) && compound.is_namespaced(name) {
            return Ok(name.to_string());
        }
        let definition = self
            .original_definition(name)
            .ok_or_else(|| FetchError::UndefinedVariable(name.to_string()))?;
        let value = self.variables.get(name);
        // an operation variable already carrying the suffix keeps its name
        if name.ends_with(&self.suffix) && compound.claim(name, name, definition, value) {
            return Ok(name.to_string());
        }

        let mut separator = String::new();
        loop {
            let namespaced = format!("{}{}{}", name, separator, self.suffix);
            if self.original_definition(&namespaced).is_none()
                && compound.claim(&namespaced, name, definition, value)
            {
                return Ok(namespaced);
            }
            separator.push('_');
        }
    }

    fn original_definition(&self, name: &str) -> Option<&'a VariableDefinition> {
        self.variable_definitions
            .iter()
            .find(|definition| definition.name == name)
    }
}

/// Fragments reachable from the selection set, following spreads inside
/// fragments too, in order of first use.
pub fn referenced_fragments<'f>(
    selection_set: &SelectionSet,
    fragments: &'f HashMap<String, FragmentDefinition>,
) -> Result<Vec<&'f FragmentDefinition>, FetchError> {
    let mut pending = Vec::new();
    collect_spreads(selection_set, &mut pending);
    pending.reverse();

    let mut found: Vec<&'f FragmentDefinition> = Vec::new();
    while let Some(name) = pending.pop() {
        if found.iter().any(|fragment| fragment.name == name) {
            continue;
        }
        let fragment = fragments
            .get(&name)
            .ok_or_else(|| FetchError::UndefinedFragment(name.clone()))?;
        let mut nested = Vec::new();
        collect_spreads(&fragment.selection_set, &mut nested);
        pending.extend(nested.into_iter().rev());
        found.push(fragment);
    }
    Ok(found)
}

fn collect_spreads(selection_set: &SelectionSet, names: &mut Vec<String>) {
    for selection in &selection_set.items {
        match selection {
            Selection::Field(field) => collect_spreads(&field.selection_set, names),
            Selection::InlineFragment(fragment) => collect_spreads(&fragment.selection_set, names),
            Selection::FragmentSpread(spread) => names.push(spread.fragment_name.clone()),
        }
    }
}
