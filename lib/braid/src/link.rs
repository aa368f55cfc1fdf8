//! Declarative joins between a field of one source and a type of another.

use crate::{error::LinkError, namespace::SchemaNamespace};

const DEFAULT_ARGUMENT_NAME: &str = "id";
const DEFAULT_VARIABLE_QUERY_FIELD: &str = "id";

/// `sourceType.sourceField` in the braided schema is resolved by calling
/// `targetField(argumentName: <value of sourceFromField>)` on the source
/// registered under `targetNamespace`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    source_type: String,
    source_field: String,
    source_from_field: String,
    target_namespace: SchemaNamespace,
    target_type: String,
    target_field: String,
    argument_name: String,
    target_variable_query_field: String,
    nullable: bool,
    replace_from_field: bool,
}

impl Link {
    /// Starts building a link for `source_type.source_field`.
    pub fn from(source_type: impl Into<String>, source_field: impl Into<String>) -> LinkBuilder {
        LinkBuilder {
            source_type: Some(source_type.into()),
            source_field: Some(source_field.into()),
            ..LinkBuilder::default()
        }
    }

    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    pub fn source_field(&self) -> &str {
        &self.source_field
    }

    /// The field of the source object carrying the join key.
    pub fn source_from_field(&self) -> &str {
        &self.source_from_field
    }

    pub fn target_namespace(&self) -> &SchemaNamespace {
        &self.target_namespace
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    /// The query field of the target source that is called with the join key.
    pub fn target_field(&self) -> &str {
        &self.target_field
    }

    pub fn argument_name(&self) -> &str {
        &self.argument_name
    }

    /// The field of the target type holding the same value as the join key.
    pub fn target_variable_query_field(&self) -> &str {
        &self.target_variable_query_field
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_replace_from_field(&self) -> bool {
        self.replace_from_field
    }

    /// True when the join key is read from a field other than the visible one.
    pub fn has_different_from_field(&self) -> bool {
        self.source_field != self.source_from_field
    }
}

#[derive(Clone, Debug, Default)]
pub struct LinkBuilder {
    source_type: Option<String>,
    source_field: Option<String>,
    source_from_field: Option<String>,
    target_namespace: Option<SchemaNamespace>,
    target_type: Option<String>,
    target_field: Option<String>,
    argument_name: Option<String>,
    target_variable_query_field: Option<String>,
    nullable: bool,
    replace_from_field: bool,
}

impl LinkBuilder {
    pub fn to(mut self, namespace: impl Into<SchemaNamespace>, target_type: impl Into<String>) -> Self {
        self.target_namespace = Some(namespace.into());
        self.target_type = Some(target_type.into());
        self
    }

    pub fn from_field(mut self, name: impl Into<String>) -> Self {
        self.source_from_field = Some(name.into());
        self
    }

    pub fn target_field(mut self, name: impl Into<String>) -> Self {
        self.target_field = Some(name.into());
        self
    }

    pub fn target_argument(mut self, name: impl Into<String>) -> Self {
        self.argument_name = Some(name.into());
        self
    }

    pub fn target_variable_query_field(mut self, name: impl Into<String>) -> Self {
        self.target_variable_query_field = Some(name.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn replace_from_field(mut self) -> Self {
        self.replace_from_field = true;
        self
    }

    pub fn build(self) -> Result<Link, LinkError> {
        let source_type = required(self.source_type, "sourceType")?;
        let source_field = required(self.source_field, "sourceField")?;
        let target_namespace = self
            .target_namespace
            .filter(|namespace| !namespace.as_str().is_empty())
            .ok_or(LinkError::MissingAttribute("targetNamespace"))?;
        let target_type = required(self.target_type, "targetType")?;

        let source_from_field = non_empty(self.source_from_field).unwrap_or_else(|| source_field.clone());
        let target_field = non_empty(self.target_field).unwrap_or_else(|| source_field.clone());

        Ok(Link {
            source_type,
            source_field,
            source_from_field,
            target_namespace,
            target_type,
            target_field,
            argument_name: non_empty(self.argument_name)
                .unwrap_or_else(|| DEFAULT_ARGUMENT_NAME.to_string()),
            target_variable_query_field: non_empty(self.target_variable_query_field)
                .unwrap_or_else(|| DEFAULT_VARIABLE_QUERY_FIELD.to_string()),
            nullable: self.nullable,
            replace_from_field: self.replace_from_field,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn required(value: Option<String>, attribute: &'static str) -> Result<String, LinkError> {
    non_empty(value).ok_or(LinkError::MissingAttribute(attribute))
}

#[cfg(test)]
mod tests {
    use super::Link;
    use crate::error::LinkError;

    #[test]
    fn defaults_follow_the_source_field() {
        let link = Link::from("Foo", "bar").to("bar", "Bar").build().unwrap();

        assert_eq!(link.source_from_field(), "bar");
        assert_eq!(link.target_field(), "bar");
        assert_eq!(link.argument_name(), "id");
        assert_eq!(link.target_variable_query_field(), "id");
        assert!(!link.is_nullable());
        assert!(!link.has_different_from_field());
    }

    #[test]
    fn overrides_are_kept() {
        let link = Link::from("Foo", "bar")
            .from_field("barId")
            .to("bar", "Bar")
            .target_field("topbar")
            .target_argument("key")
            .target_variable_query_field("key")
            .nullable()
            .replace_from_field()
            .build()
            .unwrap();

        assert_eq!(link.source_from_field(), "barId");
        assert_eq!(link.target_field(), "topbar");
        assert_eq!(link.argument_name(), "key");
        assert_eq!(link.target_variable_query_field(), "key");
        assert!(link.is_nullable());
        assert!(link.is_replace_from_field());
        assert!(link.has_different_from_field());
    }

    #[test]
    fn missing_target_fails() {
        let error = Link::from("Foo", "bar").build().unwrap_err();
        assert!(matches!(error, LinkError::MissingAttribute("targetNamespace")));

        let error = Link::from("", "bar").to("bar", "Bar").build().unwrap_err();
        assert!(matches!(error, LinkError::MissingAttribute("sourceType")));

        let error = Link::from("Foo", "bar").to("bar", "").build().unwrap_err();
        assert!(matches!(error, LinkError::MissingAttribute("targetType")));
    }
}
