use std::{fmt, sync::Arc};

/// Identifies one schema source. Cheap to clone, compared by value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaNamespace(Arc<str>);

impl SchemaNamespace {
    pub fn of(value: impl AsRef<str>) -> Self {
        SchemaNamespace(Arc::from(value.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SchemaNamespace {
    fn from(value: &str) -> Self {
        SchemaNamespace::of(value)
    }
}

impl From<String> for SchemaNamespace {
    fn from(value: String) -> Self {
        SchemaNamespace(Arc::from(value))
    }
}

impl AsRef<str> for SchemaNamespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::SchemaNamespace;

    #[test]
    fn equality_is_by_value() {
        let a = SchemaNamespace::of("foo");
        let b = SchemaNamespace::from(String::from("foo"));
        assert_eq!(a, b);
        assert_ne!(a, SchemaNamespace::of("bar"));
        assert_eq!(a.to_string(), "foo");
    }
}
