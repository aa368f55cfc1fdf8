use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLError {
    #[serde(
        default = "unknown_error_message",
        deserialize_with = "deserialize_message"
    )]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<GraphQLErrorLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<GraphQLErrorPathSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

fn unknown_error_message() -> String {
    UNKNOWN_ERROR_MESSAGE.to_string()
}

fn deserialize_message<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(unknown_error_message))
}

impl From<String> for GraphQLError {
    fn from(message: String) -> Self {
        GraphQLError {
            message,
            locations: None,
            path: None,
            extensions: None,
        }
    }
}

impl From<&str> for GraphQLError {
    fn from(message: &str) -> Self {
        message.to_string().into()
    }
}

impl GraphQLError {
    pub fn with_path(mut self, path: Vec<GraphQLErrorPathSegment>) -> Self {
        self.path = Some(path);
        self
    }

    /// An error without a path (or with an empty one) is not tied to any field.
    pub fn is_global(&self) -> bool {
        self.path.as_ref().map_or(true, |path| path.is_empty())
    }

    /// Whether the first path segment names the given response key.
    pub fn starts_with_key(&self, key: &str) -> bool {
        matches!(
            self.path.as_ref().and_then(|path| path.first()),
            Some(GraphQLErrorPathSegment::String(first)) if first == key
        )
    }

    /// Drops the leading path segment, which names the batch alias of the fetch.
    pub fn relativize(&self) -> GraphQLError {
        let mut error = self.clone();
        if let Some(path) = error.path.as_mut() {
            if !path.is_empty() {
                path.remove(0);
            }
        }
        error
    }

    /// Anchors a fetch relative error below the response path of the field that issued the fetch.
    pub fn prefixed_with(mut self, prefix: &[GraphQLErrorPathSegment]) -> GraphQLError {
        let mut path = prefix.to_vec();
        if let Some(relative) = self.path.take() {
            path.extend(relative);
        }
        self.path = Some(path);
        self
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct GraphQLErrorLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum GraphQLErrorPathSegment {
    String(String),
    Index(usize),
}

impl From<&str> for GraphQLErrorPathSegment {
    fn from(value: &str) -> Self {
        GraphQLErrorPathSegment::String(value.to_string())
    }
}

impl From<usize> for GraphQLErrorPathSegment {
    fn from(value: usize) -> Self {
        GraphQLErrorPathSegment::Index(value)
    }
}

impl<'de> Deserialize<'de> for GraphQLErrorPathSegment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PathSegmentVisitor;

        impl<'de> de::Visitor<'de> for PathSegmentVisitor {
            type Value = GraphQLErrorPathSegment;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or an integer for a GraphQL path segment")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(GraphQLErrorPathSegment::String(value.to_owned()))
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(GraphQLErrorPathSegment::String(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(GraphQLErrorPathSegment::Index(value as usize))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if value < 0 {
                    return Err(E::custom(format!(
                        "path segment must be a non-negative integer, but got {}",
                        value
                    )));
                }
                Ok(GraphQLErrorPathSegment::Index(value as usize))
            }
        }

        deserializer.deserialize_any(PathSegmentVisitor)
    }
}
