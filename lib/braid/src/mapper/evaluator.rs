use serde_json::{Map, Value};

/// Looks values up in a JSON object.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate<'v>(&self, input: &'v Map<String, Value>, expression: &str) -> Option<&'v Value>;
}

/// Expressions are plain keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleExpressionEvaluator;

impl ExpressionEvaluator for SimpleExpressionEvaluator {
    fn evaluate<'v>(&self, input: &'v Map<String, Value>, expression: &str) -> Option<&'v Value> {
        input.get(expression)
    }
}

/// Expressions are paths such as `user.addresses[0]['zip code']`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathExpressionEvaluator;

#[derive(Debug, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

impl ExpressionEvaluator for PathExpressionEvaluator {
    fn evaluate<'v>(&self, input: &'v Map<String, Value>, expression: &str) -> Option<&'v Value> {
        let mut segments = parse_path(expression)?.into_iter();
        let mut current = match segments.next()? {
            Segment::Key(key) => input.get(&key)?,
            Segment::Index(_) => return None,
        };
        for segment in segments {
            current = match segment {
                Segment::Key(key) => current.as_object()?.get(&key)?,
                Segment::Index(index) => current.as_array()?.get(index)?,
            };
        }
        Some(current)
    }
}

fn parse_path(expression: &str) -> Option<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut chars = expression.chars().peekable();
    let mut key = String::new();
    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !key.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut key)));
                }
            }
            '[' => {
                if !key.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut key)));
                }
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    let quoted: String = chars.by_ref().take_while(|c| *c != '\'').collect();
                    if chars.next() != Some(']') {
                        return None;
                    }
                    segments.push(Segment::Key(quoted));
                } else {
                    let digits: String = chars.by_ref().take_while(|c| *c != ']').collect();
                    segments.push(Segment::Index(digits.trim().parse().ok()?));
                }
            }
            c => key.push(c),
        }
    }
    if !key.is_empty() {
        segments.push(Segment::Key(key));
    }
    (!segments.is_empty()).then_some(segments)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ExpressionEvaluator, PathExpressionEvaluator, SimpleExpressionEvaluator};

    #[test]
    fn simple_expressions_are_keys() {
        let input = json!({ "a.b": 1, "a": { "b": 2 } });
        let input = input.as_object().unwrap();

        assert_eq!(SimpleExpressionEvaluator.evaluate(input, "a.b"), Some(&json!(1)));
        assert_eq!(SimpleExpressionEvaluator.evaluate(input, "missing"), None);
    }

    #[test]
    fn path_expressions_walk_objects_and_lists() {
        let input = json!({
            "user": { "addresses": [{ "zip code": "2000" }, { "zip code": "3000" }] },
            "plain": true
        });
        let input = input.as_object().unwrap();

        assert_eq!(
            PathExpressionEvaluator.evaluate(input, "user.addresses[1]['zip code']"),
            Some(&json!("3000"))
        );
        assert_eq!(PathExpressionEvaluator.evaluate(input, "['plain']"), Some(&json!(true)));
        assert_eq!(PathExpressionEvaluator.evaluate(input, "plain"), Some(&json!(true)));
        assert_eq!(PathExpressionEvaluator.evaluate(input, "user.addresses[5]"), None);
        assert_eq!(PathExpressionEvaluator.evaluate(input, "user[0]"), None);
    }
}
