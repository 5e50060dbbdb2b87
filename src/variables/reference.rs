//! Variable Reference Grammar
//!
//! Scans parameter values for `${...}` expressions and parses their
//! contents as task output references:
//!
//! ```text
//! ${task-<taskId>.output.<segment>(.<segment>)*}
//! ```
//!
//! Scanning and parsing are kept separate from resolution so that a
//! malformed reference (left verbatim) can be told apart from a
//! well-formed one that simply has no data yet.

use std::fmt;

use serde_json::Value;

/// Opening marker of a variable reference.
pub const REFERENCE_START: &str = "${";

/// Prefix convention on the first path segment.
const TASK_PREFIX: &str = "task-";

/// Literal second path segment.
const OUTPUT_SEGMENT: &str = "output";

/// A piece of a scanned parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Plain text copied through unchanged
    Literal(&'a str),
    /// A `${...}` expression
    Expression {
        /// Full matched text including `${` and `}`
        raw: &'a str,
        /// Text between the braces
        path: &'a str,
    },
}

/// Splits a value into literal text and `${...}` expressions.
///
/// An expression needs at least one character between the braces and
/// ends at the first `}`. `${}` and an unterminated `${` stay literal.
///
/// # Example
/// ```
/// use jarvis::variables::reference::{scan, Token};
///
/// let tokens = scan("Hello ${task-1.output.name}!");
/// assert_eq!(tokens.len(), 3);
/// assert_eq!(tokens[0], Token::Literal("Hello "));
/// ```
pub fn scan(value: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut cursor = 0;

    while let Some(offset) = value[cursor..].find(REFERENCE_START) {
        let start = cursor + offset;
        let inner_start = start + REFERENCE_START.len();

        let Some(close) = value[inner_start..].find('}') else {
            break;
        };
        let end = inner_start + close;

        if end == inner_start {
            // `${}` - keep scanning past the `$`
            cursor = start + 1;
            continue;
        }

        if start > literal_start {
            tokens.push(Token::Literal(&value[literal_start..start]));
        }
        tokens.push(Token::Expression {
            raw: &value[start..=end],
            path: &value[inner_start..end],
        });

        cursor = end + 1;
        literal_start = cursor;
    }

    if literal_start < value.len() {
        tokens.push(Token::Literal(&value[literal_start..]));
    }

    tokens
}

/// Why an expression is not a usable task output reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReference {
    /// Fewer than two dot-separated segments
    TooShort,
    /// Second segment is not `output`
    NotOutput(String),
    /// First segment names no task
    EmptyTaskId,
}

impl fmt::Display for MalformedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "expected at least 'task-<id>.output'"),
            Self::NotOutput(segment) => {
                write!(f, "expected 'output' as second segment, found '{}'", segment)
            }
            Self::EmptyTaskId => write!(f, "missing task id"),
        }
    }
}

/// A parsed `task-<id>.output.<path>` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableReference {
    /// Referenced task id, with the `task-` prefix stripped
    pub task_id: String,
    /// Segments to walk inside the task's output
    pub segments: Vec<String>,
}

impl VariableReference {
    /// Parses the text between `${` and `}`.
    ///
    /// # Example
    /// ```
    /// use jarvis::variables::reference::VariableReference;
    ///
    /// let reference = VariableReference::parse("task-3.output.user.name").unwrap();
    /// assert_eq!(reference.task_id, "3");
    /// assert_eq!(reference.segments, vec!["user", "name"]);
    /// ```
    pub fn parse(path: &str) -> Result<Self, MalformedReference> {
        let parts: Vec<&str> = path.split('.').collect();

        if parts.len() < 2 {
            return Err(MalformedReference::TooShort);
        }
        if parts[1] != OUTPUT_SEGMENT {
            return Err(MalformedReference::NotOutput(parts[1].to_string()));
        }

        let task_id = parts[0].strip_prefix(TASK_PREFIX).unwrap_or(parts[0]);
        if task_id.is_empty() {
            return Err(MalformedReference::EmptyTaskId);
        }

        Ok(Self {
            task_id: task_id.to_string(),
            segments: parts[2..].iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Walks the segments into an output value.
    ///
    /// Objects are indexed by key and arrays by decimal index. Returns
    /// `None` when a segment is missing or the current value can't be
    /// indexed.
    pub fn lookup<'v>(&self, output: &'v Value) -> Option<&'v Value> {
        self.segments
            .iter()
            .try_fold(output, |current, segment| match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// Renders the canonical `${task-<id>.output.<path>}` form.
    pub fn to_expression(&self) -> String {
        let mut expr = format!("${{{}{}.{}", TASK_PREFIX, self.task_id, OUTPUT_SEGMENT);
        for segment in &self.segments {
            expr.push('.');
            expr.push_str(segment);
        }
        expr.push('}');
        expr
    }
}

/// Converts a resolved value into substitution text.
///
/// Strings are inserted verbatim, containers as compact JSON, other
/// scalars through their display form.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
