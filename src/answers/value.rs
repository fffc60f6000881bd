//! Answer value shapes.

use serde::{Deserialize, Serialize};

/// Reference to a document already accepted by the intake service.
///
/// Unknown keys are refused so that richer objects stay `Object` answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentRef {
    pub document_id: String,
    pub document_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// A binary payload staged by the applicant but not yet uploaded.
///
/// Staged files live only in memory; they are never mirrored or drafted.
#[derive(Clone, PartialEq)]
pub struct StagedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl StagedFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

impl std::fmt::Debug for StagedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A single answer. The set of shapes is closed; anything richer goes in
/// `Object` or `Array`, both kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<String>),
    Array(Vec<serde_json::Value>),
    Document(DocumentRef),
    Object(serde_json::Map<String, serde_json::Value>),
    #[serde(skip)]
    File(StagedFile),
}

impl AnswerValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Convert a JSON value into the closest answer shape.
    ///
    /// Lossless: `to_json` gives back the same value. Arrays that are not all
    /// strings stay `Array`, and only an object with exactly the document
    /// reference keys becomes `Document`.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::Text(s),
            Value::Array(items) => {
                if items.iter().all(Value::is_string) {
                    Self::List(
                        items
                            .into_iter()
                            .filter_map(|v| match v {
                                Value::String(s) => Some(s),
                                _ => None,
                            })
                            .collect(),
                    )
                } else {
                    Self::Array(items)
                }
            }
            Value::Object(map) => match serde_json::from_value::<DocumentRef>(Value::Object(map.clone())) {
                Ok(doc) => Self::Document(doc),
                Err(_) => Self::Object(map),
            },
        }
    }

    /// JSON form of this value. Staged files have none.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::File(_) => None,
            other => serde_json::to_value(other).ok(),
        }
    }

    /// Truthiness used by `exists` predicates and required-field checks.
    pub fn is_present(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Text(s) => !s.trim().is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Array(items) => !items.is_empty(),
            Self::Object(map) => !map.is_empty(),
            Self::File(file) => !file.bytes.is_empty(),
            Self::Bool(_) | Self::Number(_) | Self::Document(_) => true,
        }
    }

    /// Scalar rendering used by `equals` comparisons.
    pub fn coerce_string(&self) -> Option<String> {
        match self {
            Self::Null => Some("null".to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Number(n) => Some(format_number(n)),
            Self::Text(s) => Some(s.clone()),
            Self::List(items) => Some(items.join(",")),
            Self::Document(doc) => Some(doc.document_id.clone()),
            Self::Array(_) | Self::Object(_) | Self::File(_) => None,
        }
    }

    /// Membership test used by `includesAny` predicates.
    pub fn contains_any(&self, candidates: &[String]) -> bool {
        match self {
            Self::List(items) => items.iter().any(|i| candidates.contains(i)),
            other => other
                .coerce_string()
                .is_some_and(|s| candidates.contains(&s)),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&StagedFile> {
        match self {
            Self::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

impl From<bool> for AnswerValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Non-finite floats have no JSON form and become `Null`.
impl From<f64> for AnswerValue {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(Self::Null, Self::Number)
    }
}

impl From<i64> for AnswerValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for AnswerValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<DocumentRef> for AnswerValue {
    fn from(doc: DocumentRef) -> Self {
        Self::Document(doc)
    }
}

impl From<StagedFile> for AnswerValue {
    fn from(file: StagedFile) -> Self {
        Self::File(file)
    }
}

/// Integers render as written. Integral floats drop the fraction ("3", not "3.0").
fn format_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}
