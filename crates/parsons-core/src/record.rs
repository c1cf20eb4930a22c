//! Event records
//!
//! An [`EventRecord`] is one immutable description of something that happened
//! while a student worked on an exercise: the session starting or resuming, a
//! burst of typing, a paste, a line being dragged or re-indented, a submission.
//!
//! Records are an open set. The tags the logger itself understands are named
//! variants of [`EventKind`]; anything else a widget wants to log travels as
//! [`EventKind::Custom`] and is still eligible for mapping.
//!
//! ## Wire Format
//!
//! Records serialize flat, with the type-specific fields next to the common
//! ones:
//! ```text
//! {"type":"text","time":0,"questionId":"Q1","value":"def f(x):","batchId":"L1"}
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RecordError;
use crate::identity::SessionIdentity;

/// Keys owned by [`EventRecord`] itself rather than its free-form fields
const RESERVED_KEYS: [&str; 3] = ["type", "time", "questionId"];

/// Type tag of an [`EventRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// First record of a fresh session
    Init,
    /// First record of a session recovered after a reload
    Resume,
    /// Paste or drop into a text field
    Paste,
    /// A coalesced burst of keystrokes
    Text,
    /// Legacy name for a coalesced burst of keystrokes
    Typed,
    /// The student pressed submit
    Submit,
    /// A code line was dragged to a new position
    Reorder,
    /// A code line changed indentation
    Reindent,
    /// Pre-commit hook tag; never appended to a log
    Commit,
    /// Any other widget-defined tag
    Custom(String),
}

impl EventKind {
    /// Get the string tag for this kind
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Init => "init",
            EventKind::Resume => "resume",
            EventKind::Paste => "paste",
            EventKind::Text => "text",
            EventKind::Typed => "typed",
            EventKind::Submit => "submit",
            EventKind::Reorder => "reorder",
            EventKind::Reindent => "reindent",
            EventKind::Commit => "commit",
            EventKind::Custom(tag) => tag,
        }
    }

    /// Whether this kind starts a session log
    pub fn is_session_start(&self) -> bool {
        matches!(self, EventKind::Init | EventKind::Resume)
    }
}

impl From<&str> for EventKind {
    fn from(tag: &str) -> Self {
        match tag {
            "init" => EventKind::Init,
            "resume" => EventKind::Resume,
            "paste" => EventKind::Paste,
            "text" => EventKind::Text,
            "typed" => EventKind::Typed,
            "submit" => EventKind::Submit,
            "reorder" => EventKind::Reorder,
            "reindent" => EventKind::Reindent,
            "commit" => EventKind::Commit,
            other => EventKind::Custom(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(tag: String) -> Self {
        match EventKind::from(tag.as_str()) {
            EventKind::Custom(_) => EventKind::Custom(tag),
            known => known,
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Custom(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for EventKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(EventKind::from(s))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the text field a keystroke burst belongs to
///
/// Widgets name fields either by string (a codeline name) or by number;
/// the two are never equal to each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchId {
    Name(String),
    Index(i64),
}

impl From<&str> for BatchId {
    fn from(name: &str) -> Self {
        BatchId::Name(name.to_string())
    }
}

impl From<String> for BatchId {
    fn from(name: String) -> Self {
        BatchId::Name(name)
    }
}

impl From<i64> for BatchId {
    fn from(index: i64) -> Self {
        BatchId::Index(index)
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchId::Name(name) => f.write_str(name),
            BatchId::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Snapshot of one code line in the Parsons widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLine {
    pub id: String,
    pub code: String,
    pub indent: u32,
}

impl CodeLine {
    pub fn new(id: impl Into<String>, code: impl Into<String>, indent: u32) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            indent,
        }
    }
}

/// Position of one line in the solution list after a reorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionLine {
    pub id: String,
    /// `None` when the widget does not know the line (it was never modified)
    pub indent: Option<u32>,
}

/// One logged, immutable description of a user interaction or lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Type tag
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Wall-clock milliseconds; filled at capture time when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    /// Label of the exercise this record belongs to
    #[serde(rename = "questionId", default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    /// Type-specific fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EventRecord {
    /// Create an empty record of the given kind
    pub fn new(kind: impl Into<EventKind>) -> Self {
        Self {
            kind: kind.into(),
            time: None,
            question_id: None,
            fields: Map::new(),
        }
    }

    /// Validate and convert an untyped value into a record
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Null`] for `null`, [`RecordError::NonStringType`]
    /// when `type` is missing or not a string, and [`RecordError::Malformed`]
    /// for anything else that does not fit the record shape.
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        match &value {
            Value::Null => return Err(RecordError::Null),
            Value::Object(map) => {
                if !matches!(map.get("type"), Some(Value::String(_))) {
                    return Err(RecordError::NonStringType);
                }
            }
            other => {
                return Err(RecordError::Malformed(format!(
                    "expected an object, got {}",
                    other
                )));
            }
        }

        serde_json::from_value(value).map_err(|e| RecordError::Malformed(e.to_string()))
    }

    /// Convert to the flat JSON object stored in logs
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + 3);
        map.insert("type".into(), Value::String(self.kind.to_string()));
        if let Some(time) = self.time {
            map.insert("time".into(), Value::from(time));
        }
        if let Some(question_id) = &self.question_id {
            map.insert("questionId".into(), Value::String(question_id.clone()));
        }
        for (key, value) in &self.fields {
            if !RESERVED_KEYS.contains(&key.as_str()) {
                map.insert(key.clone(), value.clone());
            }
        }
        Value::Object(map)
    }

    /// Set the capture time
    pub fn with_time(mut self, time: i64) -> Self {
        self.time = Some(time);
        self
    }

    /// Set the question label
    pub fn with_question_id(mut self, question_id: impl Into<String>) -> Self {
        self.question_id = Some(question_id.into());
        self
    }

    /// Add a type-specific field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(key, value);
        self
    }

    /// Set a type-specific field in place
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Get a type-specific field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a type-specific field as a string
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// A finished keystroke burst
    pub fn text(start_time: i64, value: impl Into<String>, batch_id: Option<BatchId>) -> Self {
        EventRecord::new(EventKind::Text)
            .with_time(start_time)
            .with_field("value", value.into())
            .with_field("batchId", batch_value(batch_id))
    }

    /// A paste or drop; never batched, so its duration is always zero
    pub fn paste(batch_id: Option<BatchId>, value: impl Into<String>) -> Self {
        EventRecord::new(EventKind::Paste)
            .with_field("duration", 0)
            .with_field("batchId", batch_value(batch_id))
            .with_field("value", value.into())
    }

    /// The student pressed submit
    pub fn submit() -> Self {
        EventRecord::new(EventKind::Submit)
    }

    /// A line moved within (or into) a sortable list
    pub fn reorder(
        kind: impl Into<EventKind>,
        target_id: impl Into<String>,
        solution_lines: &[SolutionLine],
    ) -> Self {
        EventRecord::new(kind)
            .with_field("targetId", target_id.into())
            .with_field("solutionLines", to_json_array(solution_lines))
    }

    /// A line changed indentation
    pub fn reindent(target_id: impl Into<String>, indent: u32) -> Self {
        EventRecord::new(EventKind::Reindent)
            .with_field("targetId", target_id.into())
            .with_field("indent", indent)
    }

    /// The first record of a session, either `init` or `resume`
    pub fn session_start(resuming: bool, identity: &SessionIdentity) -> Self {
        let kind = if resuming {
            EventKind::Resume
        } else {
            EventKind::Init
        };
        EventRecord::new(kind)
            .with_field("problemHash", identity.problem_hash)
            .with_field("userHash", identity.user_hash)
            .with_field("usernameStr", identity.username.clone())
    }
}

fn batch_value(batch_id: Option<BatchId>) -> Value {
    match batch_id {
        Some(BatchId::Name(name)) => Value::String(name),
        Some(BatchId::Index(index)) => Value::from(index),
        None => Value::Null,
    }
}

/// Serialize a slice of plain data structs into a JSON array
pub fn to_json_array<T: Serialize>(items: &[T]) -> Value {
    Value::Array(
        items
            .iter()
            .filter_map(|item| serde_json::to_value(item).ok())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_tags() {
        assert_eq!(EventKind::from("init"), EventKind::Init);
        assert_eq!(EventKind::from("reindent"), EventKind::Reindent);
        assert_eq!(
            EventKind::from("myType"),
            EventKind::Custom("myType".into())
        );
        assert_eq!(EventKind::Custom("myType".into()).to_string(), "myType");
        assert!(EventKind::Resume.is_session_start());
        assert!(!EventKind::Submit.is_session_start());
    }

    #[test]
    fn test_from_value_rejects_null() {
        assert_eq!(EventRecord::from_value(Value::Null), Err(RecordError::Null));
    }

    #[test]
    fn test_from_value_rejects_non_string_type() {
        assert_eq!(
            EventRecord::from_value(json!({ "type": 7 })),
            Err(RecordError::NonStringType)
        );
        assert_eq!(
            EventRecord::from_value(json!({ "value": "x" })),
            Err(RecordError::NonStringType)
        );
        assert!(matches!(
            EventRecord::from_value(json!("text")),
            Err(RecordError::Malformed(_))
        ));
    }

    #[test]
    fn test_from_value_keeps_extra_fields() {
        let record = EventRecord::from_value(json!({
            "type": "reorder",
            "time": 42,
            "targetId": "codeline-3",
        }))
        .unwrap();

        assert_eq!(record.kind, EventKind::Reorder);
        assert_eq!(record.time, Some(42));
        assert_eq!(record.question_id, None);
        assert_eq!(record.field_str("targetId"), Some("codeline-3"));
        assert!(record.field("type").is_none());
    }

    #[test]
    fn test_text_record_shape() {
        let record = EventRecord::text(0, "def f(x):", Some("L1".into()));
        assert_eq!(
            record.to_value(),
            json!({ "type": "text", "time": 0, "value": "def f(x):", "batchId": "L1" })
        );
    }

    #[test]
    fn test_paste_record_without_batch() {
        let record = EventRecord::paste(None, "print(x)");
        let value = record.to_value();
        assert_eq!(value["type"], "paste");
        assert_eq!(value["duration"], 0);
        assert!(value["batchId"].is_null());
        assert!(value.get("time").is_none());
    }

    #[test]
    fn test_serde_matches_to_value() {
        let record = EventRecord::reorder(
            "reorder",
            "codeline-1",
            &[
                SolutionLine { id: "codeline-1".into(), indent: Some(1) },
                SolutionLine { id: "codeline-2".into(), indent: None },
            ],
        )
        .with_time(10)
        .with_question_id("Q1");

        let via_serde = serde_json::to_value(&record).unwrap();
        assert_eq!(via_serde, record.to_value());

        let back: EventRecord = serde_json::from_value(via_serde).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_batch_id_equality_is_strict() {
        assert_ne!(BatchId::from("1"), BatchId::from(1));
        assert_eq!(BatchId::from("L1").to_string(), "L1");
    }
}
