//! Task records exchanged with the task store, and the text policy
//! applied before any create or edit reaches the network.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::identity::Address;

/// Minimum task text length in characters, after trimming.
pub const MIN_TASK_TEXT_LEN: usize = 3;

/// Maximum task text length in characters, after trimming.
pub const MAX_TASK_TEXT_LEN: usize = 100;

/// Opaque task identifier issued by the task store.
///
/// The store may issue integers or strings; both are accepted on the
/// wire and kept as their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps a store-issued identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as used in request paths.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(u64),
            Str(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => Self(n.to_string()),
            RawId::Str(s) => Self(s),
        })
    }
}

/// A task as held by the task store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Store-issued identifier.
    pub id: TaskId,
    /// Trimmed task text.
    pub text: String,
    /// Completion flag.
    pub completed: bool,
    /// Account that created the task. Never changes after creation.
    pub owner: Address,
}

impl Task {
    /// Whether `identity` may see and mutate this task.
    #[must_use]
    pub fn is_owned_by(&self, identity: &Address) -> bool {
        self.owner == *identity
    }
}

/// Body of `POST /todos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    /// Validated, trimmed text.
    pub text: String,
    /// Creating account.
    pub owner: Address,
}

/// Body of `PATCH /todos/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionPatch {
    /// New completion flag.
    pub completed: bool,
}

/// Body of `PUT /todos/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPatch {
    /// Validated, trimmed text.
    pub text: String,
}

/// Completion filter for listing tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    /// Every task.
    #[default]
    All,
    /// Tasks not yet completed.
    Active,
    /// Completed tasks.
    Completed,
}

impl TaskFilter {
    /// Value of the `completed` query parameter, if any.
    #[must_use]
    pub const fn completed_param(self) -> Option<bool> {
        match self {
            Self::All => None,
            Self::Active => Some(false),
            Self::Completed => Some(true),
        }
    }

    /// Whether `task` belongs in this view.
    #[must_use]
    pub const fn matches(self, task: &Task) -> bool {
        match self.completed_param() {
            None => true,
            Some(completed) => task.completed == completed,
        }
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for TaskFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "completed" | "done" => Ok(Self::Completed),
            other => Err(format!("unknown filter: {other}")),
        }
    }
}

/// Reasons a candidate task text is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextError {
    /// Fewer than [`MIN_TASK_TEXT_LEN`] characters after trimming.
    #[error("text must contain at least 3 characters")]
    TooShort,
    /// Nothing but whitespace.
    #[error("text must not consist only of spaces or tabs")]
    WhitespaceOnly,
    /// More than [`MAX_TASK_TEXT_LEN`] characters after trimming.
    #[error("task is too long, please shorten it to 100 characters")]
    TooLong,
}

/// Validates a candidate task text and returns its trimmed form.
///
/// # Errors
///
/// Returns [`TextError::TooShort`], [`TextError::WhitespaceOnly`] or
/// [`TextError::TooLong`], checked in that order.
pub fn validate_task_text(text: &str) -> Result<String, TextError> {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if len < MIN_TASK_TEXT_LEN {
        return Err(TextError::TooShort);
    }
    if !text.chars().any(|c| !c.is_whitespace()) {
        return Err(TextError::WhitespaceOnly);
    }
    if len > MAX_TASK_TEXT_LEN {
        return Err(TextError::TooLong);
    }
    Ok(trimmed.to_string())
}
