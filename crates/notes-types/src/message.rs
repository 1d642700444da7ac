use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::note::{Note, NoteId};
use crate::params::Params;
use crate::schema::StoreSchema;
use crate::token::CorrelationToken;

/// Coordinator -> worker message.
///
/// `operation` is kept as the raw name so the worker can answer a name
/// outside the closed set with `UnknownOperation` instead of failing to
/// decode the message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub correlation_token: CorrelationToken,
    pub operation: String,
    pub schema: StoreSchema,
    #[serde(default)]
    pub params: Params,
}

impl ActionRequest {
    pub fn new(
        correlation_token: CorrelationToken,
        operation: impl Into<String>,
        schema: StoreSchema,
        params: Params,
    ) -> Self {
        Self {
            correlation_token,
            operation: operation.into(),
            schema,
            params,
        }
    }
}

/// Result body of an operation.
///
/// Serialized untagged, so on the wire it is exactly one of a note, a list
/// of notes, a bare id, or `null`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    #[default]
    None,
    Id(NoteId),
    Note(Note),
    Notes(Vec<Note>),
}

impl Payload {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_id(&self) -> Option<NoteId> {
        match self {
            Self::Id(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_note(&self) -> Option<&Note> {
        match self {
            Self::Note(note) => Some(note),
            _ => None,
        }
    }

    pub fn as_notes(&self) -> Option<&[Note]> {
        match self {
            Self::Notes(notes) => Some(notes),
            _ => None,
        }
    }
}

impl From<Option<Note>> for Payload {
    fn from(note: Option<Note>) -> Self {
        note.map_or(Self::None, Self::Note)
    }
}

/// Classification of a failed action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The store could not be opened (denied, corrupt, or newer than requested).
    StoreOpenError,
    /// Creating the collection during an upgrade failed.
    SchemaUpgradeError,
    /// `add` hit an existing key.
    ConstraintError,
    /// The store failed while running an operation's transaction.
    TransactionFailed,
    /// The operation name is outside the closed set.
    UnknownOperation,
    /// Required parameters were missing or ill-typed.
    InvalidParams,
    /// Rejected locally because `init` has not succeeded.
    InitFailed,
    /// The background worker is gone.
    WorkerUnavailable,
    /// Unexpected failure inside the worker.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StoreOpenError => "StoreOpenError",
            Self::SchemaUpgradeError => "SchemaUpgradeError",
            Self::ConstraintError => "ConstraintError",
            Self::TransactionFailed => "TransactionFailed",
            Self::UnknownOperation => "UnknownOperation",
            Self::InvalidParams => "InvalidParams",
            Self::InitFailed => "InitFailed",
            Self::WorkerUnavailable => "WorkerUnavailable",
            Self::Internal => "Internal",
        };
        write!(f, "{s}")
    }
}

/// Structured failure carried by a result instead of a thrown error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<TypeError> for ErrorInfo {
    fn from(err: TypeError) -> Self {
        let kind = match err {
            TypeError::UnknownOperation(_) => ErrorKind::UnknownOperation,
            TypeError::MissingParam(_) | TypeError::InvalidParam { .. } => ErrorKind::InvalidParams,
            TypeError::InvalidSchema(_) => ErrorKind::StoreOpenError,
        };
        Self::new(kind, err.to_string())
    }
}

/// Worker -> coordinator message.
///
/// `echo` carries the request parameters back so subscribers can inspect
/// what was asked without keeping their own index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub correlation_token: CorrelationToken,
    pub operation: String,
    pub ok: bool,
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(default)]
    pub echo: Params,
}

impl ActionResult {
    /// Successful result for the given request.
    pub fn success(request: &ActionRequest, payload: Payload) -> Self {
        Self {
            correlation_token: request.correlation_token,
            operation: request.operation.clone(),
            ok: true,
            payload,
            error: None,
            echo: request.params.clone(),
        }
    }

    /// Failed result for the given request.
    pub fn failure(request: &ActionRequest, error: ErrorInfo) -> Self {
        Self {
            correlation_token: request.correlation_token,
            operation: request.operation.clone(),
            ok: false,
            payload: Payload::None,
            error: Some(error),
            echo: request.params.clone(),
        }
    }
}
