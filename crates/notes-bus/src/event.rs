use serde::{Deserialize, Serialize};

use notes_types::{ActionResult, CorrelationToken, ErrorInfo, Operation, Params, Payload};

/// `action-request`: a UI collaborator asks for an operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequestEvent {
    pub operation: String,
    #[serde(default)]
    pub params: Params,
}

impl ActionRequestEvent {
    pub fn new(operation: impl Into<String>, params: Params) -> Self {
        Self {
            operation: operation.into(),
            params,
        }
    }

    /// Request without parameters (`init`, `getAll`).
    pub fn bare(operation: Operation) -> Self {
        Self::new(operation.as_str(), Params::new())
    }
}

/// `action-complete`: the outcome of one request, published to every
/// matching completion subscriber.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionComplete {
    pub token: CorrelationToken,
    pub operation: String,
    pub ok: bool,
    pub result: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(default)]
    pub original_params: Params,
}

impl ActionComplete {
    /// Completion for a request the coordinator answered itself.
    pub fn rejected(
        token: CorrelationToken,
        operation: impl Into<String>,
        original_params: Params,
        error: ErrorInfo,
    ) -> Self {
        Self {
            token,
            operation: operation.into(),
            ok: false,
            result: Payload::None,
            error: Some(error),
            original_params,
        }
    }
}

impl From<ActionResult> for ActionComplete {
    fn from(result: ActionResult) -> Self {
        Self {
            token: result.correlation_token,
            operation: result.operation,
            ok: result.ok,
            result: result.payload,
            error: result.error,
            original_params: result.echo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notes_types::{params::from_value, ActionRequest, ErrorKind, NoteId, StoreSchema};
    use serde_json::json;

    #[test]
    fn completion_carries_result_fields() {
        let req = ActionRequest::new(
            CorrelationToken::new(),
            "add",
            StoreSchema::default(),
            from_value(json!({ "title": "t", "note": "n" })),
        );
        let done = ActionComplete::from(ActionResult::success(&req, Payload::Id(NoteId::new(3))));
        assert_eq!(done.token, req.correlation_token);
        assert_eq!(done.operation, "add");
        assert!(done.ok);
        assert_eq!(done.result.as_id(), Some(NoteId::new(3)));
        assert_eq!(done.original_params["title"], "t");
    }

    #[test]
    fn completion_wire_shape() {
        let done = ActionComplete::rejected(
            CorrelationToken::new(),
            "get",
            from_value(json!({ "id": 1 })),
            ErrorInfo::new(ErrorKind::InitFailed, "init failed"),
        );
        let value = serde_json::to_value(&done).unwrap();
        assert_eq!(value["ok"], false);
        assert_eq!(value["result"], json!(null));
        assert_eq!(value["originalParams"]["id"], 1);
        assert_eq!(value["error"]["kind"], "InitFailed");
    }

    #[test]
    fn bare_request_has_no_params() {
        let event = ActionRequestEvent::bare(Operation::GetAll);
        assert_eq!(event.operation, "getAll");
        assert!(event.params.is_empty());
    }
}
