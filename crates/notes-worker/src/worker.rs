use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use notes_store::{Connection, ObjectStoreDriver};
use notes_types::params::{self, Params};
use notes_types::{
    ActionRequest, ActionResult, ErrorInfo, ErrorKind, NoteDraft, NoteId, Operation, Payload,
    StoreSchema, TypeError,
};

use crate::error::{open_error_info, operation_error_info, WorkerError, WorkerResult};

/// Name of the worker's OS thread.
pub const WORKER_THREAD_NAME: &str = "notes-store-worker";

/// A request with its parameters already extracted.
#[derive(Debug)]
enum Command {
    Init,
    Add(NoteDraft),
    Put(NoteDraft),
    Get(NoteId),
    GetAll,
    Delete(NoteId),
}

impl Command {
    fn parse(operation: Operation, params: &Params) -> Result<Self, TypeError> {
        Ok(match operation {
            Operation::Init => Self::Init,
            Operation::Add => Self::Add(params::note_draft(params)?),
            Operation::Put => Self::Put(params::note_draft(params)?),
            Operation::Get => Self::Get(params::note_id(params)?),
            Operation::GetAll => Self::GetAll,
            Operation::Delete => Self::Delete(params::note_id(params)?),
        })
    }
}

/// Executes action requests against the store, one at a time.
///
/// The worker owns the only connection. It is opened on first use and
/// kept for as long as requests carry the same schema.
pub struct StoreWorker {
    driver: ObjectStoreDriver,
    connection: Option<Connection>,
}

impl StoreWorker {
    pub fn new(driver: ObjectStoreDriver) -> Self {
        Self {
            driver,
            connection: None,
        }
    }

    /// Whether a connection is currently cached.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Run one request to completion. Never panics; every failure becomes
    /// an `ok: false` result.
    pub fn handle(&mut self, request: &ActionRequest) -> ActionResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(request)));
        match outcome {
            Ok(Ok(payload)) => ActionResult::success(request, payload),
            Ok(Err(info)) => {
                debug!(
                    token = %request.correlation_token,
                    operation = %request.operation,
                    kind = %info.kind,
                    "action failed"
                );
                ActionResult::failure(request, info)
            }
            Err(cause) => {
                let message = panic_message(cause.as_ref());
                error!(
                    token = %request.correlation_token,
                    operation = %request.operation,
                    %message,
                    "worker panicked while handling request; dropping connection"
                );
                self.connection = None;
                ActionResult::failure(request, ErrorInfo::new(ErrorKind::Internal, message))
            }
        }
    }

    fn dispatch(&mut self, request: &ActionRequest) -> Result<Payload, ErrorInfo> {
        let operation: Operation = request.operation.parse()?;
        let command = Command::parse(operation, &request.params)?;
        let conn = self.connection(&request.schema)?;

        let result = match command {
            Command::Init => Ok(Payload::None),
            Command::Add(draft) => conn.add(draft).map(Payload::Id),
            Command::Put(draft) => conn.put(draft).map(Payload::Id),
            Command::Get(id) => conn.get(id).map(Payload::from),
            Command::GetAll => conn.get_all().map(Payload::Notes),
            Command::Delete(id) => conn.delete(id).map(|()| Payload::None),
        };
        result.map_err(|e| operation_error_info(&e))
    }

    fn connection(&mut self, schema: &StoreSchema) -> Result<&mut Connection, ErrorInfo> {
        let cached = self
            .connection
            .as_ref()
            .is_some_and(|conn| conn.schema() == schema);
        if !cached {
            if let Some(previous) = self.connection.take() {
                previous.close();
            }
            let conn = self.driver.open(schema).map_err(|e| {
                warn!(store = %schema, error = %e, "failed to open store");
                open_error_info(&e)
            })?;
            return Ok(self.connection.insert(conn));
        }
        self.connection
            .as_mut()
            .ok_or_else(|| ErrorInfo::new(ErrorKind::Internal, "no cached connection"))
    }

    /// Process requests until the request channel closes.
    ///
    /// Results whose receiver is gone are discarded.
    pub fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<ActionRequest>,
        results: mpsc::UnboundedSender<ActionResult>,
    ) {
        info!("store worker started");
        let mut handled = 0u64;
        while let Some(request) = requests.blocking_recv() {
            let result = self.handle(&request);
            handled += 1;
            if results.send(result).is_err() {
                debug!(token = %request.correlation_token, "result receiver gone; discarding result");
            }
        }
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
        info!(handled, "store worker stopped");
    }

    /// Start the worker on its own named thread.
    pub fn spawn(driver: ObjectStoreDriver) -> WorkerResult<WorkerHandle> {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let worker = Self::new(driver);
        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run(request_rx, result_tx))?;
        Ok(WorkerHandle {
            requests: request_tx,
            results: Some(result_rx),
            thread: Some(thread),
        })
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(s) = cause.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Owner's side of a running [`StoreWorker`].
pub struct WorkerHandle {
    requests: mpsc::UnboundedSender<ActionRequest>,
    results: Option<mpsc::UnboundedReceiver<ActionResult>>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Handle over channels whose other ends the caller services itself.
    pub fn from_channels(
        requests: mpsc::UnboundedSender<ActionRequest>,
        results: mpsc::UnboundedReceiver<ActionResult>,
    ) -> Self {
        Self {
            requests,
            results: Some(results),
            thread: None,
        }
    }

    /// Queue a request. Requests are handled strictly in send order.
    pub fn send(&self, request: ActionRequest) -> WorkerResult<()> {
        self.requests
            .send(request)
            .map_err(|_| WorkerError::Unavailable)
    }

    /// Take the result stream. Only the first call returns it.
    pub fn take_results(&mut self) -> Option<mpsc::UnboundedReceiver<ActionResult>> {
        self.results.take()
    }

    /// Close the request channel and wait for the thread to drain and exit.
    ///
    /// Blocks the calling thread.
    pub fn shutdown(self) -> WorkerResult<()> {
        let Self {
            requests, thread, ..
        } = self;
        drop(requests);
        match thread {
            Some(thread) => thread.join().map_err(|_| WorkerError::Panicked),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("running", &!self.requests.is_closed())
            .field("results_taken", &self.results.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use notes_store::{Backend, Commit, MemoryBackend, StoreResult};
    use notes_types::{params::from_value, CorrelationToken, Note};
    use serde_json::json;

    use super::*;

    /// Memory backend that can be told to panic on the next load.
    #[derive(Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        panic_on_load: AtomicBool,
    }

    impl Backend for FlakyBackend {
        fn load(&self, store: &str) -> StoreResult<Vec<Commit>> {
            if self.panic_on_load.swap(false, Ordering::SeqCst) {
                panic!("simulated backend crash");
            }
            self.inner.load(store)
        }

        fn append(&self, store: &str, commit: &Commit) -> StoreResult<()> {
            self.inner.append(store, commit)
        }

        fn replace(&self, store: &str, commits: &[Commit]) -> StoreResult<()> {
            self.inner.replace(store, commits)
        }

        fn exists(&self, store: &str) -> StoreResult<bool> {
            self.inner.exists(store)
        }

        fn kind(&self) -> &'static str {
            "flaky"
        }
    }

    fn request(op: &str, params: serde_json::Value) -> ActionRequest {
        request_with(op, params, StoreSchema::default())
    }

    fn request_with(op: &str, params: serde_json::Value, schema: StoreSchema) -> ActionRequest {
        ActionRequest::new(CorrelationToken::new(), op, schema, from_value(params))
    }

    fn worker() -> StoreWorker {
        StoreWorker::new(ObjectStoreDriver::in_memory())
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    #[test]
    fn init_opens_and_caches_connection() {
        let mut worker = worker();
        assert!(!worker.is_connected());
        let res = worker.handle(&request("init", json!({})));
        assert!(res.ok);
        assert!(res.payload.is_none());
        assert!(worker.is_connected());
    }

    #[test]
    fn add_get_round_trip_through_messages() {
        let mut worker = worker();
        let add = request("add", json!({ "title": "T", "note": "N" }));
        let res = worker.handle(&add);
        assert!(res.ok);
        assert_eq!(res.correlation_token, add.correlation_token);
        assert_eq!(res.echo["title"], "T");
        let id = res.payload.as_id().unwrap();

        let res = worker.handle(&request("get", json!({ "id": id.get() })));
        assert_eq!(res.payload.as_note(), Some(&Note::new(id, "T", "N")));
    }

    #[test]
    fn get_missing_is_ok_null() {
        let mut worker = worker();
        let res = worker.handle(&request("get", json!({ "id": 42 })));
        assert!(res.ok);
        assert!(res.payload.is_none());
    }

    #[test]
    fn get_all_and_delete() {
        let mut worker = worker();
        for title in ["a", "b"] {
            worker.handle(&request("add", json!({ "title": title, "note": "" })));
        }
        let res = worker.handle(&request("delete", json!({ "id": 1 })));
        assert!(res.ok);
        let res = worker.handle(&request("delete", json!({ "id": 1 })));
        assert!(res.ok, "deleting an absent id succeeds");

        let res = worker.handle(&request("getAll", json!({})));
        let notes = res.payload.as_notes().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "b");
    }

    #[test]
    fn put_upserts_with_explicit_id() {
        let mut worker = worker();
        let res = worker.handle(&request("put", json!({ "id": 7, "title": "x", "note": "" })));
        assert_eq!(res.payload.as_id(), Some(NoteId::new(7)));
        worker.handle(&request("put", json!({ "id": 7, "title": "y", "note": "" })));
        let res = worker.handle(&request("getAll", json!({})));
        assert_eq!(res.payload.as_notes().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_add_is_constraint_error() {
        let mut worker = worker();
        worker.handle(&request("add", json!({ "id": 1, "title": "a", "note": "" })));
        let res = worker.handle(&request("add", json!({ "id": 1, "title": "b", "note": "" })));
        assert!(!res.ok);
        assert!(res.payload.is_none());
        assert_eq!(res.error.unwrap().kind, ErrorKind::ConstraintError);
    }

    #[test]
    fn unknown_operation_is_reported() {
        let mut worker = worker();
        let res = worker.handle(&request("initDb", json!({})));
        assert!(!res.ok);
        assert_eq!(res.operation, "initDb");
        assert_eq!(res.error.unwrap().kind, ErrorKind::UnknownOperation);
        assert!(!worker.is_connected(), "nothing is opened for an unknown operation");
    }

    #[test]
    fn bad_params_are_invalid_params() {
        let mut worker = worker();
        let res = worker.handle(&request("get", json!({ "id": "seven" })));
        assert_eq!(res.error.unwrap().kind, ErrorKind::InvalidParams);
        let res = worker.handle(&request("add", json!({ "note": "no title" })));
        assert_eq!(res.error.unwrap().kind, ErrorKind::InvalidParams);
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn schema_change_reopens() {
        let backend = Arc::new(MemoryBackend::new());
        let mut worker = StoreWorker::new(ObjectStoreDriver::new(backend.clone()));
        worker.handle(&request("init", json!({})));
        let res = worker.handle(&request_with(
            "init",
            json!({}),
            StoreSchema::new("Notes", 2, "notes"),
        ));
        assert!(res.ok);
        assert_eq!(backend.commit_count("Notes"), 2);

        let res = worker.handle(&request("init", json!({})));
        assert_eq!(res.error.unwrap().kind, ErrorKind::StoreOpenError);
        assert!(!worker.is_connected());
    }

    #[test]
    fn failed_upgrade_is_schema_upgrade_error() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_read_only(true);
        let mut worker = StoreWorker::new(ObjectStoreDriver::new(backend));
        let res = worker.handle(&request("init", json!({})));
        assert_eq!(res.error.unwrap().kind, ErrorKind::SchemaUpgradeError);
    }

    #[test]
    fn write_failure_is_transaction_failed() {
        let backend = Arc::new(MemoryBackend::new());
        let mut worker = StoreWorker::new(ObjectStoreDriver::new(backend.clone()));
        worker.handle(&request("init", json!({})));
        backend.set_read_only(true);
        let res = worker.handle(&request("add", json!({ "title": "t", "note": "" })));
        assert_eq!(res.error.unwrap().kind, ErrorKind::TransactionFailed);
    }

    #[test]
    fn panic_becomes_internal_and_drops_connection() {
        let backend = Arc::new(FlakyBackend::default());
        let mut worker = StoreWorker::new(ObjectStoreDriver::new(backend.clone()));

        backend.panic_on_load.store(true, Ordering::SeqCst);
        let res = worker.handle(&request("init", json!({})));
        let err = res.error.unwrap();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(err.message.contains("simulated backend crash"));
        assert!(!worker.is_connected());

        let res = worker.handle(&request("add", json!({ "title": "after", "note": "" })));
        assert!(res.ok, "worker keeps serving after a panic");
    }

    // -----------------------------------------------------------------------
    // Thread
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn spawned_worker_answers_in_order() {
        let mut handle = StoreWorker::spawn(ObjectStoreDriver::in_memory()).unwrap();
        let mut results = handle.take_results().unwrap();
        assert!(handle.take_results().is_none());

        let requests: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|t| request("add", json!({ "title": t, "note": "" })))
            .collect();
        for req in &requests {
            handle.send(req.clone()).unwrap();
        }

        for (i, req) in requests.iter().enumerate() {
            let res = results.recv().await.unwrap();
            assert_eq!(res.correlation_token, req.correlation_token);
            assert_eq!(res.payload.as_id(), Some(NoteId::new(i as u64 + 1)));
        }

        tokio::task::spawn_blocking(move || handle.shutdown())
            .await
            .unwrap()
            .unwrap();
        assert!(results.recv().await.is_none());
    }

    #[tokio::test]
    async fn shutdown_drains_queued_requests() {
        let dir = tempfile::tempdir().unwrap();
        let backend = notes_store::FileBackend::open(dir.path(), Default::default()).unwrap();
        let driver = ObjectStoreDriver::new(Arc::new(backend));

        let mut handle = StoreWorker::spawn(driver.clone()).unwrap();
        drop(handle.take_results());
        for i in 0..5 {
            handle
                .send(request("add", json!({ "title": format!("n{i}"), "note": "" })))
                .unwrap();
        }
        tokio::task::spawn_blocking(move || handle.shutdown())
            .await
            .unwrap()
            .unwrap();

        let mut conn = driver.open(&StoreSchema::default()).unwrap();
        assert_eq!(conn.get_all().unwrap().len(), 5);
    }

    #[test]
    fn thread_is_named() {
        let handle = StoreWorker::spawn(ObjectStoreDriver::in_memory()).unwrap();
        let name = handle
            .thread
            .as_ref()
            .and_then(|t| t.thread().name().map(str::to_string));
        assert_eq!(name.as_deref(), Some(WORKER_THREAD_NAME));
        handle.shutdown().unwrap();
    }
}
