use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use notes_bus::{
    wait_for, ActionBus, ActionComplete, CompletionFilter, RequestSubscription,
};
use notes_store::ObjectStoreDriver;
use notes_types::{
    ActionRequest, ActionResult, CorrelationToken, ErrorInfo, ErrorKind, Operation, Params,
    StoreSchema,
};
use notes_worker::{StoreWorker, WorkerHandle};

use crate::error::{CoordinatorError, CoordinatorResult};

/// Commands from a [`CoordinatorHandle`] to the coordinator task.
enum Command {
    Submit {
        token: CorrelationToken,
        operation: String,
        params: Params,
    },
}

/// Progress of the store's `init`.
#[derive(Clone, Debug, PartialEq)]
pub enum InitState {
    /// `init` with this token is in flight; other actions are buffered.
    Pending(CorrelationToken),
    Ready,
    /// `init` failed; actions are rejected until `init` is retried.
    Failed(ErrorInfo),
}

/// What the coordinator remembers about a forwarded request.
struct PendingRequest {
    operation: String,
    params: Params,
}

/// An action held back until `init` completes.
struct Buffered {
    token: CorrelationToken,
    operation: Operation,
    params: Params,
}

/// Routes action requests to the store worker and completions back out.
///
/// The coordinator mints a [`CorrelationToken`] per request, forwards it
/// with the fixed store identity, and matches the worker's result by token
/// before publishing it on the bus. It owns the worker for its lifetime.
pub struct PersistenceCoordinator {
    schema: StoreSchema,
    bus: Arc<ActionBus>,
    worker: Option<WorkerHandle>,
    init: InitState,
    pending: HashMap<CorrelationToken, PendingRequest>,
    buffered: VecDeque<Buffered>,
}

impl PersistenceCoordinator {
    /// Spawn a store worker over `driver` and start coordinating.
    ///
    /// The bus subscription is taken first so a second coordinator on the
    /// same bus fails without starting a worker thread.
    pub fn start(
        bus: Arc<ActionBus>,
        driver: ObjectStoreDriver,
        schema: StoreSchema,
    ) -> CoordinatorResult<CoordinatorHandle> {
        let requests = bus.subscribe_requests()?;
        let worker = StoreWorker::spawn(driver)?;
        Self::launch(bus, requests, worker, schema)
    }

    /// Start coordinating an existing worker.
    ///
    /// Subscribes to the bus's requests and sends `init` before returning.
    /// Must be called within a tokio runtime.
    pub fn attach(
        bus: Arc<ActionBus>,
        worker: WorkerHandle,
        schema: StoreSchema,
    ) -> CoordinatorResult<CoordinatorHandle> {
        let requests = bus.subscribe_requests()?;
        Self::launch(bus, requests, worker, schema)
    }

    fn launch(
        bus: Arc<ActionBus>,
        requests: RequestSubscription,
        mut worker: WorkerHandle,
        schema: StoreSchema,
    ) -> CoordinatorResult<CoordinatorHandle> {
        let results = worker
            .take_results()
            .ok_or_else(|| CoordinatorError::Internal("worker results already taken".into()))?;

        let init_token = CorrelationToken::new();
        let mut coordinator = Self {
            schema,
            bus: Arc::clone(&bus),
            worker: Some(worker),
            init: InitState::Pending(init_token),
            pending: HashMap::new(),
            buffered: VecDeque::new(),
        };
        coordinator.forward(init_token, Operation::Init, Params::new());
        info!(store = %coordinator.schema, %init_token, "coordinator started");

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(coordinator.run(commands_rx, requests, results));
        Ok(CoordinatorHandle {
            commands: commands_tx,
            bus,
            init_token,
            task,
        })
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut requests: RequestSubscription,
        mut results: mpsc::UnboundedReceiver<ActionResult>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Submit { token, operation, params }) => {
                        self.submit(token, &operation, params);
                    }
                    None => break,
                },
                event = requests.recv() => match event {
                    Some(event) => {
                        self.submit(CorrelationToken::new(), &event.operation, event.params);
                    }
                    None => break,
                },
                result = results.recv(), if self.worker.is_some() => match result {
                    Some(result) => self.on_result(result),
                    None => self.on_worker_gone(),
                },
            }
        }

        drop(requests);
        drop(results);
        self.teardown().await;
    }

    /// Entry point for every action, from the handle or the bus.
    fn submit(&mut self, token: CorrelationToken, name: &str, params: Params) {
        let operation = match name.parse::<Operation>() {
            Ok(operation) => operation,
            Err(e) => {
                warn!(%token, operation = name, "rejecting unknown operation");
                self.reject(token, name, params, ErrorInfo::from(e));
                return;
            }
        };

        if self.worker.is_none() {
            self.reject(token, name, params, worker_unavailable());
            return;
        }

        if operation == Operation::Init {
            if matches!(self.init, InitState::Failed(_)) {
                info!(%token, "retrying init");
                self.init = InitState::Pending(token);
            }
            self.forward(token, operation, params);
            return;
        }

        match &self.init {
            InitState::Ready => self.forward(token, operation, params),
            InitState::Pending(_) => {
                debug!(%token, %operation, "buffering until init completes");
                self.buffered.push_back(Buffered {
                    token,
                    operation,
                    params,
                });
            }
            InitState::Failed(cause) => {
                let error = init_failed(cause);
                self.reject(token, name, params, error);
            }
        }
    }

    fn forward(&mut self, token: CorrelationToken, operation: Operation, params: Params) {
        let Some(worker) = self.worker.as_ref() else {
            self.reject(token, operation.as_str(), params, worker_unavailable());
            return;
        };
        let request =
            ActionRequest::new(token, operation.as_str(), self.schema.clone(), params.clone());
        if worker.send(request).is_err() {
            warn!(%token, %operation, "worker request channel closed");
            self.reject(token, operation.as_str(), params, worker_unavailable());
            return;
        }
        self.pending.insert(
            token,
            PendingRequest {
                operation: operation.as_str().to_string(),
                params,
            },
        );
        debug!(%token, %operation, in_flight = self.pending.len(), "request forwarded");
    }

    fn on_result(&mut self, result: ActionResult) {
        let token = result.correlation_token;
        let Some(pending) = self.pending.remove(&token) else {
            warn!(%token, operation = %result.operation, "result for unknown token; dropping");
            return;
        };
        debug_assert_eq!(pending.operation, result.operation);

        let init_outcome = match &self.init {
            InitState::Pending(init_token) if *init_token == token => Some(if result.ok {
                Ok(())
            } else {
                Err(result
                    .error
                    .clone()
                    .unwrap_or_else(|| ErrorInfo::new(ErrorKind::Internal, "init failed")))
            }),
            _ => None,
        };

        self.bus.publish_complete(ActionComplete::from(result));

        match init_outcome {
            Some(Ok(())) => {
                info!(buffered = self.buffered.len(), "store initialized");
                self.init = InitState::Ready;
                while let Some(next) = self.buffered.pop_front() {
                    self.forward(next.token, next.operation, next.params);
                }
            }
            Some(Err(cause)) => {
                warn!(kind = %cause.kind, message = %cause.message, "store init failed");
                let error = init_failed(&cause);
                self.init = InitState::Failed(cause);
                while let Some(next) = self.buffered.pop_front() {
                    self.reject(next.token, next.operation.as_str(), next.params, error.clone());
                }
            }
            None => {}
        }
    }

    fn on_worker_gone(&mut self) {
        warn!(
            in_flight = self.pending.len(),
            buffered = self.buffered.len(),
            "store worker went away"
        );
        self.worker = None;
        let pending: Vec<_> = self.pending.drain().collect();
        for (token, request) in pending {
            self.reject(token, &request.operation, request.params, worker_unavailable());
        }
        while let Some(next) = self.buffered.pop_front() {
            self.reject(next.token, next.operation.as_str(), next.params, worker_unavailable());
        }
    }

    fn reject(&self, token: CorrelationToken, operation: &str, params: Params, error: ErrorInfo) {
        self.bus
            .publish_complete(ActionComplete::rejected(token, operation, params, error));
    }

    async fn teardown(mut self) {
        let dropped = self.pending.len() + self.buffered.len();
        if dropped > 0 {
            debug!(dropped, "dropping in-flight requests");
        }
        self.pending.clear();
        self.buffered.clear();

        if let Some(worker) = self.worker.take() {
            match tokio::task::spawn_blocking(move || worker.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "worker shutdown failed"),
                Err(e) => warn!(error = %e, "worker shutdown task failed"),
            }
        }
        info!("coordinator stopped");
    }
}

fn worker_unavailable() -> ErrorInfo {
    ErrorInfo::new(ErrorKind::WorkerUnavailable, "store worker is not running")
}

fn init_failed(cause: &ErrorInfo) -> ErrorInfo {
    ErrorInfo::new(ErrorKind::InitFailed, format!("store init failed: {cause}"))
}

/// Caller's side of a running [`PersistenceCoordinator`].
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    bus: Arc<ActionBus>,
    init_token: CorrelationToken,
    task: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// Queue an action and return its token without waiting.
    pub fn submit(
        &self,
        operation: impl Into<String>,
        params: Params,
    ) -> CoordinatorResult<CorrelationToken> {
        let token = CorrelationToken::new();
        self.send(token, operation.into(), params)?;
        Ok(token)
    }

    /// Submit an action and wait for its completion.
    pub async fn request(
        &self,
        operation: impl Into<String>,
        params: Params,
    ) -> CoordinatorResult<ActionComplete> {
        let token = CorrelationToken::new();
        let mut stream = self.bus.subscribe_completions(CompletionFilter::token(token));
        self.send(token, operation.into(), params)?;
        Ok(wait_for(&mut stream, token).await?)
    }

    fn send(
        &self,
        token: CorrelationToken,
        operation: String,
        params: Params,
    ) -> CoordinatorResult<()> {
        self.commands
            .send(Command::Submit {
                token,
                operation,
                params,
            })
            .map_err(|_| CoordinatorError::Shutdown)
    }

    /// Token of the `init` sent at construction.
    pub fn init_token(&self) -> CorrelationToken {
        self.init_token
    }

    pub fn bus(&self) -> &Arc<ActionBus> {
        &self.bus
    }

    /// Stop the coordinator: unsubscribe from the bus, drop in-flight
    /// requests, and shut the worker down.
    pub async fn shutdown(self) -> CoordinatorResult<()> {
        drop(self.commands);
        self.task
            .await
            .map_err(|e| CoordinatorError::Internal(e.to_string()))
    }
}

impl std::fmt::Debug for CoordinatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorHandle")
            .field("init_token", &self.init_token)
            .field("running", &!self.task.is_finished())
            .finish()
    }
}
