//! Collection runs
//!
//! A [`CollectionRunner`] executes every request of a collection, either
//! one after another or all at once, and keeps one [`RequestResult`] slot
//! per request. It is a cheap handle: clone it to pause, resume or stop a
//! run from another task while `start()` is being awaited.

mod control;

pub use control::{RunMode, RunOptions, RunState, DEFAULT_DELAY};

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::{ReqdeckError, Result};
use crate::http::RequestExecutor;
use crate::models::{Collection, Request};
use crate::results::{RequestResult, ResultAggregator, RunSummary};
use crate::variables::{Variable, VariableStore};
use control::RunControl;

const EVENT_CAPACITY: usize = 256;

/// Notifications published while a run progresses
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    StateChanged(RunState),
    /// A slot changed; `index` is its position in the collection
    ResultUpdated { index: usize, result: RequestResult },
    /// Percentage in `0..=100`
    Progress(f64),
}

/// Point-in-time view of the run session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSession {
    pub mode: RunMode,
    pub delay_ms: u64,
    pub is_running: bool,
    pub is_paused: bool,
    pub current_index: Option<usize>,
    pub progress_percent: f64,
}

struct Shared {
    executor: RequestExecutor,
    variables: Arc<RwLock<VariableStore>>,
    collection: RwLock<Collection>,
    options: Mutex<RunOptions>,
    results: Mutex<ResultAggregator>,
    control: RunControl,
    events: broadcast::Sender<RunEvent>,
}

#[derive(Clone)]
pub struct CollectionRunner {
    inner: Arc<Shared>,
}

impl CollectionRunner {
    pub fn new(
        collection: Collection,
        executor: RequestExecutor,
        variables: Arc<RwLock<VariableStore>>,
        options: RunOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let results = ResultAggregator::new(&collection.requests);
        Self {
            inner: Arc::new(Shared {
                executor,
                variables,
                collection: RwLock::new(collection),
                options: Mutex::new(options),
                results: Mutex::new(results),
                control: RunControl::new(),
                events,
            }),
        }
    }

    /// Run every request and resolve once the run completes or is stopped.
    ///
    /// Only valid from `idle`; call [`reset`](Self::reset) after a finished run.
    pub async fn start(&self) -> Result<RunSummary> {
        let options = self.options();
        let requests = self.requests();
        let generation = {
            let mut results = self.lock_results();
            self.inner.control.begin()?;
            results.reset(&requests)
        };
        info!(
            collection = %self.collection_name(),
            mode = %options.mode,
            total = requests.len(),
            "Starting collection run"
        );
        self.publish(RunEvent::StateChanged(RunState::Running));
        self.publish(RunEvent::Progress(0.0));

        match options.mode {
            RunMode::Sequential => self.run_sequential(generation, &requests, options).await,
            RunMode::Parallel => self.run_parallel(generation, &requests).await,
        }

        let finished = {
            let results = self.lock_results();
            results.generation() == generation && self.inner.control.finish()
        };
        if finished {
            info!(collection = %self.collection_name(), "Collection run completed");
            self.publish(RunEvent::StateChanged(RunState::Completed));
        }

        Ok(self.summary())
    }

    /// Hold the next dispatch until [`resume`](Self::resume); sequential runs only
    pub fn pause(&self) -> Result<()> {
        if self.options().mode == RunMode::Parallel {
            return Err(ReqdeckError::InvalidTransition {
                action: "pause",
                state: format!("{} in parallel mode", self.state()),
            });
        }
        self.inner.control.pause()?;
        debug!("Collection run paused");
        self.publish(RunEvent::StateChanged(RunState::Paused));
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        self.inner.control.resume()?;
        debug!("Collection run resumed");
        self.publish(RunEvent::StateChanged(RunState::Running));
        Ok(())
    }

    /// Prevent further dispatches.
    ///
    /// Requests already on the wire are not aborted; their results are
    /// still recorded when they arrive.
    pub fn stop(&self) -> Result<()> {
        self.inner.control.stop()?;
        info!(collection = %self.collection_name(), "Collection run stopped");
        self.publish(RunEvent::StateChanged(RunState::Stopped));
        Ok(())
    }

    /// Back to idle from any state: every slot pending, progress 0.
    ///
    /// Results still in flight from the previous run are discarded.
    pub fn reset(&self) {
        let requests = self.requests();
        {
            let mut results = self.lock_results();
            self.inner.control.reset();
            results.reset(&requests);
        }
        debug!("Collection run reset");
        self.publish(RunEvent::StateChanged(RunState::Idle));
        self.publish(RunEvent::Progress(0.0));
    }

    /// Change mode or delay; rejected while a run is active
    pub fn set_options(&self, options: RunOptions) -> Result<()> {
        self.ensure_inactive("change options")?;
        *self.inner.options.lock().unwrap_or_else(PoisonError::into_inner) = options;
        Ok(())
    }

    /// Bind another collection; results start over as pending
    pub fn set_collection(&self, collection: Collection) -> Result<()> {
        self.ensure_inactive("change the collection")?;
        let requests = collection.requests.clone();
        *self
            .inner
            .collection
            .write()
            .unwrap_or_else(PoisonError::into_inner) = collection;
        self.lock_results().reset(&requests);
        self.publish(RunEvent::Progress(0.0));
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.inner.events.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<RunState> {
        self.inner.control.subscribe()
    }

    pub fn state(&self) -> RunState {
        self.inner.control.current()
    }

    pub fn options(&self) -> RunOptions {
        *self.inner.options.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn progress(&self) -> f64 {
        self.lock_results().progress()
    }

    pub fn results(&self) -> Vec<RequestResult> {
        self.lock_results().results().to_vec()
    }

    pub fn summary(&self) -> RunSummary {
        self.lock_results().summary()
    }

    pub fn session(&self) -> RunSession {
        let options = self.options();
        let state = self.state();
        let results = self.lock_results();
        RunSession {
            mode: options.mode,
            delay_ms: options.delay.as_millis() as u64,
            is_running: state.is_active(),
            is_paused: state == RunState::Paused,
            current_index: results.current_index(),
            progress_percent: results.progress(),
        }
    }

    pub fn variables(&self) -> Arc<RwLock<VariableStore>> {
        Arc::clone(&self.inner.variables)
    }

    async fn run_sequential(&self, generation: u64, requests: &[Request], options: RunOptions) {
        let total = requests.len();
        for (index, request) in requests.iter().enumerate() {
            if !self.inner.control.wait_while_paused().await || !self.is_current(generation) {
                return;
            }

            self.mark_running(generation, index, request);
            let handle = self.dispatch(generation, index, request.clone(), RunMode::Sequential);
            tokio::select! {
                joined = handle => {
                    if let Err(e) = joined {
                        let result =
                            RequestResult::failed(request, format!("Execution task failed: {}", e));
                        self.complete(generation, index, result, RunMode::Sequential);
                    }
                }
                _ = self.inner.control.halted() => return,
            }

            if index + 1 < total
                && (!self.is_current(generation) || !self.inner.control.delay(options.delay).await)
            {
                return;
            }
        }
    }

    async fn run_parallel(&self, generation: u64, requests: &[Request]) {
        for (index, request) in requests.iter().enumerate() {
            self.mark_running(generation, index, request);
        }

        let mut pending: FuturesUnordered<_> = requests
            .iter()
            .enumerate()
            .map(|(index, request)| {
                let handle = self.dispatch(generation, index, request.clone(), RunMode::Parallel);
                async move { (index, handle.await) }
            })
            .collect();

        loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some((index, Err(e))) => {
                        let result = RequestResult::failed(
                            &requests[index],
                            format!("Execution task failed: {}", e),
                        );
                        self.complete(generation, index, result, RunMode::Parallel);
                    }
                    Some(_) => {}
                    None => return,
                },
                _ = self.inner.control.halted() => return,
            }
        }
    }

    /// Execute one request on its own task.
    ///
    /// Variables are read right before the send so edits made since the
    /// previous dispatch take effect.
    fn dispatch(
        &self,
        generation: u64,
        index: usize,
        request: Request,
        mode: RunMode,
    ) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move {
            let variables = runner.variable_snapshot();
            let result = runner.inner.executor.execute(&request, &variables).await;
            runner.complete(generation, index, result, mode);
        })
    }

    fn mark_running(&self, generation: u64, index: usize, request: &Request) {
        let result = {
            let mut results = self.lock_results();
            if results.generation() != generation {
                return;
            }
            results.mark_running(index, request);
            results.get(index).cloned()
        };
        if let Some(result) = result {
            self.publish(RunEvent::ResultUpdated { index, result });
        }
    }

    fn complete(&self, generation: u64, index: usize, result: RequestResult, mode: RunMode) {
        let progress = {
            let mut results = self.lock_results();
            if !results.record(generation, index, result.clone()) {
                return;
            }
            let progress = match mode {
                RunMode::Sequential => (index + 1) as f64 / results.len() as f64 * 100.0,
                RunMode::Parallel => results.settled_progress(),
            };
            results.set_progress(progress);
            results.progress()
        };
        debug!(index, status = ?result.status, progress, "Request settled");
        self.publish(RunEvent::ResultUpdated { index, result });
        self.publish(RunEvent::Progress(progress));
    }

    fn variable_snapshot(&self) -> Vec<Variable> {
        self.inner
            .variables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock_results().generation() == generation
    }

    fn ensure_inactive(&self, action: &'static str) -> Result<()> {
        let state = self.state();
        if state.is_active() {
            return Err(ReqdeckError::InvalidTransition {
                action,
                state: state.to_string(),
            });
        }
        Ok(())
    }

    fn requests(&self) -> Vec<Request> {
        self.inner
            .collection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .clone()
    }

    fn collection_name(&self) -> String {
        self.inner
            .collection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .name
            .clone()
    }

    fn lock_results(&self) -> MutexGuard<'_, ResultAggregator> {
        self.inner.results.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: RunEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }
}
