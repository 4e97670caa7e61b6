use crate::candidate::Candidate;
use crate::coordinator::SearchCoordinator;
use crate::SearchError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{error, info, info_span};

const IDLE_SLEEP: Duration = Duration::from_millis(1);

struct SharedState<C: Candidate> {
    coordinator: SearchCoordinator<C>,
    // Candidates popped but not yet recorded as processed.
    in_flight: usize,
}

/// Several workers driving one coordinator through a single lock.
///
/// Pops, appends and bookkeeping happen under the lock; only `expand`
/// runs outside it. Terminal candidates are popped and recorded in one
/// critical section, so the best set matches the single-threaded search.
/// A worker whose `expand` panics releases its in-flight slot and stops
/// with `SearchError::Worker`; the others drain the frontier and `run`
/// returns that error.
pub struct SharedSearch<C: Candidate> {
    state: Arc<Mutex<SharedState<C>>>,
    workers: usize,
}

impl<C: Candidate> SharedSearch<C> {
    pub fn new(coordinator: SearchCoordinator<C>, workers: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SharedState {
                coordinator,
                in_flight: 0,
            })),
            workers: workers.max(1),
        }
    }

    pub fn seed<I>(&self, candidates: I) -> Result<usize, SearchError>
    where
        I: IntoIterator<Item = C>,
    {
        let mut state = self.state.lock()?;
        state.coordinator.seed(candidates)
    }

    /// Run every worker to completion and hand back the coordinator.
    pub fn run(self) -> Result<SearchCoordinator<C>, SearchError> {
        info!(workers = self.workers, "starting shared search");
        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let state = Arc::clone(&self.state);
            handles.push(thread::spawn(move || {
                let span = info_span!("worker", id = worker_id);
                let _enter = span.enter();
                let result = worker_loop(&state);
                if let Err(e) = &result {
                    error!(error = %e, "worker stopped");
                }
                result
            }));
        }

        let mut first_error = None;
        for handle in handles {
            let result = handle
                .join()
                .unwrap_or_else(|payload| Err(SearchError::from_panic(payload.as_ref())));
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let state = Arc::try_unwrap(self.state)
            .map_err(|_| SearchError::Worker("search state still shared after join".to_string()))?
            .into_inner()?;
        state.coordinator.log_final();
        Ok(state.coordinator)
    }
}

fn worker_loop<C: Candidate>(state: &Mutex<SharedState<C>>) -> Result<(), SearchError> {
    loop {
        let candidate = {
            let mut guard = state.lock()?;
            match guard.coordinator.pop_unprocessed()? {
                Some(candidate) if candidate.is_terminal() => {
                    guard.coordinator.mark_processed(candidate);
                    continue;
                }
                Some(candidate) => {
                    guard.in_flight += 1;
                    Some(candidate)
                }
                None if guard.in_flight == 0 => return Ok(()),
                None => None,
            }
        };

        let Some(candidate) = candidate else {
            thread::sleep(IDLE_SLEEP);
            continue;
        };

        let expanded = panic::catch_unwind(AssertUnwindSafe(|| candidate.expand()));
        let mut guard = state.lock()?;
        guard.in_flight -= 1;
        let children = expanded.map_err(|payload| SearchError::from_panic(payload.as_ref()))?;
        guard.coordinator.submit(children)?;
        guard.coordinator.finish(candidate);
    }
}
