//! Throughput-first search over a plain work channel.
//!
//! Workers pull candidates from an unbounded FIFO channel instead of the
//! frontier, so pops are not globally best-first. The processed index and
//! best set are shared behind one lock; dominance is still enforced, but
//! the work done to reach the answer depends on scheduling. A panic while
//! processing one candidate stops that worker with `SearchError::Worker`.

use crate::candidate::Candidate;
use crate::coordinator::{BestSet, BestUpdate, SearchStats};
use crate::processed::ProcessedIndex;
use crate::SearchError;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{error, info, info_span};

const POLL_TIMEOUT: Duration = Duration::from_millis(10);

struct Tally<C: Candidate> {
    processed: ProcessedIndex<C::Fingerprint, C::Score>,
    best: BestSet<C>,
    stats: SearchStats,
}

impl<C: Candidate> Tally<C> {
    fn dominated(&mut self, candidate: &C) -> bool {
        self.processed.dominates(&candidate.fingerprint(), candidate.score())
    }

    fn finish(&mut self, candidate: C) {
        if self.dominated(&candidate) {
            self.stats.pruned += 1;
            return;
        }
        let fingerprint = candidate.fingerprint();
        let score = candidate.score();
        if candidate.is_terminal() {
            self.stats.terminals += 1;
            if self.best.offer(candidate) == BestUpdate::Improved {
                info!(score = ?score, "current best");
            }
        } else {
            self.stats.expanded += 1;
        }
        self.processed.record(fingerprint, score);
    }
}

pub struct FanOutResult<C: Candidate> {
    pub best: BestSet<C>,
    pub stats: SearchStats,
    pub processed: usize,
}

pub struct FanOutSearch<C: Candidate> {
    sender: Sender<C>,
    receiver: Receiver<C>,
    tally: Arc<Mutex<Tally<C>>>,
    // Candidates sent but not yet finished.
    pending: Arc<AtomicU64>,
    screen_terminal_children: bool,
    workers: usize,
}

impl<C: Candidate> FanOutSearch<C> {
    pub fn new(workers: usize, screen_terminal_children: bool) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            tally: Arc::new(Mutex::new(Tally {
                processed: ProcessedIndex::new(),
                best: BestSet::new(),
                stats: SearchStats::default(),
            })),
            pending: Arc::new(AtomicU64::new(0)),
            screen_terminal_children,
            workers: workers.max(1),
        }
    }

    pub fn seed<I>(&self, candidates: I) -> Result<usize, SearchError>
    where
        I: IntoIterator<Item = C>,
    {
        let mut count = 0;
        for candidate in candidates {
            self.pending.fetch_add(1, Ordering::SeqCst);
            self.sender
                .send(candidate)
                .map_err(|_| SearchError::Worker("work channel closed".to_string()))?;
            count += 1;
        }
        Ok(count)
    }

    pub fn run(self) -> Result<FanOutResult<C>, SearchError> {
        info!(workers = self.workers, "starting fan-out search");
        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let worker = Worker {
                sender: self.sender.clone(),
                receiver: self.receiver.clone(),
                tally: Arc::clone(&self.tally),
                pending: Arc::clone(&self.pending),
                screen_terminal_children: self.screen_terminal_children,
            };
            handles.push(thread::spawn(move || {
                let span = info_span!("worker", id = worker_id);
                let _enter = span.enter();
                let result = worker.run();
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

        let tally = Arc::try_unwrap(self.tally)
            .map_err(|_| SearchError::Worker("tally still shared after join".to_string()))?
            .into_inner()?;
        info!(
            best_score = ?tally.best.score(),
            best_count = tally.best.len(),
            pops = tally.stats.pops,
            pruned = tally.stats.pruned,
            "fan-out search finished"
        );
        Ok(FanOutResult {
            processed: tally.processed.len(),
            best: tally.best,
            stats: tally.stats,
        })
    }
}

struct Worker<C: Candidate> {
    sender: Sender<C>,
    receiver: Receiver<C>,
    tally: Arc<Mutex<Tally<C>>>,
    pending: Arc<AtomicU64>,
    screen_terminal_children: bool,
}

impl<C: Candidate> Worker<C> {
    fn run(&self) -> Result<(), SearchError> {
        loop {
            let candidate = match self.receiver.recv_timeout(POLL_TIMEOUT) {
                Ok(candidate) => candidate,
                Err(RecvTimeoutError::Timeout) => {
                    if self.pending.load(Ordering::SeqCst) == 0 {
                        return Ok(());
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            };
            // A panicking candidate still counts as finished, or the
            // siblings would wait on it forever.
            let result = panic::catch_unwind(AssertUnwindSafe(|| self.process(candidate)))
                .unwrap_or_else(|payload| Err(SearchError::from_panic(payload.as_ref())));
            self.pending.fetch_sub(1, Ordering::SeqCst);
            result?;
        }
    }

    fn process(&self, candidate: C) -> Result<(), SearchError> {
        {
            let mut tally = self.tally.lock()?;
            tally.stats.pops += 1;
            if tally.dominated(&candidate) {
                tally.stats.pruned += 1;
                return Ok(());
            }
            if candidate.is_terminal() {
                tally.finish(candidate);
                return Ok(());
            }
        }

        let children = candidate.expand();
        let mut screened = 0;
        let mut sent = 0;
        for child in children {
            if self.screen_terminal_children && child.is_terminal() && self.tally.lock()?.dominated(&child) {
                screened += 1;
                continue;
            }
            self.pending.fetch_add(1, Ordering::SeqCst);
            if self.sender.send(child).is_err() {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                return Err(SearchError::Worker("work channel closed".to_string()));
            }
            sent += 1;
        }

        let mut tally = self.tally.lock()?;
        tally.stats.children_screened += screened;
        tally.stats.children_appended += sent;
        tally.finish(candidate);
        Ok(())
    }
}
