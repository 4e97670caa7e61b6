//! Client/server distribution of one search.
//!
//! The server owns the coordinator. Clients fetch batches, expand them
//! locally, submit the children and report the batch as processed. An
//! empty batch tells a client the search is over.

use crate::candidate::Candidate;
use crate::coordinator::SearchCoordinator;
use crate::SearchError;
use bincode::{Decode, Encode};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::collections::VecDeque;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum FrontierRequest<C> {
    Fetch { batch_size: usize },
    Submit(Vec<C>),
    ReportProcessed(Vec<C>),
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum FrontierResponse<C> {
    Batch(Vec<C>),
    Ack,
}

pub trait Transport<C: Candidate> {
    fn call(&self, request: FrontierRequest<C>) -> Result<FrontierResponse<C>, SearchError>;
}

/// A request paired with the channel its response goes back on.
pub type Envelope<C> = (FrontierRequest<C>, Sender<FrontierResponse<C>>);

/// In-process transport over crossbeam channels.
pub struct ChannelTransport<C> {
    requests: Sender<Envelope<C>>,
}

impl<C> Clone for ChannelTransport<C> {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
        }
    }
}

impl<C: Candidate> ChannelTransport<C> {
    pub fn new(requests: Sender<Envelope<C>>) -> Self {
        Self { requests }
    }
}

impl<C: Candidate> Transport<C> for ChannelTransport<C> {
    fn call(&self, request: FrontierRequest<C>) -> Result<FrontierResponse<C>, SearchError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.requests
            .send((request, reply_tx))
            .map_err(|_| SearchError::Transport("server is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| SearchError::Transport("server dropped the request".to_string()))
    }
}

pub struct SearchServer<C: Candidate> {
    coordinator: SearchCoordinator<C>,
    // Candidates handed out and not yet reported.
    in_flight: usize,
    waiting: VecDeque<(usize, Sender<FrontierResponse<C>>)>,
}

impl<C: Candidate> SearchServer<C> {
    pub fn new(coordinator: SearchCoordinator<C>) -> Self {
        Self {
            coordinator,
            in_flight: 0,
            waiting: VecDeque::new(),
        }
    }

    /// A transport and the receiver `serve` should be given.
    pub fn channel() -> (ChannelTransport<C>, Receiver<Envelope<C>>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (ChannelTransport::new(sender), receiver)
    }

    /// Answer requests until every client has hung up.
    ///
    /// A fetch that finds the frontier empty while batches are still out is
    /// parked until a submit or report arrives, so no client quits while
    /// another may still produce work.
    pub fn serve(&mut self, requests: Receiver<Envelope<C>>) -> Result<(), SearchError> {
        info!("search server started");
        while let Ok((request, reply)) = requests.recv() {
            match request {
                FrontierRequest::Fetch { batch_size } => {
                    self.waiting.push_back((batch_size.max(1), reply));
                }
                FrontierRequest::Submit(children) => {
                    let appended = self.coordinator.submit(children)?;
                    debug!(appended, "children submitted");
                    let _ = reply.send(FrontierResponse::Ack);
                }
                FrontierRequest::ReportProcessed(batch) => {
                    self.in_flight = self.in_flight.saturating_sub(batch.len());
                    for candidate in batch {
                        self.coordinator.finish(candidate);
                    }
                    let _ = reply.send(FrontierResponse::Ack);
                }
            }
            self.answer_waiting()?;
        }
        self.coordinator.log_final();
        Ok(())
    }

    pub fn coordinator(&self) -> &SearchCoordinator<C> {
        &self.coordinator
    }

    pub fn into_coordinator(self) -> SearchCoordinator<C> {
        self.coordinator
    }

    fn answer_waiting(&mut self) -> Result<(), SearchError> {
        while let Some((batch_size, _)) = self.waiting.front() {
            let batch_size = *batch_size;
            let batch = self.fetch(batch_size)?;
            if batch.is_empty() && self.in_flight > 0 {
                break;
            }
            let Some((_, reply)) = self.waiting.pop_front() else {
                break;
            };
            let handed_out = batch.len();
            self.in_flight += handed_out;
            if let Err(returned) = reply.send(FrontierResponse::Batch(batch)) {
                // Client vanished; its batch goes back on the frontier.
                self.in_flight -= handed_out;
                if let FrontierResponse::Batch(batch) = returned.into_inner() {
                    self.coordinator.submit(batch)?;
                }
            }
        }
        Ok(())
    }

    fn fetch(&mut self, batch_size: usize) -> Result<Vec<C>, SearchError> {
        let mut batch = Vec::with_capacity(batch_size);
        while batch.len() < batch_size {
            match self.coordinator.pop_unprocessed()? {
                Some(candidate) => batch.push(candidate),
                None => break,
            }
        }
        Ok(batch)
    }
}

pub struct SearchClient<C: Candidate, T: Transport<C>> {
    transport: T,
    batch_size: usize,
    retry_delay: Duration,
    retry_limit: Option<usize>,
    processed: u64,
    _candidate: std::marker::PhantomData<C>,
}

impl<C: Candidate, T: Transport<C>> SearchClient<C, T> {
    pub fn new(transport: T, batch_size: usize) -> Self {
        Self {
            transport,
            batch_size: batch_size.max(1),
            retry_delay: Duration::from_millis(100),
            retry_limit: None,
            processed: 0,
            _candidate: std::marker::PhantomData,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Give up after `limit` consecutive failures instead of retrying forever.
    pub fn with_retry_limit(mut self, limit: usize) -> Self {
        self.retry_limit = Some(limit);
        self
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Fetch, expand and report until the server returns an empty batch.
    pub fn run(&mut self) -> Result<u64, SearchError> {
        loop {
            let batch = match self.call(FrontierRequest::Fetch { batch_size: self.batch_size })? {
                FrontierResponse::Batch(batch) => batch,
                FrontierResponse::Ack => {
                    return Err(SearchError::Transport("expected a batch, got an ack".to_string()));
                }
            };
            if batch.is_empty() {
                debug!(processed = self.processed, "no more candidates");
                return Ok(self.processed);
            }

            let children: Vec<C> = batch
                .iter()
                .filter(|candidate| !candidate.is_terminal())
                .flat_map(|candidate| candidate.expand())
                .collect();
            if !children.is_empty() {
                self.call(FrontierRequest::Submit(children))?;
            }
            self.processed += batch.len() as u64;
            self.call(FrontierRequest::ReportProcessed(batch))?;
        }
    }

    fn call(&self, request: FrontierRequest<C>) -> Result<FrontierResponse<C>, SearchError> {
        let mut failures = 0;
        loop {
            match self.transport.call(request.clone()) {
                Ok(response) => return Ok(response),
                Err(e) => {
                    failures += 1;
                    if self.retry_limit.is_some_and(|limit| failures >= limit) {
                        return Err(e);
                    }
                    warn!(error = %e, attempt = failures, "transport call failed, retrying");
                    thread::sleep(self.retry_delay);
                }
            }
        }
    }
}
