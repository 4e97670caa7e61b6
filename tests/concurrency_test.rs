use bincode::{Decode, Encode};
use crossbeam_channel::bounded;
use flipsearch::othello::OthelloCandidate;
use flipsearch::{
    Candidate, Comparator, FanOutSearch, SearchClient, SearchConfig, SearchCoordinator, SearchError, SearchServer,
    SharedSearch,
};
use std::collections::HashSet;
use std::thread;
use std::time::Duration;

fn coordinator(config: &SearchConfig) -> SearchCoordinator<OthelloCandidate> {
    SearchCoordinator::in_memory(config, OthelloCandidate::comparator()).unwrap()
}

fn seeds(width: usize, height: usize, depth: usize) -> Vec<OthelloCandidate> {
    OthelloCandidate::start(width, height, depth).expand()
}

fn single(width: usize, height: usize, depth: usize) -> (Option<u32>, HashSet<String>) {
    let mut search = coordinator(&SearchConfig::default_config());
    search.seed(seeds(width, height, depth)).unwrap();
    search.run().unwrap();
    let fingerprints = search.best().members().iter().map(|c| c.fingerprint()).collect();
    (search.best_score(), fingerprints)
}

fn run_remote(config: &SearchConfig, clients: usize, batch_size: usize, width: usize, height: usize, depth: usize) -> SearchCoordinator<OthelloCandidate> {
    let mut search = coordinator(config);
    search.seed(seeds(width, height, depth)).unwrap();
    let mut server = SearchServer::new(search);
    let (transport, requests) = SearchServer::<OthelloCandidate>::channel();

    let server_handle = thread::spawn(move || {
        server.serve(requests).unwrap();
        server
    });
    let client_handles: Vec<_> = (0..clients)
        .map(|_| {
            let transport = transport.clone();
            thread::spawn(move || {
                SearchClient::new(transport, batch_size)
                    .with_retry_delay(Duration::from_millis(1))
                    .run()
                    .unwrap()
            })
        })
        .collect();
    drop(transport);

    let processed: u64 = client_handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert!(processed > 0);
    server_handle.join().unwrap().into_coordinator()
}

#[test]
fn test_shared_search_matches_single_threaded() {
    let (score, fingerprints) = single(3, 3, 3);

    let search = SharedSearch::new(coordinator(&SearchConfig::default_config()), 4);
    search.seed(seeds(3, 3, 3)).unwrap();
    let done = search.run().unwrap();

    assert_eq!(done.best_score(), score);
    assert_eq!(done.best().len(), 3);
    let found: HashSet<String> = done.best().members().iter().map(|c| c.fingerprint()).collect();
    assert_eq!(found, fingerprints);
    assert_eq!(done.frontier_len(), 0);
}

#[test]
fn test_shared_search_with_spilling_frontier() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = SearchConfig::default_config()
        .with_thresholds(16, 4)
        .with_state_dir(temp_dir.path().join("frontier"));
    let (score, fingerprints) = single(4, 3, 3);

    let search = SharedSearch::new(
        SearchCoordinator::on_disk(&config, OthelloCandidate::comparator()).unwrap(),
        3,
    );
    search.seed(seeds(4, 3, 3)).unwrap();
    let done = search.run().unwrap();

    assert_eq!(done.best_score(), score);
    let found: HashSet<String> = done.best().members().iter().map(|c| c.fingerprint()).collect();
    assert_eq!(found, fingerprints);
}

#[test]
fn test_fan_out_reaches_same_best_score() {
    let (score, fingerprints) = single(3, 3, 3);

    let search = FanOutSearch::new(4, true);
    search.seed(seeds(3, 3, 3)).unwrap();
    let result = search.run().unwrap();

    assert_eq!(result.best.score(), score);
    let found: HashSet<String> = result.best.members().iter().map(|c| c.fingerprint()).collect();
    assert_eq!(found.len(), result.best.len());
    assert!(found.is_subset(&fingerprints));
    assert!(result.stats.pops > 0);
}

#[test]
fn test_remote_clients_match_single_threaded() {
    let (score, fingerprints) = single(3, 3, 3);
    let done = run_remote(&SearchConfig::default_config(), 3, 2, 3, 3, 3);

    assert_eq!(done.best_score(), score);
    assert_eq!(done.best().len(), 3);
    let found: HashSet<String> = done.best().members().iter().map(|c| c.fingerprint()).collect();
    assert_eq!(found, fingerprints);
    assert_eq!(done.frontier_len(), 0);
}

#[test]
fn test_remote_single_client_large_batches() {
    let (score, fingerprints) = single(4, 3, 3);
    let config = SearchConfig::default_config().with_thresholds(30, 6);
    let done = run_remote(&config, 1, 16, 4, 3, 3);

    assert_eq!(done.best_score(), score);
    let found: HashSet<String> = done.best().members().iter().map(|c| c.fingerprint()).collect();
    assert_eq!(found, fingerprints);
}

/// Counts up to a terminal value; expanding the zero candidate panics.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct Fuse(u32);

impl Candidate for Fuse {
    type Fingerprint = u32;
    type Score = u32;

    fn fingerprint(&self) -> u32 {
        self.0
    }

    fn score(&self) -> u32 {
        self.0
    }

    fn is_terminal(&self) -> bool {
        self.0 >= 100
    }

    fn expand(&self) -> Vec<Self> {
        if self.0 == 0 {
            panic!("cannot expand fuse 0");
        }
        vec![Fuse(self.0 * 10), Fuse(self.0 * 10 + 1)]
    }
}

/// Run `search` on another thread and fail the test if it does not finish.
fn within_deadline<R: Send + 'static>(search: impl FnOnce() -> R + Send + 'static) -> R {
    let (done, finished) = bounded(1);
    thread::spawn(move || {
        let _ = done.send(search());
    });
    finished
        .recv_timeout(Duration::from_secs(20))
        .expect("search did not finish after a worker panicked")
}

fn assert_worker_panic(err: SearchError) {
    match err {
        SearchError::Worker(message) => assert!(message.contains("cannot expand fuse 0"), "{}", message),
        other => panic!("expected a worker error, got {:?}", other),
    }
}

#[test]
fn test_shared_search_survives_panicking_expand() {
    let result = within_deadline(|| {
        let config = SearchConfig::default_config();
        let search = SharedSearch::new(
            SearchCoordinator::in_memory(&config, Comparator::by_key(|f: &Fuse| f.0)).unwrap(),
            3,
        );
        search.seed([Fuse(0), Fuse(1), Fuse(2)]).unwrap();
        search.run().map(|done| done.frontier_len())
    });
    assert_worker_panic(result.unwrap_err());
}

#[test]
fn test_fan_out_search_survives_panicking_expand() {
    let result = within_deadline(|| {
        let search = FanOutSearch::new(3, true);
        search.seed([Fuse(0), Fuse(1), Fuse(2)]).unwrap();
        search.run().map(|result| result.stats.pops)
    });
    assert_worker_panic(result.unwrap_err());
}
