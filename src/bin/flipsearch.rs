use clap::{Parser, ValueEnum};
use flipsearch::othello::OthelloCandidate;
use flipsearch::{
    BestSet, Candidate, FanOutSearch, SearchClient, SearchConfig, SearchCoordinator, SearchError, SearchServer,
    SharedSearch,
};
use std::path::PathBuf;
use std::thread;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Single,
    Shared,
    Fanout,
    Remote,
}

#[derive(Parser)]
#[command(name = "flipsearch")]
#[command(about = "Best-first search for the placement sequence that flips the most white pieces", long_about = None)]
struct Cli {
    /// Pieces to place
    #[arg(short, long, default_value_t = 3)]
    depth: usize,
    /// Side of a square board
    #[arg(short, long, default_value_t = 3)]
    size: usize,
    #[arg(long)]
    width: Option<usize>,
    #[arg(long)]
    height: Option<usize>,
    #[arg(short, long, value_enum, default_value_t = Mode::Single)]
    mode: Mode,
    /// Worker threads or remote clients
    #[arg(short, long, default_value_t = 4)]
    concurrency: usize,
    /// Candidates per remote fetch
    #[arg(short, long, default_value_t = 2)]
    batch_size: usize,
    #[arg(long)]
    max_threshold: Option<usize>,
    #[arg(long)]
    min_threshold: Option<usize>,
    /// Directory for frontier fragments (temporary directory when unset)
    #[arg(long)]
    state_dir: Option<PathBuf>,
    /// JSON search configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), SearchError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    config.log_summary();

    let width = cli.width.unwrap_or(cli.size);
    let height = cli.height.unwrap_or(cli.size);
    let start = OthelloCandidate::start(width, height, cli.depth);
    info!(width, height, depth = cli.depth, mode = ?cli.mode, "starting search");

    let best = match cli.mode {
        Mode::Single => {
            let mut coordinator = SearchCoordinator::on_disk(&config, OthelloCandidate::comparator())?;
            coordinator.seed(start.expand())?;
            coordinator.run()?;
            coordinator.into_best()
        }
        Mode::Shared => {
            let coordinator = SearchCoordinator::on_disk(&config, OthelloCandidate::comparator())?;
            let search = SharedSearch::new(coordinator, cli.concurrency);
            search.seed(start.expand())?;
            search.run()?.into_best()
        }
        Mode::Fanout => {
            let search = FanOutSearch::new(cli.concurrency, config.screen_terminal_children);
            search.seed(start.expand())?;
            search.run()?.best
        }
        Mode::Remote => run_remote(&config, start, cli.concurrency, cli.batch_size)?,
    };

    print_best(&best);
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<SearchConfig, SearchError> {
    let mut config = match &cli.config {
        Some(path) => SearchConfig::load(path)?,
        None => SearchConfig::from_env()?,
    };
    match (cli.max_threshold, cli.min_threshold) {
        (Some(max), Some(min)) => config = config.with_thresholds(max, min),
        (Some(max), None) => config = config.with_max_threshold(max),
        (None, Some(min)) => config.min_threshold = min,
        (None, None) => {}
    }
    if let Some(dir) = &cli.state_dir {
        config = config.with_state_dir(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

fn run_remote(
    config: &SearchConfig,
    start: OthelloCandidate,
    clients: usize,
    batch_size: usize,
) -> Result<BestSet<OthelloCandidate>, SearchError> {
    let mut coordinator = SearchCoordinator::on_disk(config, OthelloCandidate::comparator())?;
    coordinator.seed(start.expand())?;
    let mut server = SearchServer::new(coordinator);
    let (transport, requests) = SearchServer::<OthelloCandidate>::channel();

    let server_handle = thread::spawn(move || server.serve(requests).map(|_| server));
    let client_handles: Vec<_> = (0..clients.max(1))
        .map(|id| {
            let transport = transport.clone();
            thread::spawn(move || {
                let span = tracing::info_span!("client", id);
                let _enter = span.enter();
                SearchClient::new(transport, batch_size).run()
            })
        })
        .collect();
    drop(transport);

    for handle in client_handles {
        let processed = handle
            .join()
            .map_err(|_| SearchError::Worker("client panicked".to_string()))??;
        info!(processed, "client finished");
    }
    let server = server_handle
        .join()
        .map_err(|_| SearchError::Worker("server panicked".to_string()))??;
    Ok(server.into_coordinator().into_best())
}

fn print_best(best: &BestSet<OthelloCandidate>) {
    match best.score() {
        Some(score) => println!("best score: {} ({} boards)", score, best.len()),
        None => println!("no terminal boards found"),
    }
    for candidate in best.members() {
        println!("score={}", candidate.score());
        println!("{}", candidate.board().render(true));
    }
}
