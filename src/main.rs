//! Replay host for the feed scheduler.
//!
//! Reads a script of events, one JSON object per line, applies them through
//! the scheduler, and prints every resulting action as a JSON line on stdout.
//! Logs go to stderr and spans to the trace file in the data directory.
//!
//! ```text
//! reelfeed <script.jsonl> [catalog.json]
//! ```
//!
//! # Host Responsibilities
//!
//! The binary plays the part a UI host would:
//!
//! - Players are console stand-ins that log play/pause/release calls
//! - `PostToWorker` actions run synchronously against a [`FeedWorker`] and
//!   the response is queued as the next [`Event::Worker`]
//! - `ScheduleTick` actions are printed; scripts deliver ticks explicitly
//! - `Mounted` actions print the generation that `player` events for that
//!   item must carry
//!
//! A catalog file, if given, backs page loads. Without one, scripts supply
//! items with `feed_reloaded` / `items_appended` events.
//!
//! # Configuration
//!
//! `REELFEED_CONFIG` names an optional TOML file (see [`Config::from_file`]).
//! `RUST_LOG` overrides the configured trace level.
//!
//! # Example Script
//!
//! ```text
//! {"feed_reloaded":{"items":[{"id":"a","ordinal":0,"media":"a.mp4","kind":"video"}]}}
//! {"mounted":{"item_id":"a"}}
//! {"viewability":{"timestamp_ms":0,"entries":[{"ordinal":0,"fraction":0.9}]}}
//! {"tick":{"timestamp_ms":150}}
//! {"player":{"item_id":"a","generation":1,"signal":"ready"}}
//! {"focus_changed":{"has_focus":false}}
//! ```

use reelfeed::feed::ContentStore;
use reelfeed::player::PlayerResult;
use reelfeed::storage::JsonCatalog;
use reelfeed::worker::FeedWorker;
use reelfeed::{Action, Config, Event, EventQueue, FeedItem, FeedState, ItemId, PlayerFactory, PlayerResource};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Environment variable naming a TOML configuration file.
const CONFIG_ENV: &str = "REELFEED_CONFIG";

/// Media prefix for players that refuse the first play until a `ready` signal.
const SLOW_MEDIA_PREFIX: &str = "slow:";

/// Player that logs each call instead of decoding anything.
struct ConsolePlayer {
    item_id: ItemId,
    generation: u64,
    ready: bool,
}

impl PlayerResource for ConsolePlayer {
    fn play(&mut self) -> PlayerResult {
        if !self.ready {
            // A refused play stands in for the resource finishing its setup.
            self.ready = true;
            tracing::info!(item_id = %self.item_id, generation = self.generation, "player not ready, play refused");
            return Err(reelfeed::domain::ResourceNotReady);
        }
        tracing::info!(item_id = %self.item_id, "player play");
        Ok(())
    }

    fn pause(&mut self) -> PlayerResult {
        tracing::info!(item_id = %self.item_id, "player pause");
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) -> PlayerResult {
        tracing::info!(item_id = %self.item_id, muted, "player mute");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn release(&mut self) {
        tracing::info!(item_id = %self.item_id, generation = self.generation, "player release");
    }
}

struct ConsolePlayers;

impl PlayerFactory for ConsolePlayers {
    fn create(&mut self, item: &FeedItem, generation: u64) -> Box<dyn PlayerResource> {
        Box::new(ConsolePlayer {
            item_id: item.id.clone(),
            generation,
            ready: !item.media.starts_with(SLOW_MEDIA_PREFIX),
        })
    }
}

/// Parsed command line.
#[derive(Debug)]
struct Args {
    script: PathBuf,
    catalog: Option<PathBuf>,
}

impl Args {
    fn parse() -> Option<Self> {
        let mut args = std::env::args_os().skip(1);
        let script = PathBuf::from(args.next()?);
        let catalog = args.next().map(PathBuf::from);
        Some(Self { script, catalog })
    }
}

/// Drives the scheduler over a script.
struct Replay {
    state: FeedState,
    worker: FeedWorker,
    queue: EventQueue,
    errors: usize,
}

impl Replay {
    /// Executes actions, feeding worker responses back until none remain.
    fn settle(&mut self, mut actions: Vec<Action>, out: &mut impl Write) -> std::io::Result<()> {
        loop {
            for action in actions {
                writeln!(out, "{}", serde_json::to_string(&action).map_err(std::io::Error::other)?)?;
                if let Action::PostToWorker(message) = action {
                    let response = self.worker.handle_message(message);
                    self.queue.push(Event::Worker(response));
                }
            }
            if self.queue.is_empty() {
                return Ok(());
            }
            let report = self.queue.drain(&mut self.state);
            self.errors += report.errors.len();
            actions = report.actions;
        }
    }

    fn apply(&mut self, event: Event, out: &mut impl Write) -> std::io::Result<()> {
        self.queue.push(event);
        self.settle(Vec::new(), out)
    }
}

fn load_config() -> reelfeed::Result<Config> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => Config::from_file(Path::new(&path)),
        None => Ok(Config::default()),
    }
}

fn run(args: &Args) -> reelfeed::Result<usize> {
    let config = load_config()?;
    reelfeed::observability::init_tracing(&config);

    let span = tracing::info_span!("replay", script = %args.script.display());
    let _guard = span.enter();

    let content: Option<Box<dyn ContentStore>> = match &args.catalog {
        Some(path) => Some(Box::new(JsonCatalog::open(path)?)),
        None => None,
    };
    let worker = FeedWorker::from_config(&config, content)?;
    let state = reelfeed::initialize(&config, Box::new(ConsolePlayers))?;
    let mut replay = Replay {
        state,
        worker,
        queue: EventQueue::new(),
        errors: 0,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let startup = replay.state.startup_actions();
    replay.settle(startup, &mut out)?;

    let script = BufReader::new(std::fs::File::open(&args.script)?);
    for (index, line) in script.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<Event>(trimmed) {
            Ok(event) => replay.apply(event, &mut out)?,
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "skipping unparseable event");
                replay.errors += 1;
            }
        }
    }

    tracing::info!(
        active = ?replay.state.active_index(),
        playing = replay.state.playing_count(),
        errors = replay.errors,
        "replay finished"
    );
    Ok(replay.errors)
}

fn main() -> ExitCode {
    let Some(args) = Args::parse() else {
        eprintln!("usage: reelfeed <script.jsonl> [catalog.json]");
        return ExitCode::from(2);
    };

    match run(&args) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(errors) => {
            eprintln!("reelfeed: replay finished with {errors} error(s)");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("reelfeed: {e}");
            ExitCode::FAILURE
        }
    }
}
