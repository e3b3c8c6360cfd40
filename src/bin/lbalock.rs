//! Diagnostic driver for the LBA range lock manager.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use lbalock::{
    LockError, LockHandle, LockKind, LockManager, LockManagerOptions, LockState, NamespaceId,
    RemovalBalance,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "lbalock",
    version,
    about = "Exercise and inspect the LBA range lock manager",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(flatten)]
    manager: ManagerArgs,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for the final statistics"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ManagerArgs {
    #[arg(long, value_name = "FILE", help = "TOML file with manager options")]
    config: Option<PathBuf>,

    #[arg(long, env = "LBALOCK_MAX_NODES", help = "Override the node pool capacity")]
    max_nodes: Option<u32>,

    #[arg(long, help = "Override the number of namespaces")]
    max_namespaces: Option<u32>,

    #[arg(long, value_enum, help = "Tree maintenance after removal")]
    removal: Option<RemovalArg>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the six-request walkthrough and print the tree after each step.
    Scenario,
    /// Drive seeded random request/release rounds, verifying after each call.
    Stress(StressCmd),
}

#[derive(Args, Debug)]
struct StressCmd {
    #[arg(long, default_value_t = 0x5eed, help = "RNG seed")]
    seed: u64,

    #[arg(long, default_value_t = 100, help = "Number of rounds")]
    rounds: u32,

    #[arg(long, default_value_t = 0, help = "Namespace to exercise")]
    namespace: u32,

    #[arg(long, help = "Print the tree at the end of each round")]
    dump: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RemovalArg {
    Retrace,
    Legacy,
}

impl From<RemovalArg> for RemovalBalance {
    fn from(value: RemovalArg) -> Self {
        match value {
            RemovalArg::Retrace => RemovalBalance::Retrace,
            RemovalArg::Legacy => RemovalBalance::Legacy,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();
    let options = load_options(&cli.manager)?;
    let mut manager = LockManager::new(options)?;

    match cli.command {
        Command::Scenario => run_scenario(&mut manager)?,
        Command::Stress(cmd) => run_stress(&mut manager, &cmd)?,
    }

    let snapshot = manager.stats().snapshot();
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        OutputFormat::Text => {
            println!(
                "requests={} added={} queued={} collisions={} pool_exhausted={}",
                snapshot.requests,
                snapshot.added,
                snapshot.queued,
                snapshot.collisions,
                snapshot.pool_exhausted
            );
            println!(
                "releases={} refused={} promotions={} compactions={} rotations={}",
                snapshot.releases,
                snapshot.refused_releases,
                snapshot.promotions,
                snapshot.compactions,
                snapshot.rotations
            );
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lbalock=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_options(args: &ManagerArgs) -> Result<LockManagerOptions, Box<dyn Error>> {
    let mut options = match &args.config {
        Some(path) => LockManagerOptions::from_toml_str(&std::fs::read_to_string(path)?)?,
        None => LockManagerOptions::default(),
    };
    if let Some(nodes) = args.max_nodes {
        options = options.max_nodes(nodes);
    }
    if let Some(namespaces) = args.max_namespaces {
        options = options.max_namespaces(namespaces);
    }
    if let Some(removal) = args.removal {
        options = options.removal_balance(removal.into());
    }
    options.validate()?;
    Ok(options)
}

fn run_scenario(manager: &mut LockManager) -> Result<(), Box<dyn Error>> {
    let ns = NamespaceId(0);
    let requests = [
        (1, 40, LockKind::Read),
        (1, 10, LockKind::Write),
        (8, 20, LockKind::Write),
        (21, 30, LockKind::Write),
        (31, 40, LockKind::Write),
        (1, 40, LockKind::Read),
    ];
    let mut handles = Vec::with_capacity(requests.len());
    for (start, end, kind) in requests {
        let outcome = manager.lock_request(start, end, kind, true, ns)?;
        println!("request {kind} [{start} -- {end}] => {outcome:?}");
        handles.extend(outcome.handle());
    }
    print!("{}", manager.dump(ns)?);

    println!("\nrelease #1");
    manager.lock_release(handles[0], ns)?;
    print!("{}", manager.dump(ns)?);

    println!("\nrelease #6 (still queued)");
    match manager.lock_release(handles[5], ns) {
        Err(err @ LockError::InvalidRelease { .. }) => println!("refused: {err}"),
        other => println!("unexpected: {other:?}"),
    }

    for idx in [1usize, 3, 4, 2, 5] {
        if manager.state(handles[idx]) != Some(LockState::Granted) {
            continue;
        }
        println!("\nrelease #{}", idx + 1);
        manager.lock_release(handles[idx], ns)?;
        print!("{}", manager.dump(ns)?);
    }
    let report = manager.verify(ns)?;
    println!(
        "\nremaining: {} granted, {} queued",
        report.residents, report.queued
    );
    Ok(())
}

fn run_stress(manager: &mut LockManager, cmd: &StressCmd) -> Result<(), Box<dyn Error>> {
    let ns = NamespaceId(cmd.namespace);
    let mut rng = ChaCha8Rng::seed_from_u64(cmd.seed);
    let capacity = manager.capacity() as u64;
    let strict = manager.options().removal_balance == RemovalBalance::Retrace;

    for round in 0..cmd.rounds {
        manager.initialize();
        let mut live: Vec<LockHandle> = Vec::new();

        // Half the pool as disjoint ranges, half as short overlapping ones.
        for i in 0..capacity / 2 {
            let start = i * 5;
            admit(manager, &mut rng, start, start + 4, ns, &mut live)?;
            check(manager, ns, strict)?;
        }
        for i in 0..capacity / 2 {
            let start = i + 1;
            let end = start + rng.gen_range(0..10);
            admit(manager, &mut rng, start, end, ns, &mut live)?;
            check(manager, ns, strict)?;
        }
        drain_randomly(manager, &mut rng, ns, &mut live, 0, strict)?;

        // Fill the pool, release all but two, refill to force compaction.
        for i in 0..capacity {
            admit(manager, &mut rng, i * 5, i * 5 + 4, ns, &mut live)?;
        }
        drain_randomly(manager, &mut rng, ns, &mut live, 2, strict)?;
        for i in 0..capacity {
            let start = (capacity + i) * 5;
            match admit(manager, &mut rng, start, start + 4, ns, &mut live) {
                Ok(()) | Err(LockError::PoolExhausted) => {}
                Err(err) => return Err(err.into()),
            }
            check(manager, ns, strict)?;
        }
        drain_randomly(manager, &mut rng, ns, &mut live, 0, strict)?;

        if cmd.dump {
            print!("{}", manager.dump(ns)?);
        }
        debug!(round, live = manager.live_count(), "stress.round");
    }
    info!(rounds = cmd.rounds, seed = cmd.seed, "stress complete");
    manager.stats().emit_tracing();
    Ok(())
}

fn admit(
    manager: &mut LockManager,
    rng: &mut ChaCha8Rng,
    start: u64,
    end: u64,
    ns: NamespaceId,
    live: &mut Vec<LockHandle>,
) -> Result<(), LockError> {
    let kind = if rng.gen_bool(0.5) {
        LockKind::Write
    } else {
        LockKind::Read
    };
    let outcome = manager.lock_request(start, end, kind, true, ns)?;
    live.extend(outcome.handle());
    Ok(())
}

/// Releases random granted locks until only `keep` requests remain.
fn drain_randomly(
    manager: &mut LockManager,
    rng: &mut ChaCha8Rng,
    ns: NamespaceId,
    live: &mut Vec<LockHandle>,
    keep: usize,
    strict: bool,
) -> Result<(), Box<dyn Error>> {
    while live.len() > keep {
        let granted: Vec<usize> = live
            .iter()
            .enumerate()
            .filter(|(_, handle)| manager.state(**handle) == Some(LockState::Granted))
            .map(|(idx, _)| idx)
            .collect();
        if granted.is_empty() {
            return Err("live requests remain but none is granted".into());
        }
        let idx = granted[rng.gen_range(0..granted.len())];
        let handle = live.swap_remove(idx);
        manager.lock_release(handle, ns)?;
        check(manager, ns, strict)?;
    }
    Ok(())
}

fn check(manager: &LockManager, ns: NamespaceId, strict: bool) -> Result<(), Box<dyn Error>> {
    let report = manager.verify(ns)?;
    let healthy = if strict {
        report.is_ok()
    } else {
        report.is_consistent()
    };
    if healthy {
        return Ok(());
    }
    let listing: Vec<String> = report.violations.iter().map(ToString::to_string).collect();
    Err(format!(
        "invariant violated: {}\n{}",
        listing.join("; "),
        manager.dump(ns)?
    )
    .into())
}
