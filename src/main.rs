use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use hogwatch::collector::LinuxProcessCollector;
use hogwatch::config::Config;
use hogwatch::daemon;
use hogwatch::executor::{ProcessKiller, SignalKiller};
use hogwatch::matcher::IgnoreList;
use hogwatch::notifier::DesktopNotifier;
use hogwatch::resolver::{KillResolver, KillTarget, StdinPrompt};
use hogwatch::sampler::Sampler;
use hogwatch::watcher::{WatchPolicy, Watcher, NOTIFY_WAIT};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(
    name = "hogwatch",
    version,
    about = "Alerts on or kills processes that cross the CPU line"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    /// Show debug output
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start watching in the background (the default)
    Start(WatchArgs),
    /// Run the watch loop in the current terminal
    Watch(WatchArgs),
    /// Stop a running background watcher
    Stop,
    /// Show the current top CPU consumers
    Top,
    /// List processes matching a pid, :port, or name pattern
    List {
        target: String,
    },
    /// Kill a process by pid, :port, or name pattern
    Kill {
        target: String,
        /// Answer yes to every question
        #[arg(long, visible_alias = "no-questions-asked")]
        yes: bool,
    },
}

#[derive(Args, Clone, Default)]
struct WatchArgs {
    /// Alert when any process passes this CPU share
    #[arg(long, value_name = "PERCENT")]
    alert: Option<f64>,
    /// Kill on sight above this CPU share (0 disables)
    #[arg(long, value_name = "PERCENT")]
    limit: Option<f64>,
    /// Seconds between checks
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,
    /// Ignore processes matching a pattern, % matches anything (repeatable)
    #[arg(long = "ignore", value_name = "PATTERN")]
    ignore: Vec<String>,
    /// Alert even for ignored processes
    #[arg(long)]
    alert_ignored: bool,
    /// Marks the detached background copy in the process table
    #[arg(long = "watch-daemon", hide = true)]
    daemon_marker: bool,
}

struct WatchSettings {
    alert_threshold: f64,
    kill_limit: f64,
    interval_seconds: u64,
    patterns: Vec<String>,
    alert_ignored: bool,
}

impl WatchSettings {
    fn effective(config: &Config, args: &WatchArgs) -> Self {
        let mut patterns = config.ignore.patterns.clone();
        patterns.extend(args.ignore.iter().cloned());
        WatchSettings {
            alert_threshold: args.alert.unwrap_or(config.watch.alert_threshold),
            kill_limit: args.limit.unwrap_or(config.watch.kill_limit),
            interval_seconds: args.interval.unwrap_or(config.watch.interval_seconds).max(1),
            patterns,
            alert_ignored: args.alert_ignored || config.ignore.alert_ignored,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let config_path = Config::config_path();
    let config = if config_path.exists() {
        Config::load(&config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        })
    } else {
        Config::default()
    };

    match cli.command.unwrap_or(Command::Start(WatchArgs::default())) {
        Command::Start(args) => start(&args, cli.verbose),
        Command::Watch(args) => watch(&config, &args).await,
        Command::Stop => stop(),
        Command::Top => top().await,
        Command::List { target } => list(&target),
        Command::Kill { target, yes } => kill(&target, yes).await,
    }

    Ok(())
}

fn start(args: &WatchArgs, verbose: bool) {
    let collector = LinuxProcessCollector::new();
    if let Some(pid) = daemon::find_running(&collector) {
        println!("hogwatch is already running (pid {}).", pid);
        return;
    }

    let mut argv = vec!["watch".to_string(), daemon::DAEMON_FLAG.to_string()];
    if let Some(alert) = args.alert {
        argv.push(format!("--alert={}", alert));
    }
    if let Some(limit) = args.limit {
        argv.push(format!("--limit={}", limit));
    }
    if let Some(interval) = args.interval {
        argv.push(format!("--interval={}", interval));
    }
    for pattern in &args.ignore {
        argv.push(format!("--ignore={}", pattern));
    }
    if args.alert_ignored {
        argv.push("--alert-ignored".to_string());
    }
    if verbose {
        argv.push("--verbose".to_string());
    }

    match daemon::spawn_detached(&argv) {
        Ok(pid) => {
            println!("Watching in the background (pid {}).", pid);
            println!("To stop it, run `hogwatch stop`.");
        }
        Err(e) => eprintln!("Could not start the background watcher: {}", e),
    }
}

async fn watch(config: &Config, args: &WatchArgs) {
    if args.daemon_marker {
        debug!("Running as the detached background copy");
    }
    let settings = WatchSettings::effective(config, args);
    let policy = WatchPolicy {
        alert_threshold: settings.alert_threshold,
        kill_limit: settings.kill_limit,
        alert_ignored: settings.alert_ignored,
    };
    let ignore = IgnoreList::from_specs(&settings.patterns);

    let watcher = Watcher::new(
        LinuxProcessCollector::new(),
        DesktopNotifier::new(NOTIFY_WAIT),
        SignalKiller,
        ignore,
        policy,
    );
    watcher.run(Duration::from_secs(settings.interval_seconds)).await;
}

fn stop() {
    let collector = LinuxProcessCollector::new();
    match daemon::find_running(&collector) {
        Some(pid) => match SignalKiller.terminate(pid) {
            Ok(_) => {
                info!("Stopped background watcher (pid {})", pid);
                println!("hogwatch is done here.");
            }
            Err(e) => eprintln!("{}", e),
        },
        None => println!("hogwatch wasn't running in the background."),
    }
}

async fn top() {
    let sampler = Sampler::new(LinuxProcessCollector::new());
    // Two passes with a short window, so CPU shares are current rather than
    // lifetime averages.
    sampler.prime();
    tokio::time::sleep(Duration::from_millis(400)).await;

    let line = "+---------+---------+-------------------";
    println!("{}", line);
    println!("|   PID   |   CPU   | Process Name");
    println!("{}", line);
    for p in sampler.top_n(5) {
        println!("| {:<7} | {:>6.1}% | {}", p.pid, p.cpu_percent, p.name);
    }
    println!("{}", line);
}

fn list(target: &str) {
    let target = match KillTarget::parse(target) {
        Ok(target) => target,
        Err(e) => {
            println!("{}", e);
            return;
        }
    };
    let resolver = KillResolver::new(LinuxProcessCollector::new(), SignalKiller, StdinPrompt, false);
    let processes = resolver.resolve(&target);
    for p in &processes {
        println!("{:<8} {}", p.pid, p.name);
    }
    println!("{} matching processes", processes.len());
}

async fn kill(target: &str, yes: bool) {
    let target = match KillTarget::parse(target) {
        Ok(target) => target,
        Err(e) => {
            println!("{}", e);
            return;
        }
    };
    let resolver = KillResolver::new(LinuxProcessCollector::new(), SignalKiller, StdinPrompt, yes);
    resolver.execute(&target).await;
}
