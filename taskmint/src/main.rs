//! `TaskMint`: task tracker whose completed tasks earn on-chain rewards.
//!
//! A line-oriented REPL over the synchronization core. Without an API
//! URL it runs against in-process backends.
//!
//! ```bash
//! # Offline, with a demo account
//! cargo run --bin taskmint -- --address 0x00000000000000000000000000000000000a11ce
//!
//! # Against a backend
//! TASKMINT_API_URL=http://127.0.0.1:8000 TASKMINT_ADDRESS=0x... cargo run
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use taskmint::app::{App, Command, HELP};
use taskmint::config::{CliArgs, ClientConfig};
use taskmint::notify::{Notice, Notifier};
use taskmint::remote::memory::{MemoryRewardAuthority, MemoryTaskStore};
use taskmint::remote::rest::{RestRewardAuthority, RestTaskStore};
use taskmint::remote::{RewardAuthority, TaskStore};
use taskmint::wallet::loopback::LoopbackWallet;

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config: {e}");
            ClientConfig::default()
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!("taskmint starting");

    let (notifier, notices) = Notifier::channel(config.notice_buffer);
    let accounts = config.wallet_address.iter().cloned().collect();
    let wallet = LoopbackWallet::new(accounts, config.chain_id);

    let result = match config.api_base() {
        Some(base) => {
            let store = RestTaskStore::new(base, config.request_timeout);
            let authority = RestRewardAuthority::new(base, config.request_timeout);
            match (store, authority) {
                (Ok(store), Ok(authority)) => {
                    println!("Using backend at {base}");
                    let app = App::new(Arc::new(store), Arc::new(authority), &config, notifier);
                    run(app, wallet, notices, &config).await
                }
                (Err(e), _) | (_, Err(e)) => {
                    eprintln!("Invalid API URL {base}: {e}");
                    return Ok(());
                }
            }
        }
        None => {
            println!("No API URL configured; running offline");
            let store = Arc::new(MemoryTaskStore::new());
            let authority = MemoryRewardAuthority::tracking(Arc::clone(&store));
            let app = App::new(store, Arc::new(authority), &config, notifier);
            run(app, wallet, notices, &config).await
        }
    };

    tracing::info!("taskmint exiting");
    result
}

/// Initialize file-based logging.
///
/// Logs go to a file so they don't interleave with the REPL. The
/// returned [`WorkerGuard`] must be held until shutdown to flush
/// buffered entries.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskmint.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// REPL loop: reads commands and prints notices as they arrive.
async fn run<S: TaskStore, A: RewardAuthority + 'static>(
    app: App<S, A>,
    wallet: LoopbackWallet,
    mut notices: mpsc::Receiver<Notice>,
    config: &ClientConfig,
) -> io::Result<()> {
    println!("{HELP}");
    if config.wallet_address.is_some() {
        connect(&app, &wallet).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => execute(&app, &wallet, command, config).await,
                    Err(taskmint::app::CommandError::Empty) => {}
                    Err(e) => println!("{e}"),
                }
            }
            Some(notice) = notices.recv() => print_notice(&notice, &config.timestamp_format),
        }
    }

    app.shutdown();
    while let Ok(notice) = notices.try_recv() {
        print_notice(&notice, &config.timestamp_format);
    }
    Ok(())
}

async fn connect<S: TaskStore, A: RewardAuthority + 'static>(app: &App<S, A>, wallet: &LoopbackWallet) {
    match app.identity.connect(wallet).await {
        Ok(address) => {
            println!("Connected as {}", address.short());
            if let Err(e) = app.tasks.refresh(app.tasks.filter()).await {
                println!("{}", e.user_message());
            }
        }
        Err(e) => println!("{e}"),
    }
}

#[allow(clippy::too_many_lines)]
async fn execute<S: TaskStore, A: RewardAuthority + 'static>(
    app: &App<S, A>,
    wallet: &LoopbackWallet,
    command: Command,
    config: &ClientConfig,
) {
    match command {
        Command::List(filter) => {
            let filter = filter.unwrap_or_else(|| app.tasks.filter());
            if let Err(e) = app.tasks.refresh(filter).await {
                println!("{}", e.user_message());
            }
            let tasks = app.tasks.tasks(filter);
            if tasks.is_empty() {
                println!("No {filter} tasks");
            }
            for task in tasks {
                let mark = if task.completed { "x" } else { " " };
                let busy = if app.tasks.is_pending(&task.id) { " …" } else { "" };
                println!("[{mark}] {}  {}{busy}", task.id, task.text);
            }
        }
        Command::Add(text) => match app.tasks.create(&text).await {
            Ok(task) => println!("Added {}", task.id),
            Err(e) => println!("{}", e.user_message()),
        },
        Command::Toggle(id) => match app.tasks.toggle_completion(&id).await {
            Ok(task) => {
                let state = if task.completed { "completed" } else { "active" };
                println!("{} is now {state}", task.id);
            }
            Err(e) => println!("{}", e.user_message()),
        },
        Command::Edit(id, text) => match app.tasks.edit_text(&id, &text).await {
            Ok(task) => println!("{}: {}", task.id, task.text),
            Err(e) => println!("{}", e.user_message()),
        },
        Command::Remove(id) => match app.tasks.delete(&id).await {
            Ok(()) => println!("Deleted {id}"),
            Err(e) => println!("{}", e.user_message()),
        },
        Command::Status => {
            let status = app.status();
            let Some(identity) = status.identity else {
                println!("Not connected");
                return;
            };
            let snapshot = status.snapshot;
            println!(
                "{} on {}",
                identity.short(),
                app.identity.supported_chain().label()
            );
            println!(
                "completed {} | claimed {} | claimable {}",
                snapshot.completed_count(),
                snapshot.claimed_milestone(),
                snapshot.claimable_count()
            );
            println!(
                "{} more tasks to reach {} ({:.0}%)",
                snapshot.tasks_until_next(),
                snapshot.next_milestone(),
                snapshot.progress_fraction() * 100.0
            );
            if let Some(at) = status.last_synced {
                println!(
                    "synced at {}",
                    at.with_timezone(&Local).format(&config.timestamp_format)
                );
            }
            if status.claim_pending {
                println!("claim in progress");
            } else if app.claims.can_claim() {
                println!("a reward is ready: run `claim`");
            }
        }
        Command::Claim => match app.claim().await {
            Ok(receipt) => println!("Claimed: {}", receipt.transaction_hash),
            Err(e) => println!("{}", e.user_message()),
        },
        Command::Connect => connect(app, wallet).await,
        Command::Switch(accounts) => {
            wallet.switch_accounts(accounts);
            if app.identity.current().is_none() {
                println!("Run `connect` to use the new account");
            }
        }
        Command::Chain(raw) => {
            let payload = if raw.starts_with("0x") {
                raw
            } else {
                raw.parse::<u64>().map_or(raw, |n| format!("{n:#x}"))
            };
            wallet.switch_chain(&payload);
        }
        Command::Disconnect => {
            app.identity.disconnect();
            println!("Disconnected");
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

fn print_notice(notice: &Notice, format: &str) {
    println!(
        "{} [{}] {}",
        Local::now().format(format),
        notice.level,
        notice.message
    );
}
