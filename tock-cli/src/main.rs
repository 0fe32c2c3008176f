mod config;
mod console;
mod state;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tock_core::parse::Match;
use tock_core::{
    ChannelId, Clock, CommandProcessor, JsonFileRepository, Repository, Scheduler, TaskStore,
    UserId,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, init_config, load_config};
use crate::console::{Console, ConsoleSender};

#[derive(Parser)]
#[command(name = "tock", version, about = "Timezone-aware reminder bot, console edition")]
struct Cli {
    /// Data file (overrides [storage] data_file)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat with the bot on stdin while the scheduler runs
    Run {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        channel: Option<String>,
        /// Virtual time speed factor
        #[arg(long)]
        speed: Option<f64>,
        #[arg(long)]
        tick_ms: Option<u64>,
    },

    /// Show which command a message parses as, without acting on it
    Parse {
        #[arg(required = true)]
        message: Vec<String>,
    },

    /// Manage ~/.tock/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write the default config if none exists
    Init,
    /// Print the effective config
    Show,
}

fn init_tracing(cfg: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cfg.log.filter.as_deref().unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config()?;
    init_tracing(&cfg);

    match cli.command {
        Command::Run {
            user,
            channel,
            speed,
            tick_ms,
        } => {
            let data_file = match cli.data {
                Some(path) => path,
                None => cfg.data_file()?,
            };
            let speed = speed.unwrap_or(cfg.scheduler.speed_factor);
            if speed.is_nan() || speed <= 0.0 {
                bail!("speed factor must be positive, got {speed}");
            }
            let tick = Duration::from_millis(tick_ms.unwrap_or(cfg.scheduler.tick_ms).max(1));
            let user = UserId::new(user.unwrap_or_else(|| cfg.bot.user_id.clone()));
            let channel = ChannelId::new(channel.unwrap_or_else(|| cfg.bot.channel_id.clone()));
            run(data_file, speed, tick, user, channel).await?;
        }
        Command::Parse { message } => {
            let processor = CommandProcessor::new(
                Arc::new(TaskStore::new()),
                Clock::system(),
                Arc::new(ConsoleSender::new()),
            );
            let text = message.join(" ");
            match processor.parse(&text) {
                None => println!("no command matched"),
                Some(parsed) => {
                    let tz = if parsed.needs_tz { " (needs timezone)" } else { "" };
                    match &parsed.outcome {
                        Match::NoMatch => println!("no command matched"),
                        Match::Values(args) => println!("{:?}{tz}: {args:?}", parsed.handler),
                        Match::Warnings(warnings) => {
                            println!("{:?}{tz} with warnings:", parsed.handler);
                            for w in warnings {
                                println!("  {}", w.as_str());
                            }
                        }
                    }
                }
            }
        }
        Command::Config { command } => match command {
            ConfigCommand::Init => init_config()?,
            ConfigCommand::Show => {
                let text = toml::to_string_pretty(&cfg).context("serialize config")?;
                print!("{text}");
            }
        },
    }

    Ok(())
}

async fn run(
    data_file: PathBuf,
    speed: f64,
    tick: Duration,
    user: UserId,
    channel: ChannelId,
) -> Result<()> {
    let repo: Arc<dyn Repository> = Arc::new(JsonFileRepository::new(&data_file));
    let store = Arc::new(
        TaskStore::load_from(repo)
            .with_context(|| format!("load {}", data_file.display()))?,
    );
    info!(path = %data_file.display(), alerts = store.len(), "store loaded");

    let clock = Clock::system();
    clock.set_speed(speed);
    let sender = Arc::new(ConsoleSender::new());

    let scheduler =
        Scheduler::new(store.clone(), clock.clone(), sender.clone()).with_tick(tick);
    let worker = tokio::spawn(async move { scheduler.run().await });

    let console = Console {
        processor: CommandProcessor::new(store.clone(), clock.clone(), sender),
        store: store.clone(),
        clock,
        user,
        channel,
    };
    let result = console.run().await;

    worker.abort();
    store.save().context("save store")?;
    result
}
