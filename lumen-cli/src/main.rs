//! CLI entry point for lumen

mod repl;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use lumen_agent::{HistoryStore, SessionController, SessionView};
use lumen_core::config::{Config, ConfigLoader, StorageBackend};
use lumen_core::logging::init_logging;
use lumen_core::session::{Role, Turn};
use lumen_core::utils::{expand_tilde, mask_secret, truncate};
use lumen_providers::GeminiConnector;
use lumen_store::open_store;
use repl::Input;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const HISTORY_PREVIEW_LEN: usize = 240;

#[derive(Parser)]
#[command(name = "lumen")]
#[command(about = "A personal assistant for your career, meals, health goals and tasks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,

    /// User whose profile and history are used
    #[arg(short, long, global = true, default_value = "local")]
    user: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat
    Chat,
    /// Send a single message and print the reply
    Ask {
        /// Message to send
        message: String,
        /// Image to attach
        #[arg(short, long)]
        image: Option<PathBuf>,
        /// Print the resulting conversation as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear stored history and start over
    Reset,
    /// Print the stored conversation
    History {
        /// Only show the most recent N turns
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print full turn text
        #[arg(long)]
        full: bool,
    },
    /// Show resolved configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };
    let config = loader.load()?;
    let _log_guard = init_logging(&config.logging);

    match cli.command {
        Commands::Chat => {
            info!("Starting chat for user {}", cli.user);
            run_chat(&config, &cli.user).await?;
        }
        Commands::Ask {
            message,
            image,
            json,
        } => {
            run_ask(&config, &cli.user, &message, image, json).await?;
        }
        Commands::Reset => {
            info!("Resetting conversation for user {}", cli.user);
            run_reset(&config, &cli.user).await?;
        }
        Commands::History { limit, full } => {
            run_history(&config, &cli.user, limit, full).await?;
        }
        Commands::Status => {
            run_status(&loader, &config, &cli.user);
        }
    }

    Ok(())
}

fn build_controller(config: &Config) -> SessionController {
    let store = open_store(&config.storage);
    let connector = Arc::new(GeminiConnector::new(
        &config.providers.gemini,
        &config.assistant,
    ));
    SessionController::from_config(config, store, connector)
}

async fn start_session(config: &Config, user: &str) -> Result<SessionController> {
    let controller = build_controller(config);
    controller
        .initialize_session(user, Some(config.providers.gemini.api_key.as_str()))
        .await?;
    Ok(controller)
}

fn print_turn(turn: &Turn, persona: &str) {
    let label = match turn.role() {
        Role::User => style("you".to_string()).bold().green(),
        Role::Assistant => style(persona.to_lowercase()).bold().cyan(),
    };
    println!("{} {}\n", label, repl::describe_parts(turn));
}

fn print_new_turns(view: &SessionView, from: usize, persona: &str) {
    for turn in view.turns.iter().skip(from) {
        print_turn(turn, persona);
    }
}

async fn run_chat(config: &Config, user: &str) -> Result<()> {
    let persona = config.assistant.persona_name.as_str();
    let controller = start_session(config, user).await?;

    println!(
        "{}",
        style(format!("{} (type /image <path> [caption], /reset or /quit)", persona)).bold()
    );
    println!();
    print_new_turns(&controller.view(), 0, persona);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", style(">").dim());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match repl::parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Reset => match controller.reset_session().await {
                Ok(view) => {
                    let last = view.turns.len().saturating_sub(1);
                    print_new_turns(&view, last, persona);
                }
                Err(e) => println!("{}", style(e).yellow()),
            },
            Input::Message { text, image } => {
                let attachment = match image {
                    Some(path) => match repl::load_image(&path).await {
                        Ok(attachment) => Some(attachment),
                        Err(e) => {
                            println!("{}", style(format!("{:#}", e)).red());
                            continue;
                        }
                    },
                    None => None,
                };

                // The user's own line is already on screen
                let shown = controller.view().turns.len() + 1;
                match controller.send_message(&text, attachment).await {
                    Ok(view) => print_new_turns(&view, shown, persona),
                    Err(e) => println!("{}", style(e).yellow()),
                }
            }
        }
    }

    Ok(())
}

async fn run_ask(
    config: &Config,
    user: &str,
    message: &str,
    image: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let attachment = match image {
        Some(path) => Some(repl::load_image(&path).await?),
        None => None,
    };

    let controller = start_session(config, user).await?;
    let view = controller.send_message(message, attachment).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else if let Some(reply) = view.turns.last() {
        println!("{}", repl::describe_parts(reply));
    }
    Ok(())
}

async fn run_reset(config: &Config, user: &str) -> Result<()> {
    let controller = start_session(config, user).await?;
    let view = controller.reset_session().await?;
    if let Some(turn) = view.turns.last() {
        println!("{}", repl::describe_parts(turn));
    }
    Ok(())
}

async fn run_history(config: &Config, user: &str, limit: Option<usize>, full: bool) -> Result<()> {
    let history = HistoryStore::new(open_store(&config.storage));
    let Some(turns) = history.load(user).await? else {
        println!("No stored history for {}", user);
        return Ok(());
    };

    let skip = limit.map_or(0, |limit| turns.len().saturating_sub(limit));
    if skip > 0 {
        println!("{}", style(format!("({} earlier turns hidden)", skip)).dim());
    }
    let persona = config.assistant.persona_name.as_str();
    for turn in &turns[skip..] {
        let body = repl::describe_parts(turn);
        let body = if full {
            body
        } else {
            truncate(&body, HISTORY_PREVIEW_LEN)
        };
        let label = match turn.role() {
            Role::User => "you".to_string(),
            Role::Assistant => persona.to_lowercase(),
        };
        println!("{} {}", style(label).bold(), body);
    }
    Ok(())
}

fn run_status(loader: &ConfigLoader, config: &Config, user: &str) {
    println!("{}", style("Lumen Status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    let config_path = loader.config_path();
    let found = if config_path.exists() {
        style("found").green()
    } else {
        style("not found, using defaults").dim()
    };
    println!("  Config file: {} ({})", config_path.display(), found);
    println!("  User: {}", user);
    println!();

    println!("{}", style("Assistant:").bold());
    let assistant = &config.assistant;
    println!("  Persona: {}", assistant.persona_name);
    println!("  Model: {}", assistant.model);
    println!("  Request timeout: {}s", assistant.request_timeout_secs);
    println!("  Recent tasks in context: {}", assistant.task_limit);
    println!();

    println!("{}", style("Providers:").bold());
    let gemini = &config.providers.gemini;
    let key_status = if gemini.api_key.trim().is_empty() {
        warn!("Gemini API key is not configured");
        style("not configured").red()
    } else {
        style("configured").green()
    };
    println!(
        "  gemini: {} ({})",
        key_status,
        mask_secret(&gemini.api_key)
    );
    println!("  API base: {}", gemini.api_base);
    println!();

    println!("{}", style("Storage:").bold());
    let storage = &config.storage;
    match storage.backend {
        StorageBackend::File => {
            println!("  Backend: file");
            println!("  Directory: {}", expand_tilde(&storage.dir).display());
        }
        StorageBackend::Memory => {
            println!("  Backend: memory (nothing is persisted)");
        }
        StorageBackend::Rest => {
            println!("  Backend: rest");
            println!("  URL: {}", storage.rest.url);
            println!("  API key: {}", mask_secret(&storage.rest.api_key));
            println!("  Access token: {}", mask_secret(&storage.rest.access_token));
        }
    }
    println!();

    println!("{}", style("Logging:").bold());
    println!("  Level: {}", config.logging.level);
    println!("  Directory: {}", expand_tilde(&config.logging.dir).display());
}
