use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use skillful::agent::{Agent, TurnOutcome};
use skillful::config::{self, Config, RetentionKind};
use skillful::llm::OllamaClient;
use skillful::session::SessionStore;
use skillful::skills::{SkillDescriptor, SkillRegistry, Visibility};

#[derive(Parser)]
#[command(name = "skillful")]
#[command(about = "Skill registry and tool-calling chat", long_about = None)]
struct Cli {
    /// Log at info level (RUST_LOG still takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config, workspace, bundled skills).
    Init {
        /// Config file path (default: SKILLFUL_CONFIG_PATH or ~/.skillful/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Inspect the skill registry.
    Skills {
        #[command(subcommand)]
        command: SkillsCommand,
    },

    /// List models available on the Ollama server.
    Models {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Chat with the agent (interactive). Type `help` for commands.
    Chat {
        /// Config file path (default: SKILLFUL_CONFIG_PATH or ~/.skillful/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Retention mode for the session: replace, accumulate or fifo
        #[arg(long, value_name = "MODE")]
        mode: Option<RetentionKind>,

        /// Entry bound for fifo retention
        #[arg(long, value_name = "N")]
        capacity: Option<usize>,

        /// Ollama model name (default: SKILLFUL_MODEL or agents.defaultModel)
        #[arg(long, short, value_name = "MODEL")]
        model: Option<String>,
    },
}

#[derive(Subcommand)]
enum SkillsCommand {
    /// List registered skills.
    List {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Include private and internal skills
        #[arg(long)]
        all: bool,
    },

    /// Search skills by name/description substring and tags.
    Search {
        /// Case-insensitive substring of name or description
        query: Option<String>,

        /// Tag to match (repeatable)
        #[arg(long = "tag", short, value_name = "TAG")]
        tags: Vec<String>,

        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Show one skill and its operations.
    Show {
        name: String,

        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("skillful {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Init { config }) => run_init(config),
        Some(Commands::Skills { command }) => run_skills(command),
        Some(Commands::Models { config }) => run_models(config).await,
        Some(Commands::Chat {
            config,
            mode,
            capacity,
            model,
        }) => run_chat(config, mode, capacity, model).await,
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };
    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(config::default_config_path);
    let summary = skillful::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", summary.config_dir.display());
    for p in &summary.created {
        println!("  created {}", p.display());
    }
    Ok(())
}

/// Load and validate config, then build the registry. Load errors are logged, not fatal.
fn load(config_path: Option<PathBuf>) -> anyhow::Result<(Config, PathBuf, SkillRegistry)> {
    let (config, path) = config::load_config(config_path)?;
    config.validate()?;
    let (registry, report) = config::discover_skills(&config, &path);
    for e in &report.errors {
        log::warn!("skill not loaded: {}", e);
    }
    log::info!("{} skills registered", registry.len());
    Ok((config, path, registry))
}

fn print_skill_line(s: &SkillDescriptor) {
    let tags = if s.tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", s.tags.join(", "))
    };
    let vis = if s.visibility == Visibility::Public {
        String::new()
    } else {
        format!(" ({})", s.visibility)
    };
    println!("{}{}{}: {}", s.name, vis, tags, s.description);
}

fn run_skills(command: SkillsCommand) -> anyhow::Result<()> {
    match command {
        SkillsCommand::List { config, all } => {
            let (config, _, registry) = load(config)?;
            let allowed = if all {
                Visibility::ALL.to_vec()
            } else {
                config.middleware.to_filter_config().allowed_visibilities
            };
            let skills = registry.list_visible(&allowed);
            if skills.is_empty() {
                println!("no skills registered");
            }
            for s in skills {
                print_skill_line(&s);
            }
        }
        SkillsCommand::Search {
            query,
            tags,
            config,
        } => {
            let (_, _, registry) = load(config)?;
            let found = registry.search(query.as_deref().unwrap_or(""), &tags);
            if found.is_empty() {
                println!("no matching skills");
            }
            for s in found {
                print_skill_line(&s);
            }
        }
        SkillsCommand::Show { name, config } => {
            let (_, _, registry) = load(config)?;
            let s = registry.lookup(&name)?;
            println!("name:        {}", s.name);
            println!("description: {}", s.description);
            println!("visibility:  {}", s.visibility);
            println!("version:     {}", s.version);
            if !s.author.is_empty() {
                println!("author:      {}", s.author);
            }
            if !s.tags.is_empty() {
                println!("tags:        {}", s.tags.join(", "));
            }
            if !s.dependencies.is_empty() {
                println!("depends on:  {}", s.dependencies.join(", "));
            }
            println!("origin:      {}", s.origin);
            println!("operations:");
            for op in &s.operations {
                println!("  {}: {}", op.name, op.description);
                println!("    parameters: {}", op.parameters);
            }
        }
    }
    Ok(())
}

async fn run_models(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (config, _) = config::load_config(config_path)?;
    let client = OllamaClient::new(config::resolve_llm_base_url(&config));
    let models = client.list_models().await?;
    if models.is_empty() {
        println!("no models on {}", client.base_url());
    }
    let default_model = config::resolve_model(&config);
    for m in models {
        let marker = if m.name == default_model { " (default)" } else { "" };
        match m.size {
            Some(size) => println!("{}{}  {:.1} GB", m.name, marker, size as f64 / 1e9),
            None => println!("{}{}", m.name, marker),
        }
    }
    Ok(())
}

const CHAT_HELP: &str = "commands: help, new (start a new session), clear (forget history), skills (list offered skills), quit";

async fn run_chat(
    config_path: Option<PathBuf>,
    mode: Option<RetentionKind>,
    capacity: Option<usize>,
    model: Option<String>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (mut config, path, registry) = load(config_path)?;
    skillful::init::require_initialized(&path, &config)?;
    if let Some(m) = mode {
        config.retention.mode = m;
    }
    if let Some(c) = capacity {
        config.retention.capacity = c;
    }
    config.validate()?;

    let model = model.unwrap_or_else(|| config::resolve_model(&config));
    let backend = OllamaClient::new(config::resolve_llm_base_url(&config));
    let instructions = config.agents.system_prompt.clone().or_else(|| {
        skillful::prompt::load_agent_ctx(config::resolve_workspace_dir(&config).as_deref())
    });
    let agent = Agent::new(Arc::new(registry), backend, model)
        .with_filter(config.middleware.build_filter())
        .with_max_turns(config.agents.max_turns)
        .with_instructions(instructions);

    let store = SessionStore::new(config.retention.to_mode());
    let mut session_id = store.create().await?;
    println!(
        "skillful chat: {} skills, retention {}, model {}. Type `help` for commands.",
        agent.registry().len(),
        store.mode(),
        if agent.model().is_empty() { "(default)" } else { agent.model() }
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input.trim_start_matches('/').to_ascii_lowercase().as_str() {
            "quit" | "exit" => break,
            "help" => {
                println!("{}", CHAT_HELP);
                continue;
            }
            "new" => {
                store.remove(&session_id).await;
                session_id = store.create().await?;
                println!("started new session {}", session_id);
                continue;
            }
            "clear" => {
                if let Some(s) = store.get(&session_id).await {
                    s.lock().await.clear();
                }
                println!("history cleared");
                continue;
            }
            "skills" => {
                let allowed = agent.filter().config().allowed_visibilities.clone();
                for s in agent.registry().list_visible(&allowed) {
                    print_skill_line(&s);
                }
                continue;
            }
            _ => {}
        }

        match agent.run_in(&store, &session_id, input).await {
            Ok(res) => {
                if config.middleware.verbose {
                    println!(
                        "[offered: {}{}; rounds: {}]",
                        res.visibility.names.join(", "),
                        if res.visibility.fell_back { " (fallback)" } else { "" },
                        res.rounds
                    );
                    for call in &res.tool_calls {
                        println!("[{}({}) -> {}]", call.name, call.arguments, call.output.trim());
                    }
                }
                println!("< {}", res.content.trim());
                if res.outcome == TurnOutcome::BudgetExhausted {
                    println!("(stopped after {} model rounds)", res.rounds);
                }
            }
            Err(e) => {
                eprintln!("chat error: {}", e);
            }
        }
    }

    Ok(())
}
