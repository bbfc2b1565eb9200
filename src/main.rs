use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use foreman::agents::coder::{CodeBackend, GeneratingBackend, StubBackend};
use foreman::agents::router::{KeywordClassifier, LlmClassifier, StepClassifier};
use foreman::banner::{BannerInfo, print_banner, print_session_summary};
use foreman::commands::{CommandRegistry, CommandResult, SessionInfo, StateChange};
use foreman::config::{self, Config};
use foreman::consts::{DEFAULT_MODEL, default_db_path};
use foreman::engine::workflow::{Providers, WorkflowConfig, WorkflowEngine};
use foreman::engine::{Engine, Node, RunReport};
use foreman::error::WorkflowError;
use foreman::events::{Event, EventBus};
use foreman::provider::anthropic::AnthropicGenerator;
use foreman::provider::human::HumanGenerator;
use foreman::provider::tavily::TavilySearcher;
use foreman::provider::{Generator, NoSearch, Searcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Provider {
    Anthropic,
    Human,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Search {
    Tavily,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Router {
    Llm,
    Keyword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Coder {
    Stub,
    Generate,
}

#[derive(Parser)]
#[command(name = "foreman", version, about = "Plans the work, then works the plan.")]
struct Cli {
    /// Text-generation provider
    #[arg(short, long, value_enum, default_value_t = Provider::Anthropic)]
    provider: Provider,

    /// Model name (provider-specific, ignored for human)
    #[arg(long)]
    model: Option<String>,

    /// Web-search backend [default: tavily when TAVILY_API_KEY is set]
    #[arg(short, long, value_enum)]
    search: Option<Search>,

    /// How plan steps are classified [default: stored preference, else llm]
    #[arg(long, value_enum)]
    router: Option<Router>,

    /// Backend for coding steps
    #[arg(long, value_enum, default_value_t = Coder::Stub)]
    coder: Coder,

    /// Node executions allowed per run
    #[arg(long, default_value_t = 32)]
    max_steps: usize,

    /// Replanning rounds allowed per run
    #[arg(long, default_value_t = 2)]
    max_replans: usize,

    /// Search hits requested per research step [default: stored preference, else 1]
    #[arg(long)]
    search_results: Option<usize>,

    /// Timeout for a single provider call, in seconds
    #[arg(long, default_value_t = 60)]
    call_timeout: u64,

    /// Deadline for a whole run, in seconds
    #[arg(long, default_value_t = 300)]
    deadline: u64,

    /// SQLite database for preferences (use :memory: for ephemeral)
    #[arg(short, long)]
    db: Option<String>,

    /// Run a single task and exit (non-interactive)
    #[arg(short, long)]
    run: Option<String>,

    /// Generate each reply in one call instead of streaming it
    #[arg(long, default_value_t = false)]
    no_stream: bool,

    /// With --run, print the run report as JSON instead of streaming output
    #[arg(long, default_value_t = false, requires = "run")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,foreman=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let db = match &cli.db {
        Some(db) => db.clone(),
        None => {
            let path = default_db_path();
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
            path.to_string_lossy().into_owned()
        }
    };
    let prefs = Config::open(&db)?;

    let model = match cli.model.clone() {
        Some(model) => model,
        None => prefs
            .get(config::MODEL)?
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
    };
    let router = match cli.router {
        Some(router) => router,
        None => match prefs.get(config::ROUTER)?.as_deref() {
            Some("keyword") => Router::Keyword,
            _ => Router::Llm,
        },
    };
    let search_results = match cli.search_results {
        Some(n) => n,
        None => prefs.get_parsed(config::SEARCH_RESULTS)?.unwrap_or(1),
    };
    if search_results == 0 {
        bail!("--search-results must be at least 1");
    }

    let generator = build_generator(cli.provider, &model)?;
    let (searcher, search_label) = build_searcher(cli.search)?;
    let coder: Arc<dyn CodeBackend> = match cli.coder {
        Coder::Stub => Arc::new(StubBackend),
        Coder::Generate => Arc::new(GeneratingBackend),
    };

    let providers = Providers::new(Arc::clone(&generator), searcher)
        .with_classifier(build_classifier(router))
        .with_coder(coder);

    let workflow_config = WorkflowConfig {
        max_steps: cli.max_steps,
        max_replans: cli.max_replans,
        search_results,
        call_timeout: Duration::from_secs(cli.call_timeout),
        run_deadline: Duration::from_secs(cli.deadline),
        stream: !cli.no_stream,
    };
    let mut engine = WorkflowEngine::new(providers, workflow_config);

    // Single task mode
    if let Some(task) = &cli.run {
        if cli.json {
            let report = engine.run(task).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        print_banner(&banner_info(&cli, &model, search_label, router, &db));
        run_task(&mut engine, task).await;
        print_session_summary(engine.session_usage());
        return Ok(());
    }

    print_banner(&banner_info(&cli, &model, search_label, router, &db));

    let registry = CommandRegistry::new();
    let mut model = model;

    // REPL: async stdin so Ctrl+C is caught at the prompt too
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("\nforeman> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            result = lines.next_line() => {
                match result {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        // Ctrl+D (EOF)
                        println!();
                        break;
                    }
                    Err(e) => {
                        eprintln!("input error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let info = SessionInfo {
            provider: provider_label(cli.provider),
            model: &model,
            usage: engine.session_usage(),
            last_state: engine.last_state(),
            config: Some(&prefs),
        };
        match registry.dispatch(input, &info).await {
            CommandResult::NotACommand => {}
            CommandResult::Handled => continue,
            CommandResult::Quit => break,
            CommandResult::StateChanged(change) => {
                if let Err(e) = apply_change(&mut engine, cli.provider, &mut model, change) {
                    eprintln!("  ✗ {e}");
                }
                continue;
            }
        }

        run_task(&mut engine, input).await;
    }

    print_session_summary(engine.session_usage());
    Ok(())
}

/// Run one task with a console renderer attached. Ctrl+C cancels the run,
/// not the REPL.
async fn run_task(engine: &mut WorkflowEngine, task: &str) {
    let renderer = spawn_renderer(&engine.events());

    let interrupted = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let result = engine.run_until(task, interrupted).await;
    // The renderer stops on the terminal event; let it drain first.
    let _ = renderer.await;

    match result {
        Err(WorkflowError::Cancelled) => {
            warn!("run cancelled");
            println!("\n\ninterrupted");
        }
        result => print_result(result),
    }
}

fn print_result(result: Result<RunReport, WorkflowError>) {
    match result {
        Ok(report) => {
            println!(
                "\n=> [{}] {}",
                outcome_kind(&report),
                report.outcome.text()
            );
            let path: Vec<&str> = report.path.iter().map(Node::name).collect();
            info!(path = %path.join(" → "), tokens = report.usage.total(), "run complete");
        }
        Err(e) => eprintln!("\nerror: {}", e),
    }
}

fn outcome_kind(report: &RunReport) -> &'static str {
    use foreman::engine::Outcome;
    match report.outcome {
        Outcome::Answer(_) => "answer",
        Outcome::Report(_) => "report",
        Outcome::Exhausted(_) => "findings",
    }
}

/// Print streamed chunks grouped under the node that produced them.
fn spawn_renderer(events: &EventBus) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "renderer fell behind");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            match &event {
                Event::NodeEntered { node } => println!("\n[{node}]"),
                Event::Chunk { text, .. } => {
                    print!("{text}");
                    let _ = io::stdout().flush();
                }
                Event::NodeFinished { .. } => println!(),
                Event::PlanUpdated { plan } => {
                    println!(
                        "\n  plan: {} of {} done",
                        plan.done_count(),
                        plan.len()
                    );
                }
                Event::Finished { .. } | Event::Failed { .. } => {}
            }

            if event.is_terminal() {
                break;
            }
        }
    })
}

fn build_generator(provider: Provider, model: &str) -> anyhow::Result<Arc<dyn Generator>> {
    match provider {
        Provider::Human => Ok(Arc::new(HumanGenerator)),
        Provider::Anthropic => {
            let key = std::env::var("ANTHROPIC_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .context("ANTHROPIC_API_KEY is not set (or use --provider human)")?;
            Ok(Arc::new(AnthropicGenerator::new(key, Some(model.to_string()))))
        }
    }
}

fn build_searcher(search: Option<Search>) -> anyhow::Result<(Arc<dyn Searcher>, &'static str)> {
    let key = std::env::var("TAVILY_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());

    match (search, key) {
        (Some(Search::None), _) => Ok((Arc::new(NoSearch), "none")),
        (Some(Search::Tavily) | None, Some(key)) => {
            Ok((Arc::new(TavilySearcher::new(key)), "tavily"))
        }
        (Some(Search::Tavily), None) => bail!("TAVILY_API_KEY is not set (or use --search none)"),
        (None, None) => {
            warn!("TAVILY_API_KEY is not set; research steps will find nothing");
            Ok((Arc::new(NoSearch), "none"))
        }
    }
}

fn build_classifier(router: Router) -> Arc<dyn StepClassifier> {
    match router {
        Router::Llm => Arc::new(LlmClassifier),
        Router::Keyword => Arc::new(KeywordClassifier),
    }
}

/// Make a stored preference take effect in the running session.
fn apply_change(
    engine: &mut WorkflowEngine,
    provider: Provider,
    model: &mut String,
    change: StateChange,
) -> anyhow::Result<()> {
    let StateChange::Setting { key, value } = change;
    match key.as_str() {
        config::MODEL => {
            if provider == Provider::Human {
                println!("  (model is ignored for the human provider)");
                return Ok(());
            }
            engine.set_generator(build_generator(provider, &value)?);
            *model = value;
        }
        config::ROUTER => {
            let router = if value == "keyword" {
                Router::Keyword
            } else {
                Router::Llm
            };
            engine.set_classifier(build_classifier(router));
        }
        config::SEARCH_RESULTS => {
            engine.config_mut().search_results = value
                .parse()
                .with_context(|| format!("invalid search_results: {value}"))?;
        }
        other => bail!("unknown setting: {other}"),
    }
    Ok(())
}

fn provider_label(provider: Provider) -> &'static str {
    match provider {
        Provider::Anthropic => "anthropic",
        Provider::Human => "human",
    }
}

fn banner_info<'a>(
    cli: &Cli,
    model: &'a str,
    search: &'a str,
    router: Router,
    db: &'a str,
) -> BannerInfo<'a> {
    BannerInfo {
        provider: provider_label(cli.provider),
        model: if cli.provider == Provider::Human {
            "—"
        } else {
            model
        },
        search,
        router: match router {
            Router::Llm => "llm",
            Router::Keyword => "keyword",
        },
        coder: match cli.coder {
            Coder::Stub => "stub",
            Coder::Generate => "generate",
        },
        max_steps: cli.max_steps,
        max_replans: cli.max_replans,
        preferences: if db == ":memory:" { "ephemeral" } else { db },
    }
}
