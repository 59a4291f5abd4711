//! CLI entry point: assemble the actor pool and run the pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use incubator::actor::{AnthropicActor, HttpActorConfig, OpenAiChatActor};
use incubator::{run_pipeline, ActorRef, EngineConfig, MockActor, RolesConfig};

#[derive(Parser)]
#[command(name = "incubator", about = "Multi-actor startup incubator pipeline")]
struct Cli {
    /// Use deterministic canned actors instead of live providers.
    #[arg(long)]
    use_mock: bool,

    /// Maximum in-flight actor calls per fan-out batch (1 = sequential).
    #[arg(long)]
    concurrency: Option<usize>,

    /// Attempt budget for each retry-validate call.
    #[arg(long)]
    retry_max: Option<u32>,

    /// Maximum Stage-2 review/revise rounds per founder.
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Ideas each founder generates in Stage 1.
    #[arg(long)]
    ideas_per_founder: Option<usize>,

    /// Synthesize each review round through a rotating lead advisor.
    #[arg(long)]
    deliberation: bool,

    /// Constrain Stage-1 ideation to a sector.
    #[arg(long)]
    sector_focus: Option<String>,

    /// Base directory for fresh run directories.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Resume an interrupted run from its run directory.
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Skip the preflight connectivity check.
    #[arg(long)]
    skip_preflight: bool,

    /// TOML file assigning actors to founder/advisor/investor roles.
    #[arg(long)]
    roles: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn to_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(v) = self.concurrency {
            config.concurrency = v.max(1);
        }
        if let Some(v) = self.retry_max {
            config.max_attempts = v;
        }
        if let Some(v) = self.max_rounds {
            config.max_rounds = v.max(1);
        }
        if let Some(v) = self.ideas_per_founder {
            config.ideas_per_founder = v.max(1);
        }
        if self.deliberation {
            config.deliberation = true;
        }
        if let Some(v) = &self.sector_focus {
            config.sector_focus = v.clone();
        }
        if let Some(v) = &self.out_dir {
            config.out_dir = v.clone();
        }
        config.resume = self.resume.clone();
        config.skip_preflight = self.skip_preflight;
        config
    }
}

const PROVIDERS: &[(&str, &str, &str, &str)] = &[
    ("openai", "OPENAI_API_KEY", "OPENAI_MODEL", "gpt-4o"),
    (
        "anthropic",
        "ANTHROPIC_API_KEY",
        "ANTHROPIC_MODEL",
        "claude-3-5-sonnet-latest",
    ),
    ("deepseek", "DEEPSEEK_API_KEY", "DEEPSEEK_MODEL", "deepseek-chat"),
    ("gemini", "GEMINI_API_KEY", "GEMINI_MODEL", "gemini-2.0-flash"),
];

fn mock_pool() -> Vec<ActorRef> {
    PROVIDERS
        .iter()
        .map(|(name, ..)| Arc::new(MockActor::new(*name)) as ActorRef)
        .collect()
}

/// Build live actors for every provider with an API key in the environment.
/// Providers without keys are skipped with a warning; the run needs at least
/// two actors so ideas get reviewed by someone other than their proposer.
fn live_pool() -> anyhow::Result<Vec<ActorRef>> {
    let mut actors: Vec<ActorRef> = Vec::new();
    for (name, key_env, model_env, default_model) in PROVIDERS {
        if std::env::var(key_env).map_or(true, |v| v.trim().is_empty()) {
            warn!(provider = name, "skipping provider: {key_env} not set");
            continue;
        }
        let model = std::env::var(model_env).unwrap_or_else(|_| default_model.to_string());
        let actor: ActorRef = match *name {
            "anthropic" => Arc::new(
                AnthropicActor::new(HttpActorConfig::new(
                    *name,
                    model,
                    "https://api.anthropic.com",
                    *key_env,
                ))
                .with_context(|| format!("building actor {name}"))?,
            ),
            "openai" => Arc::new(
                OpenAiChatActor::new(HttpActorConfig::new(
                    *name,
                    model,
                    "https://api.openai.com/v1",
                    *key_env,
                ))
                .with_context(|| format!("building actor {name}"))?,
            ),
            "deepseek" => Arc::new(
                OpenAiChatActor::new(HttpActorConfig::new(
                    *name,
                    model,
                    "https://api.deepseek.com/v1",
                    *key_env,
                ))
                .with_context(|| format!("building actor {name}"))?,
            ),
            _ => Arc::new(
                OpenAiChatActor::new(HttpActorConfig::new(
                    *name,
                    model,
                    "https://generativelanguage.googleapis.com/v1beta/openai",
                    *key_env,
                ))
                .with_context(|| format!("building actor {name}"))?,
            ),
        };
        actors.push(actor);
    }

    if actors.len() < 2 {
        bail!(
            "need at least two live providers; set API keys or pass --use-mock \
             for a dry run"
        );
    }
    Ok(actors)
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "incubator=info",
        1 => "incubator=debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let roles_config = match &cli.roles {
        Some(path) => Some(
            RolesConfig::load(path)
                .with_context(|| format!("loading roles from {}", path.display()))?,
        ),
        None => None,
    };
    let actors = if cli.use_mock {
        info!("using canned actors (dry run)");
        mock_pool()
    } else {
        live_pool()?
    };
    let config = cli.to_config();

    let outcome = run_pipeline(actors, roles_config, config).await?;
    info!(
        run_dir = %outcome.run_dir.display(),
        founders = outcome.portfolio.len(),
        "run complete"
    );
    Ok(())
}
