//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use campaignsmith_core::{
    BrunchPromptBook, CampaignPipeline, PipelineProgress, PipelineSettings,
};
use campaignsmith_shared::{
    AppConfig, CampaignReport, PipelineState, Rubric, init_config, load_brief_from, load_config,
    load_config_from,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// campaignsmith: ideas, blog, email and social posts for one campaign.
#[derive(Parser)]
#[command(
    name = "campaignsmith",
    version,
    about = "Draft and score a complete marketing campaign with LLMs.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full campaign pipeline and write the report.
    Run(RunArgs),

    /// Print the scoring rubrics.
    Rubrics,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `campaignsmith run`. Each one overrides the config file.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Provider for every stage without a per-stage override.
    #[arg(long)]
    pub provider: Option<String>,

    /// Model for every stage without a per-stage override.
    #[arg(long)]
    pub model: Option<String>,

    /// Number of social posts to draft.
    #[arg(long)]
    pub posts: Option<usize>,

    /// Social evaluations allowed in flight at once.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Output root; the run lands in <out>/<run_id>/.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// TOML file with a campaign brief (client, offerings, audiences).
    #[arg(long)]
    pub brief: Option<PathBuf>,

    /// Config file to use instead of ~/.campaignsmith/campaignsmith.toml.
    #[arg(long, env = "CAMPAIGNSMITH_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "campaignsmith=info",
        1 => "campaignsmith=debug",
        _ => "campaignsmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args).await,
        Command::Rubrics => cmd_rubrics(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    apply_overrides(&mut config, &args)?;
    config.validate()?;

    let providers = providers_in_use(&config);
    let registry = campaignsmith_provider::registry_from_config(
        &config,
        providers.iter().map(String::as_str),
    )?;

    let settings = PipelineSettings::from_config(&config);
    info!(
        provider = %settings.default_target.provider,
        model = %settings.default_target.model,
        overrides = settings.targets.len(),
        posts = settings.social_post_count,
        "starting campaign"
    );

    let prompts = Arc::new(BrunchPromptBook::new(config.brief.clone()));
    let pipeline = CampaignPipeline::new(Arc::new(registry), prompts, settings);

    let cancel = pipeline.cancel_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after in-flight calls");
            cancel.cancel();
        }
    });

    let reporter = CliProgress::new();
    let report = pipeline.run(&reporter).await?;

    let output_root = PathBuf::from(&config.defaults.output_dir);
    let location =
        campaignsmith_artifacts::write_report(&output_root, &report, env!("CARGO_PKG_VERSION"))?;
    let manifest = campaignsmith_artifacts::validate_report_dir(&location.dir)?;
    info!(
        dir = %location.dir.display(),
        files = manifest.files.len(),
        "report verified"
    );

    print_summary(&report, &location.dir);
    Ok(())
}

/// Fold CLI flags into the loaded config.
fn apply_overrides(config: &mut AppConfig, args: &RunArgs) -> Result<()> {
    if let Some(provider) = &args.provider {
        config.defaults.provider = provider.clone();
    }
    if let Some(model) = &args.model {
        config.defaults.model = model.clone();
    }
    if let Some(posts) = args.posts {
        config.defaults.social_post_count = posts;
    }
    if let Some(concurrency) = args.concurrency {
        config.defaults.evaluation_concurrency = concurrency;
    }
    if let Some(out) = &args.out {
        config.defaults.output_dir = out.to_string_lossy().into_owned();
    }
    if let Some(brief) = &args.brief {
        config.brief = load_brief_from(brief)?;
    }
    Ok(())
}

/// Every provider some stage will call, deduplicated.
fn providers_in_use(config: &AppConfig) -> BTreeSet<String> {
    PipelineState::SEQUENCE
        .iter()
        .filter(|s| s.config_key().is_some())
        .map(|s| config.target_for(*s).provider)
        .collect()
}

fn print_summary(report: &CampaignReport, dir: &Path) {
    let gaps = report.gaps();
    println!();
    println!("  Campaign drafted!");
    println!("  Idea:    {}", report.idea.artifact().name);
    println!(
        "  Scores:  idea {}/{}  blog {}/{}  email {}/{}",
        report.idea.total_score(),
        Rubric::Idea.max_total(),
        report.blog.total_score(),
        Rubric::Blog.max_total(),
        report.email.total_score(),
        Rubric::Email.max_total(),
    );
    println!(
        "  Social:  {} evaluated, {} gap(s)",
        report.evaluated_social().count(),
        gaps.len()
    );
    if !gaps.is_empty() {
        let positions: Vec<String> = gaps.iter().map(|i| (i + 1).to_string()).collect();
        println!("  Gaps:    post(s) {}", positions.join(", "));
    }
    println!("  Path:    {}", dir.display());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
                .expect("valid progress template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

fn state_label(state: PipelineState) -> &'static str {
    match state {
        PipelineState::GeneratingIdeas => "Generating campaign ideas",
        PipelineState::EvaluatingIdeas => "Scoring ideas",
        PipelineState::SelectingIdea => "Selecting the best idea",
        PipelineState::DraftingBlog => "Drafting blog post",
        PipelineState::EvaluatingBlog => "Scoring blog post",
        PipelineState::DraftingEmail => "Drafting launch email",
        PipelineState::EvaluatingEmail => "Scoring launch email",
        PipelineState::DraftingSocial => "Drafting social posts",
        PipelineState::EvaluatingSocial => "Scoring social posts",
        PipelineState::Done => "Done",
        PipelineState::Failed => "Failed",
    }
}

impl PipelineProgress for CliProgress {
    fn state(&self, state: PipelineState) {
        if state.is_terminal() {
            self.spinner.finish_and_clear();
        } else {
            self.spinner.set_message(state_label(state));
        }
    }

    fn item_done(&self, done: usize, total: usize) {
        self.spinner.set_message(format!(
            "{} [{done}/{total}]",
            state_label(PipelineState::EvaluatingSocial)
        ));
    }

    fn done(&self, _report: &CampaignReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// rubrics / config
// ---------------------------------------------------------------------------

fn cmd_rubrics() -> Result<()> {
    for rubric in Rubric::ALL {
        println!("{} (max {})", rubric.as_str(), rubric.max_total());
        for dimension in rubric.dimensions() {
            println!("  - {dimension}: 0-5");
        }
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)
        .map_err(|e| eyre!("could not render config: {e}"))?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaignsmith_shared::StageOverride;

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "campaignsmith",
            "-vv",
            "run",
            "--provider",
            "anthropic",
            "--posts",
            "4",
            "--out",
            "/tmp/campaigns",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.provider.as_deref(), Some("anthropic"));
        assert_eq!(args.posts, Some(4));
        assert_eq!(args.out, Some(PathBuf::from("/tmp/campaigns")));
        assert!(args.model.is_none());
    }

    #[test]
    fn flags_override_config() {
        let mut config = AppConfig::default();
        let args = RunArgs {
            model: Some("gpt-4o".into()),
            posts: Some(3),
            concurrency: Some(8),
            ..RunArgs::default()
        };
        apply_overrides(&mut config, &args).unwrap();
        assert_eq!(config.defaults.model, "gpt-4o");
        assert_eq!(config.defaults.provider, "openai");
        assert_eq!(config.defaults.social_post_count, 3);
        assert_eq!(config.defaults.evaluation_concurrency, 8);
    }

    #[test]
    fn providers_in_use_includes_stage_overrides() {
        let mut config = AppConfig::default();
        assert_eq!(
            providers_in_use(&config).into_iter().collect::<Vec<_>>(),
            vec!["openai".to_string()]
        );

        config.stages.insert(
            "email_evaluation".into(),
            StageOverride {
                provider: Some("anthropic".into()),
                model: None,
            },
        );
        assert_eq!(
            providers_in_use(&config).into_iter().collect::<Vec<_>>(),
            vec!["anthropic".to_string(), "openai".to_string()]
        );
    }

    #[test]
    fn every_state_has_a_label() {
        for state in PipelineState::SEQUENCE {
            assert!(!state_label(state).is_empty());
        }
    }
}
