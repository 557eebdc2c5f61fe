//! CLI interface for slackarchive - export SlackArchive teams to JSON files.

use std::env;
use std::fs::OpenOptions;
use std::io::{self, BufRead, IsTerminal, Write as _};
use std::path::PathBuf;

use anyhow::{Context as _, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use env_logger::fmt::WriteStyle;
use log::{LevelFilter, debug};
use slackarchive_core::export::render_json;
use slackarchive_core::paths::write_default_config;
use slackarchive_core::{
    AppConfig, AppPaths, ArchiveApi, ArchiveClient, ChannelReport, ExportLayout, ExportOptions,
    ExportSummary, Exporter, LogLevel, PagePlan, generate_schema,
};

const APP_NAME: &str = "slackarchive";

/// Repository URL used as the schema `$id` base.
const REPO_URL: &str = "https://github.com/byteowlz/slackarchive";

fn main() -> anyhow::Result<()> {
    try_main()
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("resolved paths: {:#?}", ctx.paths);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    match cli.command {
        Command::Export(cmd) => rt.block_on(handle_export(&ctx, cmd)),
        Command::Team { domain } => rt.block_on(handle_team(&ctx, &domain)),
        Command::Channels { domain } => rt.block_on(handle_channels(&ctx, &domain)),
        Command::Messages(cmd) => rt.block_on(handle_messages(&ctx, cmd)),
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => {
            handle_completions(shell);
            Ok(())
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "slackarchive",
    author,
    version,
    about = "Export SlackArchive teams, channels and messages to JSON",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

/// Common CLI options shared across all subcommands.
#[derive(Debug, Clone, Args)]
pub struct CommonOpts {
    /// Override the config file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
    /// Reduce output to only errors.
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    pub quiet: bool,
    /// Increase logging verbosity (stackable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,
    /// Enable trace logging.
    #[arg(long, global = true)]
    pub trace: bool,
    /// Output machine-readable JSON.
    #[arg(long, global = true)]
    pub json: bool,
    /// Disable ANSI colors in output.
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    pub no_color: bool,
    /// Control color output.
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    pub color: ColorOption,
    /// Do not change anything on disk.
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,
    /// Assume "yes" for interactive prompts.
    #[arg(short = 'y', long = "yes", alias = "force", global = true)]
    pub assume_yes: bool,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorOption {
    /// Detect terminal capabilities automatically.
    Auto,
    /// Always emit ANSI color codes.
    Always,
    /// Never emit ANSI color codes.
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Export a team: team.json, the channel list, and per-channel messages and users.
    Export(ExportCommand),
    /// Show the metadata of a team.
    Team {
        /// Team domain, e.g. 'kubernetes' for kubernetes.slackarchive.io.
        domain: String,
    },
    /// List the channels of a team.
    Channels {
        /// Team domain.
        domain: String,
    },
    /// Fetch a single page of messages.
    Messages(MessagesCommand),
    /// Create config directories and default files.
    Init(InitCommand),
    /// Inspect and manage configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Args)]
struct ExportCommand {
    /// Team domain. Read from stdin when omitted.
    domain: Option<String>,
    /// Directory receiving the artifacts (default: config or working directory).
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,
    /// Messages requested per page.
    #[arg(long, value_name = "N")]
    page_size: Option<u32>,
    /// Maximum pages fetched per channel.
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,
    /// Keep requesting pages after an empty one, up to --max-pages.
    #[arg(long)]
    no_stop_on_empty: bool,
    /// Only export this channel (repeatable).
    #[arg(short, long = "channel", value_name = "NAME")]
    channels: Vec<String>,
    /// Skip the users/<channel>.json artifacts.
    #[arg(long)]
    no_users: bool,
    /// Abort on the first failing channel.
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Debug, Clone, Args)]
struct MessagesCommand {
    /// Team domain.
    domain: String,
    /// Channel identifier as listed by 'slackarchive channels'.
    channel_id: String,
    /// Messages to fetch.
    #[arg(short = 'n', long, default_value_t = 100)]
    size: u32,
    /// Newest messages to skip.
    #[arg(long, default_value_t = 0)]
    offset: u32,
}

#[derive(Debug, Clone, Copy, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists.
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration.
    Show,
    /// Print the resolved config file path.
    Path,
    /// Print all resolved paths.
    Paths,
    /// Print the JSON schema.
    Schema,
    /// Regenerate the default configuration file.
    Reset,
}

// ─── Runtime ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.as_deref())?;
        let config = AppConfig::load(&paths, common.dry_run)?;
        let paths = paths.apply_overrides(&config)?;
        Ok(Self {
            common,
            paths,
            config,
        })
    }

    fn init_logging(&self) -> Result<()> {
        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
        builder.filter_level(self.effective_log_level());

        if let Some(ref file) = self.config.logging.file {
            let sink = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .with_context(|| format!("opening log file {file}"))?;
            builder.target(env_logger::Target::Pipe(Box::new(sink)));
            builder.write_style(WriteStyle::Never);
        } else {
            let force_color = matches!(self.common.color, ColorOption::Always)
                || env::var_os("FORCE_COLOR").is_some();
            let disable_color = self.common.no_color
                || matches!(self.common.color, ColorOption::Never)
                || env::var_os("NO_COLOR").is_some()
                || (!force_color && !io::stderr().is_terminal());

            if disable_color {
                builder.write_style(WriteStyle::Never);
            } else if force_color {
                builder.write_style(WriteStyle::Always);
            } else {
                builder.write_style(WriteStyle::Auto);
            }
        }

        builder.try_init().or_else(|err| {
            if self.common.verbose > 0 {
                eprintln!("logger already initialized: {err}");
            }
            Ok(())
        })
    }

    const fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => match self.config.logging.level {
                    LogLevel::Error => LevelFilter::Error,
                    LogLevel::Warn => LevelFilter::Warn,
                    LogLevel::Info => LevelFilter::Info,
                    LogLevel::Debug => LevelFilter::Debug,
                    LogLevel::Trace => LevelFilter::Trace,
                },
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    fn client(&self) -> Result<ArchiveClient> {
        ArchiveClient::new(&self.config.api, &self.config.runtime)
            .context("building archive client")
    }

    fn print_json<T: serde::Serialize + ?Sized>(&self, data: &T) -> Result<()> {
        let rendered = if self.common.json {
            serde_json::to_vec(data).context("serializing output")?
        } else {
            render_json(data)?
        };
        let mut stdout = io::stdout().lock();
        stdout.write_all(&rendered)?;
        writeln!(stdout)?;
        Ok(())
    }
}

// ─── Handlers ────────────────────────────────────────────────────────

async fn handle_export(ctx: &RuntimeContext, cmd: ExportCommand) -> Result<()> {
    let domain = match cmd.domain {
        Some(domain) => domain,
        None => prompt_domain()?,
    };

    let paths = ctx
        .paths
        .clone()
        .with_output_override(cmd.output.as_deref())?;
    let layout = ExportLayout::new(&paths.output_dir, ctx.config.export.channel_file.as_str());

    let mut plan = PagePlan::from_config(&ctx.config.export);
    if let Some(size) = cmd.page_size {
        plan.page_size = size;
    }
    if let Some(pages) = cmd.max_pages {
        plan.max_pages = pages;
    }
    if cmd.no_stop_on_empty {
        plan.stop_on_empty = false;
    }

    let mut options = ExportOptions::from_config(&ctx.config);
    options.dry_run = ctx.common.dry_run;
    options.channels = cmd.channels;
    options.fail_fast |= cmd.fail_fast;
    if cmd.no_users {
        options.write_users = false;
    }

    let client = ctx.client()?;
    let quiet = ctx.common.quiet || ctx.common.json;
    let summary = Exporter::new(&client, layout, plan, options)
        .run(&domain, |report| {
            if !quiet {
                print_report(report);
            }
        })
        .await
        .with_context(|| format!("exporting team '{domain}'"))?;

    if ctx.common.json {
        ctx.print_json(&summary)?;
    } else if !ctx.common.quiet {
        print_summary(&summary);
    }

    match summary.failed() {
        0 => Ok(()),
        n => Err(anyhow!("{n} channel(s) could not be exported")),
    }
}

async fn handle_team(ctx: &RuntimeContext, domain: &str) -> Result<()> {
    let team = ctx
        .client()?
        .fetch_team(domain)
        .await
        .with_context(|| format!("looking up team '{domain}'"))?;
    ctx.print_json(&team)
}

async fn handle_channels(ctx: &RuntimeContext, domain: &str) -> Result<()> {
    let client = ctx.client()?;
    let team = client
        .fetch_team(domain)
        .await
        .with_context(|| format!("looking up team '{domain}'"))?;
    let team_id = team.team_id()?;
    let channels = client
        .fetch_channels(domain, team_id)
        .await
        .with_context(|| format!("listing channels of {team_id}"))?;
    ctx.print_json(&channels)
}

async fn handle_messages(ctx: &RuntimeContext, cmd: MessagesCommand) -> Result<()> {
    let client = ctx.client()?;
    let team = client
        .fetch_team(&cmd.domain)
        .await
        .with_context(|| format!("looking up team '{}'", cmd.domain))?;
    let team_id = team.team_id()?;
    let page = client
        .fetch_messages(&cmd.domain, team_id, &cmd.channel_id, cmd.size, cmd.offset)
        .await
        .with_context(|| format!("fetching messages of {}", cmd.channel_id))?;
    ctx.print_json(&page)
}

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
    if ctx.paths.config_file.exists() && !(cmd.force || ctx.common.assume_yes) {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            ctx.paths.config_file.display()
        ));
    }
    if ctx.common.dry_run {
        log::info!(
            "dry-run: would write default config to {}",
            ctx.paths.config_file.display()
        );
        return Ok(());
    }
    write_default_config(&ctx.paths.config_file)
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            if ctx.common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&ctx.config)
                        .context("serializing config to JSON")?
                );
            } else {
                println!("{:#?}", ctx.config);
            }
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Paths => {
            if ctx.common.json {
                let paths = serde_json::json!({
                    "config": ctx.paths.config_file,
                    "output": ctx.paths.output_dir,
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&paths).context("serializing paths to JSON")?
                );
            } else {
                println!("config: {}", ctx.paths.config_file.display());
                println!("output: {}", ctx.paths.output_dir.display());
            }
            Ok(())
        }
        ConfigCommand::Schema => {
            println!("{}", generate_schema(APP_NAME, REPO_URL)?);
            Ok(())
        }
        ConfigCommand::Reset => {
            if ctx.common.dry_run {
                log::info!(
                    "dry-run: would reset config at {}",
                    ctx.paths.config_file.display()
                );
                return Ok(());
            }
            write_default_config(&ctx.paths.config_file)
        }
    }
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
}

// ─── Output helpers ──────────────────────────────────────────────────

fn prompt_domain() -> Result<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("Enter team name : ");
        io::stderr().flush()?;
    }
    let mut line = String::new();
    stdin.lock().read_line(&mut line).context("reading team name")?;
    let domain = line.trim();
    if domain.is_empty() {
        return Err(anyhow!("no team domain given"));
    }
    Ok(domain.to_string())
}

fn print_report(report: &ChannelReport) {
    match report.error {
        None => println!(
            "Completed {}: {} messages, {} users",
            report.name, report.messages, report.users
        ),
        Some(ref error) => eprintln!("Failed {}: {error}", report.name),
    }
}

fn print_summary(summary: &ExportSummary) {
    let exported = summary.reports.len() - summary.failed();
    let elapsed = summary.finished_at - summary.started_at;
    let verb = if summary.dry_run { "Would export" } else { "Exported" };
    println!(
        "{verb} {exported}/{} channels of {} ({} messages) to {} in {:.1}s.",
        summary.channels_total,
        summary.team_id,
        summary.total_messages(),
        summary.output_dir.display(),
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    if summary.skipped > 0 {
        println!("Skipped {} unnamed or unselected channels.", summary.skipped);
    }
}
