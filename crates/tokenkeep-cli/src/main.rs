//! CLI interface for tokenkeep - inspect, store and migrate bearer tokens.

use std::env;
use std::io::{self, IsTerminal, Read as _};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, anyhow};
use chrono::Utc;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use env_logger::Target;
use env_logger::fmt::WriteStyle;
use log::{LevelFilter, debug};
use tokenkeep_core::config::generate_schema;
use tokenkeep_core::expiry::{expiration_instant, is_expired, is_expiring_soon};
use tokenkeep_core::paths::write_default_config;
use tokenkeep_core::{
    AppConfig, AppPaths, LogLevel, TokenError, TokenManager, TokenStatus, decode_claims_strict,
};

const APP_NAME: &str = "tokenkeep";

fn main() -> anyhow::Result<()> {
    try_main()
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("resolved paths: {:#?}", ctx.paths);

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Command::Token { command } => rt.block_on(handle_token(&ctx, command)),
        Command::Decode(input) => handle_decode(&ctx, &input.read()?),
        Command::Migrate => rt.block_on(handle_migrate(&ctx)),
        Command::Backend => {
            handle_backend(&ctx);
            Ok(())
        }
        Command::Init(cmd) => handle_init(&ctx, &cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => {
            handle_completions(shell);
            Ok(())
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "tokenkeep",
    author,
    version,
    about = "Store, inspect and migrate bearer tokens",
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
    /// Do not change anything on disk or in the credential store.
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
    /// Manage the stored token (set, get, clear, status).
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },
    /// Decode a token's claims without storing it.
    Decode(TokenInput),
    /// Move a token left in legacy plaintext storage into the secure store.
    Migrate,
    /// Show which storage backend is selected.
    Backend,
    /// Create a default config file.
    Init(InitCommand),
    /// Inspect and manage configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum TokenCommand {
    /// Store a token, replacing any existing one.
    Set(TokenInput),
    /// Print the stored token.
    Get,
    /// Delete the stored token.
    Clear,
    /// Show validity and expiry of the stored token.
    Status,
}

#[derive(Debug, Args)]
struct TokenInput {
    /// The compact JWT.
    #[arg(required_unless_present = "stdin")]
    token: Option<String>,
    /// Read the token from standard input.
    #[arg(long, conflicts_with = "token")]
    stdin: bool,
}

impl TokenInput {
    fn read(self) -> Result<String> {
        if self.stdin {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading token from stdin")?;
            return Ok(buf.trim().to_string());
        }
        self.token
            .map(|t| t.trim().to_string())
            .ok_or_else(|| anyhow!("missing TOKEN (or pass --stdin)"))
    }
}

#[derive(Debug, Args)]
struct InitCommand {
    /// Overwrite an existing config file.
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration.
    Show,
    /// Print the config file path.
    Path,
    /// Print all resolved paths.
    Paths,
    /// Print the JSON schema for the config file.
    Schema,
    /// Overwrite the config file with defaults.
    Reset,
}

#[derive(Debug)]
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
        let ctx = Self {
            common,
            paths,
            config,
        };
        ctx.ensure_directories()?;
        Ok(ctx)
    }

    fn init_logging(&self) -> Result<()> {
        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
        builder.filter_level(self.effective_log_level());

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

        if let Some(ref path) = self.config.logging.file {
            let file = open_log_file(Path::new(path))?;
            builder.target(Target::Pipe(Box::new(file)));
            builder.write_style(WriteStyle::Never);
        }

        builder.try_init().or_else(|err| {
            if self.common.verbose > 0 {
                eprintln!("logger already initialized: {err}");
            }
            Ok(())
        })
    }

    /// Command-line flags win; otherwise the configured level applies.
    const fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            return LevelFilter::Trace;
        }
        if self.common.debug {
            return LevelFilter::Debug;
        }
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

    fn ensure_directories(&self) -> Result<()> {
        if self.common.dry_run {
            log::info!(
                "dry-run: would ensure data dir {}",
                self.paths.data_dir.display()
            );
            return Ok(());
        }
        self.paths.ensure_directories()
    }

    fn token_manager(&self) -> Result<TokenManager> {
        let locations = self.config.storage.locations(&self.paths)?;
        let platform = self.config.storage.platform.resolve();
        Ok(TokenManager::open(platform, &locations))
    }

    /// Open the manager and run startup migration, as app bootstrap would.
    async fn bootstrap(&self) -> Result<TokenManager> {
        let manager = self.token_manager()?;
        if self.common.dry_run {
            log::info!("dry-run: skipping legacy token migration");
        } else {
            manager.initialize().await;
        }
        Ok(manager)
    }

    fn print_json(&self, value: &serde_json::Value) -> Result<()> {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("serializing output to JSON")?
        );
        Ok(())
    }
}

async fn handle_token(ctx: &RuntimeContext, cmd: TokenCommand) -> Result<()> {
    let manager = ctx.bootstrap().await?;

    match cmd {
        TokenCommand::Set(input) => {
            let token = input.read()?;
            if ctx.common.dry_run {
                log::info!("dry-run: would store token in {} backend", manager.backend_kind());
                return Ok(());
            }
            manager.set_token(Some(&token)).await.map_err(explain)?;
            if !ctx.common.quiet {
                println!("Token stored ({} backend).", manager.backend_kind());
            }
            Ok(())
        }
        TokenCommand::Get => match manager.get_token().await.map_err(explain)? {
            Some(token) => {
                if ctx.common.json {
                    ctx.print_json(&serde_json::json!({ "token": token }))
                } else {
                    println!("{token}");
                    Ok(())
                }
            }
            None => Err(anyhow!("no token stored - sign in to obtain one")),
        },
        TokenCommand::Clear => {
            if ctx.common.dry_run {
                log::info!("dry-run: would clear token from {} backend", manager.backend_kind());
                return Ok(());
            }
            manager.clear_token().await.map_err(explain)?;
            if !ctx.common.quiet {
                println!("Token cleared.");
            }
            Ok(())
        }
        TokenCommand::Status => {
            let status = manager.status().await;
            if ctx.common.json {
                ctx.print_json(&serde_json::to_value(&status)?)
            } else {
                print_status(&status);
                Ok(())
            }
        }
    }
}

/// Attach a next step to token errors that mean the user must sign in again.
fn explain(err: TokenError) -> anyhow::Error {
    if err.requires_sign_in() {
        anyhow!("{err} - sign in again to obtain a new token")
    } else {
        anyhow::Error::new(err)
    }
}

fn handle_decode(ctx: &RuntimeContext, token: &str) -> Result<()> {
    let claims = decode_claims_strict(token)?;
    let expired = is_expired(token);
    let expiring_soon = is_expiring_soon(token);
    let expires_at = expiration_instant(token);

    if ctx.common.json {
        return ctx.print_json(&serde_json::json!({
            "claims": claims.as_map(),
            "expired": expired,
            "expiring_soon": expiring_soon,
            "expires_at": expires_at,
        }));
    }

    println!(
        "{}",
        serde_json::to_string_pretty(claims.as_map()).context("serializing claims")?
    );
    println!();
    match expires_at {
        Some(at) => println!("Expires:  {} ({})", at.to_rfc3339(), describe_remaining(at)),
        None => println!("Expires:  no usable exp claim (treated as expired)"),
    }
    if let Some(iat) = claims.iat() {
        println!("Issued:   {iat}");
    }
    println!(
        "State:    {}",
        if expired {
            "expired"
        } else if expiring_soon {
            "valid, expiring soon"
        } else {
            "valid"
        }
    );
    Ok(())
}

async fn handle_migrate(ctx: &RuntimeContext) -> Result<()> {
    let manager = ctx.token_manager()?;
    if ctx.common.dry_run {
        log::info!("dry-run: would migrate into {} backend", manager.backend_kind());
        return Ok(());
    }
    let outcome = manager
        .migrate()
        .await
        .context("legacy token migration failed")?;

    if ctx.common.json {
        let mut value = serde_json::to_value(outcome)?;
        value["backend"] = serde_json::json!(manager.backend_kind());
        return ctx.print_json(&value);
    }

    println!("Backend:   {}", manager.backend_kind());
    println!("Migration: {outcome:?}");
    Ok(())
}

fn handle_backend(ctx: &RuntimeContext) {
    let platform = ctx.config.storage.platform.resolve();
    let kind = tokenkeep_core::select_backend(platform);
    if ctx.common.json {
        println!(
            "{}",
            serde_json::json!({ "platform": platform, "backend": kind })
        );
    } else {
        println!("{kind} (platform: {platform})");
    }
}

fn handle_init(ctx: &RuntimeContext, cmd: &InitCommand) -> Result<()> {
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
                ctx.print_json(&serde_json::to_value(&ctx.config)?)
            } else {
                println!("{:#?}", ctx.config);
                Ok(())
            }
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Paths => {
            let locations = ctx.config.storage.locations(&ctx.paths)?;
            if ctx.common.json {
                ctx.print_json(&serde_json::json!({
                    "config": ctx.paths.config_file,
                    "data": ctx.paths.data_dir,
                    "plain_store": locations.plain_file,
                    "keyring_service": locations.keyring_service,
                }))
            } else {
                println!("config:          {}", ctx.paths.config_file.display());
                println!("data:            {}", ctx.paths.data_dir.display());
                println!("plain store:     {}", locations.plain_file.display());
                println!("keyring service: {}", locations.keyring_service);
                Ok(())
            }
        }
        ConfigCommand::Schema => {
            println!("{}", generate_schema()?);
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

// ─── Formatting helpers ──────────────────────────────────────────────

/// Open `path` for appending log lines, creating parent directories.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

fn print_status(status: &TokenStatus) {
    println!("Backend:   {}", status.backend);
    if !status.valid {
        match status.problem {
            Some(ref problem) => println!("Token:     unavailable ({problem})"),
            None => println!("Token:     none stored"),
        }
        return;
    }
    println!("Token:     valid");
    if let Some(ref subject) = status.subject {
        println!("Subject:   {subject}");
    }
    if let Some(at) = status.expires_at {
        println!("Expires:   {} ({})", at.to_rfc3339(), describe_remaining(at));
    }
    if status.expiring_soon {
        println!("Warning:   token expires within 5 minutes");
    }
}

fn describe_remaining(at: chrono::DateTime<Utc>) -> String {
    let remaining = at.signed_duration_since(Utc::now()).num_seconds();
    if remaining <= 0 {
        return format!("{}s ago", -remaining);
    }
    let days = remaining / 86_400;
    let hours = (remaining % 86_400) / 3_600;
    let mins = (remaining % 3_600) / 60;
    if days > 0 {
        format!("in {days}d {hours}h")
    } else if hours > 0 {
        format!("in {hours}h {mins}m")
    } else {
        format!("in {mins}m {}s", remaining % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_token_set_from_argument() {
        let cli = Cli::try_parse_from(["tokenkeep", "token", "set", "a.b.c"]).expect("parse");
        match cli.command {
            Command::Token {
                command: TokenCommand::Set(input),
            } => assert_eq!(input.read().expect("read"), "a.b.c"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn decode_is_a_top_level_command() {
        let cli = Cli::try_parse_from(["tokenkeep", "decode", "a.b.c"]).expect("parse");
        match cli.command {
            Command::Decode(input) => assert_eq!(input.read().expect("read"), "a.b.c"),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["tokenkeep", "token", "decode", "a.b.c"]).is_err());
    }

    #[test]
    fn token_set_requires_input() {
        assert!(Cli::try_parse_from(["tokenkeep", "token", "set"]).is_err());
        assert!(Cli::try_parse_from(["tokenkeep", "token", "set", "--stdin", "x.y.z"]).is_err());
    }

    #[test]
    fn log_file_is_created_and_appended() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("logs").join("tokenkeep.log");

        let mut first = open_log_file(&path).expect("open");
        std::io::Write::write_all(&mut first, b"one\n").expect("write");
        drop(first);
        let mut second = open_log_file(&path).expect("reopen");
        std::io::Write::write_all(&mut second, b"two\n").expect("write");
        drop(second);

        assert_eq!(fs::read_to_string(&path).expect("read"), "one\ntwo\n");
    }

    #[test]
    fn remaining_time_formatting() {
        let past = Utc::now() - chrono::Duration::seconds(90);
        assert!(describe_remaining(past).ends_with("s ago"));
        let later = Utc::now() + chrono::Duration::days(3) + chrono::Duration::hours(2);
        assert!(describe_remaining(later).starts_with("in 3d"));
    }
}
