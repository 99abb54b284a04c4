use std::io::{BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use coderev_core::{
    readable_bytes, CoderevConfig, InputMode, OutputFormat, ReviewRecord, API_KEY_ENV,
};
use coderev_review::{LlmClient, ReviewFailure, ReviewSession, RunOutcome};

const CONFIG_FILE: &str = ".coderev.toml";

#[derive(Parser)]
#[command(
    name = "coderev",
    version,
    about = "AI code review assistant",
    long_about = "Review source files or a pasted snippet with an OpenAI chat model.\n\n\
                   Examples:\n  \
                     coderev review src/lib.rs src/main.rs   Review files\n  \
                     pbpaste | coderev review --stdin          Review pasted code\n  \
                     coderev review app.py --focus security    Narrow the review focus\n  \
                     coderev session                           Interactive session with history\n  \
                     coderev doctor                            Check setup and environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .coderev.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for review results.\n\n\
                       Formats:\n  \
                         text      The review text as returned by the model (default)\n  \
                         json      The history record as JSON with camelCase keys\n  \
                         markdown  Review text under a heading with run metadata"
    )]
    format: OutputFormat,

    /// Enable verbose (debug) logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Review files or code from stdin
    #[command(long_about = "Review files or code from stdin.\n\n\
        Files are reviewed together in the order given. With --stdin the input is\n\
        treated as a manually pasted snippet instead.\n\n\
        Examples:\n  coderev review a.py b.py\n  cat snippet.rs | coderev review --stdin --focus performance")]
    Review {
        /// Files to review, in order
        files: Vec<PathBuf>,
        /// Read a pasted snippet from stdin instead of files
        #[arg(long, conflicts_with = "files")]
        stdin: bool,
        /// Review focus (default: from config)
        #[arg(long)]
        focus: Option<String>,
        /// API key (default: OPENAI_API_KEY, then config)
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Start an interactive review session
    #[command(long_about = "Start an interactive review session.\n\n\
        Add and remove files, paste snippets, change the focus, run reviews, and\n\
        revisit earlier results. History lives only as long as the session.\n\
        Type 'help' inside the session for commands.")]
    Session {
        /// API key (default: OPENAI_API_KEY, then config)
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Create a default .coderev.toml configuration file
    #[command(long_about = "Create a default .coderev.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .coderev.toml already exists.")]
    Init,
    /// Check your setup and environment
    Doctor,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const DEFAULT_CONFIG: &str = r#"# coderev configuration

[llm]
# model = "gpt-4o-mini"
# base_url = "https://api.openai.com"
# api_key = "sk-..."            # prefer the OPENAI_API_KEY environment variable
# timeout_secs = 120            # unset means no client-side timeout

[review]
# focus = "bugs, readability, maintainability, performance, tests"
"#;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<CoderevConfig> {
    let config = match path {
        Some(path) => CoderevConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                CoderevConfig::from_file(default_path)?
            } else {
                CoderevConfig::default()
            }
        }
    };
    Ok(config)
}

fn new_session(config: &CoderevConfig, api_key: Option<String>) -> Result<ReviewSession<LlmClient>> {
    let client = LlmClient::new(&config.llm)?;
    let session = ReviewSession::new(client, config.review.focus.clone());
    if let Some(key) = config
        .llm
        .resolve_api_key(api_key, std::env::var(API_KEY_ENV).ok())
    {
        session.set_credential(key);
    }
    Ok(session)
}

async fn run_with_spinner(session: &ReviewSession<LlmClient>) -> RunOutcome {
    let spinner = if std::io::stderr().is_terminal() {
        let pb = indicatif::ProgressBar::new_spinner();
        if let Ok(style) =
            indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
        {
            pb.set_style(style);
        }
        pb.set_message("Running review...");
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let outcome = session.run_review().await;

    if let Some(pb) = spinner {
        match outcome {
            RunOutcome::Completed(_) => pb.finish_and_clear(),
            _ => pb.finish_with_message("Failed"),
        }
    }
    outcome
}

/// Rebuild a failed run as a report that keeps the error's code and help.
fn failure_report(failure: &ReviewFailure) -> miette::Report {
    let error = failure.error();
    let code = miette::Diagnostic::code(error).map(|c| c.to_string());
    let help = miette::Diagnostic::help(error).map(|h| h.to_string());
    match (code, help) {
        (Some(code), Some(help)) => miette::miette!(code = code, help = help, "{error}"),
        (Some(code), None) => miette::miette!(code = code, "{error}"),
        (None, Some(help)) => miette::miette!(help = help, "{error}"),
        (None, None) => miette::miette!("{error}"),
    }
}

fn render_record(record: &ReviewRecord, format: OutputFormat) -> Result<String> {
    let out = match format {
        OutputFormat::Json => serde_json::to_string_pretty(record).into_diagnostic()?,
        OutputFormat::Markdown => format!(
            "# Code Review\n\n*{} · {}*\n\n{}\n",
            record.timestamp.to_rfc3339(),
            record.summary,
            record.result
        ),
        OutputFormat::Text => record.result.clone(),
    };
    Ok(out)
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            "fail" => "\u{2717}",
            _ => "~",
        }
    }
}

fn run_doctor(config: &CoderevConfig, config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let mut checks: Vec<CheckResult> = Vec::new();

    let path = config_path.unwrap_or(Path::new(CONFIG_FILE));
    if path.exists() {
        checks.push(CheckResult::pass(
            "config_file",
            format!("{} found", path.display()),
        ));
    } else {
        checks.push(CheckResult::info(
            "config_file",
            format!("{} not found, using defaults", path.display()),
        ));
    }

    checks.push(CheckResult::pass(
        "llm_endpoint",
        format!("{} (model: {})", config.llm.endpoint(), config.llm.model),
    ));

    let key = config
        .llm
        .resolve_api_key(None, std::env::var(API_KEY_ENV).ok());
    match key {
        Some(key) if !key.is_blank() => {
            checks.push(CheckResult::pass("llm_api_key", "API key configured"));
        }
        _ => checks.push(CheckResult::fail(
            "llm_api_key",
            format!("{API_KEY_ENV} not set"),
            format!("export {API_KEY_ENV}=... or pass --api-key"),
        )),
    }

    let timeout = match config.llm.timeout_secs {
        Some(secs) => format!("{secs}s"),
        None => "none (transport default)".into(),
    };
    checks.push(CheckResult::info("request_timeout", timeout));

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        _ => {
            println!("coderev v{} — Environment Check\n", env!("CARGO_PKG_VERSION"));
            for check in &checks {
                let label = check.name.replace('_', " ");
                println!("  {} {label:<20} {}", check.symbol(), check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }
            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            println!("\n{passed} checks passed, {failed} failed");
        }
    }
    Ok(())
}

const SESSION_HELP: &str = "\
Commands:
  mode file|manual      switch input source (clears the other source)
  add <path>...         upload files, in order
  files                 list uploaded files
  select <n>            preview uploaded file n
  remove <n>            remove uploaded file n
  paste                 enter code until a line containing only '.'
  focus [text]          show or set the review focus
  key <api-key>         set the API key for this session
  run                   run a review
  history               list past reviews
  show <n>              re-display past review n
  dismiss               clear the last error
  status                show session state
  quit                  leave the session";

async fn run_session(session: ReviewSession<LlmClient>, format: OutputFormat) -> Result<()> {
    println!("coderev session — type 'help' for commands");
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("coderev> ");
        std::io::stdout().flush().into_diagnostic()?;
        let Some(line) = lines.next() else { break };
        let line = line.into_diagnostic()?;
        let mut parts = line.trim().splitn(2, ' ');
        let cmd = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default().trim();

        match cmd {
            "" => {}
            "help" => println!("{SESSION_HELP}"),
            "quit" | "exit" => break,
            "mode" => match rest.parse::<InputMode>() {
                Ok(mode) => {
                    session.set_input_mode(mode);
                    println!("input mode: {mode}");
                }
                Err(e) => println!("{e}"),
            },
            "add" => {
                let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
                if paths.is_empty() {
                    println!("usage: add <path>...");
                    continue;
                }
                match session.add_files(&paths).await {
                    Ok(ids) => println!("added {} file(s)", ids.len()),
                    Err(e) => println!("error: {e}"),
                }
            }
            "files" => {
                let state = session.snapshot();
                let selected = state.selected_item().map(|item| item.id);
                println!(
                    "{} file(s) · {}",
                    state.items().len(),
                    readable_bytes(state.total_size())
                );
                for (i, item) in state.items().iter().enumerate() {
                    let marker = if Some(item.id) == selected { "*" } else { " " };
                    println!("{marker}{:>3}. {} ({})", i + 1, item.name, readable_bytes(item.size));
                }
            }
            "select" | "remove" => {
                let state = session.snapshot();
                let Some(item) = nth(rest).and_then(|n| state.items().get(n)) else {
                    println!("usage: {cmd} <n> (see 'files')");
                    continue;
                };
                if cmd == "remove" {
                    session.remove_file(item.id);
                    println!("removed {}", item.name);
                } else {
                    session.select_item(item.id);
                    println!("{} · {}", item.name, readable_bytes(item.size));
                    if item.content.is_empty() {
                        println!("// (empty file)");
                    } else {
                        println!("{}", item.content);
                    }
                }
            }
            "paste" => {
                if session.snapshot().mode() == InputMode::File {
                    session.set_input_mode(InputMode::Manual);
                    println!("switched to manual mode");
                }
                let mut buffer = String::new();
                for line in lines.by_ref() {
                    let line = line.into_diagnostic()?;
                    if line == "." {
                        break;
                    }
                    buffer.push_str(&line);
                    buffer.push('\n');
                }
                println!("{} chars", buffer.chars().count());
                session.set_manual_text(buffer);
            }
            "focus" => {
                if rest.is_empty() {
                    println!("focus: {}", session.snapshot().focus());
                } else {
                    session.set_focus(rest);
                }
            }
            "key" => session.set_credential(coderev_core::ApiKey::new(rest)),
            "run" => match run_with_spinner(&session).await {
                RunOutcome::Completed(record) => println!("{}", render_record(&record, format)?),
                RunOutcome::Failed(failure) => println!("error: {failure}"),
                RunOutcome::Busy => println!("a review is already running"),
            },
            "history" => {
                let state = session.snapshot();
                if state.history().is_empty() {
                    println!("no reviews yet; history is discarded when the session ends");
                }
                for (i, record) in state.history().iter().enumerate() {
                    println!(
                        "{:>3}. {} · {}",
                        i + 1,
                        record.timestamp.to_rfc3339(),
                        record.summary
                    );
                }
            }
            "show" => {
                let state = session.snapshot();
                let Some(record) = nth(rest).and_then(|n| state.history().iter().nth(n)) else {
                    println!("usage: show <n> (see 'history')");
                    continue;
                };
                if let Some(record) = session.select_history_entry(record.id) {
                    println!("{}", render_record(&record, format)?);
                }
            }
            "dismiss" => session.dismiss_error(),
            "status" => {
                let state = session.snapshot();
                println!("mode:        {}", state.mode());
                println!("files:       {}", state.items().len());
                println!("manual:      {} chars", state.manual_text().chars().count());
                println!(
                    "reviewable:  {} chars",
                    coderev_review::input::reviewed_chars(&state.reviewable_unit())
                );
                println!("focus:       {}", state.focus());
                println!(
                    "api key:     {}",
                    if state.has_credential() { "set" } else { "not set" }
                );
                println!("history:     {} review(s)", state.history().len());
                if let Some(error) = state.last_error() {
                    println!("last error:  {error}");
                }
            }
            other => println!("unknown command '{other}', type 'help'"),
        }
    }
    Ok(())
}

fn nth(arg: &str) -> Option<usize> {
    arg.parse::<usize>().ok()?.checked_sub(1)
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help().into_diagnostic()?;
        }
        Some(Command::Review {
            ref files,
            stdin,
            ref focus,
            ref api_key,
        }) => {
            tracing::debug!(files = files.len(), stdin, "starting one-shot review");
            let session = new_session(&config, api_key.clone())?;
            if let Some(focus) = focus {
                session.set_focus(focus.as_str());
            }

            if stdin {
                let mut input = String::new();
                std::io::stdin()
                    .read_to_string(&mut input)
                    .into_diagnostic()?;
                session.set_input_mode(InputMode::Manual);
                session.set_manual_text(input);
            } else {
                session.add_files(files).await?;
            }

            match run_with_spinner(&session).await {
                RunOutcome::Completed(record) => {
                    let out = render_record(&record, cli.format)?;
                    println!("{out}");
                }
                RunOutcome::Failed(failure) => return Err(failure_report(&failure)),
                RunOutcome::Busy => miette::bail!("a review is already running"),
            }
        }
        Some(Command::Session { ref api_key }) => {
            let session = new_session(&config, api_key.clone())?;
            run_session(session, cli.format).await?;
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Doctor) => {
            run_doctor(&config, cli.config.as_deref(), cli.format)?;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "coderev", &mut std::io::stdout());
        }
    }

    Ok(())
}
