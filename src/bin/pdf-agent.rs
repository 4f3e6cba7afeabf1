//! CLI binary for pdf-agent.
//!
//! A thin shim over the library crate: flags fill the session's form, the
//! session does the work, and this file prints the outcome.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_agent::config::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use pdf_agent::{
    error_message, extract_text_async, resolve_input, write_response, AgentConfig, AgentError,
    Outcome, Phase, Session, SessionObserver,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Spinner driven by session phases ─────────────────────────────────────────

/// Shows a spinner while a submission is in flight. A fresh bar is created
/// for every submission so the interactive mode can reuse one observer.
struct SpinnerObserver {
    bar: Mutex<Option<ProgressBar>>,
}

impl SpinnerObserver {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
        })
    }

    fn start_bar() -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Procesando");
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    }
}

impl SessionObserver for SpinnerObserver {
    fn on_phase_change(&self, phase: &Phase) {
        let mut slot = self.bar.lock().unwrap();
        match phase {
            Phase::Validating => {
                let bar = Self::start_bar();
                bar.set_message("Validando…");
                *slot = Some(bar);
            }
            Phase::Extracting => {
                if let Some(bar) = slot.as_ref() {
                    bar.set_message("Extrayendo texto del PDF…");
                }
            }
            Phase::Completing => {
                if let Some(bar) = slot.as_ref() {
                    bar.set_message("Esperando respuesta del agente…");
                }
            }
            Phase::Idle { .. } | Phase::Displaying(_) => {
                if let Some(bar) = slot.take() {
                    bar.finish_and_clear();
                }
            }
        }
    }

    fn on_extracted(&self, document_chars: usize) {
        if let Some(bar) = self.bar.lock().unwrap().as_ref() {
            bar.println(format!(
                "  {} Texto extraído  {}",
                green("✓"),
                dim(&format!("{document_chars} chars"))
            ));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ask about a local PDF
  pdf-agent resumen.pdf -p "Eres un asistente experto en análisis de gastos."

  # Add a follow-up question
  pdf-agent resumen.pdf -p "Analiza el resumen de tarjeta" -m "¿Cuáles son mis gastos más altos?"

  # Long instruction from a file, answer written to a file
  pdf-agent contrato.pdf --instruction-file prompt.txt -o respuesta.md

  # PDF from a URL, structured output
  pdf-agent https://arxiv.org/pdf/1706.03762 -p "Summarize" --json

  # Only print the extracted text (no API key needed)
  pdf-agent --extract-only resumen.pdf

  # Interactive form: edit fields, submit, reset
  pdf-agent --interactive

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          API key (read on the first request)
  OPENAI_BASE_URL         OpenAI-compatible API root (default https://api.openai.com/v1)
  PDF_AGENT_MODEL         Model ID (default gpt-4o)
  PDF_AGENT_TEMPERATURE   Sampling temperature (default 0.7)
  RUST_LOG                Log filter, e.g. pdf_agent=debug
"#;

const INTERACTIVE_HELP: &str = "\
Comandos:
  instruction <texto>   fija el system prompt            (alias: i)
  file <ruta|url>       selecciona el PDF                (alias: f)
  message <texto>       mensaje adicional opcional       (alias: m)
  submit                analiza el PDF                   (alias: s)
  reset                 limpia todos los campos          (alias: r)
  show                  muestra el formulario y el estado
  help                  esta ayuda
  quit                  salir                            (alias: q, exit)";

/// Ask a language model about a PDF.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-agent",
    version,
    about = "Ask a language model about a PDF",
    long_about = "Extract the text of a PDF (local file or URL) and send it, together with your \
instruction and an optional message, to an OpenAI-compatible chat-completions endpoint. Prints \
the answer and the token usage.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "interactive")]
    input: Option<String>,

    /// Instruction sent as the system message.
    #[arg(short = 'p', long, env = "PDF_AGENT_INSTRUCTION")]
    instruction: Option<String>,

    /// Read the instruction from a text file.
    #[arg(long, conflicts_with = "instruction")]
    instruction_file: Option<PathBuf>,

    /// Optional message appended after the document text.
    #[arg(short, long, env = "PDF_AGENT_MESSAGE")]
    message: Option<String>,

    /// Chat model ID.
    #[arg(long, env = "PDF_AGENT_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "PDF_AGENT_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// OpenAI-compatible API root.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// API key (defaults to OPENAI_API_KEY at request time).
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Write the response to this file instead of stdout.
    #[arg(short, long, env = "PDF_AGENT_OUTPUT")]
    output: Option<PathBuf>,

    /// Output structured JSON (SubmissionReport) instead of plain text.
    #[arg(long, env = "PDF_AGENT_JSON")]
    json: bool,

    /// Print the extracted text and exit; no request is sent.
    #[arg(long)]
    extract_only: bool,

    /// Edit the form line by line and submit repeatedly.
    #[arg(short, long, conflicts_with_all = ["extract_only", "json", "output"])]
    interactive: bool,

    /// Disable the spinner.
    #[arg(long, env = "PDF_AGENT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_AGENT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except the response and errors.
    #[arg(short, long, env = "PDF_AGENT_QUIET")]
    quiet: bool,

    /// Completion request timeout in seconds.
    #[arg(
        long,
        env = "PDF_AGENT_API_TIMEOUT",
        default_value_t = 120,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(
        long,
        env = "PDF_AGENT_DOWNLOAD_TIMEOUT",
        default_value_t = 120,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs out
    // of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let input = cli.input.as_deref().unwrap_or_default();
        let file = resolve_input(input, cli.download_timeout)
            .await
            .context("Failed to read input")?;
        if !file.is_pdf() {
            return Err(AgentError::NotAPdf {
                name: file.name,
                media_type: file.media_type,
            })
            .context("Refusing to extract");
        }
        let text = extract_text_async(file.bytes)
            .await
            .context("Extraction failed")?;
        println!("{text}");
        return Ok(ExitCode::SUCCESS);
    }

    // ── Build session ────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let mut session = Session::from_config(config).context("Failed to create session")?;
    if show_progress {
        session = session.with_observer(SpinnerObserver::new());
    }

    if cli.interactive {
        if let Some(ref input) = cli.input {
            select_input(&mut session, input, cli.download_timeout).await;
        }
        if let Some(instruction) = initial_instruction(&cli).await? {
            session.set_instruction(instruction)?;
        }
        if let Some(ref message) = cli.message {
            session.set_auxiliary_message(message.as_str())?;
        }
        run_interactive(&mut session, cli.download_timeout).await?;
        return Ok(ExitCode::SUCCESS);
    }

    // ── One-shot mode ────────────────────────────────────────────────────
    session.set_instruction(initial_instruction(&cli).await?.unwrap_or_default())?;
    if let Some(ref message) = cli.message {
        session.set_auxiliary_message(message.as_str())?;
    }
    let input = cli.input.as_deref().unwrap_or_default();
    if !select_input(&mut session, input, cli.download_timeout).await {
        return Ok(ExitCode::FAILURE);
    }

    if session.submit().await.is_err() {
        render_phase(&session, cli.quiet);
        return Ok(ExitCode::FAILURE);
    }

    let Some(report) = session.report() else {
        return Ok(ExitCode::FAILURE);
    };

    if cli.json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialise output")?;
        println!("{json}");
    } else if let Some(ref output_path) = cli.output {
        write_response(output_path, &report.result.content)
            .await
            .context("Failed to write response")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} chars  →  {}",
                green("✔"),
                report.result.content.len(),
                bold(&output_path.display().to_string()),
            );
            render_usage(session.usage().copied().unwrap_or_default());
        }
    } else {
        render_phase(&session, cli.quiet);
    }

    Ok(ExitCode::SUCCESS)
}

/// Map CLI args to `AgentConfig`.
fn build_config(cli: &Cli) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder()
        .model(cli.model.as_str())
        .temperature(cli.temperature)
        .base_url(cli.base_url.as_str())
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.as_str());
    }
    builder.build().context("Invalid configuration")
}

/// The instruction from `--instruction` or `--instruction-file`, if any.
async fn initial_instruction(cli: &Cli) -> Result<Option<String>> {
    if let Some(ref path) = cli.instruction_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction from {:?}", path))?;
        return Ok(Some(text));
    }
    Ok(cli.instruction.clone())
}

/// Load `input` and hand it to the session. Errors are printed; returns
/// whether a PDF is now selected.
async fn select_input(session: &mut Session, input: &str, timeout_secs: u64) -> bool {
    let selected = match resolve_input(input, timeout_secs).await {
        Ok(file) => session.select_file(file),
        Err(e) => Err(e),
    };
    match selected {
        Ok(()) => true,
        Err(e) => {
            render_error(&e);
            false
        }
    }
}

/// Print whatever the current phase shows: response + usage, or the error.
fn render_phase(session: &Session, quiet: bool) {
    match session.phase() {
        Phase::Displaying(Outcome::Success(report)) => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(report.result.content.as_bytes()).ok();
            if !report.result.content.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
            handle.flush().ok();
            if !quiet {
                render_usage(report.result.usage);
            }
        }
        _ => {
            if let Some(err) = session.last_error() {
                render_error(err);
            }
        }
    }
}

fn render_usage(usage: pdf_agent::TokenUsage) {
    eprintln!("{}", bold("Uso de tokens:"));
    eprintln!("  Prompt:     {}", dim(&usage.prompt_tokens.to_string()));
    eprintln!("  Completion: {}", dim(&usage.completion_tokens.to_string()));
    eprintln!("  Total:      {}", dim(&usage.total_tokens.to_string()));
}

fn render_error(err: &AgentError) {
    eprintln!("{} {}", red("✘"), red(&error_message(err)));
}

/// Line-oriented form editor.
async fn run_interactive(session: &mut Session, download_timeout: u64) -> Result<()> {
    eprintln!("{} {}", cyan("◆"), bold("Agente - Análisis de PDF"));
    eprintln!("{}", dim("Escribe `help` para ver los comandos."));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("{} ", cyan(">"));
        io::stderr().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        let edit = match command {
            "instruction" | "i" => session.set_instruction(arg),
            "message" | "m" => session.set_auxiliary_message(arg),
            "file" | "f" => {
                select_input(session, arg, download_timeout).await;
                Ok(())
            }
            "submit" | "s" => {
                if !session.can_submit() {
                    eprintln!("{}", dim("(falta el system prompt o el archivo PDF)"));
                }
                // Validation still runs so the error banner matches the form.
                let _ = session.submit().await;
                render_phase(session, false);
                Ok(())
            }
            "reset" | "r" => session.reset().map(|()| {
                eprintln!("{} {}", green("✓"), dim("formulario limpio"));
            }),
            "show" => {
                render_form(session);
                Ok(())
            }
            "help" | "?" => {
                eprintln!("{INTERACTIVE_HELP}");
                Ok(())
            }
            "quit" | "q" | "exit" => break,
            other => {
                eprintln!("{} comando desconocido: {other}", red("✘"));
                Ok(())
            }
        };
        if let Err(e) = edit {
            render_error(&e);
        }
    }
    Ok(())
}

fn render_form(session: &Session) {
    let form = session.form();
    let or_dash = |s: &str| {
        if s.trim().is_empty() {
            dim("—")
        } else {
            s.to_string()
        }
    };
    eprintln!("System prompt:     {}", or_dash(&form.instruction));
    match form.file {
        Some(ref f) => eprintln!("Archivo:           {} {}", f.name, dim(&format!("({} bytes)", f.size()))),
        None => eprintln!("Archivo:           {}", dim("—")),
    }
    eprintln!("Mensaje adicional: {}", or_dash(&form.auxiliary_message));
    eprintln!("Estado:            {}", session.phase().label());
    if let Some(err) = session.last_error() {
        render_error(err);
    }
}
