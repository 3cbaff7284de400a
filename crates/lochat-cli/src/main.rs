//! lochat - chat with local Ollama models

mod app;
mod logging;
mod surface;

use std::io::Read as _;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use lochat_core::markdown::render_with_theme;
use lochat_core::ollama::OllamaClient;
use lochat_core::session::TurnState;
use lochat_core::Config;
use tracing::debug;

use app::{ChatApp, NO_MODELS_HINT};
use surface::{FanOut, HtmlFileSurface, TerminalSurface};

#[derive(Parser)]
#[command(name = "lochat", version, about = "Chat with local Ollama models")]
struct Cli {
    /// Ollama server URL (overrides OLLAMA_HOST and the config file)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Model name (defaults to the first installed model)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Config file (defaults to ~/.lochat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs here instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat (default)
    Chat {
        /// Rewrite the rendered transcript to this HTML file on every chunk
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Send a single prompt and print the reply
    Ask {
        prompt: String,

        /// Attach an image or document (repeatable)
        #[arg(long = "attach", value_name = "PATH")]
        attachments: Vec<PathBuf>,

        /// Wait for the whole reply instead of streaming it
        #[arg(long)]
        no_stream: bool,

        /// Write the rendered transcript to this HTML file
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// List installed models
    Models,
    /// Render markdown from a file (or stdin) to HTML on stdout
    Render { path: Option<PathBuf> },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?.apply_env();
    if let Some(host) = &cli.host {
        config = config.with_host_override(host);
    }
    Ok(config.with_model_override(cli.model.clone()))
}

fn surfaces(config: &Config, html: Option<PathBuf>) -> FanOut {
    let theme = config.theme();
    let mut fan = FanOut::new().with(TerminalSurface::stdout(&theme));
    if let Some(path) = html.or_else(|| config.transcript_path.clone()) {
        let html = HtmlFileSurface::new(path, theme);
        eprintln!("Transcript: {}", html.path().display());
        fan = fan.with(html);
    }
    fan
}

async fn ask(
    config: &Config,
    prompt: &str,
    attachments: &[PathBuf],
    no_stream: bool,
    html: Option<PathBuf>,
) -> Result<TurnState> {
    let mut app = ChatApp::new(config, surfaces(config, html));
    for path in attachments {
        app.attach(path)?;
    }
    let Some(model) = app.resolve_model().await? else {
        anyhow::bail!(NO_MODELS_HINT);
    };
    debug!("Asking {} ({} attachments)", model, attachments.len());

    if no_stream {
        app.run_turn_blocking(&model, prompt).await
    } else {
        app.run_turn(&model, prompt).await
    }
}

async fn list_models(config: &Config) -> Result<()> {
    let client = OllamaClient::from_config(config);
    let models = client
        .list_models()
        .await
        .with_context(|| format!("Cannot reach Ollama at {}", client.base_url()))?;
    if models.is_empty() {
        eprintln!("{NO_MODELS_HINT}");
    }
    for model in models {
        println!("{model}");
    }
    Ok(())
}

fn render_markdown(config: &Config, path: Option<&Path>) -> Result<()> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            text
        }
    };
    println!("{}", render_with_theme(&text, &config.theme()));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_file.as_deref())?;
    let config = load_config(&cli)?;
    debug!("Config: {:?}", config);

    match cli.command.unwrap_or(Command::Chat { html: None }) {
        Command::Chat { html } => {
            let mut app = ChatApp::new(&config, surfaces(&config, html));
            app.run().await
        }
        Command::Ask {
            prompt,
            attachments,
            no_stream,
            html,
        } => {
            if ask(&config, &prompt, &attachments, no_stream, html).await? == TurnState::Failed {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Models => list_models(&config).await,
        Command::Render { path } => render_markdown(&config, path.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from([
            "lochat", "--model", "llava", "ask", "what is this?", "--attach", "a.png", "--attach",
            "b.txt", "--no-stream",
        ])
        .unwrap();
        assert_eq!(cli.model.as_deref(), Some("llava"));
        match cli.command {
            Some(Command::Ask {
                prompt,
                attachments,
                no_stream,
                html,
            }) => {
                assert_eq!(prompt, "what is this?");
                assert_eq!(attachments, vec![PathBuf::from("a.png"), PathBuf::from("b.txt")]);
                assert!(no_stream);
                assert!(html.is_none());
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_default_command_is_chat() {
        let cli = Cli::try_parse_from(["lochat", "--host", "localhost:1234"]).unwrap();
        assert!(cli.command.is_none());

        let config = load_config(&Cli {
            config: Some(PathBuf::from("/nonexistent/lochat.toml")),
            ..cli
        });
        assert!(config.is_err());
    }

    #[test]
    fn test_host_flag_overrides_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "host = \"http://remote:11434\"\nmodel = \"mistral\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "lochat",
            "--config",
            path.to_str().unwrap(),
            "--host",
            "localhost:1234",
            "models",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.host, "http://localhost:1234");
        assert_eq!(config.model.as_deref(), Some("mistral"));
    }
}
