//! Interactive chat loop and one-shot turns

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use crossterm::style::Stylize;
use lochat_core::attachments::Attachment;
use lochat_core::ollama::{OllamaClient, StreamEvent};
use lochat_core::session::{DisplaySurface, SessionController, TurnState};
use lochat_core::Config;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

pub const NO_MODELS_HINT: &str = "No models available.\n\
    Make sure Ollama is installed and running, then download a model with: ollama pull llama2";

const HELP: &str = "\
/attach PATH     attach an image or document to the next prompt
/detach NAME     remove a pending attachment
/attachments     list pending attachments
/models          list installed models
/model [NAME]    show or switch the model
/clear           forget the conversation
/help            show this help
/quit            exit";

/// One line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Prompt(String),
    Attach(PathBuf),
    Detach(String),
    Attachments,
    Models,
    Model(Option<String>),
    Clear,
    Help,
    Quit,
    Empty,
}

impl ReplCommand {
    /// Parse a line; `Err` carries a usage message
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Self::Empty);
        }
        let Some(command) = line.strip_prefix('/') else {
            return Ok(Self::Prompt(line.to_string()));
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (command, None),
        };

        match (name, arg) {
            ("attach", Some(path)) => Ok(Self::Attach(PathBuf::from(path))),
            ("attach", None) => Err("usage: /attach PATH".to_string()),
            ("detach", Some(name)) => Ok(Self::Detach(name.to_string())),
            ("detach", None) => Err("usage: /detach NAME".to_string()),
            ("attachments", _) => Ok(Self::Attachments),
            ("models", _) => Ok(Self::Models),
            ("model", arg) => Ok(Self::Model(arg.map(str::to_string))),
            ("clear", _) => Ok(Self::Clear),
            ("help", _) => Ok(Self::Help),
            ("quit" | "exit", _) => Ok(Self::Quit),
            (other, _) => Err(format!("unknown command /{other} (try /help)")),
        }
    }
}

pub struct ChatApp<S: DisplaySurface> {
    client: OllamaClient,
    session: SessionController<S>,
    model: Option<String>,
    /// Attachments for the next prompt
    pending: Vec<Attachment>,
}

impl<S: DisplaySurface> ChatApp<S> {
    pub fn new(config: &Config, surface: S) -> Self {
        Self {
            client: OllamaClient::from_config(config),
            session: SessionController::new(surface, config.theme()),
            model: config.model.clone(),
            pending: Vec::new(),
        }
    }

    pub fn pending(&self) -> &[Attachment] {
        &self.pending
    }

    pub fn attach(&mut self, path: &Path) -> Result<&Attachment> {
        let attachment = Attachment::load(path)
            .with_context(|| format!("Cannot attach {}", path.display()))?;
        info!("Attached {} ({:?})", attachment.name, attachment.kind);
        self.pending.push(attachment);
        Ok(&self.pending[self.pending.len() - 1])
    }

    /// Remove a pending attachment by name; false if none matched
    pub fn detach(&mut self, name: &str) -> bool {
        let before = self.pending.len();
        self.pending.retain(|a| a.name != name);
        self.pending.len() != before
    }

    /// Configured model, or the first installed one
    pub async fn resolve_model(&mut self) -> Result<Option<String>> {
        if let Some(model) = &self.model {
            return Ok(Some(model.clone()));
        }
        let models = self
            .client
            .list_models()
            .await
            .with_context(|| format!("Cannot reach Ollama at {}", self.client.base_url()))?;
        self.model = models.into_iter().next();
        if let Some(model) = &self.model {
            info!("Using model {}", model);
        }
        Ok(self.model.clone())
    }

    /// Run one streamed turn to completion
    pub async fn run_turn(&mut self, model: &str, prompt: &str) -> Result<TurnState> {
        let attachments = std::mem::take(&mut self.pending);
        let messages = self.session.begin_turn(prompt, attachments)?;
        let mut rx = self.client.spawn_chat_stream(model.to_string(), messages);

        while let Some(event) = rx.recv().await {
            if self.session.handle_event(event)? != TurnState::Streaming {
                break;
            }
        }
        if self.session.is_streaming() {
            self.session.fail("stream ended unexpectedly")?;
        }
        Ok(self.session.state())
    }

    /// Run one turn with a single non-streaming request
    pub async fn run_turn_blocking(&mut self, model: &str, prompt: &str) -> Result<TurnState> {
        let attachments = std::mem::take(&mut self.pending);
        let messages = self.session.begin_turn(prompt, attachments)?;
        let event = match self.client.chat(model, &messages).await {
            Ok(reply) => StreamEvent::chunk(reply),
            Err(e) => StreamEvent::failed(e.to_string()),
        };
        if self.session.handle_event(event)? == TurnState::Streaming {
            self.session.handle_event(StreamEvent::Done)?;
        }
        Ok(self.session.state())
    }

    /// Read prompts and commands from stdin until `/quit` or EOF
    pub async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("lochat connected to {} (type /help for commands)", self.client.base_url());

        loop {
            print!("{} ", "You:".blue().bold());
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                println!();
                break;
            };
            let command = match ReplCommand::parse(&line) {
                Ok(command) => command,
                Err(usage) => {
                    eprintln!("{usage}");
                    continue;
                }
            };
            debug!("REPL command: {:?}", command);

            match command {
                ReplCommand::Empty => {}
                ReplCommand::Quit => break,
                ReplCommand::Help => println!("{HELP}"),
                ReplCommand::Prompt(prompt) => self.send(&prompt).await,
                ReplCommand::Attach(path) => match self.attach(&path) {
                    Ok(attachment) => println!("{}", attachment.marker()),
                    Err(e) => eprintln!("{e:#}"),
                },
                ReplCommand::Detach(name) => {
                    if !self.detach(&name) {
                        eprintln!("No pending attachment named {name}");
                    }
                }
                ReplCommand::Attachments => {
                    if self.pending().is_empty() {
                        println!("No pending attachments");
                    }
                    for attachment in self.pending() {
                        println!("{}", attachment.marker());
                    }
                }
                ReplCommand::Models => match self.client.list_models().await {
                    Ok(models) if models.is_empty() => eprintln!("{NO_MODELS_HINT}"),
                    Ok(models) => {
                        for model in models {
                            let marker = if self.model.as_deref() == Some(model.as_str()) { "*" } else { " " };
                            println!("{marker} {model}");
                        }
                    }
                    Err(e) => eprintln!("Failed to list models: {e}"),
                },
                ReplCommand::Model(None) => match &self.model {
                    Some(model) => println!("{model}"),
                    None => println!("No model selected"),
                },
                ReplCommand::Model(Some(name)) => {
                    info!("Switching model to {}", name);
                    self.model = Some(name);
                }
                ReplCommand::Clear => match self.session.clear() {
                    Ok(()) => println!("Conversation cleared"),
                    Err(e) => eprintln!("{e}"),
                },
            }
        }
        Ok(())
    }

    async fn send(&mut self, prompt: &str) {
        let model = match self.resolve_model().await {
            Ok(Some(model)) => model,
            Ok(None) => {
                eprintln!("{NO_MODELS_HINT}");
                return;
            }
            Err(e) => {
                eprintln!("{e:#}");
                return;
            }
        };
        // Failures are shown by the surface and recorded in the history
        if let Err(e) = self.run_turn(&model, prompt).await {
            eprintln!("{e:#}");
        }
    }
}
