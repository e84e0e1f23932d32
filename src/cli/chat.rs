use std::borrow::Cow;
use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use rustyline::completion::Completer;
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{ColorMode, DefaultEditor, Editor, Helper};

use crate::ai::chat::{ChatBuilder, Render, Session, TerminalRenderer};
use crate::api::public::chat::EXPORT_FILE_NAME;
use crate::catalog::{self, CatalogLoad};
use crate::core::AppConfig;
use crate::openai::CompletionClient;
use crate::retriever::DenserRetriever;

const HOW_TO_USE: &str = "\
1. Select an LLM model with /models and /model <id>.
2. Enter your GROQ API key if prompted.
3. Type your question about the documentation.
4. Read the answer and the retrieved context below it.
5. Optionally, /export the chat history or /clear it.";

const HOW_IT_WORKS: &str = "\
[User selects LLM model]
          |
[User enters query]
          |
[Retriever finds relevant chunks]
          |
[Query + chunks sent to the LLM]
          |
[LLM generates response]
          |
[Response displayed in chat]";

#[derive(Debug, PartialEq)]
enum SlashCommand {
    Models,
    Model(String),
    Export(Option<String>),
    Clear,
    Help,
    How,
    Quit,
    Unknown(String),
}

impl SlashCommand {
    /// Parses a line starting with `/`. Anything else is a question
    /// for the chat.
    fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('/')?;
        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::to_string);

        let cmd = match name {
            "models" => Self::Models,
            "model" => match arg {
                Some(id) => Self::Model(id),
                None => Self::Models,
            },
            "export" => Self::Export(arg),
            "clear" => Self::Clear,
            "help" => Self::Help,
            "how" => Self::How,
            "quit" | "exit" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        };
        Some(cmd)
    }
}

/// Runs a slash command. Returns false when the session should end.
fn handle_command(
    cmd: SlashCommand,
    session: &mut Session,
    catalog: &CatalogLoad,
    ui: &mut dyn Render,
) -> Result<bool> {
    match cmd {
        SlashCommand::Models => {
            if let Some(problem) = &catalog.problem {
                println!("Error: {}", problem);
            }
            for model in catalog.choices() {
                let marker = if session.model() == Some(model) { "*" } else { " " };
                println!("{} {}", marker, model);
            }
        }
        SlashCommand::Model(id) => {
            if catalog.accepts(&id) {
                session.set_model(&id);
                println!("Using model {}", id);
            } else {
                println!("Unknown model {}. See /models", id);
            }
        }
        SlashCommand::Export(path) => {
            let path = path.unwrap_or_else(|| EXPORT_FILE_NAME.to_string());
            fs::write(&path, session.export()?)
                .with_context(|| format!("Failed to export chat history to {}", path))?;
            println!("Exported {} messages to {}", session.transcript().len(), path);
        }
        SlashCommand::Clear => session.clear(ui),
        SlashCommand::Help => println!("{}", HOW_TO_USE),
        SlashCommand::How => println!("{}", HOW_IT_WORKS),
        SlashCommand::Quit => return Ok(false),
        SlashCommand::Unknown(name) => println!("Unknown command /{}. Try /help", name),
    }
    Ok(true)
}

/// Shows `*` for every typed character.
struct MaskingHelper;

impl Highlighter for MaskingHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Owned("*".repeat(line.chars().count()))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

impl Completer for MaskingHelper {
    type Candidate = String;
}

impl Hinter for MaskingHelper {
    type Hint = String;
}

impl Validator for MaskingHelper {}

impl Helper for MaskingHelper {}

/// Asks for the API key without echoing it. The key is only kept in
/// memory for this session.
fn prompt_api_key() -> Result<String> {
    let mut rl: Editor<MaskingHelper, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(MaskingHelper));
    rl.set_color_mode(ColorMode::Forced);
    rl.set_auto_add_history(false);
    let key = rl.readline("Enter GROQ API Key: ")?;
    Ok(key.trim().to_string())
}

pub async fn run(model: Option<String>, top_k: Option<usize>) -> Result<()> {
    super::init_tracing(&format!("{}=warn", env!("CARGO_CRATE_NAME")));

    let mut config = AppConfig::from_env()?;
    if let Some(k) = top_k {
        config.top_k = k;
    }

    let api_key = match config.llm_api_key.clone() {
        Some(key) => key,
        None => {
            let key = prompt_api_key()?;
            println!("API Key saved for this session");
            key
        }
    };

    let catalog = catalog::load(&config.models_path);
    if let Some(problem) = &catalog.problem {
        println!("Error: {}", problem);
    }

    let retriever = DenserRetriever::new(
        &config.retriever_url,
        &config.retriever_api_key,
        &config.retriever_id,
        config.request_timeout,
    );
    let completion = CompletionClient::new(&config.llm_api_hostname, &api_key);
    let chat = ChatBuilder::new(Arc::new(retriever), Arc::new(completion))
        .top_k(config.top_k)
        .subject(&config.subject)
        .build();

    let preferred = model.or(config.default_model.clone());
    let mut session = Session::new(catalog.select(preferred.as_deref()));
    let mut ui = TerminalRenderer::stdout();

    println!("RAG chatbot. Ask me anything about {}.", config.subject);
    match session.model() {
        Some(m) => println!("Model: {} (/help for commands)", m),
        None => println!("Model: none selected (/help for commands)"),
    }

    let mut rl = DefaultEditor::new()?;
    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if let Some(cmd) = SlashCommand::parse(line) {
                    match handle_command(cmd, &mut session, &catalog, &mut ui) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(err) => println!("Error: {:#}", err),
                    }
                    continue;
                }

                // Errors are shown by the renderer and the session
                // carries on with the next question
                let _ = chat.send(&mut session, line, &mut ui).await;
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
