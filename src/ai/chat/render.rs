//! Terminal rendering of a chat session.
use std::io::{self, Write};

use super::core::{Render, TurnError};
use super::models::{ChatMessage, Transcript};
use crate::openai::Role;
use crate::retriever::Passage;

/// Relevance score rounded to 3 decimals without trailing zeros,
/// e.g. `0.8123` -> `0.812` and `0.81` -> `0.81`.
pub fn format_score(score: f64) -> String {
    let rounded = (score * 1000.0).round() / 1000.0;
    format!("{}", rounded)
}

/// Streams answers to a writer as they arrive and prints the
/// retrieved context after each answer.
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_message(&mut self, msg: &ChatMessage) {
        let label = match msg.role {
            Role::User => ">>>",
            Role::Assistant => "<<<",
            Role::System => "###",
        };
        let _ = writeln!(self.out, "{} {}", label, msg.content);
    }
}

impl<W: Write + Send> Render for TerminalRenderer<W> {
    fn user_message(&mut self, _msg: &ChatMessage) {
        // Already on screen from the prompt
    }

    fn fragment(&mut self, fragment: &str, _partial: &str) {
        let _ = write!(self.out, "{}", fragment);
        let _ = self.out.flush();
    }

    fn assistant_message(&mut self, _msg: &ChatMessage) {
        let _ = writeln!(self.out);
    }

    fn passages(&mut self, passages: &[Passage]) {
        let _ = writeln!(self.out, "\n--- Retrieved context ---");
        for (index, passage) in passages.iter().enumerate() {
            let _ = writeln!(
                self.out,
                "[Chunk {}] Relevance Score: {}",
                index + 1,
                format_score(passage.score)
            );
            for line in passage.page_content.lines() {
                let _ = writeln!(self.out, "    {}", line);
            }
            if index + 1 < passages.len() {
                let _ = writeln!(self.out, "    ---");
            }
        }
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }

    fn error(&mut self, err: &TurnError) {
        let _ = writeln!(self.out, "\nError: {}", err);
        let _ = self.out.flush();
    }

    fn refresh(&mut self, transcript: &Transcript) {
        // ANSI clear screen and move the cursor home
        let _ = write!(self.out, "\x1B[2J\x1B[H");
        if transcript.is_empty() {
            let _ = writeln!(self.out, "Chat history cleared.");
        }
        for msg in transcript.iter() {
            self.write_message(msg);
        }
        let _ = self.out.flush();
    }
}

/// Renders nothing. For sessions without an attached view.
pub struct NullRenderer;

impl Render for NullRenderer {
    fn user_message(&mut self, _msg: &ChatMessage) {}
    fn fragment(&mut self, _fragment: &str, _partial: &str) {}
    fn assistant_message(&mut self, _msg: &ChatMessage) {}
    fn passages(&mut self, _passages: &[Passage]) {}
    fn error(&mut self, _err: &TurnError) {}
    fn refresh(&mut self, _transcript: &Transcript) {}
}
