//! Reusable prompts using Handlebars for templating. Retrieved
//! passages are untrusted text so the registry runs in strict mode
//! and only knows the variables each template declares. HTML escaping
//! is turned off since the output is a chat prompt, not a web page.

use std::fmt;

use anyhow::Result;
use handlebars::Handlebars;
use serde::Serialize;

use crate::retriever::Passage;

#[derive(Debug)]
pub enum Prompt {
    RetrievalAnswer,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<Prompt> for String {
    fn from(item: Prompt) -> String {
        format!("{:?}", item)
    }
}

const RETRIEVAL_ANSWER_PROMPT: &str = r"
You are an AI chatbot specialized in {{subject}}. Your role is to answer questions exclusively based on the provided documentation and context about this library.

Answer the user's question from the context given below:
{{context}}
";

#[derive(Serialize)]
struct RetrievalAnswerVars<'a> {
    subject: &'a str,
    context: String,
}

pub fn templates<'a>() -> Handlebars<'a> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_escape_fn(handlebars::no_escape);
    registry
        .register_template_string(&Prompt::RetrievalAnswer.to_string(), RETRIEVAL_ANSWER_PROMPT)
        .expect("Failed to register template");
    registry
}

/// Joins the passages' text with newlines, in retrieval order.
pub fn context(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| p.page_content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders the system prompt that grounds the answer in the
/// retrieved passages.
pub fn retrieval_answer(
    templates: &Handlebars,
    subject: &str,
    passages: &[Passage],
) -> Result<String> {
    let vars = RetrievalAnswerVars {
        subject,
        context: context(passages),
    };
    Ok(templates.render(&Prompt::RetrievalAnswer.to_string(), &vars)?)
}
