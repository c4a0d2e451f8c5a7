use log::{ debug, error, info };
use std::io::Write;
use std::path::Path;
use tokio::io::{ AsyncBufReadExt, BufReader };

use crate::error::ChatError;
use crate::export;
use crate::models::chat::{ ChatMessage, Role };
use crate::render::Renderer;
use crate::session::ChatSession;

const HELP: &str = "Commands:
  /clear          delete the conversation
  /export         save the conversation as JSON
  /model <name>   switch model
  /models         list available models
  /history        show the conversation
  /help           show this help
  exit, quit, q   leave";

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Quit,
    Clear,
    Export,
    Model(Option<String>),
    Models,
    History,
    Help,
    Message(String),
    Nothing,
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Nothing;
    }
    match line.to_lowercase().as_str() {
        "exit" | "quit" | "q" | "/quit" | "/exit" => {
            return Input::Quit;
        }
        _ => {}
    }

    let mut parts = line.splitn(2, char::is_whitespace);
    match parts.next() {
        Some("/clear") => Input::Clear,
        Some("/export") => Input::Export,
        Some("/models") => Input::Models,
        Some("/history") => Input::History,
        Some("/help") => Input::Help,
        Some("/model") => {
            Input::Model(parts.next().map(str::trim).filter(|m| !m.is_empty()).map(String::from))
        }
        _ => Input::Message(line.to_string()),
    }
}

pub fn format_message(message: &ChatMessage, renderer: &dyn Renderer) -> String {
    match message.role {
        Role::User => format!("You: {}", message.content),
        Role::Assistant => format!("AI: {}", renderer.render(&message.content)),
    }
}

/// The styled form of a completed answer, or `None` when rendering leaves
/// the streamed text as it was.
pub fn rendered_answer(answer: &str, renderer: &dyn Renderer) -> Option<String> {
    let formatted = format_message(&ChatMessage::assistant(answer), renderer);
    (formatted != format!("AI: {}", answer)).then_some(formatted)
}

fn print_fragment(fragment: &str) {
    print!("{}", fragment);
    if let Err(e) = std::io::stdout().flush() {
        debug!("Failed to flush stdout: {}", e);
    }
}

/// Streams one answer to stdout. Ctrl-C abandons the stream. A completed
/// answer is printed again through `renderer` when that changes it.
pub async fn ask(
    session: &mut ChatSession,
    question: &str,
    renderer: &dyn Renderer
) -> Result<String, ChatError> {
    let cancel = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    print!("AI: ");
    let result = session.send_until(question, print_fragment, cancel).await;
    println!();
    if let Ok(answer) = &result {
        if let Some(styled) = rendered_answer(answer, renderer) {
            println!("\n{}", styled);
        }
    }
    result
}

pub async fn run(
    session: &mut ChatSession,
    renderer: &dyn Renderer,
    export_dir: &Path
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    println!("Tokamak AI Chat (Model: {})", display_model(session.model()));
    println!("Type 'exit' or 'quit' to end the conversation, '/help' for commands.\n");

    for message in session.history() {
        println!("{}\n", format_message(message, renderer));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let next = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = next else {
            println!();
            break;
        };

        match parse_input(&line) {
            Input::Nothing => {}
            Input::Quit => {
                println!("Goodbye!");
                break;
            }
            Input::Help => println!("{}", HELP),
            Input::History => {
                if session.history().is_empty() {
                    println!("(no messages)");
                }
                for message in session.history() {
                    println!("{}\n", format_message(message, renderer));
                }
            }
            Input::Clear => {
                session.clear().await;
                println!("Conversation cleared.");
            }
            Input::Export => {
                let written = match session.export_document() {
                    Ok(doc) => export::write_document(&doc, export_dir, chrono::Utc::now()).await,
                    Err(e) => Err(e),
                };
                match written {
                    Ok(path) => println!("Saved to {}", path.display()),
                    Err(e) => println!("Export failed: {}", e),
                }
            }
            Input::Models => {
                match session.client().list_models().await {
                    Ok(models) => {
                        for model in models {
                            let marker = if model == session.model() { "*" } else { " " };
                            println!("{} {}", marker, model);
                        }
                    }
                    Err(e) => println!("Failed to load models: {}", e),
                }
            }
            Input::Model(None) => println!("Current model: {}", display_model(session.model())),
            Input::Model(Some(name)) => {
                session.select_model(&name).await;
                println!("Model set to {}", name);
            }
            Input::Message(text) => {
                match ask(session, &text, renderer).await {
                    Ok(answer) => {
                        info!("Received {} characters", answer.len());
                        println!();
                    }
                    Err(e) => {
                        error!("Chat turn failed: {}", e);
                        println!("Error: {}\n", e);
                    }
                }
            }
        }
    }

    Ok(())
}

fn display_model(model: &str) -> &str {
    if model.is_empty() { "server default" } else { model }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::PlainRenderer;

    #[test]
    fn quit_words() {
        for word in ["exit", "QUIT", " q "] {
            assert_eq!(parse_input(word), Input::Quit);
        }
    }

    #[test]
    fn commands_and_messages() {
        assert_eq!(parse_input("/model  gpt-4o "), Input::Model(Some("gpt-4o".to_string())));
        assert_eq!(parse_input("/model"), Input::Model(None));
        assert_eq!(parse_input("/export"), Input::Export);
        assert_eq!(parse_input("  "), Input::Nothing);
        assert_eq!(parse_input("quite nice"), Input::Message("quite nice".to_string()));
    }

    struct Shouting;

    impl Renderer for Shouting {
        fn render(&self, text: &str) -> String {
            text.to_uppercase()
        }
    }

    #[test]
    fn completed_answer_is_reprinted_only_when_styled() {
        assert_eq!(rendered_answer("hi", &PlainRenderer), None);
        assert_eq!(rendered_answer("hi", &Shouting).as_deref(), Some("AI: HI"));
        assert_eq!(rendered_answer("OK", &Shouting), None);
    }

    #[test]
    fn formats_roles() {
        assert_eq!(format_message(&ChatMessage::user("hi"), &PlainRenderer), "You: hi");
        assert_eq!(format_message(&ChatMessage::assistant("yo"), &PlainRenderer), "AI: yo");
    }
}
