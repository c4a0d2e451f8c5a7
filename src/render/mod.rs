//! Turning message text into terminal output.

use log::debug;
use once_cell::sync::Lazy;
use pulldown_cmark::{ CodeBlockKind, Event, Options, Parser, Tag, TagEnd };
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::{ as_24_bit_terminal_escaped, LinesWithEndings };

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const ITALIC: &str = "\x1b[3m";
const STRIKE: &str = "\x1b[9m";
const CODE: &str = "\x1b[36m";
const HEADING: &str = "\x1b[1;35m";
const LINK: &str = "\x1b[4;34m";

const CODE_THEME: &str = "base16-ocean.dark";

static SYNTAXES: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEMES: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

pub trait Renderer: Send + Sync {
    fn render(&self, text: &str) -> String;
}

/// Leaves text untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainRenderer;

impl Renderer for PlainRenderer {
    fn render(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Markdown to ANSI terminal text. Fenced code blocks are highlighted by
/// language.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnsiRenderer;

impl Renderer for AnsiRenderer {
    fn render(&self, text: &str) -> String {
        let mut writer = AnsiWriter::default();
        for event in Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS) {
            writer.event(event);
        }
        writer.finish()
    }
}

#[derive(Default)]
struct AnsiWriter {
    out: String,
    /// Active styles, re-applied after each reset.
    styles: Vec<&'static str>,
    /// Next number of each open list; `None` for bullet lists.
    lists: Vec<Option<u64>>,
    /// Language and body of the fenced block being collected.
    code: Option<(String, String)>,
    links: Vec<String>,
}

impl AnsiWriter {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                match self.code.as_mut() {
                    Some((_, body)) => body.push_str(&text),
                    None => self.out.push_str(&text),
                }
            }
            Event::Code(code) => {
                self.push_style(CODE);
                self.out.push_str(&code);
                self.pop_style();
            }
            Event::Html(html) | Event::InlineHtml(html) => self.out.push_str(&html),
            Event::SoftBreak | Event::HardBreak => self.out.push('\n'),
            Event::Rule => {
                self.block_break();
                self.out.push_str(&"─".repeat(24));
            }
            Event::TaskListMarker(done) => self.out.push_str(if done { "[x] " } else { "[ ] " }),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.lists.is_empty() {
                    self.block_break();
                }
            }
            Tag::Heading { .. } => {
                self.block_break();
                self.push_style(HEADING);
            }
            Tag::CodeBlock(kind) => {
                self.block_break();
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info.split([',', ' ']).next().unwrap_or_default().to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some((language, String::new()));
            }
            Tag::List(first) => {
                if self.lists.is_empty() {
                    self.block_break();
                } else {
                    self.line_break();
                }
                self.lists.push(first);
            }
            Tag::Item => {
                self.line_break();
                self.out.push_str(&"  ".repeat(self.lists.len().saturating_sub(1)));
                match self.lists.last_mut() {
                    Some(Some(n)) => {
                        self.out.push_str(&format!("{}. ", n));
                        *n += 1;
                    }
                    _ => self.out.push_str("• "),
                }
            }
            Tag::Emphasis => self.push_style(ITALIC),
            Tag::Strong => self.push_style(BOLD),
            Tag::Strikethrough => self.push_style(STRIKE),
            Tag::Link { dest_url, .. } => {
                self.links.push(dest_url.to_string());
                self.push_style(LINK);
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) | TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.pop_style();
            }
            TagEnd::CodeBlock => {
                if let Some((language, body)) = self.code.take() {
                    self.out.push_str(&highlight_code(&body, &language));
                }
            }
            TagEnd::List(_) => {
                self.lists.pop();
            }
            TagEnd::Link => {
                let url = self.links.pop().unwrap_or_default();
                // Autolinks already show their target.
                let shown = !url.is_empty() && !self.out.ends_with(&url);
                self.pop_style();
                if shown {
                    self.out.push_str(&format!(" ({})", url));
                }
            }
            _ => {}
        }
    }

    fn push_style(&mut self, style: &'static str) {
        self.styles.push(style);
        self.out.push_str(style);
    }

    fn pop_style(&mut self) {
        self.styles.pop();
        self.out.push_str(RESET);
        for style in &self.styles {
            self.out.push_str(style);
        }
    }

    /// Blocks are separated by one blank line.
    fn block_break(&mut self) {
        if self.out.is_empty() {
            return;
        }
        self.trim_newlines();
        self.out.push_str("\n\n");
    }

    fn line_break(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn trim_newlines(&mut self) {
        let kept = self.out.trim_end_matches('\n').len();
        self.out.truncate(kept);
    }

    fn finish(mut self) -> String {
        self.trim_newlines();
        self.out
    }
}

fn highlight_code(code: &str, language: &str) -> String {
    let syntax = Some(language)
        .filter(|l| !l.is_empty())
        .and_then(|l| SYNTAXES.find_syntax_by_token(l))
        .unwrap_or_else(|| SYNTAXES.find_syntax_plain_text());
    let Some(theme) = THEMES.themes.get(CODE_THEME) else {
        return format!("{}{}{}", CODE, code.trim_end_matches('\n'), RESET);
    };

    let mut highlighter = HighlightLines::new(syntax, theme);
    let mut out = String::with_capacity(code.len() * 2);
    for line in LinesWithEndings::from(code) {
        match highlighter.highlight_line(line, &SYNTAXES) {
            Ok(ranges) => out.push_str(&as_24_bit_terminal_escaped(&ranges, false)),
            Err(e) => {
                debug!("Highlighting failed for '{}' block: {}", language, e);
                out.push_str(line);
            }
        }
    }
    let kept = out.trim_end_matches('\n').len();
    out.truncate(kept);
    out.push_str(RESET);
    out
}

pub fn renderer_for(plain: bool) -> Box<dyn Renderer> {
    if plain { Box::new(PlainRenderer) } else { Box::new(AnsiRenderer) }
}
