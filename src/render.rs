//! Markdown to HTML for the preview pane and for export.
//!
//! The body comes from pulldown-cmark; fenced code blocks that name a
//! language are colored with syntect, math is passed through in MathJax
//! delimiters and a `[TOC]` paragraph becomes a list of links to the
//! headings. The header and footer templates are read once when the
//! renderer is built.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use pulldown_cmark::{html as md_html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::config::{Config, TemplatePaths};
use crate::error::{QuarkError, RenderError, Result};

const FALLBACK_THEME: &str = "base16-ocean.dark";
const STYLESHEET_PLACEHOLDER: &str = "{stylesheet}";

/// Colors fenced code blocks.
pub struct CodeHighlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl CodeHighlighter {
    pub fn new(theme_name: &str) -> Self {
        let mut theme_set = ThemeSet::load_defaults();
        let theme = match theme_set.themes.remove(theme_name) {
            Some(theme) => theme,
            None => {
                log::warn!("Unknown syntax theme '{theme_name}', using {FALLBACK_THEME}");
                theme_set.themes.remove(FALLBACK_THEME).unwrap_or_default()
            }
        };
        Self { syntax_set: SyntaxSet::load_defaults_newlines(), theme }
    }

    /// Colored HTML for `code`, or `UnknownLexer` when no syntax matches `lang`.
    pub fn highlight(&self, code: &str, lang: &str) -> std::result::Result<String, RenderError> {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .ok_or_else(|| RenderError::UnknownLexer(lang.to_string()))?;
        let html = highlighted_html_for_string(code, &self.syntax_set, syntax, &self.theme)?;
        Ok(format!("<div class=\"highlight\">{html}</div>\n"))
    }
}

impl Default for CodeHighlighter {
    fn default() -> Self {
        Self::new(FALLBACK_THEME)
    }
}

pub struct Renderer {
    header: String,
    footer: String,
    code: CodeHighlighter,
}

impl Renderer {
    pub fn new(header: impl Into<String>, footer: impl Into<String>, code: CodeHighlighter) -> Self {
        Self { header: header.into(), footer: footer.into(), code }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let (header, footer) = load_templates(&config.template_paths())?;
        Ok(Self::new(header, footer, CodeHighlighter::new(&config.syntax_theme)))
    }

    /// The complete HTML document for `text`.
    pub fn render(&self, text: &str) -> String {
        let body = self.render_body(text);
        let mut html = String::with_capacity(self.header.len() + body.len() + self.footer.len());
        html.push_str(&self.header);
        html.push_str(&body);
        html.push_str(&self.footer);
        html
    }

    /// Writes the rendered document to `path` as is.
    pub fn export(&self, text: &str, path: &Path) -> Result<()> {
        fs::write(path, self.render(text)).map_err(|e| QuarkError::io(path, e))?;
        log::info!("Exported HTML to {}", path.display());
        Ok(())
    }

    pub fn highlight_code(&self, code: &str, lang: &str) -> std::result::Result<String, RenderError> {
        self.code.highlight(code, lang)
    }

    /// Converts markdown to the HTML that goes between header and footer.
    pub fn render_body(&self, text: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        options.insert(Options::ENABLE_MATH);

        let mut events: Vec<Event> = Vec::new();
        let mut code_block: Option<(Option<String>, String)> = None;

        for event in Parser::new_ext(text, options) {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .map(str::to_string),
                        CodeBlockKind::Indented => None,
                    };
                    code_block = Some((lang, String::new()));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, code)) = code_block.take() {
                        events.push(Event::Html(self.code_block_html(&code, lang.as_deref()).into()));
                    }
                }
                Event::Text(t) if code_block.is_some() => {
                    if let Some((_, code)) = code_block.as_mut() {
                        code.push_str(&t);
                    }
                }
                Event::InlineMath(math) => {
                    events.push(Event::InlineHtml(
                        format!("<span class=\"math inline\">\\({}\\)</span>", html_escape(&math)).into(),
                    ));
                }
                Event::DisplayMath(math) => {
                    events.push(Event::InlineHtml(
                        format!("<span class=\"math display\">\\[{}\\]</span>", html_escape(&math)).into(),
                    ));
                }
                other => events.push(other),
            }
        }

        let headings = assign_heading_ids(&mut events);
        expand_toc(&mut events, &headings);

        let mut html_output = String::new();
        md_html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    fn code_block_html(&self, code: &str, lang: Option<&str>) -> String {
        let Some(lang) = lang else {
            return plain_code_block(code);
        };
        match self.code.highlight(code, lang) {
            Ok(html) => html,
            Err(e) => {
                log::debug!("{e}; rendering code block without colors");
                plain_code_block(code)
            }
        }
    }
}

/// Reads the header and footer, substituting the stylesheet into the header.
pub fn load_templates(paths: &TemplatePaths) -> Result<(String, String)> {
    let header = fs::read_to_string(&paths.start).map_err(|e| QuarkError::io(&paths.start, e))?;
    let footer = fs::read_to_string(&paths.end).map_err(|e| QuarkError::io(&paths.end, e))?;

    let css = match &paths.stylesheet {
        Some(path) => match fs::read_to_string(path) {
            Ok(css) => format!("<style>\n{css}\n</style>"),
            Err(e) => {
                log::warn!("Failed to read stylesheet {}: {e}", path.display());
                String::new()
            }
        },
        None => String::new(),
    };

    Ok((header.replace(STYLESHEET_PLACEHOLDER, &css), footer))
}

fn plain_code_block(code: &str) -> String {
    format!("<div class=\"highlight\"><pre>{}</pre></div>\n", html_escape(code))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[derive(Debug, Clone, PartialEq)]
struct TocEntry {
    level: usize,
    id: String,
    title: String,
}

/// Gives every heading an `id` (keeping explicit `{#id}` attributes) and
/// returns them in document order.
fn assign_heading_ids(events: &mut [Event]) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    // Explicit ids are taken first so generated slugs steer around them.
    let mut used: HashSet<String> = events
        .iter()
        .filter_map(|e| match e {
            Event::Start(Tag::Heading { id: Some(id), .. }) => Some(id.to_string()),
            _ => None,
        })
        .collect();

    let mut i = 0;
    while i < events.len() {
        let Event::Start(Tag::Heading { level, .. }) = &events[i] else {
            i += 1;
            continue;
        };
        let level = *level as usize;

        let mut title = String::new();
        let mut j = i + 1;
        while j < events.len() && !matches!(events[j], Event::End(TagEnd::Heading(_))) {
            if let Event::Text(t) | Event::Code(t) = &events[j] {
                title.push_str(t);
            }
            j += 1;
        }

        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            let slug = match id {
                Some(existing) => existing.to_string(),
                None => unique_slug(&slugify(&title), &mut used),
            };
            *id = Some(CowStr::from(slug.clone()));
            entries.push(TocEntry { level, id: slug, title });
        }
        i = j + 1;
    }
    entries
}

fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if (c.is_whitespace() || c == '-' || c == '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() { "section".to_string() } else { slug }
}

fn unique_slug(base: &str, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }
    let mut n = 1;
    loop {
        let slug = format!("{base}-{n}");
        if used.insert(slug.clone()) {
            return slug;
        }
        n += 1;
    }
}

/// Replaces paragraphs that only contain `[TOC]` with the table of contents.
fn expand_toc(events: &mut Vec<Event>, headings: &[TocEntry]) {
    let mut i = 0;
    while i < events.len() {
        if !matches!(events[i], Event::Start(Tag::Paragraph)) {
            i += 1;
            continue;
        }
        let Some(len) = events[i..].iter().position(|e| matches!(e, Event::End(TagEnd::Paragraph))) else {
            break;
        };
        let end = i + len;

        let mut text = String::new();
        let only_text = events[i + 1..end].iter().all(|e| match e {
            Event::Text(t) => {
                text.push_str(t);
                true
            }
            _ => false,
        });

        if only_text && text.trim() == "[TOC]" {
            events.drain(i + 1..=end);
            events[i] = Event::Html(toc_html(headings).into());
        }
        i += 1;
    }
}

fn toc_html(headings: &[TocEntry]) -> String {
    let mut html = String::from("<div class=\"toc\">\n");
    let base = headings.iter().map(|h| h.level).min().unwrap_or(1);
    let mut depth = 0;

    for heading in headings {
        let target = heading.level - base + 1;
        while depth < target {
            html.push_str("<ul>\n");
            depth += 1;
        }
        while depth > target {
            html.push_str("</ul>\n");
            depth -= 1;
        }
        html.push_str(&format!(
            "<li><a href=\"#{}\">{}</a></li>\n",
            html_escape(&heading.id),
            html_escape(&heading.title)
        ));
    }
    while depth > 0 {
        html.push_str("</ul>\n");
        depth -= 1;
    }
    html.push_str("</div>\n");
    html
}
