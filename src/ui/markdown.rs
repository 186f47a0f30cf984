// Markdown rendering for terminal display
//
// Answers are parsed with pulldown-cmark and flattened into styled lines.
// Fenced blocks with a language tag are highlighted with syntect and can be
// copied; tables stay unwrapped so the history view can scroll them sideways.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use regex::Regex;
use std::sync::OnceLock;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use tracing::debug;
use unicode_width::UnicodeWidthStr;

const HIGHLIGHT_THEME: &str = "base16-eighties.dark";
const RULE_WIDTH: usize = 48;

const INLINE_CODE: Style = Style::new().fg(Color::Magenta);
const CODE_FRAME: Style = Style::new().fg(Color::DarkGray);
const LINK: Style = Style::new()
    .fg(Color::Blue)
    .add_modifier(Modifier::UNDERLINED);
const QUOTE: Style = Style::new().fg(Color::Gray).add_modifier(Modifier::ITALIC);
const TABLE: Style = Style::new().fg(Color::Cyan);

/// How a rendered line behaves in the history view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Text,
    /// Rendered unwrapped and shifted by the horizontal table offset.
    Table,
    /// Part of the copyable code block with this index.
    Code(usize),
}

#[derive(Debug, Clone)]
pub struct DisplayLine {
    pub line: Line<'static>,
    pub kind: LineKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    code: String,
}

impl CodeBlock {
    /// Raw code as staged by the copy control, without the fence's trailing newline.
    pub fn copy_text(&self) -> &str {
        &self.code
    }
}

/// Links open outside the terminal; the title is the link text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct DisplayTree {
    pub lines: Vec<DisplayLine>,
    pub code_blocks: Vec<CodeBlock>,
    pub links: Vec<LinkRef>,
}

impl DisplayTree {
    #[cfg(test)]
    pub fn plain_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| {
                l.line
                    .spans
                    .iter()
                    .map(|s| s.content.as_ref())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Render an answer. Never fails: anything pulldown-cmark cannot give
/// structure to comes through as literal text.
pub fn render(markdown: &str) -> DisplayTree {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut renderer = Renderer::default();
    for event in Parser::new_ext(markdown, options) {
        renderer.handle(event);
    }
    renderer.finish()
}

/// Language of a fence info string; accepts `sql` as well as `language-sql`.
pub fn code_language(info: &str) -> Option<String> {
    let token = info.split_whitespace().next()?;
    let token = token.strip_prefix("language-").unwrap_or(token);
    let language: String = token
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!language.is_empty()).then_some(language)
}

struct PendingCode {
    language: Option<String>,
    text: String,
}

#[derive(Default)]
struct PendingTable {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
    has_header: bool,
}

struct PendingLink {
    url: String,
    title: String,
}

#[derive(Default)]
struct Renderer {
    out: Vec<DisplayLine>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    code: Option<PendingCode>,
    table: Option<PendingTable>,
    link: Option<PendingLink>,
    code_blocks: Vec<CodeBlock>,
    links: Vec<LinkRef>,
}

impl Renderer {
    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, patch: Style) {
        let style = self.style().patch(patch);
        self.styles.push(style);
    }

    fn pop_style(&mut self) {
        self.styles.pop();
    }

    fn push_line(&mut self, line: Line<'static>, kind: LineKind) {
        self.out.push(DisplayLine { line, kind });
    }

    fn flush(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let mut spans = Vec::with_capacity(self.spans.len() + 1);
        if self.quote_depth > 0 {
            spans.push(Span::styled("│ ".repeat(self.quote_depth), QUOTE));
        }
        spans.append(&mut self.spans);
        self.push_line(Line::from(spans), LineKind::Text);
    }

    fn blank(&mut self) {
        let last_blank = self
            .out
            .last()
            .map_or(true, |l| l.line.width() == 0 && l.kind == LineKind::Text);
        if !last_blank {
            self.push_line(Line::from(""), LineKind::Text);
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(code) = self.code.as_mut() {
            code.text.push_str(text);
        } else if let Some(table) = self.table.as_mut() {
            table.cell.push_str(text);
        } else if let Some(link) = self.link.as_mut() {
            link.title.push_str(text);
            let style = self.style();
            self.spans.push(Span::styled(text.to_string(), style));
        } else {
            self.linkified(text);
        }
    }

    /// Plain text with bare URLs turned into link references.
    fn linkified(&mut self, text: &str) {
        let style = self.style();
        let mut last = 0;
        for url in find_urls(text) {
            if url.start > last {
                self.spans
                    .push(Span::styled(text[last..url.start].to_string(), style));
            }
            let href = &text[url.start..url.end];
            self.spans.push(Span::styled(href.to_string(), style.patch(LINK)));
            self.links.push(LinkRef {
                title: href.to_string(),
                url: href.to_string(),
            });
            self.link_marker();
            last = url.end;
        }
        if last < text.len() {
            self.spans.push(Span::styled(text[last..].to_string(), style));
        }
    }

    fn link_marker(&mut self) {
        self.spans.push(Span::styled(
            format!("[{}]", self.links.len()),
            Style::default().fg(Color::DarkGray),
        ));
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                if self.table.is_some() || self.link.is_some() {
                    self.text(&code);
                } else {
                    self.spans.push(Span::styled(code.to_string(), INLINE_CODE));
                }
            }
            // Raw HTML is shown, never interpreted
            Event::Html(html) => {
                if self.code.is_some() || self.table.is_some() {
                    self.text(&html);
                } else {
                    let style = self.style().fg(Color::DarkGray);
                    for (i, part) in html.split('\n').enumerate() {
                        if i > 0 {
                            self.flush();
                        }
                        if !part.is_empty() {
                            self.spans.push(Span::styled(part.to_string(), style));
                        }
                    }
                }
            }
            Event::FootnoteReference(name) => self.text(&format!("[^{name}]")),
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => {
                if self.table.is_some() {
                    self.text(" ");
                } else {
                    self.flush();
                }
            }
            Event::Rule => {
                self.flush();
                self.push_line(
                    Line::from(Span::styled("─".repeat(RULE_WIDTH), CODE_FRAME)),
                    LineKind::Text,
                );
                self.blank();
            }
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                self.spans
                    .push(Span::styled(marker, Style::default().fg(Color::Yellow)));
            }
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph | Tag::FootnoteDefinition(_) => {}
            Tag::Heading(level, _, _) => {
                self.flush();
                let color = match level {
                    HeadingLevel::H1 => Color::Yellow,
                    HeadingLevel::H2 => Color::Cyan,
                    _ => Color::Blue,
                };
                self.push_style(Style::default().fg(color).add_modifier(Modifier::BOLD));
            }
            Tag::BlockQuote => {
                self.flush();
                self.quote_depth += 1;
                self.push_style(QUOTE);
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                let language = match kind {
                    CodeBlockKind::Fenced(info) => code_language(&info),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some(PendingCode {
                    language,
                    text: String::new(),
                });
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.spans.push(Span::raw(indent));
                self.spans
                    .push(Span::styled(marker, Style::default().fg(Color::Cyan)));
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Tag::Strikethrough => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT));
            }
            Tag::Link(_, url, _) => {
                self.push_style(LINK);
                self.link = Some(PendingLink {
                    url: url.to_string(),
                    title: String::new(),
                });
            }
            Tag::Image(_, url, _) => {
                let style = self.style().fg(Color::DarkGray);
                self.spans.push(Span::styled(format!("[image {url}: "), style));
            }
            Tag::Table(_) => {
                self.flush();
                self.table = Some(PendingTable::default());
            }
            Tag::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.has_header = true;
                }
            }
            Tag::TableRow | Tag::TableCell => {}
        }
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.flush();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            Tag::Heading(..) => {
                self.flush();
                self.pop_style();
                self.blank();
            }
            Tag::BlockQuote => {
                self.flush();
                self.pop_style();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank();
            }
            Tag::CodeBlock(_) => {
                if let Some(code) = self.code.take() {
                    self.finish_code(code);
                }
                self.blank();
            }
            Tag::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            Tag::Item | Tag::FootnoteDefinition(_) => self.flush(),
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough => self.pop_style(),
            Tag::Link(..) => {
                self.pop_style();
                if let Some(link) = self.link.take() {
                    let title = if link.title.trim().is_empty() {
                        link.url.clone()
                    } else {
                        link.title.trim().to_string()
                    };
                    if let Some(table) = self.table.as_mut() {
                        table.cell.push_str(&format!(" <{}>", link.url));
                    }
                    self.links.push(LinkRef {
                        title,
                        url: link.url,
                    });
                    if self.table.is_none() {
                        self.link_marker();
                    }
                }
            }
            Tag::Image(..) => {
                let style = self.style().fg(Color::DarkGray);
                self.spans.push(Span::styled("]", style));
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell.trim().to_string());
                }
            }
            Tag::TableHead | Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            Tag::Table(_) => {
                if let Some(table) = self.table.take() {
                    self.finish_table(&table);
                }
                self.blank();
            }
        }
    }

    fn finish_code(&mut self, code: PendingCode) {
        let text = code
            .text
            .strip_suffix('\n')
            .unwrap_or(&code.text)
            .to_string();

        let Some(language) = code.language else {
            for line in text.lines() {
                self.push_line(
                    Line::from(Span::styled(format!("  {line}"), INLINE_CODE)),
                    LineKind::Text,
                );
            }
            return;
        };

        let index = self.code_blocks.len();
        let kind = LineKind::Code(index);
        let header = format!("┌─ {language} ");
        let fill = RULE_WIDTH.saturating_sub(header.width());
        self.push_line(
            Line::from(vec![
                Span::styled(format!("{header}{}", "─".repeat(fill)), CODE_FRAME),
                Span::styled(" Ctrl+Y copy", Style::default().fg(Color::DarkGray)),
            ]),
            kind,
        );

        let highlighted = highlight_code(&text, &language);
        let gutter = highlighted.len().to_string().len();
        for (n, line) in highlighted.into_iter().enumerate() {
            let mut spans = vec![Span::styled(
                format!("│ {:>gutter$} ", n + 1),
                CODE_FRAME,
            )];
            spans.extend(line.spans);
            self.push_line(Line::from(spans), kind);
        }

        self.push_line(
            Line::from(Span::styled(format!("└{}", "─".repeat(RULE_WIDTH - 1)), CODE_FRAME)),
            kind,
        );
        self.code_blocks.push(CodeBlock {
            language,
            code: text,
        });
    }

    fn finish_table(&mut self, table: &PendingTable) {
        let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }
        let mut widths = vec![0; columns];
        for row in &table.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.width());
            }
        }

        let border = |left: &str, mid: &str, right: &str| {
            let parts: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            Line::from(Span::styled(
                format!("{left}{}{right}", parts.join(mid)),
                TABLE,
            ))
        };

        self.push_line(border("┌", "┬", "┐"), LineKind::Table);
        for (r, row) in table.rows.iter().enumerate() {
            let is_header = table.has_header && r == 0;
            let mut spans = vec![Span::styled("│", TABLE)];
            for (i, width) in widths.iter().enumerate() {
                let cell = row.get(i).map_or("", String::as_str);
                let pad = width.saturating_sub(cell.width());
                let style = if is_header {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                spans.push(Span::styled(format!(" {cell}{} ", " ".repeat(pad)), style));
                spans.push(Span::styled("│", TABLE));
            }
            self.push_line(Line::from(spans), LineKind::Table);
            if is_header {
                self.push_line(border("├", "┼", "┤"), LineKind::Table);
            }
        }
        self.push_line(border("└", "┴", "┘"), LineKind::Table);
    }

    fn finish(mut self) -> DisplayTree {
        // An unterminated construct still shows what was typed
        if let Some(code) = self.code.take() {
            self.finish_code(code);
        }
        if let Some(table) = self.table.take() {
            self.finish_table(&table);
        }
        self.flush();

        if !self.links.is_empty() {
            self.blank();
            self.push_line(
                Line::from(Span::styled(
                    "Links (open in browser):",
                    Style::default().fg(Color::DarkGray),
                )),
                LineKind::Text,
            );
            let refs: Vec<Line<'static>> = self
                .links
                .iter()
                .enumerate()
                .map(|(i, link)| {
                    Line::from(vec![
                        Span::styled(
                            format!("[{}] ", i + 1),
                            Style::default().fg(Color::DarkGray),
                        ),
                        Span::styled(
                            link.title.clone(),
                            Style::default().add_modifier(Modifier::BOLD),
                        ),
                        Span::raw(": "),
                        Span::styled(link.url.clone(), LINK),
                    ])
                })
                .collect();
            for line in refs {
                self.push_line(line, LineKind::Text);
            }
        }

        while self
            .out
            .last()
            .is_some_and(|l| l.line.width() == 0 && l.kind == LineKind::Text)
        {
            self.out.pop();
        }

        DisplayTree {
            lines: self.out,
            code_blocks: self.code_blocks,
            links: self.links,
        }
    }
}

fn url_pattern() -> Option<&'static Regex> {
    static URL: OnceLock<Option<Regex>> = OnceLock::new();
    URL.get_or_init(|| Regex::new(r"https?://[^\s<>()\[\]]+").ok())
        .as_ref()
}

fn find_urls(text: &str) -> Vec<std::ops::Range<usize>> {
    let Some(pattern) = url_pattern() else {
        return Vec::new();
    };
    pattern
        .find_iter(text)
        .map(|m| {
            let trimmed = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', '\'', '"']);
            m.start()..m.start() + trimmed.len()
        })
        .collect()
}

struct HighlightAssets {
    syntax_set: SyntaxSet,
    theme: Option<Theme>,
}

fn highlight_assets() -> &'static HighlightAssets {
    static ASSETS: OnceLock<HighlightAssets> = OnceLock::new();
    ASSETS.get_or_init(|| {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let mut themes = ThemeSet::load_defaults().themes;
        let theme = themes
            .remove(HIGHLIGHT_THEME)
            .or_else(|| themes.into_values().next());
        HighlightAssets { syntax_set, theme }
    })
}

fn syntect_style(style: syntect::highlighting::Style) -> Style {
    let fg = style.foreground;
    let mut out = Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b));
    if style.font_style.contains(FontStyle::BOLD) {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        out = out.add_modifier(Modifier::ITALIC);
    }
    if style.font_style.contains(FontStyle::UNDERLINE) {
        out = out.add_modifier(Modifier::UNDERLINED);
    }
    out
}

fn strip_eol(text: &str) -> &str {
    text.trim_end_matches(|c| c == '\n' || c == '\r')
}

/// One line per source line; unknown languages fall back to the plain-text syntax.
fn highlight_code(code: &str, language: &str) -> Vec<Line<'static>> {
    let assets = highlight_assets();
    let plain = |line: &str| Line::from(Span::raw(strip_eol(line).to_string()));

    let Some(theme) = assets.theme.as_ref() else {
        return LinesWithEndings::from(code).map(plain).collect();
    };
    let syntax = assets
        .syntax_set
        .find_syntax_by_token(language)
        .unwrap_or_else(|| assets.syntax_set.find_syntax_plain_text());

    let mut highlighter = HighlightLines::new(syntax, theme);
    LinesWithEndings::from(code)
        .map(|line| match highlighter.highlight_line(line, &assets.syntax_set) {
            Ok(ranges) => Line::from(
                ranges
                    .into_iter()
                    .map(|(style, text)| (syntect_style(style), strip_eol(text)))
                    .filter(|(_, text)| !text.is_empty())
                    .map(|(style, text)| Span::styled(text.to_string(), style))
                    .collect::<Vec<_>>(),
            ),
            Err(err) => {
                debug!(error = %err, language, "highlighting failed, showing plain line");
                plain(line)
            }
        })
        .collect()
}
