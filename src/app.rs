use reqwest::Url;
use std::time::Instant;
use tracing::debug;

use crate::store::{Intent, Store};
use crate::submission::QueryTicket;
use crate::ui::history::MarkdownCache;
use crate::ui::markdown::CodeBlock;
use crate::ui::widgets::Theme;

/// Longest question the input box accepts.
pub const MAX_QUESTION_LEN: usize = 500;

/// Work the UI loop has to carry out after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Submit(QueryTicket),
    Copy { text: String, what: String },
}

#[derive(Debug)]
pub struct App {
    pub should_quit: bool,
    pub store: Store,
    /// Text being typed. Mirrored into the store, owned here.
    pub input_buffer: String,
    /// Set once a query completed; editing the input clears it.
    pub regenerate_eligible: bool,
    pub scroll_offset: usize,
    pub table_offset: usize,
    pub show_help: bool,
    pub show_examples: bool,
    pub exit_pending: bool,
    pub examples: Vec<String>,
    pub selected_example: usize,
    /// Position in [`App::code_block_refs`], so older answers are reachable too.
    pub selected_code_block: usize,
    pub notice: Option<String>,
    pub fetch_started: Option<Instant>,
    pub share_url: String,
    pub markdown: MarkdownCache,
    pub theme: Theme,
}

impl App {
    pub fn new(examples: Vec<String>, share_url: String) -> Self {
        Self {
            should_quit: false,
            store: Store::new(),
            input_buffer: String::new(),
            regenerate_eligible: false,
            scroll_offset: 0,
            table_offset: 0,
            show_help: false,
            show_examples: false,
            exit_pending: false,
            examples,
            selected_example: 0,
            selected_code_block: 0,
            notice: None,
            fetch_started: None,
            share_url,
            markdown: MarkdownCache::default(),
            theme: Theme::default(),
        }
    }

    pub const fn quit(&mut self) {
        self.should_quit = true;
    }

    pub const fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn toggle_examples(&mut self) {
        self.show_examples = !self.show_examples && !self.examples.is_empty();
    }

    pub const fn scroll_up(&mut self, amount: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(amount);
    }

    pub const fn scroll_down(&mut self, amount: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(amount);
    }

    pub const fn scroll_to_top(&mut self) {
        self.scroll_offset = 0;
    }

    pub const fn scroll_to_bottom(&mut self) {
        // Clamped to the real content height while rendering
        self.scroll_offset = usize::MAX;
    }

    pub const fn scroll_left(&mut self, amount: usize) {
        self.table_offset = self.table_offset.saturating_sub(amount);
    }

    pub const fn scroll_right(&mut self, amount: usize) {
        self.table_offset = self.table_offset.saturating_add(amount);
    }

    fn mirror_input(&mut self) {
        self.regenerate_eligible = false;
        self.store.dispatch(Intent::SetInputQuestion(self.input_buffer.clone()));
    }

    pub fn input_len(&self) -> usize {
        self.input_buffer.chars().count()
    }

    /// Characters past [`MAX_QUESTION_LEN`] are dropped.
    pub fn push_char(&mut self, c: char) {
        if self.input_len() >= MAX_QUESTION_LEN {
            return;
        }
        self.input_buffer.push(c);
        self.mirror_input();
    }

    pub fn pop_char(&mut self) {
        if self.input_buffer.pop().is_some() {
            self.mirror_input();
        }
    }

    pub fn set_input(&mut self, text: &str) {
        self.input_buffer = text.chars().take(MAX_QUESTION_LEN).collect();
        self.mirror_input();
    }

    pub fn select_next_example(&mut self) {
        if !self.examples.is_empty() {
            self.selected_example = (self.selected_example + 1) % self.examples.len();
        }
    }

    pub fn select_previous_example(&mut self) {
        if !self.examples.is_empty() {
            self.selected_example = self
                .selected_example
                .checked_sub(1)
                .unwrap_or(self.examples.len() - 1);
        }
    }

    /// Stage the highlighted example for submission and close the popup.
    pub fn choose_example(&mut self) {
        let Some(question) = self.examples.get(self.selected_example).cloned() else {
            return;
        };
        debug!(index = self.selected_example, "example question chosen");
        self.input_buffer.clear();
        self.store.dispatch(Intent::SetInputQuestion(String::new()));
        self.store.dispatch(Intent::SetPreQuestion(question));
        self.show_examples = false;
    }

    /// Question passed on the command line; goes through the example path.
    pub fn stage_initial_question(&mut self, question: String) {
        self.store.dispatch(Intent::SetPreQuestion(question));
    }

    /// `(record, block)` of every copyable code block, newest answer first.
    pub fn code_block_refs(&mut self) -> Vec<(usize, usize)> {
        self.markdown.sync(self.store.revision(), &self.store.state().results);
        let mut refs = Vec::new();
        for (record_index, record) in self.store.state().results.iter().enumerate() {
            let count = self.markdown.tree(record).code_blocks.len();
            refs.extend((0..count).map(|block| (record_index, block)));
        }
        refs
    }

    pub fn selected_code_ref(&mut self) -> Option<(usize, usize)> {
        let index = self.selected_code_block;
        self.code_block_refs().get(index).copied()
    }

    pub fn cycle_code_block(&mut self) {
        let count = self.code_block_refs().len();
        self.selected_code_block = if count == 0 {
            0
        } else {
            (self.selected_code_block + 1) % count
        };
    }

    fn code_block(&mut self, (record_index, block_index): (usize, usize)) -> Option<&CodeBlock> {
        let record = self.store.state().results.get(record_index)?;
        self.markdown.tree(record).code_blocks.get(block_index)
    }

    pub fn copy_selected_code(&mut self) -> Option<Command> {
        let selected = self.selected_code_ref()?;
        let block = self.code_block(selected)?;
        let what = if selected.0 == 0 {
            format!("{} code block", block.language)
        } else {
            format!("{} code block from an earlier answer", block.language)
        };
        Some(Command::Copy {
            text: block.copy_text().to_string(),
            what,
        })
    }

    /// Links of the newest answer, one per line.
    pub fn copy_links(&mut self) -> Option<Command> {
        let record = self.store.state().current()?;
        self.markdown.sync(self.store.revision(), &self.store.state().results);
        let links = &self.markdown.tree(record).links;
        if links.is_empty() {
            return None;
        }
        let text = links
            .iter()
            .map(|link| link.url.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Some(Command::Copy {
            text,
            what: format!("{} link(s)", links.len()),
        })
    }

    pub fn share_current(&self) -> Option<Command> {
        let question = self.store.state().current()?.question.as_deref()?;
        let link = share_link(&self.share_url, question)?;
        Some(Command::Copy {
            text: link,
            what: "share link".to_string(),
        })
    }
}

/// `<base>?q=<question>`, the same parameter a startup question is read from.
pub fn share_link(base: &str, question: &str) -> Option<String> {
    let mut url = Url::parse(base).ok()?;
    url.query_pairs_mut().clear().append_pair("q", question);
    Some(url.to_string())
}

/// Startup question from `-q <text>`, `--q=<text>` or a URL carrying `?q=`.
pub fn initial_question<I>(args: I) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut question = None;
    while let Some(arg) = args.next() {
        if arg == "-q" || arg == "--q" {
            question = args.next();
        } else if let Some(value) = arg.strip_prefix("--q=") {
            question = Some(value.to_string());
        } else if let Ok(url) = Url::parse(&arg) {
            if let Some((_, value)) = url.query_pairs().find(|(key, _)| key == "q") {
                question = Some(value.into_owned());
            }
        }
    }
    question.filter(|q| !q.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryRecord;
    use crate::store::FetchStatus;

    fn app() -> App {
        App::new(
            vec!["first example".to_string(), "second example".to_string()],
            "https://ask.databend.rs".to_string(),
        )
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_app_new() {
        let app = app();
        assert!(!app.should_quit);
        assert!(app.input_buffer.is_empty());
        assert_eq!(app.store.state().fetch_status, FetchStatus::NeverRun);
    }

    #[test]
    fn test_app_quit() {
        let mut app = app();
        app.quit();
        assert!(app.should_quit);
    }

    #[test]
    fn test_typing_is_mirrored_and_clears_regenerate() {
        let mut app = app();
        app.regenerate_eligible = true;
        app.push_char('h');
        app.push_char('i');
        assert_eq!(app.input_buffer, "hi");
        assert_eq!(app.store.state().input_question, "hi");
        assert!(!app.regenerate_eligible);

        app.pop_char();
        assert_eq!(app.store.state().input_question, "h");
    }

    #[test]
    fn test_input_length_limit() {
        let mut app = app();
        app.set_input(&"x".repeat(MAX_QUESTION_LEN + 20));
        assert_eq!(app.input_len(), MAX_QUESTION_LEN);
        app.push_char('y');
        assert_eq!(app.input_len(), MAX_QUESTION_LEN);
        assert!(!app.input_buffer.ends_with('y'));
    }

    #[test]
    fn test_scroll() {
        let mut app = app();
        app.scroll_down(3);
        assert_eq!(app.scroll_offset, 3);
        app.scroll_up(10);
        assert_eq!(app.scroll_offset, 0);
        app.scroll_to_bottom();
        assert_eq!(app.scroll_offset, usize::MAX);
        app.scroll_to_top();
        assert_eq!(app.scroll_offset, 0);

        app.scroll_right(4);
        app.scroll_left(1);
        assert_eq!(app.table_offset, 3);
    }

    #[test]
    fn test_example_selection_wraps() {
        let mut app = app();
        app.select_previous_example();
        assert_eq!(app.selected_example, 1);
        app.select_next_example();
        assert_eq!(app.selected_example, 0);
    }

    #[test]
    fn test_choose_example_stages_question() {
        let mut app = app();
        app.set_input("half typed");
        app.show_examples = true;
        app.select_next_example();
        app.choose_example();

        assert!(app.input_buffer.is_empty());
        assert!(!app.show_examples);
        assert_eq!(app.store.state().input_question, "");
        assert_eq!(app.store.state().pre_question, "second example");
    }

    #[test]
    fn test_toggle_examples_needs_examples() {
        let mut app = App::new(Vec::new(), String::new());
        app.toggle_examples();
        assert!(!app.show_examples);
    }

    #[test]
    fn test_copy_selected_code() {
        let mut app = app();
        assert_eq!(app.copy_selected_code(), None);

        app.store.dispatch(Intent::UpdateResult(QueryRecord::new(
            "```sql\nSELECT 1;\n```\n\n```python\nprint(1)\n```".to_string(),
            Some("q".to_string()),
            false,
        )));
        assert_eq!(
            app.copy_selected_code(),
            Some(Command::Copy {
                text: "SELECT 1;".to_string(),
                what: "sql code block".to_string(),
            })
        );

        app.cycle_code_block();
        assert_eq!(app.selected_code_block, 1);
        app.cycle_code_block();
        assert_eq!(app.selected_code_block, 0);
    }

    #[test]
    fn test_code_blocks_of_earlier_answers_are_copyable() {
        let mut app = app();
        app.store.dispatch(Intent::UpdateResult(QueryRecord::new(
            "```sql\nSELECT old;\n```".to_string(),
            Some("q".to_string()),
            false,
        )));
        app.store.dispatch(Intent::UpdateResult(QueryRecord::new(
            "```sql\nSELECT new;\n```".to_string(),
            Some("q".to_string()),
            true,
        )));
        assert_eq!(app.code_block_refs(), vec![(0, 0), (1, 0)]);

        let mut copied = Vec::new();
        for _ in 0..3 {
            if let Some(Command::Copy { text, .. }) = app.copy_selected_code() {
                copied.push(text);
            }
            app.cycle_code_block();
        }
        assert_eq!(copied, vec!["SELECT new;", "SELECT old;", "SELECT new;"]);

        app.selected_code_block = 1;
        assert_eq!(
            app.copy_selected_code(),
            Some(Command::Copy {
                text: "SELECT old;".to_string(),
                what: "sql code block from an earlier answer".to_string(),
            })
        );
    }

    #[test]
    fn test_copy_links() {
        let mut app = app();
        assert_eq!(app.copy_links(), None);

        app.store.dispatch(Intent::UpdateResult(QueryRecord::new(
            "See [docs](https://databend.rs/doc) and https://github.com/datafuselabs".to_string(),
            None,
            false,
        )));
        assert_eq!(
            app.copy_links(),
            Some(Command::Copy {
                text: "https://databend.rs/doc\nhttps://github.com/datafuselabs".to_string(),
                what: "2 link(s)".to_string(),
            })
        );
    }

    #[test]
    fn test_share_current() {
        let mut app = app();
        assert_eq!(app.share_current(), None);

        app.store.dispatch(Intent::UpdateResult(QueryRecord::new(
            "answer".to_string(),
            Some("what is X".to_string()),
            false,
        )));
        assert_eq!(
            app.share_current(),
            Some(Command::Copy {
                text: "https://ask.databend.rs/?q=what+is+X".to_string(),
                what: "share link".to_string(),
            })
        );
    }

    #[test]
    fn test_share_link_invalid_base() {
        assert_eq!(share_link("not a url", "q"), None);
    }

    #[test]
    fn test_initial_question_forms() {
        assert_eq!(initial_question(args(&["askbend-tui"])), None);
        assert_eq!(
            initial_question(args(&["askbend-tui", "-q", "hello"])),
            Some("hello".to_string())
        );
        assert_eq!(
            initial_question(args(&["askbend-tui", "--q=hello world"])),
            Some("hello world".to_string())
        );
        assert_eq!(
            initial_question(args(&["askbend-tui", "https://ask.databend.rs/?q=hello"])),
            Some("hello".to_string())
        );
        assert_eq!(initial_question(args(&["askbend-tui", "-q", "  "])), None);
    }

    #[test]
    fn test_initial_question_round_trips_share_link() {
        let link = share_link("https://ask.databend.rs", "how do I load CSV?").unwrap();
        assert_eq!(
            initial_question(args(&["askbend-tui", &link])),
            Some("how do I load CSV?".to_string())
        );
    }
}
