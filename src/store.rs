// Query state store: results list, fetch status, pending questions, error flag

use tracing::trace;

use crate::models::QueryRecord;

/// Whether a query has never run, is running, or has completed at least once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    NeverRun,
    InFlight,
    Idle,
}

impl FetchStatus {
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::InFlight)
    }
}

/// The single panel shown above the results list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Headline {
    Introduction,
    Waiting,
    Failed,
    Success,
    Blank,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultsState {
    /// Newest first.
    pub results: Vec<QueryRecord>,
    pub fetch_status: FetchStatus,
    /// Question picked from the examples, waiting to be submitted.
    pub pre_question: String,
    /// Mirror of the input box for components that do not own it.
    pub input_question: String,
    pub show_error_tip: bool,
}

impl ResultsState {
    pub fn headline(&self) -> Headline {
        if self.fetch_status.is_in_flight() {
            Headline::Waiting
        } else if self.show_error_tip {
            Headline::Failed
        } else if !self.results.is_empty() {
            Headline::Success
        } else if matches!(self.fetch_status, FetchStatus::NeverRun) {
            Headline::Introduction
        } else {
            Headline::Blank
        }
    }

    pub fn current(&self) -> Option<&QueryRecord> {
        self.results.first()
    }
}

#[derive(Debug, Clone)]
pub enum Intent {
    UpdateResult(QueryRecord),
    SetFetchStatus(FetchStatus),
    SetPreQuestion(String),
    SetInputQuestion(String),
    ShowErrorTip(bool),
}

impl Intent {
    const fn name(&self) -> &'static str {
        match self {
            Self::UpdateResult(_) => "update_result",
            Self::SetFetchStatus(_) => "set_fetch_status",
            Self::SetPreQuestion(_) => "set_pre_question",
            Self::SetInputQuestion(_) => "set_input_question",
            Self::ShowErrorTip(_) => "show_error_tip",
        }
    }
}

pub fn reduce(mut state: ResultsState, intent: Intent) -> ResultsState {
    match intent {
        Intent::UpdateResult(record) => {
            if !record.is_regenerate {
                state.results.clear();
            }
            state.results.insert(0, record);
        }
        Intent::SetFetchStatus(status) => state.fetch_status = status,
        Intent::SetPreQuestion(question) => state.pre_question = question,
        Intent::SetInputQuestion(question) => state.input_question = question,
        Intent::ShowErrorTip(show) => state.show_error_tip = show,
    }
    state
}

/// Sole owner of [`ResultsState`]; everything else dispatches intents.
#[derive(Debug, Default)]
pub struct Store {
    state: ResultsState,
    revision: u64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn state(&self) -> &ResultsState {
        &self.state
    }

    /// Bumped on every dispatch so renderers can drop stale caches.
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    pub fn dispatch(&mut self, intent: Intent) {
        let name = intent.name();
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, intent);
        self.revision = self.revision.wrapping_add(1);
        trace!(
            intent = name,
            revision = self.revision,
            results = self.state.results.len(),
            "dispatched"
        );
    }

    /// Hands out the pending example question once.
    pub fn take_pre_question(&mut self) -> Option<String> {
        if self.state.pre_question.trim().is_empty() {
            return None;
        }
        let question = self.state.pre_question.clone();
        self.dispatch(Intent::SetPreQuestion(String::new()));
        Some(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: &str, is_regenerate: bool) -> QueryRecord {
        QueryRecord::new(value.to_string(), Some("q".to_string()), is_regenerate)
    }

    #[test]
    fn test_initial_state() {
        let store = Store::new();
        assert!(store.state().results.is_empty());
        assert_eq!(store.state().fetch_status, FetchStatus::NeverRun);
        assert!(!store.state().show_error_tip);
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_fresh_result_replaces_history() {
        let mut state = ResultsState::default();
        state = reduce(state, Intent::UpdateResult(record("first", false)));
        state = reduce(state, Intent::UpdateResult(record("second", true)));
        state = reduce(state, Intent::UpdateResult(record("third", false)));
        assert_eq!(state.results.len(), 1);
        assert_eq!(state.results[0].value, "third");
    }

    #[test]
    fn test_regenerate_prepends() {
        let mut state = ResultsState::default();
        state = reduce(state, Intent::UpdateResult(record("first", false)));
        state = reduce(state, Intent::UpdateResult(record("second", true)));
        state = reduce(state, Intent::UpdateResult(record("third", true)));
        let values: Vec<&str> = state.results.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, vec!["third", "second", "first"]);
    }

    #[test]
    fn test_scalar_intents() {
        let mut state = ResultsState::default();
        state = reduce(state, Intent::SetFetchStatus(FetchStatus::InFlight));
        state = reduce(state, Intent::SetPreQuestion("example".to_string()));
        state = reduce(state, Intent::SetInputQuestion("typed".to_string()));
        state = reduce(state, Intent::ShowErrorTip(true));
        assert_eq!(state.fetch_status, FetchStatus::InFlight);
        assert_eq!(state.pre_question, "example");
        assert_eq!(state.input_question, "typed");
        assert!(state.show_error_tip);
    }

    #[test]
    fn test_headline_branches() {
        let mut state = ResultsState::default();
        assert_eq!(state.headline(), Headline::Introduction);

        state.fetch_status = FetchStatus::InFlight;
        assert_eq!(state.headline(), Headline::Waiting);

        state.fetch_status = FetchStatus::Idle;
        assert_eq!(state.headline(), Headline::Blank);

        state.show_error_tip = true;
        assert_eq!(state.headline(), Headline::Failed);

        state.show_error_tip = false;
        state.results.push(record("answer", false));
        assert_eq!(state.headline(), Headline::Success);

        // Waiting wins over everything while a request runs
        state.fetch_status = FetchStatus::InFlight;
        state.show_error_tip = true;
        assert_eq!(state.headline(), Headline::Waiting);
    }

    #[test]
    fn test_dispatch_bumps_revision() {
        let mut store = Store::new();
        store.dispatch(Intent::ShowErrorTip(false));
        store.dispatch(Intent::ShowErrorTip(false));
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn test_take_pre_question_once() {
        let mut store = Store::new();
        assert_eq!(store.take_pre_question(), None);

        store.dispatch(Intent::SetPreQuestion("hello".to_string()));
        assert_eq!(store.take_pre_question(), Some("hello".to_string()));
        assert_eq!(store.take_pre_question(), None);
        assert!(store.state().pre_question.is_empty());
    }

    #[test]
    fn test_blank_pre_question_is_ignored() {
        let mut store = Store::new();
        store.dispatch(Intent::SetPreQuestion("   ".to_string()));
        assert_eq!(store.take_pre_question(), None);
    }
}
