// Query submission flow: question -> in-flight -> record or error flag -> idle
//
// Submissions are refused while a request is in flight, but a response is
// never fenced: whatever resolves is applied. The input is the only entry
// point and it is disabled while in flight, so overlapping replies can only
// come from callers that bypass `begin_query`.

use futures::Future;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::AnswerSource;
use crate::app::{App, Command};
use crate::events::AppEvent;
use crate::models::QueryRecord;
use crate::store::{FetchStatus, Intent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTicket {
    pub question: String,
    pub is_regenerate: bool,
}

/// Marks the store in-flight and clears the error flag. Returns `None` for a
/// blank question or while another request runs.
pub fn begin_query(app: &mut App, question: &str, is_regenerate: bool) -> Option<QueryTicket> {
    if question.trim().is_empty() {
        return None;
    }
    if app.store.state().fetch_status.is_in_flight() {
        warn!("query already in flight, submission ignored");
        return None;
    }

    app.store.dispatch(Intent::SetFetchStatus(FetchStatus::InFlight));
    app.store.dispatch(Intent::ShowErrorTip(false));
    app.fetch_started = Some(Instant::now());
    app.notice = None;
    info!(is_regenerate, "submitting question");

    Some(QueryTicket {
        question: question.to_string(),
        is_regenerate,
    })
}

/// Submit the question mirrored from the input box.
pub fn submit_input(app: &mut App, is_regenerate: bool) -> Option<Command> {
    if is_regenerate && !app.regenerate_eligible {
        return None;
    }
    let question = app.store.state().input_question.clone();
    begin_query(app, &question, is_regenerate).map(Command::Submit)
}

/// Picks up a question staged by the examples popup or the command line.
/// It stays staged while a request is in flight.
pub fn submit_pending(app: &mut App) -> Option<QueryTicket> {
    if app.store.state().fetch_status.is_in_flight() {
        return None;
    }
    let question = app.store.take_pre_question()?;
    app.set_input(&question);
    // Send what the input box shows, after the length cut
    let question = app.input_buffer.clone();
    begin_query(app, &question, false)
}

pub fn fetch_answer(
    source: &dyn AnswerSource,
    ticket: QueryTicket,
) -> impl Future<Output = AppEvent> + Send + 'static {
    let request = source.ask(ticket.question.clone());
    async move {
        let outcome = request.await;
        AppEvent::QueryFinished {
            question: ticket.question,
            is_regenerate: ticket.is_regenerate,
            outcome,
        }
    }
}

pub fn spawn_query(
    source: &dyn AnswerSource,
    ticket: QueryTicket,
    event_tx: &UnboundedSender<AppEvent>,
) -> JoinHandle<()> {
    let fetch = fetch_answer(source, ticket);
    let tx = event_tx.clone();
    tokio::spawn(async move {
        if tx.send(fetch.await).is_err() {
            debug!("event loop closed before the answer arrived");
        }
    })
}

pub fn finish_query(app: &mut App, event: AppEvent) {
    let AppEvent::QueryFinished {
        question,
        is_regenerate,
        outcome,
    } = event;

    match outcome {
        Ok(answer) => {
            info!(is_regenerate, chars = answer.len(), "answer received");
            app.store.dispatch(Intent::UpdateResult(QueryRecord::new(
                answer,
                Some(question),
                is_regenerate,
            )));
            app.selected_code_block = 0;
        }
        Err(err) => {
            warn!(error = %err, "query failed");
            app.store.dispatch(Intent::ShowErrorTip(true));
        }
    }

    app.store.dispatch(Intent::SetFetchStatus(FetchStatus::Idle));
    app.fetch_started = None;
    app.regenerate_eligible = true;
    app.table_offset = 0;
    app.scroll_to_top();
}
