// Event types for async communication

use crate::api::ApiError;

#[derive(Debug)]
pub enum AppEvent {
    /// The network call for a submitted question resolved
    QueryFinished {
        question: String,
        is_regenerate: bool,
        outcome: Result<String, ApiError>,
    },
}
