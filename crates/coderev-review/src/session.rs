use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use coderev_core::{
    ApiKey, CoderevError, InputDescriptor, InputMode, ReviewRecord, UploadedItem,
};
use uuid::Uuid;

use crate::history::History;
use crate::input;
use crate::llm::{self, ReviewBackend};
use crate::prompt::{self, ReviewRequest};

/// How a call to [`ReviewSession::run_review`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The review succeeded and was added to history.
    Completed(ReviewRecord),
    /// Validation or the provider call failed.
    Failed(ReviewFailure),
    /// Another run was already in flight, so nothing happened.
    Busy,
}

/// The error that ended a run.
///
/// `Display` is the user-facing message; [`ReviewFailure::error`] exposes the
/// underlying [`CoderevError`] so callers can report its diagnostic. Two
/// failures compare equal when their messages match.
#[derive(Debug, Clone)]
pub struct ReviewFailure(Arc<CoderevError>);

impl ReviewFailure {
    pub fn error(&self) -> &CoderevError {
        &self.0
    }
}

impl From<CoderevError> for ReviewFailure {
    fn from(e: CoderevError) -> Self {
        Self(Arc::new(e))
    }
}

impl fmt::Display for ReviewFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl PartialEq for ReviewFailure {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_string() == other.0.to_string()
    }
}

impl Eq for ReviewFailure {}

/// Everything the presentation layer can observe about a session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    mode: InputMode,
    items: Vec<UploadedItem>,
    selected_item: Option<Uuid>,
    manual_text: String,
    credential: ApiKey,
    focus: String,
    is_loading: bool,
    last_error: Option<String>,
    current_output: Option<String>,
    history: History,
}

impl SessionState {
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Uploaded items in upload order.
    pub fn items(&self) -> &[UploadedItem] {
        &self.items
    }

    /// The selected item, if the selection still refers to a live item.
    pub fn selected_item(&self) -> Option<&UploadedItem> {
        let id = self.selected_item?;
        self.items.iter().find(|item| item.id == id)
    }

    pub fn manual_text(&self) -> &str {
        &self.manual_text
    }

    pub fn focus(&self) -> &str {
        &self.focus
    }

    pub fn has_credential(&self) -> bool {
        !self.credential.is_blank()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn current_output(&self) -> Option<&str> {
        self.current_output.as_deref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// The text that a run started now would submit.
    pub fn reviewable_unit(&self) -> String {
        input::build_reviewable_unit(self.mode, &self.items, &self.manual_text)
    }

    /// Combined size in bytes of all uploaded items.
    pub fn total_size(&self) -> u64 {
        self.items.iter().map(|item| item.size).sum()
    }

    /// Snapshot of the current inputs, used for history summaries.
    pub fn descriptor(&self) -> InputDescriptor {
        InputDescriptor {
            file_count: self.items.len(),
            manual_chars: self.manual_text.chars().count(),
        }
    }

    fn prepare_run(&self) -> Result<PreparedRun, CoderevError> {
        llm::require_credential(&self.credential)?;
        let unit = self.reviewable_unit();
        let request = prompt::build_request(&self.focus, &unit)?;
        Ok(PreparedRun {
            credential: self.credential.clone(),
            request,
            descriptor: self.descriptor(),
            unit,
        })
    }

    fn finish_run(
        &mut self,
        result: Result<String, CoderevError>,
        descriptor: InputDescriptor,
        unit: &str,
    ) -> RunOutcome {
        self.is_loading = false;
        match result {
            Ok(text) => {
                let record = self.history.record(&text, descriptor, unit);
                self.current_output = Some(text);
                self.last_error = None;
                RunOutcome::Completed(record)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                RunOutcome::Failed(e.into())
            }
        }
    }
}

struct PreparedRun {
    credential: ApiKey,
    request: ReviewRequest,
    descriptor: InputDescriptor,
    unit: String,
}

/// Clears the loading flag if a run is dropped before it finishes.
struct InFlight<'a> {
    state: &'a Mutex<SessionState>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_loading = false;
    }
}

/// Review orchestrator owning one user's session state.
///
/// Sequences input normalization, prompt building, the provider call, and
/// history recording. Only this type writes the loading flag, the last
/// error, and the current output. The state lock is never held across an
/// await, so the session stays responsive while a review is in flight.
pub struct ReviewSession<B> {
    backend: B,
    state: Mutex<SessionState>,
}

impl<B: ReviewBackend> ReviewSession<B> {
    /// Start an empty file-mode session with the given initial focus.
    pub fn new(backend: B, focus: impl Into<String>) -> Self {
        let state = SessionState {
            focus: focus.into(),
            ..SessionState::default()
        };
        Self {
            backend,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the observable state.
    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    /// Switch input source, discarding the other source's content.
    ///
    /// File mode clears the manual buffer; manual mode clears uploaded
    /// items and the selection.
    pub fn set_input_mode(&self, mode: InputMode) {
        let mut state = self.lock();
        match mode {
            InputMode::File => state.manual_text.clear(),
            InputMode::Manual => {
                state.items.clear();
                state.selected_item = None;
            }
        }
        state.mode = mode;
    }

    /// Read files from disk and append them to the session.
    ///
    /// The whole batch is committed only if every file was read.
    ///
    /// # Errors
    ///
    /// Returns [`CoderevError::FileRead`] for the first unreadable file; the
    /// message is also stored as the session's last error.
    pub async fn add_files(&self, paths: &[PathBuf]) -> Result<Vec<Uuid>, CoderevError> {
        match input::read_items(paths).await {
            Ok(items) => Ok(self.add_items(items)),
            Err(e) => {
                self.lock().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Append already-read items, in order, and return their ids.
    ///
    /// Switches to file mode if needed. When nothing is selected the first
    /// new item becomes the selection.
    pub fn add_items(&self, items: Vec<UploadedItem>) -> Vec<Uuid> {
        let mut state = self.lock();
        if state.mode == InputMode::Manual {
            tracing::debug!("switching to file mode for upload");
            state.manual_text.clear();
            state.mode = InputMode::File;
        }
        let ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
        if state.selected_item().is_none() {
            state.selected_item = ids.first().copied();
        }
        state.items.extend(items);
        state.last_error = None;
        ids
    }

    /// Remove an uploaded item, clearing the selection if it pointed there.
    pub fn remove_file(&self, id: Uuid) -> bool {
        let mut state = self.lock();
        let before = state.items.len();
        state.items.retain(|item| item.id != id);
        if state.selected_item == Some(id) {
            state.selected_item = None;
        }
        state.items.len() != before
    }

    /// Select an uploaded item for preview. Unknown ids are ignored.
    pub fn select_item(&self, id: Uuid) -> bool {
        let mut state = self.lock();
        if state.items.iter().any(|item| item.id == id) {
            state.selected_item = Some(id);
            true
        } else {
            false
        }
    }

    pub fn selected_item(&self) -> Option<UploadedItem> {
        self.lock().selected_item().cloned()
    }

    /// Replace the manual buffer.
    ///
    /// Switches to manual mode if needed, discarding uploaded items and the
    /// selection.
    pub fn set_manual_text(&self, text: impl Into<String>) {
        let mut state = self.lock();
        if state.mode == InputMode::File {
            tracing::debug!("switching to manual mode for pasted text");
            state.items.clear();
            state.selected_item = None;
            state.mode = InputMode::Manual;
        }
        state.manual_text = text.into();
    }

    pub fn set_focus(&self, focus: impl Into<String>) {
        self.lock().focus = focus.into();
    }

    pub fn set_credential(&self, credential: ApiKey) {
        self.lock().credential = credential;
    }

    /// Run one review against the backend.
    ///
    /// Rejected with [`RunOutcome::Busy`] and no state change while another
    /// run is in flight. Failures never propagate: they are stored as the
    /// last error and the previous output stays in place.
    pub async fn run_review(&self) -> RunOutcome {
        let prepared = {
            let mut state = self.lock();
            if state.is_loading {
                tracing::warn!("review already running; ignoring run request");
                return RunOutcome::Busy;
            }
            match state.prepare_run() {
                Ok(prepared) => {
                    state.is_loading = true;
                    state.last_error = None;
                    prepared
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::debug!(%message, "review run rejected before submission");
                    state.last_error = Some(message);
                    return RunOutcome::Failed(e.into());
                }
            }
        };

        let in_flight = InFlight { state: &self.state };
        tracing::debug!(
            summary = %prepared.descriptor.summary(),
            "review run started"
        );
        let result = self
            .backend
            .submit(&prepared.credential, &prepared.request)
            .await;

        let outcome = self
            .lock()
            .finish_run(result, prepared.descriptor, &prepared.unit);
        drop(in_flight);
        tracing::debug!(ok = matches!(outcome, RunOutcome::Completed(_)), "review run finished");
        outcome
    }

    /// Re-display a past review. Returns `None` for an unknown id.
    pub fn select_history_entry(&self, id: Uuid) -> Option<ReviewRecord> {
        let mut state = self.lock();
        let record = state.history.select(id).cloned()?;
        state.current_output = Some(record.result.clone());
        Some(record)
    }

    pub fn dismiss_error(&self) {
        self.lock().last_error = None;
    }
}
