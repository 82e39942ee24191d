//! Cancellable search sessions.
//!
//! A session is one logical search: it issues the request, consumes the
//! event stream, and ends in exactly one terminal state. The logic is split
//! in two:
//!
//! - **[`reduce`]**: a pure function from the current [`SessionState`] and
//!   a [`SessionEvent`] to the next state. All ordering and terminal-state
//!   rules live here.
//! - **[`SearchSession`]**: the effect runner. It owns the network call,
//!   the elapsed-time ticker and the cancellation token, and feeds what
//!   they produce through [`reduce`].
//!
//! # State machine
//!
//! ```text
//!            Started
//!   Idle ─────────────▶ Running ──Tick / Progress──┐
//!                         │  ▲─────────────────────┘
//!          ┌──────────────┼──────────────┬──────────────┐
//!   Complete / end   Error / transport   Cancel
//!          ▼              ▼              ▼
//!      Completed        Failed       Cancelled
//! ```
//!
//! Terminal states absorb every further event.
//!
//! # One live session per surface
//!
//! A [`SearchSession`] stands for one UI surface. Starting a new search
//! while one is running cancels the old one first, and the old session's
//! later transitions are discarded by an identity check, so only the newest
//! session ever reaches the observer.
//!
//! # Cancellation
//!
//! Each session carries its own [`CancellationToken`]. Cancelling moves the
//! state to `Cancelled`, then trips the token, which stops the ticker and
//! drops the in-flight request. A transport error produced by that abort is
//! never reported.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::{SearchRequest, SearchResults};
use crate::progress::SessionObserver;
use crate::stream::{EventStream, StreamEvent};
use crate::transport::{SearchTransport, TransportError};

pub type SessionId = Uuid;

/// Message shown for any transport failure. Details go to the log.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "The search could not be completed. Check the server connection and try again.";

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Running {
        started_at: DateTime<Utc>,
        elapsed_seconds: f64,
        last_progress: Option<String>,
    },
    Completed {
        results: SearchResults,
    },
    Failed {
        message: String,
    },
    Cancelled,
}

impl SessionState {
    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed { .. } | SessionState::Failed { .. } | SessionState::Cancelled
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running { .. } => "running",
            SessionState::Completed { .. } => "completed",
            SessionState::Failed { .. } => "failed",
            SessionState::Cancelled => "cancelled",
        }
    }
}

/// Inputs to the session state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started { at: DateTime<Utc> },
    /// One ticker interval elapsed.
    Tick,
    Stream(StreamEvent),
    TransportFailed { message: String },
    /// Body ended without a terminal event.
    StreamEnded,
    Cancel,
}

/// Compute the next state. Pure; events that do not apply leave the state
/// unchanged.
pub fn reduce(state: &SessionState, event: SessionEvent) -> SessionState {
    match (state, event) {
        (SessionState::Idle, SessionEvent::Started { at }) => SessionState::Running {
            started_at: at,
            elapsed_seconds: 0.0,
            last_progress: None,
        },
        (
            SessionState::Running {
                started_at,
                elapsed_seconds,
                last_progress,
            },
            event,
        ) => match event {
            SessionEvent::Tick => SessionState::Running {
                started_at: *started_at,
                elapsed_seconds: elapsed_seconds + 1.0,
                last_progress: last_progress.clone(),
            },
            SessionEvent::Stream(StreamEvent::Progress {
                step,
                detail,
                elapsed_seconds: reported,
            }) => SessionState::Running {
                started_at: *started_at,
                // server clock wins over the local ticker
                elapsed_seconds: reported.unwrap_or(*elapsed_seconds),
                last_progress: Some(progress_text(&step, detail.as_deref())),
            },
            SessionEvent::Stream(StreamEvent::Complete(results)) => {
                SessionState::Completed { results }
            }
            SessionEvent::Stream(StreamEvent::Error { message })
            | SessionEvent::TransportFailed { message } => SessionState::Failed { message },
            SessionEvent::StreamEnded => SessionState::Completed {
                results: SearchResults::empty(),
            },
            SessionEvent::Cancel => SessionState::Cancelled,
            SessionEvent::Started { .. } => state.clone(),
        },
        (state, _) => state.clone(),
    }
}

/// `"{step}: {detail}"`, or just the step when there is no detail.
pub fn progress_text(step: &str, detail: Option<&str>) -> String {
    match detail {
        Some(detail) if !detail.is_empty() => format!("{}: {}", step, detail),
        _ => step.to_string(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SessionCell {
    id: SessionId,
    state: Mutex<SessionState>,
    cancel: CancellationToken,
}

impl SessionCell {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Mutex::new(SessionState::Idle),
            cancel: CancellationToken::new(),
        }
    }

    fn snapshot(&self) -> SessionState {
        lock(&self.state).clone()
    }
}

/// Shared between the controller, its handles, and the runner tasks.
struct Surface {
    observer: Arc<dyn SessionObserver>,
    live: Mutex<Option<Arc<SessionCell>>>,
}

impl Surface {
    fn transition(&self, cell: &SessionCell, event: SessionEvent) {
        let live = lock(&self.live);
        self.transition_locked(&live, cell, event);
    }

    fn transition_locked(
        &self,
        live: &Option<Arc<SessionCell>>,
        cell: &SessionCell,
        event: SessionEvent,
    ) {
        let mut state = lock(&cell.state);
        let next = reduce(&state, event);
        if next == *state {
            return;
        }
        *state = next;

        let is_live = live.as_ref().map(|c| c.id) == Some(cell.id);
        if is_live {
            self.observer.on_transition(cell.id, &state);
        } else {
            tracing::debug!(session = %cell.id, state = state.label(), "suppressing stale session transition");
        }
    }

    fn cancel(&self, cell: &SessionCell) {
        self.transition(cell, SessionEvent::Cancel);
        cell.cancel.cancel();
    }
}

/// Controller for the searches of one UI surface.
pub struct SearchSession {
    transport: Arc<dyn SearchTransport>,
    surface: Arc<Surface>,
    tick_interval: Duration,
}

impl SearchSession {
    pub fn new(transport: Arc<dyn SearchTransport>, observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            transport,
            surface: Arc::new(Surface {
                observer,
                live: Mutex::new(None),
            }),
            tick_interval: Duration::from_secs(1),
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Start a search, cancelling any session still running on this surface.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, request: SearchRequest) -> SessionHandle {
        let cell = Arc::new(SessionCell::new());

        {
            let mut live = lock(&self.surface.live);
            if let Some(previous) = live.as_ref() {
                if previous.snapshot().is_running() {
                    tracing::debug!(previous = %previous.id, next = %cell.id, "superseding running session");
                }
                self.surface
                    .transition_locked(&live, previous, SessionEvent::Cancel);
                previous.cancel.cancel();
            }
            *live = Some(Arc::clone(&cell));
            self.surface
                .transition_locked(&live, &cell, SessionEvent::Started { at: Utc::now() });
        }

        tracing::info!(session = %cell.id, source = %request.source, target = %request.target, match_type = ?request.match_type, "search started");

        let task = tokio::spawn(run_session(
            Arc::clone(&self.surface),
            Arc::clone(&cell),
            Arc::clone(&self.transport),
            request,
            self.tick_interval,
        ));

        SessionHandle {
            cell,
            surface: Arc::clone(&self.surface),
            task,
        }
    }

    /// Cancel the live session, if any.
    pub fn cancel(&self) {
        let live = lock(&self.surface.live).clone();
        if let Some(cell) = live {
            self.surface.cancel(&cell);
        }
    }

    /// Id and state of the live session.
    pub fn current(&self) -> Option<(SessionId, SessionState)> {
        lock(&self.surface.live)
            .as_ref()
            .map(|cell| (cell.id, cell.snapshot()))
    }
}

/// Handle to one started session.
pub struct SessionHandle {
    cell: Arc<SessionCell>,
    surface: Arc<Surface>,
    task: JoinHandle<SessionState>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.cell.id
    }

    pub fn state(&self) -> SessionState {
        self.cell.snapshot()
    }

    /// Cancel this session. No-op once it has reached a terminal state.
    pub fn cancel(&self) {
        self.surface.cancel(&self.cell);
    }

    /// Wait for the runner to stop and return this session's final state.
    pub async fn finished(self) -> SessionState {
        match self.task.await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(session = %self.cell.id, error = %e, "session task did not complete");
                self.cell.snapshot()
            }
        }
    }
}

async fn run_session(
    surface: Arc<Surface>,
    cell: Arc<SessionCell>,
    transport: Arc<dyn SearchTransport>,
    request: SearchRequest,
    tick_interval: Duration,
) -> SessionState {
    let mut ticker = interval_at(Instant::now() + tick_interval, tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let work = drive(&surface, &cell, transport.as_ref(), &request);
    tokio::pin!(work);

    loop {
        tokio::select! {
            biased;
            _ = cell.cancel.cancelled() => {
                tracing::debug!(session = %cell.id, "session cancelled, dropping request");
                break;
            }
            _ = &mut work => break,
            _ = ticker.tick() => surface.transition(&cell, SessionEvent::Tick),
        }
    }

    let final_state = cell.snapshot();
    tracing::info!(session = %cell.id, state = final_state.label(), "search finished");
    final_state
}

async fn drive(
    surface: &Surface,
    cell: &SessionCell,
    transport: &dyn SearchTransport,
    request: &SearchRequest,
) {
    if !request.match_type.is_streaming() {
        match transport.fetch_results(request).await {
            Ok(results) => {
                surface.transition(cell, SessionEvent::Stream(StreamEvent::Complete(results)))
            }
            Err(e) => report_failure(surface, cell, e),
        }
        return;
    }

    let source = match transport.open_stream(request).await {
        Ok(source) => source,
        Err(e) => {
            report_failure(surface, cell, e);
            return;
        }
    };

    let mut events = EventStream::new(source);
    loop {
        match events.next_event().await {
            Ok(Some(event)) => {
                let terminal = event.is_terminal();
                surface.transition(cell, SessionEvent::Stream(event));
                if terminal {
                    return;
                }
            }
            Ok(None) => {
                tracing::debug!(session = %cell.id, "stream ended without a terminal event");
                surface.transition(cell, SessionEvent::StreamEnded);
                return;
            }
            Err(e) => {
                report_failure(surface, cell, e);
                return;
            }
        }
    }
}

fn report_failure(surface: &Surface, cell: &SessionCell, error: TransportError) {
    if cell.cancel.is_cancelled() {
        tracing::debug!(session = %cell.id, error = %error, "ignoring transport error after cancellation");
        return;
    }
    tracing::warn!(session = %cell.id, error = %error, "search transport failed");
    surface.transition(
        cell,
        SessionEvent::TransportFailed {
            message: GENERIC_FAILURE_MESSAGE.to_string(),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Language, MatchResult, MatchType, Passage};
    use crate::transport::ChunkSource;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    fn running() -> SessionState {
        reduce(&SessionState::Idle, SessionEvent::Started { at: Utc::now() })
    }

    fn progress(step: &str, detail: Option<&str>, elapsed: Option<f64>) -> SessionEvent {
        SessionEvent::Stream(StreamEvent::Progress {
            step: step.to_string(),
            detail: detail.map(str::to_string),
            elapsed_seconds: elapsed,
        })
    }

    // ============ Reducer ============

    #[test]
    fn started_enters_running_with_zero_elapsed() {
        match running() {
            SessionState::Running {
                elapsed_seconds,
                last_progress,
                ..
            } => {
                assert_eq!(elapsed_seconds, 0.0);
                assert!(last_progress.is_none());
            }
            other => panic!("expected running, got {:?}", other),
        }
    }

    #[test]
    fn progress_text_with_and_without_detail() {
        let s = reduce(&running(), progress("scoring", Some("12 / 40"), None));
        let SessionState::Running { last_progress, .. } = &s else {
            panic!("expected running");
        };
        assert_eq!(last_progress.as_deref(), Some("scoring: 12 / 40"));

        let s = reduce(&s, progress("tokenizing", None, None));
        let SessionState::Running { last_progress, .. } = &s else {
            panic!("expected running");
        };
        assert_eq!(last_progress.as_deref(), Some("tokenizing"));
    }

    #[test]
    fn ticks_count_and_server_elapsed_wins() {
        let mut s = running();
        for _ in 0..3 {
            s = reduce(&s, SessionEvent::Tick);
        }
        assert!(matches!(s, SessionState::Running { elapsed_seconds, .. } if elapsed_seconds == 3.0));

        s = reduce(&s, progress("scoring", None, Some(7.5)));
        assert!(matches!(s, SessionState::Running { elapsed_seconds, .. } if elapsed_seconds == 7.5));

        s = reduce(&s, progress("scoring", None, None));
        assert!(matches!(s, SessionState::Running { elapsed_seconds, .. } if elapsed_seconds == 7.5));

        s = reduce(&s, SessionEvent::Tick);
        assert!(matches!(s, SessionState::Running { elapsed_seconds, .. } if elapsed_seconds == 8.5));
    }

    #[test]
    fn terminal_states_absorb_events() {
        let failed = reduce(
            &running(),
            SessionEvent::Stream(StreamEvent::Error {
                message: "Unknown text".to_string(),
            }),
        );
        assert_eq!(
            failed,
            SessionState::Failed {
                message: "Unknown text".to_string()
            }
        );

        let terminals = [
            failed,
            SessionState::Cancelled,
            SessionState::Completed {
                results: SearchResults::default(),
            },
        ];
        let events = [
            SessionEvent::Tick,
            SessionEvent::Cancel,
            SessionEvent::StreamEnded,
            SessionEvent::Started { at: Utc::now() },
            SessionEvent::TransportFailed {
                message: "x".to_string(),
            },
            progress("late", None, Some(1.0)),
        ];
        for state in &terminals {
            for event in &events {
                assert_eq!(&reduce(state, event.clone()), state);
            }
        }
    }

    #[test]
    fn idle_ignores_everything_but_started() {
        assert_eq!(
            reduce(&SessionState::Idle, SessionEvent::Cancel),
            SessionState::Idle
        );
        assert_eq!(
            reduce(&SessionState::Idle, SessionEvent::Tick),
            SessionState::Idle
        );
    }

    #[test]
    fn stream_end_synthesizes_empty_completion() {
        let s = reduce(&running(), SessionEvent::StreamEnded);
        match s {
            SessionState::Completed { results } => {
                assert!(results.results.is_empty());
                assert_eq!(results.total_matches(), 0);
            }
            other => panic!("expected completed, got {:?}", other),
        }
    }

    // ============ Runner ============

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(SessionId, SessionState)>>,
    }

    impl Recorder {
        fn states_for(&self, id: SessionId) -> Vec<SessionState> {
            lock(&self.seen)
                .iter()
                .filter(|(s, _)| *s == id)
                .map(|(_, st)| st.clone())
                .collect()
        }

        fn all(&self) -> Vec<(SessionId, SessionState)> {
            lock(&self.seen).clone()
        }
    }

    impl SessionObserver for Recorder {
        fn on_transition(&self, session: SessionId, state: &SessionState) {
            lock(&self.seen).push((session, state.clone()));
        }
    }

    enum Step {
        Wait(Duration),
        Bytes(&'static str),
        Fail,
    }

    struct ScriptedChunks {
        steps: VecDeque<Step>,
    }

    #[async_trait]
    impl ChunkSource for ScriptedChunks {
        async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
            loop {
                match self.steps.pop_front() {
                    Some(Step::Wait(d)) => tokio::time::sleep(d).await,
                    Some(Step::Bytes(s)) => return Ok(Some(s.as_bytes().to_vec())),
                    Some(Step::Fail) => {
                        return Err(TransportError::Network("connection reset".to_string()))
                    }
                    None => return Ok(None),
                }
            }
        }
    }

    struct ScriptedTransport {
        open_delay: Duration,
        refuse: bool,
        script: fn() -> Vec<Step>,
    }

    impl ScriptedTransport {
        fn new(script: fn() -> Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                open_delay: Duration::ZERO,
                refuse: false,
                script,
            })
        }

        fn slow(open_delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                open_delay,
                refuse: false,
                script: Vec::new,
            })
        }

        fn refusing() -> Arc<Self> {
            Arc::new(Self {
                open_delay: Duration::ZERO,
                refuse: true,
                script: Vec::new,
            })
        }
    }

    #[async_trait]
    impl SearchTransport for ScriptedTransport {
        async fn open_stream(
            &self,
            _request: &SearchRequest,
        ) -> Result<Box<dyn ChunkSource>, TransportError> {
            tokio::time::sleep(self.open_delay).await;
            if self.refuse {
                return Err(TransportError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            Ok(Box::new(ScriptedChunks {
                steps: (self.script)().into(),
            }))
        }

        async fn fetch_results(
            &self,
            _request: &SearchRequest,
        ) -> Result<SearchResults, TransportError> {
            tokio::time::sleep(self.open_delay).await;
            if self.refuse {
                return Err(TransportError::Network("refused".to_string()));
            }
            Ok(SearchResults {
                results: vec![MatchResult {
                    passage: Passage::new("arma uirumque cano"),
                    ..MatchResult::default()
                }],
                ..SearchResults::default()
            })
        }
    }

    fn request() -> SearchRequest {
        SearchRequest::new(
            "vergil.aeneid.tess",
            "lucan.bellum_civile.tess",
            Language::Latin,
        )
    }

    fn controller(transport: Arc<dyn SearchTransport>) -> (SearchSession, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let session = SearchSession::new(transport, recorder.clone())
            .with_tick_interval(Duration::from_millis(20));
        (session, recorder)
    }

    fn vergil_script() -> Vec<Step> {
        vec![
            Step::Bytes("data: {\"type\":\"progress\",\"step\":\"tokenizing\"}\n"),
            Step::Bytes("data: {\"type\":\"progress\",\"step\":\"scor"),
            Step::Bytes("ing\"}\ndata: {\"type\":\"complete\",\"results\":[{\"text\":\"arma uirumque cano\",\"tokens\":[\"arma\",\"uirumque\",\"cano\"],\"highlightIndices\":[0,1]}]}\n"),
        ]
    }

    #[tokio::test]
    async fn streamed_search_completes_with_progress_in_order() {
        let (session, recorder) = controller(ScriptedTransport::new(vergil_script));
        let handle = session.start(request());
        let id = handle.id();

        let final_state = handle.finished().await;
        let SessionState::Completed { results } = &final_state else {
            panic!("expected completed, got {:?}", final_state);
        };
        assert_eq!(results.results.len(), 1);
        assert_eq!(
            results.results[0].passage.highlight_indices,
            Some(vec![0, 1])
        );

        let steps: Vec<String> = recorder
            .states_for(id)
            .into_iter()
            .filter_map(|s| match s {
                SessionState::Running { last_progress, .. } => last_progress,
                _ => None,
            })
            .collect();
        assert_eq!(steps, vec!["tokenizing", "scoring"]);
    }

    #[tokio::test]
    async fn server_error_event_fails_with_its_message() {
        fn script() -> Vec<Step> {
            vec![Step::Bytes(
                "data: {\"type\":\"error\",\"message\":\"Text not found\"}\n",
            )]
        }
        let (session, _) = controller(ScriptedTransport::new(script));
        let state = session.start(request()).finished().await;
        assert_eq!(
            state,
            SessionState::Failed {
                message: "Text not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn events_after_terminal_are_not_read() {
        fn script() -> Vec<Step> {
            vec![
                Step::Bytes("data: {\"type\":\"complete\",\"results\":[]}\n"),
                Step::Bytes("data: {\"type\":\"error\",\"message\":\"late\"}\n"),
            ]
        }
        let (session, _) = controller(ScriptedTransport::new(script));
        let state = session.start(request()).finished().await;
        assert!(matches!(state, SessionState::Completed { .. }));
    }

    #[tokio::test]
    async fn stream_without_terminal_event_completes_empty() {
        fn script() -> Vec<Step> {
            vec![Step::Bytes("data: {\"type\":\"progress\",\"step\":\"loading\"}\n")]
        }
        let (session, _) = controller(ScriptedTransport::new(script));
        let state = session.start(request()).finished().await;
        assert_eq!(
            state,
            SessionState::Completed {
                results: SearchResults::empty()
            }
        );
    }

    #[tokio::test]
    async fn transport_failure_uses_generic_message() {
        let (session, _) = controller(ScriptedTransport::refusing());
        let state = session.start(request()).finished().await;
        assert_eq!(
            state,
            SessionState::Failed {
                message: GENERIC_FAILURE_MESSAGE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn dropped_connection_mid_stream_fails() {
        fn script() -> Vec<Step> {
            vec![
                Step::Bytes("data: {\"type\":\"progress\",\"step\":\"loading\"}\n"),
                Step::Fail,
            ]
        }
        let (session, _) = controller(ScriptedTransport::new(script));
        let state = session.start(request()).finished().await;
        assert!(matches!(state, SessionState::Failed { .. }));
    }

    #[tokio::test]
    async fn cancel_before_any_event_ends_cancelled() {
        let (session, recorder) = controller(ScriptedTransport::slow(Duration::from_secs(30)));
        let handle = session.start(request());
        let id = handle.id();
        handle.cancel();

        let state = handle.finished().await;
        assert_eq!(state, SessionState::Cancelled);
        let seen = recorder.states_for(id);
        assert!(seen.iter().all(|s| !matches!(s, SessionState::Failed { .. })));
        assert_eq!(seen.last(), Some(&SessionState::Cancelled));
    }

    #[tokio::test]
    async fn abort_induced_failure_is_swallowed() {
        fn script() -> Vec<Step> {
            vec![
                Step::Bytes("data: {\"type\":\"progress\",\"step\":\"loading\"}\n"),
                Step::Wait(Duration::from_millis(100)),
                Step::Fail,
            ]
        }
        let (session, recorder) = controller(ScriptedTransport::new(script));
        let handle = session.start(request());
        let id = handle.id();
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.cancel();
        assert_eq!(handle.finished().await, SessionState::Cancelled);

        // give a would-be late failure time to surface
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(recorder
            .states_for(id)
            .iter()
            .all(|s| !matches!(s, SessionState::Failed { .. })));
    }

    #[tokio::test]
    async fn cancel_after_completion_is_a_no_op() {
        let (session, _) = controller(ScriptedTransport::new(vergil_script));
        let handle = session.start(request());
        while !handle.state().is_terminal() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.cancel();
        assert!(matches!(
            handle.finished().await,
            SessionState::Completed { .. }
        ));
    }

    #[tokio::test]
    async fn ticker_advances_elapsed_while_waiting() {
        fn script() -> Vec<Step> {
            vec![
                Step::Wait(Duration::from_millis(150)),
                Step::Bytes("data: {\"type\":\"complete\",\"results\":[]}\n"),
            ]
        }
        let (session, recorder) = controller(ScriptedTransport::new(script));
        let handle = session.start(request());
        let id = handle.id();
        handle.finished().await;

        let max_elapsed = recorder
            .states_for(id)
            .into_iter()
            .filter_map(|s| match s {
                SessionState::Running {
                    elapsed_seconds, ..
                } => Some(elapsed_seconds),
                _ => None,
            })
            .fold(0.0, f64::max);
        assert!(max_elapsed >= 2.0, "ticker only reached {}", max_elapsed);
    }

    #[tokio::test]
    async fn starting_again_supersedes_running_session() {
        let (session, recorder) = controller(ScriptedTransport::slow(Duration::from_millis(200)));
        let first = session.start(request());
        let first_id = first.id();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = session.start(request().with_match_type(MatchType::Exact));
        let second_id = second.id();
        assert_eq!(first.state(), SessionState::Cancelled);

        assert_eq!(first.finished().await, SessionState::Cancelled);
        let second_state = second.finished().await;
        assert!(matches!(second_state, SessionState::Completed { .. }));

        // once the second session is announced, nothing from the first follows
        let all = recorder.all();
        let announced = all
            .iter()
            .position(|(id, _)| *id == second_id)
            .expect("second session observed");
        assert!(all[announced..].iter().all(|(id, _)| *id == second_id));
        assert_eq!(
            recorder.states_for(first_id).last(),
            Some(&SessionState::Cancelled)
        );
        assert_eq!(session.current().map(|(id, _)| id), Some(second_id));
    }

    #[tokio::test]
    async fn non_streaming_search_skips_progress() {
        let (session, recorder) = controller(ScriptedTransport::new(Vec::new));
        let handle = session.start(request().with_match_type(MatchType::SemanticCross));
        let id = handle.id();
        let state = handle.finished().await;
        assert!(matches!(state, SessionState::Completed { .. }));
        assert!(recorder.states_for(id).iter().all(|s| match s {
            SessionState::Running { last_progress, .. } => last_progress.is_none(),
            _ => true,
        }));
    }
}
