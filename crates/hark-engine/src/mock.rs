//! Deterministic in-memory speech backend.
//!
//! Used by the test suites and by non-Windows development. The platform
//! records a release log and the writes made through the handles, so tests
//! can assert teardown ordering and the exact native calls a lifecycle
//! operation issued. Failures can be injected at any lifecycle step.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use hark_core::error::{codes, ErrorKind, Result, SpeechError};
use hark_core::types::{EngineDescriptor, EngineScope, EventRecord, InterestSet, RecoState};

use crate::{ContextHandle, GrammarHandle, RecognizerHandle, SpeechPlatform};

/// Lifecycle steps where a failure can be injected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateRecognizer,
    BindInput,
    CreateContext,
    SetInterest,
    ArmNotification,
    CreateGrammar,
    LoadDictation,
    ActivateDictation,
    SwitchEngine,
    EngineName,
    StateQuery,
    SetState,
    Pause,
    Resume,
    Drain,
}

impl FailPoint {
    /// The error an injected failure at this step surfaces as.
    fn kind(&self) -> ErrorKind {
        match self {
            FailPoint::CreateRecognizer => ErrorKind::EngineCreationFailed,
            FailPoint::BindInput => ErrorKind::AudioInputBindingFailed,
            FailPoint::CreateContext => ErrorKind::ContextCreationFailed,
            FailPoint::SetInterest => ErrorKind::InterestConfigurationFailed,
            FailPoint::ArmNotification => ErrorKind::NotificationWiringFailed,
            FailPoint::CreateGrammar => ErrorKind::GrammarCreationFailed,
            FailPoint::LoadDictation => ErrorKind::DictationActivationFailed,
            FailPoint::ActivateDictation => ErrorKind::DictationActivationFailed,
            FailPoint::SwitchEngine => ErrorKind::EngineSwitchFailed,
            FailPoint::EngineName => ErrorKind::EngineNameUnavailable,
            FailPoint::StateQuery => ErrorKind::StateQueryFailed,
            FailPoint::SetState => ErrorKind::ActivationFailed,
            FailPoint::Pause => ErrorKind::PauseFailed,
            FailPoint::Resume => ErrorKind::ResumeFailed,
            FailPoint::Drain => ErrorKind::EventRetrievalFailed,
        }
    }
}

struct ContextState {
    interest: InterestSet,
    armed: bool,
    paused: bool,
    queue: VecDeque<EventRecord>,
}

struct MockState {
    engines: Vec<String>,
    failures: HashSet<FailPoint>,
    dictation_supported: bool,
    dictation_loaded: bool,
    dictation_active: bool,
    reported_state: u32,
    state_writes: Vec<u32>,
    last_scope: Option<EngineScope>,
    active_engine: Option<String>,
    release_log: Vec<&'static str>,
    contexts: Vec<Arc<Mutex<ContextState>>>,
}

/// In-memory speech platform.
///
/// Cloning shares the underlying state, so a clone kept by a test observes
/// everything the session layer does through the original.
#[derive(Clone)]
pub struct MockPlatform {
    state: Arc<Mutex<MockState>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                engines: vec![
                    "Mock Desktop Recognizer".to_string(),
                    "Mock Telephony Recognizer".to_string(),
                ],
                failures: HashSet::new(),
                dictation_supported: true,
                dictation_loaded: false,
                dictation_active: false,
                reported_state: 0,
                state_writes: Vec::new(),
                last_scope: None,
                active_engine: None,
                release_log: Vec::new(),
                contexts: Vec::new(),
            })),
        }
    }

    /// Replace the installed-engine list.
    pub fn with_engines(self, names: &[&str]) -> Self {
        self.lock().engines = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Inject a failure at the given lifecycle step.
    pub fn fail_at(&self, point: FailPoint) {
        self.lock().failures.insert(point);
    }

    /// Remove a previously injected failure.
    pub fn clear_failure(&self, point: FailPoint) {
        self.lock().failures.remove(&point);
    }

    /// Make dictation loading report "unsupported" (the server-class
    /// engine behavior) instead of succeeding.
    pub fn set_dictation_supported(&self, supported: bool) {
        self.lock().dictation_supported = supported;
    }

    /// Override the raw state code the recognizer reports.
    pub fn set_reported_state(&self, raw: u32) {
        self.lock().reported_state = raw;
    }

    /// Queue an event on the most recent context, subject to its interest
    /// mask. Returns whether the event was queued.
    pub fn push_event(&self, record: EventRecord) -> bool {
        let context = self.lock().contexts.last().cloned();
        match context {
            Some(context) => {
                let mut ctx = context.lock().expect("mock context poisoned");
                if ctx.interest.contains_raw(record.event_id) {
                    ctx.queue.push_back(record);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    /// Handle names in the order they were released.
    pub fn release_log(&self) -> Vec<&'static str> {
        self.lock().release_log.clone()
    }

    /// Raw state codes written through `set_state`, in order.
    pub fn state_writes(&self) -> Vec<u32> {
        self.lock().state_writes.clone()
    }

    /// The interest mask currently applied on the most recent context.
    pub fn interest_mask(&self) -> Option<u64> {
        self.context_view(|ctx| ctx.interest.mask())
    }

    /// Whether the most recent context's notification signal is armed.
    pub fn notification_armed(&self) -> Option<bool> {
        self.context_view(|ctx| ctx.armed)
    }

    /// Whether the most recent context is paused.
    pub fn paused(&self) -> Option<bool> {
        self.context_view(|ctx| ctx.paused)
    }

    /// Number of events queued on the most recent context.
    pub fn queued_len(&self) -> usize {
        self.context_view(|ctx| ctx.queue.len()).unwrap_or(0)
    }

    /// The engine the most recent recognizer is bound to.
    pub fn active_engine(&self) -> Option<String> {
        self.lock().active_engine.clone()
    }

    /// The scope the most recent recognizer was created with.
    pub fn last_scope(&self) -> Option<EngineScope> {
        self.lock().last_scope
    }

    /// Whether a dictation grammar was loaded, and whether it is active.
    pub fn dictation(&self) -> (bool, bool) {
        let state = self.lock();
        (state.dictation_loaded, state.dictation_active)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    fn context_view<T>(&self, f: impl FnOnce(&ContextState) -> T) -> Option<T> {
        let context = self.lock().contexts.last().cloned();
        context.map(|ctx| f(&ctx.lock().expect("mock context poisoned")))
    }

    fn check(&self, point: FailPoint) -> Result<()> {
        if self.lock().failures.contains(&point) {
            Err(SpeechError::new(point.kind(), codes::E_FAIL))
        } else {
            Ok(())
        }
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechPlatform for MockPlatform {
    fn name(&self) -> &str {
        "mock"
    }

    fn create_recognizer(&self, scope: EngineScope) -> Result<Box<dyn RecognizerHandle>> {
        self.check(FailPoint::CreateRecognizer)?;
        let engine = {
            let mut state = self.lock();
            state.last_scope = Some(scope);
            let engine = state
                .engines
                .first()
                .cloned()
                .unwrap_or_else(|| "Mock Desktop Recognizer".to_string());
            state.active_engine = Some(engine.clone());
            engine
        };
        Ok(Box::new(MockRecognizer {
            platform: self.clone(),
            engine,
        }))
    }

    fn resolve_engine(&self, name: &str) -> Result<EngineDescriptor> {
        self.lock()
            .engines
            .iter()
            .find(|candidate| candidate.as_str() == name)
            .map(|matched| EngineDescriptor::new(matched.clone()))
            .ok_or_else(|| {
                SpeechError::new(ErrorKind::EngineLookupFailed, codes::SPERR_NOT_FOUND)
            })
    }

    fn list_engines(&self) -> Result<Vec<String>> {
        Ok(self.lock().engines.clone())
    }
}

// =============================================================================
// Handles
// =============================================================================

struct MockRecognizer {
    platform: MockPlatform,
    engine: String,
}

impl RecognizerHandle for MockRecognizer {
    fn bind_default_input(&mut self) -> Result<()> {
        self.platform.check(FailPoint::BindInput)
    }

    fn create_context(&mut self) -> Result<Box<dyn ContextHandle>> {
        self.platform.check(FailPoint::CreateContext)?;
        let context = Arc::new(Mutex::new(ContextState {
            interest: InterestSet::new(),
            armed: false,
            paused: false,
            queue: VecDeque::new(),
        }));
        self.platform.lock().contexts.push(Arc::clone(&context));
        Ok(Box::new(MockContext {
            platform: self.platform.clone(),
            context,
        }))
    }

    fn switch_engine(&mut self, engine: &EngineDescriptor) -> Result<()> {
        self.platform.check(FailPoint::SwitchEngine)?;
        self.engine = engine.name.clone();
        self.platform.lock().active_engine = Some(engine.name.clone());
        Ok(())
    }

    fn engine_name(&self) -> Result<String> {
        self.platform.check(FailPoint::EngineName)?;
        Ok(self.engine.clone())
    }

    fn state(&self) -> Result<u32> {
        self.platform.check(FailPoint::StateQuery)?;
        Ok(self.platform.lock().reported_state)
    }

    fn set_state(&mut self, state: RecoState) -> Result<()> {
        self.platform.check(FailPoint::SetState)?;
        let raw = match state {
            RecoState::Inactive => 0,
            RecoState::Active => 1,
            _ => return Err(SpeechError::invalid_arg(ErrorKind::ActivationFailed)),
        };
        let mut inner = self.platform.lock();
        inner.state_writes.push(raw);
        inner.reported_state = raw;
        Ok(())
    }
}

impl Drop for MockRecognizer {
    fn drop(&mut self) {
        self.platform.lock().release_log.push("recognizer");
    }
}

struct MockContext {
    platform: MockPlatform,
    context: Arc<Mutex<ContextState>>,
}

impl MockContext {
    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.context.lock().expect("mock context poisoned")
    }
}

impl ContextHandle for MockContext {
    fn set_interest(&mut self, interest: InterestSet) -> Result<()> {
        self.platform.check(FailPoint::SetInterest)?;
        self.lock().interest = interest;
        Ok(())
    }

    fn arm_notification(&mut self) -> Result<()> {
        self.platform.check(FailPoint::ArmNotification)?;
        self.lock().armed = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.platform.check(FailPoint::Pause)?;
        self.lock().paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.platform.check(FailPoint::Resume)?;
        self.lock().paused = false;
        Ok(())
    }

    fn create_grammar(&mut self) -> Result<Box<dyn GrammarHandle>> {
        self.platform.check(FailPoint::CreateGrammar)?;
        Ok(Box::new(MockGrammar {
            platform: self.platform.clone(),
        }))
    }

    fn drain(&mut self, max_count: u32) -> Result<Vec<EventRecord>> {
        self.platform.check(FailPoint::Drain)?;
        let mut ctx = self.lock();
        let take = (max_count as usize).min(ctx.queue.len());
        Ok(ctx.queue.drain(..take).collect())
    }
}

impl Drop for MockContext {
    fn drop(&mut self) {
        self.platform.lock().release_log.push("context");
    }
}

struct MockGrammar {
    platform: MockPlatform,
}

impl GrammarHandle for MockGrammar {
    fn load_dictation(&mut self) -> Result<()> {
        if !self.platform.lock().dictation_supported {
            return Err(SpeechError::new(
                ErrorKind::DictationActivationFailed,
                codes::SPERR_NOT_SUPPORTED_FOR_SHARED_RECOGNIZER,
            ));
        }
        self.platform.check(FailPoint::LoadDictation)?;
        self.platform.lock().dictation_loaded = true;
        Ok(())
    }

    fn set_dictation_active(&mut self, active: bool) -> Result<()> {
        self.platform.check(FailPoint::ActivateDictation)?;
        self.platform.lock().dictation_active = active;
        Ok(())
    }
}

impl Drop for MockGrammar {
    fn drop(&mut self) {
        self.platform.lock().release_log.push("grammar");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use hark_core::types::EventKind;

    fn record(event_id: u32) -> EventRecord {
        EventRecord {
            event_id,
            ..EventRecord::default()
        }
    }

    #[test]
    fn test_list_engines_default() {
        let platform = MockPlatform::new();
        let engines = platform.list_engines().unwrap();
        assert_eq!(engines.len(), 2);
        assert_eq!(engines[0], "Mock Desktop Recognizer");
    }

    #[test]
    fn test_resolve_engine_exact_match() {
        let platform = MockPlatform::new().with_engines(&["Alpha", "Beta"]);
        let descriptor = platform.resolve_engine("Beta").unwrap();
        assert_eq!(descriptor.name, "Beta");
    }

    #[test]
    fn test_resolve_engine_not_found() {
        let platform = MockPlatform::new();
        let err = platform.resolve_engine("NonexistentEngineXYZ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineLookupFailed);
        assert_eq!(err.code(), codes::SPERR_NOT_FOUND);
    }

    #[test]
    fn test_create_recognizer_records_scope() {
        let platform = MockPlatform::new();
        let _recognizer = platform.create_recognizer(EngineScope::Shared).unwrap();
        assert_eq!(platform.last_scope(), Some(EngineScope::Shared));
        assert_eq!(
            platform.active_engine().as_deref(),
            Some("Mock Desktop Recognizer")
        );
    }

    #[test]
    fn test_fail_injection() {
        let platform = MockPlatform::new();
        platform.fail_at(FailPoint::CreateRecognizer);
        let err = platform
            .create_recognizer(EngineScope::InProcess)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::EngineCreationFailed);
        assert_eq!(err.code(), codes::E_FAIL);

        platform.clear_failure(FailPoint::CreateRecognizer);
        assert!(platform.create_recognizer(EngineScope::InProcess).is_ok());
    }

    #[test]
    fn test_push_event_respects_interest() {
        let platform = MockPlatform::new();
        let mut recognizer = platform.create_recognizer(EngineScope::InProcess).unwrap();
        let mut context = recognizer.create_context().unwrap();
        context
            .set_interest(InterestSet::from_kinds(&[EventKind::Recognition]))
            .unwrap();

        assert!(platform.push_event(record(EventKind::Recognition.raw())));
        assert!(!platform.push_event(record(EventKind::Hypothesis.raw())));
        assert_eq!(platform.queued_len(), 1);
    }

    #[test]
    fn test_drain_returns_oldest_first() {
        let platform = MockPlatform::new();
        let mut recognizer = platform.create_recognizer(EngineScope::InProcess).unwrap();
        let mut context = recognizer.create_context().unwrap();
        context
            .set_interest(InterestSet::from_kinds(&[EventKind::Recognition]))
            .unwrap();

        for offset in [10u64, 20, 30] {
            platform.push_event(EventRecord {
                event_id: EventKind::Recognition.raw(),
                stream_offset: offset,
                ..EventRecord::default()
            });
        }

        let drained = context.drain(2).unwrap();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].stream_offset, 10);
        assert_eq!(drained[1].stream_offset, 20);
        assert_eq!(platform.queued_len(), 1);
    }

    #[test]
    fn test_release_log_order() {
        let platform = MockPlatform::new();
        {
            let mut recognizer = platform.create_recognizer(EngineScope::InProcess).unwrap();
            let mut context = recognizer.create_context().unwrap();
            let grammar = context.create_grammar().unwrap();
            drop(grammar);
            drop(context);
            drop(recognizer);
        }
        assert_eq!(platform.release_log(), vec!["grammar", "context", "recognizer"]);
    }

    #[test]
    fn test_dictation_unsupported_reports_shared_engine_code() {
        let platform = MockPlatform::new();
        platform.set_dictation_supported(false);
        let mut recognizer = platform.create_recognizer(EngineScope::Shared).unwrap();
        let mut context = recognizer.create_context().unwrap();
        let mut grammar = context.create_grammar().unwrap();

        let err = grammar.load_dictation().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DictationActivationFailed);
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_state_writes_are_recorded() {
        let platform = MockPlatform::new();
        let mut recognizer = platform.create_recognizer(EngineScope::InProcess).unwrap();

        recognizer.set_state(RecoState::Active).unwrap();
        recognizer.set_state(RecoState::Inactive).unwrap();

        assert_eq!(platform.state_writes(), vec![1, 0]);
        assert_eq!(recognizer.state().unwrap(), 0);
    }

    #[test]
    fn test_reported_state_override() {
        let platform = MockPlatform::new();
        let recognizer = platform.create_recognizer(EngineScope::InProcess).unwrap();
        platform.set_reported_state(7);
        assert_eq!(recognizer.state().unwrap(), 7);
    }

    #[test]
    fn test_pause_resume_toggle() {
        let platform = MockPlatform::new();
        let mut recognizer = platform.create_recognizer(EngineScope::InProcess).unwrap();
        let mut context = recognizer.create_context().unwrap();

        assert_eq!(platform.paused(), Some(false));
        context.pause().unwrap();
        assert_eq!(platform.paused(), Some(true));
        context.resume().unwrap();
        assert_eq!(platform.paused(), Some(false));
    }
}
