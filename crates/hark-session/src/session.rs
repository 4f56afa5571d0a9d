//! Session lifecycle: creation in dependency order, idempotent teardown.
//!
//! The three handles are declared grammar-first so Rust's field drop order
//! matches the required release order (grammar, then context, then
//! recognizer). Creation acquires them in the opposite, dependency order;
//! if any step fails, the locals acquired so far drop in reverse before the
//! error returns, so no partial session ever reaches the caller.

use tracing::{debug, info};

use hark_core::error::{Result, SpeechError};
use hark_core::types::{EngineScope, EventKind, InterestSet, RecoState};
use hark_engine::{ContextHandle, GrammarHandle, RecognizerHandle, SpeechPlatform};

/// Options for [`Session::create`].
#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Display name of the engine to switch to after creation.
    /// `None` keeps the platform default.
    pub engine_name: Option<String>,
    /// Recognizer class to instantiate.
    pub scope: EngineScope,
    /// Whether to load and activate a dictation grammar.
    pub dictation: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            engine_name: None,
            scope: EngineScope::InProcess,
            dictation: true,
        }
    }
}

/// An owned recognition session.
///
/// Valid from successful creation until [`Session::close`]; afterwards
/// every engine-touching operation fails with `SessionInvalid`. A closed
/// session is never reusable.
pub struct Session {
    grammar: Option<Box<dyn GrammarHandle>>,
    context: Option<Box<dyn ContextHandle>>,
    recognizer: Option<Box<dyn RecognizerHandle>>,
    dictation_active: bool,
}

impl Session {
    /// Create a session against the given platform.
    ///
    /// Each step is individually fallible and short-circuits; on failure,
    /// everything acquired so far is released before the error is returned.
    pub fn create(platform: &dyn SpeechPlatform, options: &SessionOptions) -> Result<Self> {
        let mut recognizer = platform.create_recognizer(options.scope)?;
        recognizer.bind_default_input()?;

        let mut context = recognizer.create_context()?;
        context.set_interest(InterestSet::from_kinds(&[EventKind::Recognition]))?;
        context.arm_notification()?;

        let mut grammar = context.create_grammar()?;
        let mut dictation_active = false;
        if options.dictation {
            match grammar.load_dictation() {
                Ok(()) => {
                    grammar.set_dictation_active(true)?;
                    dictation_active = true;
                }
                Err(e) if e.is_unsupported() => {
                    info!(
                        code = e.code(),
                        "dictation not supported by this engine class, continuing without it"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(name) = options.engine_name.as_deref() {
            let engine = platform.resolve_engine(name)?;
            recognizer.switch_engine(&engine)?;
        }

        recognizer.set_state(RecoState::Active)?;

        debug!(
            platform = platform.name(),
            scope = ?options.scope,
            dictation_active,
            "session created"
        );
        Ok(Self {
            grammar: Some(grammar),
            context: Some(context),
            recognizer: Some(recognizer),
            dictation_active,
        })
    }

    /// Release the session's handles: grammar, then context, then
    /// recognizer. Idempotent; absent handles are skipped.
    pub fn close(&mut self) {
        if self.grammar.take().is_some() {
            debug!("grammar released");
        }
        if self.context.take().is_some() {
            debug!("context released");
        }
        if self.recognizer.take().is_some() {
            self.dictation_active = false;
            debug!("recognizer released, session closed");
        }
    }

    /// Whether the session still owns its recognizer.
    pub fn is_valid(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Whether a dictation grammar was loaded and activated at creation.
    pub fn dictation_active(&self) -> bool {
        self.dictation_active
    }

    /// Display name of the currently bound engine.
    pub fn engine_name(&self) -> Result<String> {
        self.recognizer()?.engine_name()
    }

    /// Resolve `name` and switch the recognizer to it.
    pub fn set_engine_name(&mut self, platform: &dyn SpeechPlatform, name: &str) -> Result<()> {
        let engine = platform.resolve_engine(name)?;
        self.recognizer_mut()?.switch_engine(&engine)
    }

    pub(crate) fn recognizer(&self) -> Result<&dyn RecognizerHandle> {
        self.recognizer
            .as_deref()
            .ok_or_else(SpeechError::session_invalid)
    }

    pub(crate) fn recognizer_mut(&mut self) -> Result<&mut (dyn RecognizerHandle + 'static)> {
        self.recognizer
            .as_deref_mut()
            .ok_or_else(SpeechError::session_invalid)
    }

    pub(crate) fn context_mut(&mut self) -> Result<&mut (dyn ContextHandle + 'static)> {
        self.context
            .as_deref_mut()
            .ok_or_else(SpeechError::session_invalid)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("valid", &self.is_valid())
            .field("dictation_active", &self.dictation_active)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use hark_core::error::{codes, ErrorKind};
    use hark_engine::{FailPoint, MockPlatform};

    #[test]
    fn test_create_default_options() {
        let platform = MockPlatform::new();
        let session = Session::create(&platform, &SessionOptions::default()).unwrap();

        assert!(session.is_valid());
        assert!(session.dictation_active());
        assert_eq!(platform.notification_armed(), Some(true));
        // Initial interest is the recognition-completed kind only.
        assert_eq!(
            platform.interest_mask(),
            Some(EventKind::Recognition.flag())
        );
        // Creation issues exactly one state write: activation.
        assert_eq!(platform.state_writes(), vec![1]);
    }

    #[test]
    fn test_create_with_engine_name() {
        let platform = MockPlatform::new().with_engines(&["Alpha", "Beta"]);
        let options = SessionOptions {
            engine_name: Some("Beta".to_string()),
            ..SessionOptions::default()
        };
        let session = Session::create(&platform, &options).unwrap();
        assert_eq!(session.engine_name().unwrap(), "Beta");
        assert_eq!(platform.active_engine().as_deref(), Some("Beta"));
    }

    #[test]
    fn test_create_with_unknown_engine_rolls_back() {
        let platform = MockPlatform::new();
        let options = SessionOptions {
            engine_name: Some("NonexistentEngineXYZ".to_string()),
            ..SessionOptions::default()
        };
        let err = Session::create(&platform, &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineLookupFailed);
        // Everything acquired before the lookup is released, innermost first.
        assert_eq!(
            platform.release_log(),
            vec!["grammar", "context", "recognizer"]
        );
    }

    #[test]
    fn test_create_failure_at_each_step_releases_prior_handles() {
        let cases = [
            (FailPoint::CreateRecognizer, ErrorKind::EngineCreationFailed, vec![]),
            (
                FailPoint::BindInput,
                ErrorKind::AudioInputBindingFailed,
                vec!["recognizer"],
            ),
            (
                FailPoint::CreateContext,
                ErrorKind::ContextCreationFailed,
                vec!["recognizer"],
            ),
            (
                FailPoint::SetInterest,
                ErrorKind::InterestConfigurationFailed,
                vec!["context", "recognizer"],
            ),
            (
                FailPoint::ArmNotification,
                ErrorKind::NotificationWiringFailed,
                vec!["context", "recognizer"],
            ),
            (
                FailPoint::CreateGrammar,
                ErrorKind::GrammarCreationFailed,
                vec!["context", "recognizer"],
            ),
            (
                FailPoint::LoadDictation,
                ErrorKind::DictationActivationFailed,
                vec!["grammar", "context", "recognizer"],
            ),
            (
                FailPoint::ActivateDictation,
                ErrorKind::DictationActivationFailed,
                vec!["grammar", "context", "recognizer"],
            ),
            (
                FailPoint::SetState,
                ErrorKind::ActivationFailed,
                vec!["grammar", "context", "recognizer"],
            ),
        ];

        for (point, kind, expected_releases) in cases {
            let platform = MockPlatform::new();
            platform.fail_at(point);
            let err = Session::create(&platform, &SessionOptions::default()).unwrap_err();
            assert_eq!(err.kind(), kind, "failure at {point:?}");
            assert_eq!(
                platform.release_log(),
                expected_releases,
                "release order after failure at {point:?}"
            );
        }
    }

    #[test]
    fn test_dictation_unsupported_is_nonfatal() {
        let platform = MockPlatform::new();
        platform.set_dictation_supported(false);
        let options = SessionOptions {
            scope: EngineScope::Shared,
            ..SessionOptions::default()
        };
        let session = Session::create(&platform, &options).unwrap();
        assert!(session.is_valid());
        assert!(!session.dictation_active());
        let (loaded, active) = platform.dictation();
        assert!(!loaded);
        assert!(!active);
    }

    #[test]
    fn test_dictation_disabled_skips_loading() {
        let platform = MockPlatform::new();
        let options = SessionOptions {
            dictation: false,
            ..SessionOptions::default()
        };
        let session = Session::create(&platform, &options).unwrap();
        assert!(!session.dictation_active());
        let (loaded, _) = platform.dictation();
        assert!(!loaded);
    }

    #[test]
    fn test_close_releases_in_order_and_is_idempotent() {
        let platform = MockPlatform::new();
        let mut session = Session::create(&platform, &SessionOptions::default()).unwrap();

        session.close();
        assert!(!session.is_valid());
        assert_eq!(
            platform.release_log(),
            vec!["grammar", "context", "recognizer"]
        );

        // Second close is a no-op.
        session.close();
        assert_eq!(platform.release_log().len(), 3);
    }

    #[test]
    fn test_drop_closes() {
        let platform = MockPlatform::new();
        {
            let _session = Session::create(&platform, &SessionOptions::default()).unwrap();
        }
        assert_eq!(
            platform.release_log(),
            vec!["grammar", "context", "recognizer"]
        );
    }

    #[test]
    fn test_operations_after_close_fail_with_session_invalid() {
        let platform = MockPlatform::new();
        let mut session = Session::create(&platform, &SessionOptions::default()).unwrap();
        session.close();

        let err = session.engine_name().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionInvalid);
        assert_eq!(err.code(), codes::E_HANDLE);

        let err = session.set_engine_name(&platform, "Mock Desktop Recognizer").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionInvalid);
    }

    #[test]
    fn test_set_engine_name_switches() {
        let platform = MockPlatform::new().with_engines(&["Alpha", "Beta"]);
        let mut session = Session::create(&platform, &SessionOptions::default()).unwrap();
        assert_eq!(session.engine_name().unwrap(), "Alpha");

        session.set_engine_name(&platform, "Beta").unwrap();
        assert_eq!(session.engine_name().unwrap(), "Beta");
    }

    #[test]
    fn test_set_engine_name_unknown_leaves_binding() {
        let platform = MockPlatform::new().with_engines(&["Alpha"]);
        let mut session = Session::create(&platform, &SessionOptions::default()).unwrap();

        let err = session.set_engine_name(&platform, "Missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineLookupFailed);
        assert_eq!(session.engine_name().unwrap(), "Alpha");
    }

    #[test]
    fn test_switch_failure_surfaces_engine_switch_failed() {
        let platform = MockPlatform::new().with_engines(&["Alpha", "Beta"]);
        platform.fail_at(FailPoint::SwitchEngine);
        let mut session = Session::create(&platform, &SessionOptions::default()).unwrap();

        let err = session.set_engine_name(&platform, "Beta").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineSwitchFailed);
    }

    #[test]
    fn test_shared_scope_is_requested() {
        let platform = MockPlatform::new();
        let options = SessionOptions {
            scope: EngineScope::Shared,
            ..SessionOptions::default()
        };
        let _session = Session::create(&platform, &options).unwrap();
        assert_eq!(platform.last_scope(), Some(EngineScope::Shared));
    }
}
