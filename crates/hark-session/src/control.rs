//! Recognition-state control: pause/resume and engine state access.

use tracing::debug;

use hark_core::error::{ErrorKind, Result, SpeechError};
use hark_core::types::RecoState;

use crate::Session;

impl Session {
    /// Suspend event delivery on the notification context.
    pub fn pause(&mut self) -> Result<()> {
        self.context_mut()?.pause()?;
        debug!("context paused");
        Ok(())
    }

    /// Resume event delivery on the notification context.
    pub fn resume(&mut self) -> Result<()> {
        self.context_mut()?.resume()?;
        debug!("context resumed");
        Ok(())
    }

    /// The engine-reported recognition state. Codes this build does not
    /// know map to [`RecoState::Unknown`].
    pub fn state(&self) -> Result<RecoState> {
        let raw = self.recognizer()?.state()?;
        Ok(RecoState::from_raw(raw))
    }

    /// Request a recognition state.
    ///
    /// Only `Inactive` and `Active` are accepted; anything else is
    /// `InvalidStateArgument`. The engine is then queried, not written:
    /// this call succeeds or fails on the state query alone, preserving
    /// the surface's long-standing external contract. The one real state
    /// write happens during [`Session::create`], which activates the
    /// engine.
    pub fn set_state(&mut self, target: RecoState) -> Result<()> {
        if !target.is_settable() {
            return Err(SpeechError::invalid_arg(ErrorKind::InvalidStateArgument));
        }
        let _ = self.recognizer()?.state()?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionOptions;
    use hark_core::error::codes;
    use hark_engine::{FailPoint, MockPlatform};

    fn session(platform: &MockPlatform) -> Session {
        Session::create(platform, &SessionOptions::default()).unwrap()
    }

    #[test]
    fn test_pause_and_resume() {
        let platform = MockPlatform::new();
        let mut session = session(&platform);

        session.pause().unwrap();
        assert_eq!(platform.paused(), Some(true));

        session.resume().unwrap();
        assert_eq!(platform.paused(), Some(false));
    }

    #[test]
    fn test_pause_failure_kind() {
        let platform = MockPlatform::new();
        let mut session = session(&platform);
        platform.fail_at(FailPoint::Pause);
        assert_eq!(
            session.pause().unwrap_err().kind(),
            ErrorKind::PauseFailed
        );
    }

    #[test]
    fn test_resume_failure_kind() {
        let platform = MockPlatform::new();
        let mut session = session(&platform);
        platform.fail_at(FailPoint::Resume);
        assert_eq!(
            session.resume().unwrap_err().kind(),
            ErrorKind::ResumeFailed
        );
    }

    #[test]
    fn test_state_reflects_engine_report() {
        let platform = MockPlatform::new();
        let session = session(&platform);

        // Creation activated the engine.
        assert_eq!(session.state().unwrap(), RecoState::Active);

        platform.set_reported_state(3);
        assert_eq!(session.state().unwrap(), RecoState::InactivePurge);
    }

    #[test]
    fn test_state_unknown_code_maps_to_unknown() {
        let platform = MockPlatform::new();
        let session = session(&platform);
        platform.set_reported_state(42);
        assert_eq!(session.state().unwrap(), RecoState::Unknown);
    }

    #[test]
    fn test_state_query_failure_kind() {
        let platform = MockPlatform::new();
        let session = session(&platform);
        platform.fail_at(FailPoint::StateQuery);
        assert_eq!(
            session.state().unwrap_err().kind(),
            ErrorKind::StateQueryFailed
        );
    }

    #[test]
    fn test_set_state_rejects_unsettable_targets() {
        let platform = MockPlatform::new();
        let mut session = session(&platform);

        for target in [
            RecoState::ActiveAlways,
            RecoState::InactivePurge,
            RecoState::Unknown,
        ] {
            let err = session.set_state(target).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidStateArgument);
            assert_eq!(err.code(), codes::E_INVALIDARG);
        }
        // No writes beyond the activation at creation.
        assert_eq!(platform.state_writes(), vec![1]);
    }

    #[test]
    fn test_set_state_queries_instead_of_writing() {
        let platform = MockPlatform::new();
        let mut session = session(&platform);

        session.set_state(RecoState::Inactive).unwrap();
        session.set_state(RecoState::Active).unwrap();

        // The engine still reports the state written at activation; the
        // two calls above issued queries only.
        assert_eq!(platform.state_writes(), vec![1]);
        assert_eq!(session.state().unwrap(), RecoState::Active);
    }

    #[test]
    fn test_set_state_surfaces_query_failure() {
        let platform = MockPlatform::new();
        let mut session = session(&platform);
        platform.fail_at(FailPoint::StateQuery);
        assert_eq!(
            session.set_state(RecoState::Active).unwrap_err().kind(),
            ErrorKind::StateQueryFailed
        );
    }

    #[test]
    fn test_control_after_close_fails() {
        let platform = MockPlatform::new();
        let mut session = session(&platform);
        session.close();

        assert_eq!(session.pause().unwrap_err().kind(), ErrorKind::SessionInvalid);
        assert_eq!(session.resume().unwrap_err().kind(), ErrorKind::SessionInvalid);
        assert_eq!(session.state().unwrap_err().kind(), ErrorKind::SessionInvalid);
        assert_eq!(
            session.set_state(RecoState::Active).unwrap_err().kind(),
            ErrorKind::SessionInvalid
        );
    }
}
