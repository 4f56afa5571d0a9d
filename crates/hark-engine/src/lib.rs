//! Hark engine crate - the platform seam for speech recognition.
//!
//! Defines the object-model traits the session layer drives
//! (`SpeechPlatform`, `RecognizerHandle`, `ContextHandle`, `GrammarHandle`),
//! a `SapiPlatform` that implements them over Microsoft SAPI on Windows,
//! and a `MockPlatform` for tests and non-Windows development.

pub mod mock;
pub mod sapi;

use hark_core::error::Result;
use hark_core::types::{EngineDescriptor, EngineScope, EventRecord, InterestSet, RecoState};

pub use mock::{FailPoint, MockPlatform};
pub use sapi::SapiPlatform;

/// Entry point to a speech-recognition platform.
///
/// Implementations own process-wide concerns (native runtime
/// initialization, token enumeration) and hand out recognizer instances.
pub trait SpeechPlatform: Send + Sync {
    /// Platform name for logging.
    fn name(&self) -> &str;

    /// Instantiate a recognition engine of the given class.
    fn create_recognizer(&self, scope: EngineScope) -> Result<Box<dyn RecognizerHandle>>;

    /// Locate the best-matching installed engine for a display name.
    fn resolve_engine(&self, name: &str) -> Result<EngineDescriptor>;

    /// Display names of all installed engines, in platform enumeration order.
    fn list_engines(&self) -> Result<Vec<String>>;
}

/// An owned recognition-engine instance.
///
/// Dropping the handle releases the underlying native resource; the session
/// layer relies on that for its teardown ordering.
pub trait RecognizerHandle: Send {
    /// Bind the default audio-input device as engine input, replacing any
    /// prior input.
    fn bind_default_input(&mut self) -> Result<()>;

    /// Create a notification context from this engine.
    fn create_context(&mut self) -> Result<Box<dyn ContextHandle>>;

    /// Switch this recognizer to a resolved engine.
    fn switch_engine(&mut self, engine: &EngineDescriptor) -> Result<()>;

    /// Display name of the currently bound engine.
    fn engine_name(&self) -> Result<String>;

    /// Raw engine-reported recognition state code.
    fn state(&self) -> Result<u32>;

    /// Write the engine recognition state. Only the settable states are
    /// meaningful here.
    fn set_state(&mut self, state: RecoState) -> Result<()>;
}

/// An owned notification context.
pub trait ContextHandle: Send {
    /// Apply the interest set as both the interested and queued mask, in
    /// one native call.
    fn set_interest(&mut self, interest: InterestSet) -> Result<()>;

    /// Arm the context's OS-level notification signal so the engine queues
    /// events instead of discarding them.
    fn arm_notification(&mut self) -> Result<()>;

    /// Suspend event delivery.
    fn pause(&mut self) -> Result<()>;

    /// Resume event delivery.
    fn resume(&mut self) -> Result<()>;

    /// Create an empty grammar bound to this context.
    fn create_grammar(&mut self) -> Result<Box<dyn GrammarHandle>>;

    /// Non-blocking poll: return up to `max_count` queued events in
    /// delivery order, oldest first. May return fewer, including none.
    fn drain(&mut self, max_count: u32) -> Result<Vec<EventRecord>>;
}

/// An owned grammar binding.
pub trait GrammarHandle: Send {
    /// Load the dictation topic into this grammar.
    fn load_dictation(&mut self) -> Result<()>;

    /// Activate or deactivate the loaded dictation topic.
    fn set_dictation_active(&mut self, active: bool) -> Result<()>;
}
