use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Native result codes the core recognizes.
///
/// Raw codes from the platform pass through `SpeechError` unmodified; the
/// constants here are the ones the core itself produces (argument
/// validation, closed sessions, unavailable platform paths) plus the SAPI
/// codes it inspects.
pub mod codes {
    /// Unspecified failure.
    pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;
    /// One or more arguments are invalid.
    pub const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;
    /// Not implemented.
    pub const E_NOTIMPL: i32 = 0x8000_4001_u32 as i32;
    /// The handle is invalid.
    pub const E_HANDLE: i32 = 0x8007_0006_u32 as i32;
    /// The speech subsystem has not been initialized.
    pub const SPERR_UNINITIALIZED: i32 = 0x8004_5001_u32 as i32;
    /// The requested token or data item was not found.
    pub const SPERR_NOT_FOUND: i32 = 0x8004_503A_u32 as i32;
    /// The operation is not supported for shared (server-class) recognizers.
    pub const SPERR_NOT_SUPPORTED_FOR_SHARED_RECOGNIZER: i32 = 0x8004_505E_u32 as i32;
}

/// Stable symbolic classification for every failure the core can surface.
///
/// The symbol is what adapter layers key on; it never changes across
/// platform versions even when the underlying native codes do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorKind {
    /// The process-wide speech subsystem could not be initialized.
    PlatformInitFailed,
    /// The recognition engine instance could not be created.
    EngineCreationFailed,
    /// No installed engine matched the requested name, or enumeration failed.
    EngineLookupFailed,
    /// The recognizer refused to switch to the resolved engine.
    EngineSwitchFailed,
    /// The bound engine's display name could not be read.
    EngineNameUnavailable,
    /// The default audio-input device could not be bound to the engine.
    AudioInputBindingFailed,
    /// The notification context could not be created.
    ContextCreationFailed,
    /// The event-interest mask was rejected.
    InterestConfigurationFailed,
    /// The context's OS-level notification signal could not be armed.
    NotificationWiringFailed,
    /// The grammar object could not be created.
    GrammarCreationFailed,
    /// Dictation could not be loaded or activated.
    DictationActivationFailed,
    /// The engine refused to enter the active recognition state.
    ActivationFailed,
    /// The notification context could not be suspended.
    PauseFailed,
    /// The notification context could not be resumed.
    ResumeFailed,
    /// The engine state could not be queried.
    StateQueryFailed,
    /// The caller supplied a state name that is not settable.
    InvalidStateArgument,
    /// Queued events could not be retrieved from the context.
    EventRetrievalFailed,
    /// The session has been closed or was never created.
    SessionInvalid,
}

impl ErrorKind {
    /// The stable snake_case symbol for this kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PlatformInitFailed => "platform_init_failed",
            ErrorKind::EngineCreationFailed => "engine_creation_failed",
            ErrorKind::EngineLookupFailed => "engine_lookup_failed",
            ErrorKind::EngineSwitchFailed => "engine_switch_failed",
            ErrorKind::EngineNameUnavailable => "engine_name_unavailable",
            ErrorKind::AudioInputBindingFailed => "audio_input_binding_failed",
            ErrorKind::ContextCreationFailed => "context_creation_failed",
            ErrorKind::InterestConfigurationFailed => "interest_configuration_failed",
            ErrorKind::NotificationWiringFailed => "notification_wiring_failed",
            ErrorKind::GrammarCreationFailed => "grammar_creation_failed",
            ErrorKind::DictationActivationFailed => "dictation_activation_failed",
            ErrorKind::ActivationFailed => "activation_failed",
            ErrorKind::PauseFailed => "pause_failed",
            ErrorKind::ResumeFailed => "resume_failed",
            ErrorKind::StateQueryFailed => "state_query_failed",
            ErrorKind::InvalidStateArgument => "invalid_state_argument",
            ErrorKind::EventRetrievalFailed => "event_retrieval_failed",
            ErrorKind::SessionInvalid => "session_invalid",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error value surfaced by every fallible operation in the core.
///
/// Pairs the stable symbolic kind with the raw native result code, passed
/// through unmodified for diagnostics. Construct with [`SpeechError::new`]
/// at the native call site that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} (0x{code:08X})")]
pub struct SpeechError {
    kind: ErrorKind,
    code: i32,
}

impl SpeechError {
    /// Wrap a native result code under the given symbolic kind.
    pub const fn new(kind: ErrorKind, code: i32) -> Self {
        Self { kind, code }
    }

    /// An argument-validation failure (`E_INVALIDARG`) under the given kind.
    pub const fn invalid_arg(kind: ErrorKind) -> Self {
        Self::new(kind, codes::E_INVALIDARG)
    }

    /// The error raised when an operation reaches a closed session.
    pub const fn session_invalid() -> Self {
        Self::new(ErrorKind::SessionInvalid, codes::E_HANDLE)
    }

    /// The symbolic kind.
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The raw native result code, unmodified.
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// Whether the native code reports the operation as unsupported rather
    /// than failed. Dictation activation on server-class engines is the
    /// expected case.
    pub const fn is_unsupported(&self) -> bool {
        self.code == codes::E_NOTIMPL
            || self.code == codes::SPERR_NOT_SUPPORTED_FOR_SHARED_RECOGNIZER
    }
}

/// A specialized `Result` type for speech-session operations.
pub type Result<T> = std::result::Result<T, SpeechError>;
