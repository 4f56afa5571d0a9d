use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Engine-reported recognition state.
///
/// Read from or written to the engine; never cached by the core. The four
/// known native codes map one-to-one; anything else is `Unknown`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoState {
    /// Recognition is stopped; audio is not consumed.
    Inactive,
    /// Recognition runs while at least one context is active.
    Active,
    /// Recognition runs regardless of context activity.
    ActiveAlways,
    /// Recognition is stopped and pending audio is discarded.
    InactivePurge,
    /// The engine reported a state code this build does not know.
    Unknown,
}

impl RecoState {
    /// Map a raw native state code to the enumeration.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => RecoState::Inactive,
            1 => RecoState::Active,
            2 => RecoState::ActiveAlways,
            3 => RecoState::InactivePurge,
            _ => RecoState::Unknown,
        }
    }

    /// The adapter-facing name for this state.
    pub const fn as_str(&self) -> &'static str {
        match self {
            RecoState::Inactive => "inactive",
            RecoState::Active => "active",
            RecoState::ActiveAlways => "active_always",
            RecoState::InactivePurge => "inactive_purge",
            RecoState::Unknown => "unknown",
        }
    }

    /// Parse a caller-supplied target state. Only the two settable states
    /// are accepted; everything else is `None`.
    pub fn parse_target(name: &str) -> Option<Self> {
        match name {
            "inactive" => Some(RecoState::Inactive),
            "active" => Some(RecoState::Active),
            _ => None,
        }
    }

    /// Whether this state is one a caller may request.
    pub const fn is_settable(&self) -> bool {
        matches!(self, RecoState::Inactive | RecoState::Active)
    }
}

impl fmt::Display for RecoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which recognizer class to instantiate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineScope {
    /// An engine instance private to this process.
    #[default]
    InProcess,
    /// The system-wide shared (server-class) engine. Dictation activation
    /// is an expected-unsupported path for this class.
    Shared,
}

/// Recognition event kinds the notification context can report.
///
/// Discriminants are the native event ids of the recognition range; the
/// interest mask is built from them bit-for-bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum EventKind {
    /// The input stream reached its end.
    EndStream = 34,
    /// The engine detected the start of sound.
    SoundStart = 35,
    /// The engine detected the end of sound.
    SoundEnd = 36,
    /// The engine started recognizing a phrase.
    PhraseStart = 37,
    /// A phrase was recognized with full confidence.
    Recognition = 38,
    /// A partial, lower-confidence recognition.
    Hypothesis = 39,
    /// A bookmark in the recognition stream was reached.
    Bookmark = 40,
    /// A numeric engine property changed.
    PropertyNumChange = 41,
    /// A string engine property changed.
    PropertyStringChange = 42,
    /// Audio was processed without a usable recognition.
    FalseRecognition = 43,
    /// Background interference was detected on the input.
    Interference = 44,
    /// The engine requested UI assistance.
    RequestUi = 45,
    /// A recognition was delivered to another context.
    OtherContext = 46,
    /// The input audio level changed.
    AudioLevel = 47,
    /// Retained audio for a recognition is available.
    RetainedAudio = 48,
    /// Engine-private payload.
    EnginePrivate = 49,
}

impl EventKind {
    /// All kinds, in ascending native id order.
    pub const ALL: [EventKind; 16] = [
        EventKind::EndStream,
        EventKind::SoundStart,
        EventKind::SoundEnd,
        EventKind::PhraseStart,
        EventKind::Recognition,
        EventKind::Hypothesis,
        EventKind::Bookmark,
        EventKind::PropertyNumChange,
        EventKind::PropertyStringChange,
        EventKind::FalseRecognition,
        EventKind::Interference,
        EventKind::RequestUi,
        EventKind::OtherContext,
        EventKind::AudioLevel,
        EventKind::RetainedAudio,
        EventKind::EnginePrivate,
    ];

    /// The native event id.
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// The interest-mask bit for this kind.
    pub const fn flag(self) -> u64 {
        1 << self.raw()
    }

    /// Map a native event id back to a kind, if it is one this build knows.
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.raw() == raw)
    }

    /// Parse an adapter-facing kind name (the snake_case serde form).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "end_stream" => Some(EventKind::EndStream),
            "sound_start" => Some(EventKind::SoundStart),
            "sound_end" => Some(EventKind::SoundEnd),
            "phrase_start" => Some(EventKind::PhraseStart),
            "recognition" => Some(EventKind::Recognition),
            "hypothesis" => Some(EventKind::Hypothesis),
            "bookmark" => Some(EventKind::Bookmark),
            "property_num_change" => Some(EventKind::PropertyNumChange),
            "property_string_change" => Some(EventKind::PropertyStringChange),
            "false_recognition" => Some(EventKind::FalseRecognition),
            "interference" => Some(EventKind::Interference),
            "request_ui" => Some(EventKind::RequestUi),
            "other_context" => Some(EventKind::OtherContext),
            "audio_level" => Some(EventKind::AudioLevel),
            "retained_audio" => Some(EventKind::RetainedAudio),
            "engine_private" => Some(EventKind::EnginePrivate),
            _ => None,
        }
    }
}

// =============================================================================
// Interest mask
// =============================================================================

/// Accumulated bitmask of event kinds a context should report.
///
/// Bit *n* set means events with native id *n* are requested. Applied as
/// both the interested and queued mask on the context in one call; the core
/// offers "set" only, the current value lives inside the context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestSet {
    mask: u64,
}

impl InterestSet {
    /// An empty interest set.
    pub const fn new() -> Self {
        Self { mask: 0 }
    }

    /// Build a set from the given kinds.
    pub fn from_kinds(kinds: &[EventKind]) -> Self {
        let mut set = Self::new();
        for kind in kinds {
            set.insert(*kind);
        }
        set
    }

    /// Add a kind to the set.
    pub fn insert(&mut self, kind: EventKind) {
        self.mask |= kind.flag();
    }

    /// Whether the set requests the given kind.
    pub fn contains(&self, kind: EventKind) -> bool {
        self.contains_raw(kind.raw())
    }

    /// Whether the set requests the given native event id.
    pub fn contains_raw(&self, event_id: u32) -> bool {
        event_id < 64 && self.mask & (1 << event_id) != 0
    }

    /// The accumulated bitmask.
    pub const fn mask(&self) -> u64 {
        self.mask
    }

    /// Whether no kinds are requested.
    pub const fn is_empty(&self) -> bool {
        self.mask == 0
    }
}

// =============================================================================
// Records and descriptors
// =============================================================================

/// Immutable snapshot of one recognition notification.
///
/// Holds no reference to any live engine resource. The two payload words
/// are generic; their interpretation depends on `event_id`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Native event id.
    pub event_id: u32,
    /// Native payload-kind tag for `wparam`/`lparam`.
    pub param_kind: u32,
    /// Index of the audio stream the event belongs to.
    pub stream_num: u32,
    /// Byte offset into the audio stream.
    pub stream_offset: u64,
    /// Word-sized generic payload.
    pub wparam: u64,
    /// Signed word-sized generic payload.
    pub lparam: i64,
}

impl EventRecord {
    /// The event kind, if `event_id` is one this build knows.
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_raw(self.event_id)
    }
}

/// A resolved reference to an installed recognition engine.
///
/// Transient: resolved on demand, never cached by the core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineDescriptor {
    /// Display/identifier name of the engine.
    pub name: String,
}

impl EngineDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for EngineDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Unique identifier for a registered session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Tests
// =============================================================================
