use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use hark_core::error::{ErrorKind, Result, SpeechError};
use hark_core::types::{EventKind, EventRecord, RecoState, SessionId};
use hark_engine::SpeechPlatform;
use hark_session::{Session, SessionOptions};

/// Result shape of [`SessionRegistry::drain_events`], mirroring the
/// count-then-payload convention of the host surface: nothing for zero
/// events, a single record for one, an ordered batch otherwise.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainOutcome {
    Empty,
    Single(EventRecord),
    Batch(Vec<EventRecord>),
}

impl DrainOutcome {
    fn from_records(mut records: Vec<EventRecord>) -> Self {
        match records.len() {
            0 => DrainOutcome::Empty,
            1 => DrainOutcome::Single(records.remove(0)),
            _ => DrainOutcome::Batch(records),
        }
    }

    /// Number of events actually drained.
    pub fn count(&self) -> usize {
        match self {
            DrainOutcome::Empty => 0,
            DrainOutcome::Single(_) => 1,
            DrainOutcome::Batch(records) => records.len(),
        }
    }

    /// The drained records, in delivery order.
    pub fn records(&self) -> Vec<EventRecord> {
        match self {
            DrainOutcome::Empty => Vec::new(),
            DrainOutcome::Single(record) => vec![*record],
            DrainOutcome::Batch(records) => records.clone(),
        }
    }
}

struct SessionEntry {
    session: Session,
    created_at: DateTime<Utc>,
    user_data: HashMap<String, String>,
}

/// Adapter-facing registry of recognition sessions.
///
/// Owns the platform and every session created through it. Destroyed
/// sessions stay addressable — `is_valid` keeps answering `false` and
/// their user data survives — matching the behavior hosts already rely
/// on for collected-but-referenced handles.
pub struct SessionRegistry {
    platform: Box<dyn SpeechPlatform>,
    defaults: SessionOptions,
    sessions: HashMap<SessionId, SessionEntry>,
}

impl SessionRegistry {
    /// Create a registry over the given platform with default session
    /// options.
    pub fn new(platform: Box<dyn SpeechPlatform>) -> Self {
        Self::with_options(platform, SessionOptions::default())
    }

    /// Create a registry whose sessions use `defaults` as their base
    /// options (engine scope, dictation).
    pub fn with_options(platform: Box<dyn SpeechPlatform>, defaults: SessionOptions) -> Self {
        Self {
            platform,
            defaults,
            sessions: HashMap::new(),
        }
    }

    /// Number of entries, including destroyed ones.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Create a session, optionally switching to a named engine, and
    /// register it. On failure nothing is registered.
    pub fn create_session(&mut self, engine_name: Option<&str>) -> Result<SessionId> {
        let mut options = self.defaults.clone();
        if let Some(name) = engine_name {
            options.engine_name = Some(name.to_string());
        }

        let session = Session::create(self.platform.as_ref(), &options)?;
        let id = SessionId::new();
        self.sessions.insert(
            id,
            SessionEntry {
                session,
                created_at: Utc::now(),
                user_data: HashMap::new(),
            },
        );
        info!(session = %id, engine = ?engine_name, "session registered");
        Ok(id)
    }

    /// Close a session in place. Idempotent; unknown ids are ignored.
    /// The entry and its user data stay addressable.
    pub fn destroy_session(&mut self, id: &SessionId) {
        if let Some(entry) = self.sessions.get_mut(id) {
            entry.session.close();
            debug!(session = %id, "session destroyed");
        }
    }

    /// Whether `id` names a live session. Unknown and destroyed ids are
    /// both `false`.
    pub fn is_valid(&self, id: &SessionId) -> bool {
        self.sessions
            .get(id)
            .map(|entry| entry.session.is_valid())
            .unwrap_or(false)
    }

    /// When the session was created, if the id is known.
    pub fn created_at(&self, id: &SessionId) -> Option<DateTime<Utc>> {
        self.sessions.get(id).map(|entry| entry.created_at)
    }

    /// Suspend event delivery for the session.
    pub fn pause(&mut self, id: &SessionId) -> Result<()> {
        self.entry_mut(id)?.session.pause()
    }

    /// Resume event delivery for the session.
    pub fn resume(&mut self, id: &SessionId) -> Result<()> {
        self.entry_mut(id)?.session.resume()
    }

    /// The engine-reported recognition state.
    pub fn get_state(&self, id: &SessionId) -> Result<RecoState> {
        self.entry(id)?.session.state()
    }

    /// Request a recognition state by name. Only `"inactive"` and
    /// `"active"` are accepted. See `Session::set_state` for the query
    /// contract this call preserves.
    pub fn set_state(&mut self, id: &SessionId, state: &str) -> Result<()> {
        let target = RecoState::parse_target(state)
            .ok_or(SpeechError::invalid_arg(ErrorKind::InvalidStateArgument))?;
        self.entry_mut(id)?.session.set_state(target)
    }

    /// Replace the session's event interest with the given raw kind codes.
    /// At least one code is required by construction; codes that are not
    /// recognition events are rejected.
    pub fn set_interest(&mut self, id: &SessionId, first: u32, rest: &[u32]) -> Result<()> {
        let mut kinds = Vec::with_capacity(1 + rest.len());
        for code in std::iter::once(first).chain(rest.iter().copied()) {
            let kind = EventKind::from_raw(code).ok_or(SpeechError::invalid_arg(
                ErrorKind::InterestConfigurationFailed,
            ))?;
            kinds.push(kind);
        }
        self.entry_mut(id)?.session.set_interest(&kinds)
    }

    /// Drain up to `max_count` queued events (default 1). Zero is
    /// rejected.
    pub fn drain_events(
        &mut self,
        id: &SessionId,
        max_count: Option<u32>,
    ) -> Result<DrainOutcome> {
        let max_count = max_count.unwrap_or(1);
        let records = self.entry_mut(id)?.session.drain(max_count)?;
        Ok(DrainOutcome::from_records(records))
    }

    /// Display name of the session's bound engine.
    pub fn get_engine_name(&self, id: &SessionId) -> Result<String> {
        self.entry(id)?.session.engine_name()
    }

    /// Resolve `name` and switch the session's recognizer to it.
    pub fn set_engine_name(&mut self, id: &SessionId, name: &str) -> Result<()> {
        let entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(SpeechError::session_invalid)?;
        entry.session.set_engine_name(self.platform.as_ref(), name)
    }

    /// Display names of all installed engines, in platform enumeration
    /// order.
    pub fn list_engines(&self) -> Result<Vec<String>> {
        self.platform.list_engines()
    }

    /// Attach a host-defined value to the session. No engine interaction.
    pub fn set_user_value(&mut self, id: &SessionId, key: &str, value: &str) -> Result<()> {
        let entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(SpeechError::session_invalid)?;
        entry.user_data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Read a host-defined value from the session's side table.
    pub fn user_value(&self, id: &SessionId, key: &str) -> Result<Option<String>> {
        let entry = self
            .sessions
            .get(id)
            .ok_or_else(SpeechError::session_invalid)?;
        Ok(entry.user_data.get(key).cloned())
    }

    fn entry(&self, id: &SessionId) -> Result<&SessionEntry> {
        self.sessions
            .get(id)
            .ok_or_else(SpeechError::session_invalid)
    }

    fn entry_mut(&mut self, id: &SessionId) -> Result<&mut SessionEntry> {
        self.sessions
            .get_mut(id)
            .ok_or_else(SpeechError::session_invalid)
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("platform", &self.platform.name())
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_outcome_shapes() {
        let record = EventRecord::default();

        assert_eq!(DrainOutcome::from_records(vec![]), DrainOutcome::Empty);
        assert_eq!(
            DrainOutcome::from_records(vec![record]),
            DrainOutcome::Single(record)
        );
        assert_eq!(
            DrainOutcome::from_records(vec![record, record]),
            DrainOutcome::Batch(vec![record, record])
        );
    }

    #[test]
    fn test_drain_outcome_count() {
        let record = EventRecord::default();
        assert_eq!(DrainOutcome::Empty.count(), 0);
        assert_eq!(DrainOutcome::Single(record).count(), 1);
        assert_eq!(DrainOutcome::Batch(vec![record, record, record]).count(), 3);
    }

    #[test]
    fn test_drain_outcome_records() {
        let record = EventRecord {
            event_id: 38,
            ..EventRecord::default()
        };
        assert!(DrainOutcome::Empty.records().is_empty());
        assert_eq!(DrainOutcome::Single(record).records(), vec![record]);
    }

    #[test]
    fn test_drain_outcome_serializes_for_the_adapter() {
        let record = EventRecord {
            event_id: 38,
            ..EventRecord::default()
        };
        let json = serde_json::to_string(&DrainOutcome::Single(record)).unwrap();
        assert!(json.contains("\"single\""));
        assert!(json.contains("\"event_id\":38"));

        let json = serde_json::to_string(&DrainOutcome::Empty).unwrap();
        assert_eq!(json, "\"empty\"");
    }
}
