//! Event channel: interest configuration and the non-blocking drain.

use tracing::trace;

use hark_core::error::{ErrorKind, Result, SpeechError};
use hark_core::types::{EventKind, EventRecord, InterestSet};

use crate::Session;

impl Session {
    /// Replace the context's event interest with the given kinds.
    ///
    /// Every kind's bit flag is OR-accumulated into one mask, applied as
    /// both the interested and queued mask in a single native call. An
    /// empty slice is rejected.
    pub fn set_interest(&mut self, kinds: &[EventKind]) -> Result<()> {
        if kinds.is_empty() {
            return Err(SpeechError::invalid_arg(
                ErrorKind::InterestConfigurationFailed,
            ));
        }
        let interest = InterestSet::from_kinds(kinds);
        self.context_mut()?.set_interest(interest)?;
        trace!(mask = interest.mask(), "interest applied");
        Ok(())
    }

    /// Non-blocking poll: up to `max_count` queued events in delivery
    /// order, oldest first. Returns immediately with whatever is queued,
    /// possibly nothing. `max_count` must be at least 1.
    pub fn drain(&mut self, max_count: u32) -> Result<Vec<EventRecord>> {
        if max_count == 0 {
            return Err(SpeechError::invalid_arg(ErrorKind::EventRetrievalFailed));
        }
        let records = self.context_mut()?.drain(max_count)?;
        trace!(requested = max_count, returned = records.len(), "events drained");
        Ok(records)
    }
}

// =============================================================================
// Tests
// =============================================================================
