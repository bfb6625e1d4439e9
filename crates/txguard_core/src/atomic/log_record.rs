//! Structured phase records for atomic operations.

use super::outcome::OutcomeKind;
use crate::storage::HandleId;
use log::Level;

/// Phase transition of one atomic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Commit,
    Rollback,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
        }
    }
}

/// Write-only log record: built at a phase transition, emitted, discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub phase: Phase,
    pub severity: Level,
    pub outcome: Option<OutcomeKind>,
    pub request_id: Option<String>,
    pub handle: Option<HandleId>,
    pub duration_ms: Option<u128>,
    pub detail: Option<String>,
}

impl LogRecord {
    pub fn new(phase: Phase, severity: Level) -> Self {
        Self {
            phase,
            severity,
            outcome: None,
            request_id: None,
            handle: None,
            duration_ms: None,
            detail: None,
        }
    }

    pub fn request(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn outcome(mut self, outcome: OutcomeKind) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn handle(mut self, handle: HandleId) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn duration_ms(mut self, duration_ms: u128) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Renders the record in `key=value` form.
    pub fn render(&self) -> String {
        let mut line = format!("event=atomic_op module=atomic phase={}", self.phase.as_str());
        if let Some(request_id) = &self.request_id {
            line.push_str(&format!(" request_id={request_id}"));
        }
        if let Some(outcome) = self.outcome {
            line.push_str(&format!(" outcome={}", outcome.as_str()));
        }
        if let Some(handle) = self.handle {
            line.push_str(&format!(" handle={handle}"));
        }
        if let Some(duration_ms) = self.duration_ms {
            line.push_str(&format!(" duration_ms={duration_ms}"));
        }
        if let Some(detail) = &self.detail {
            line.push_str(&format!(" detail={}", detail.replace(['\n', '\r'], " ")));
        }
        line
    }

    pub fn emit(&self) {
        log::log!(target: "txguard::atomic", self.severity, "{}", self.render());
    }
}

#[cfg(test)]
mod tests {
    use super::{LogRecord, Phase};
    use crate::atomic::outcome::OutcomeKind;
    use log::Level;

    #[test]
    fn render_includes_only_present_fields() {
        let record = LogRecord::new(Phase::Rollback, Level::Warn)
            .request("req-9")
            .outcome(OutcomeKind::Conflict)
            .duration_ms(12)
            .detail("name taken\nretry");
        assert_eq!(
            record.render(),
            "event=atomic_op module=atomic phase=rollback request_id=req-9 outcome=conflict duration_ms=12 detail=name taken retry"
        );

        let start = LogRecord::new(Phase::Start, Level::Debug);
        assert_eq!(start.render(), "event=atomic_op module=atomic phase=start");
    }
}
