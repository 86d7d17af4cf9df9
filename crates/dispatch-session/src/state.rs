//! C8: SessionFSM state — a tagged union (§9 REDESIGN FLAGS: "model as a tagged variant whose
//! variants carry their required fields, with exhaustive matching at the handler boundary")
//! replacing the source's stringly-typed state bag. Persisted via `state_json` on
//! `dispatch_store::SessionRecord`; the store treats the payload as opaque.

use chrono::{DateTime, Utc};
use dispatch_store::SessionRecord;
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Per-operator conversational state (§4.8). Every variant that has selected a channel
/// carries its id directly, rather than relying on a side channel the handler has to
/// remember to consult.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    Mode1Uploading { channel_id: i64 },
    Mode2Uploading { channel_id: i64 },
    RecurringAwaitingMedia { channel_id: i64 },
    RecurringAwaitingDescription { channel_id: i64, file_path: String },
    RecurringAwaitingSchedule { post_id: i64 },
    AwaitingScheduleInput { channel_id: i64 },
    AwaitingDateInput { channel_id: i64, editing_post_id: Option<i64> },
    AwaitingDescriptionInput { editing_post_id: i64 },
    AwaitingChannelId,
    AwaitingChannelName { pending_channel_id: i64 },
    AwaitingBatchName { channel_id: i64 },
    BatchMode1Uploading { batch_id: i64 },
    BatchMode2Uploading { batch_id: i64 },
    AwaitingBulkEditInput { post_ids: Vec<i64>, scope_label: String },
    AwaitingRescheduleSettings,
    AwaitingBackupName,
    AwaitingCaptionInput { post_id: i64, next_index: u32, channel_id: i64 },
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

impl SessionState {
    /// The tag stored in `SessionRecord::state_tag` for indexing/diagnostics; the full state
    /// (including its fields) lives in `state_json`.
    pub fn tag(&self) -> &'static str {
        match self {
            SessionState::Idle => "IDLE",
            SessionState::Mode1Uploading { .. } => "MODE1_UPLOADING",
            SessionState::Mode2Uploading { .. } => "MODE2_UPLOADING",
            SessionState::RecurringAwaitingMedia { .. } => "RECURRING_AWAITING_MEDIA",
            SessionState::RecurringAwaitingDescription { .. } => "RECURRING_AWAITING_DESCRIPTION",
            SessionState::RecurringAwaitingSchedule { .. } => "RECURRING_AWAITING_SCHEDULE",
            SessionState::AwaitingScheduleInput { .. } => "AWAITING_SCHEDULE_INPUT",
            SessionState::AwaitingDateInput { .. } => "AWAITING_DATE_INPUT",
            SessionState::AwaitingDescriptionInput { .. } => "AWAITING_DESCRIPTION_INPUT",
            SessionState::AwaitingChannelId => "AWAITING_CHANNEL_ID",
            SessionState::AwaitingChannelName { .. } => "AWAITING_CHANNEL_NAME",
            SessionState::AwaitingBatchName { .. } => "AWAITING_BATCH_NAME",
            SessionState::BatchMode1Uploading { .. } => "BATCH_MODE1_UPLOADING",
            SessionState::BatchMode2Uploading { .. } => "BATCH_MODE2_UPLOADING",
            SessionState::AwaitingBulkEditInput { .. } => "AWAITING_BULK_EDIT_INPUT",
            SessionState::AwaitingRescheduleSettings => "AWAITING_RESCHEDULE_SETTINGS",
            SessionState::AwaitingBackupName => "AWAITING_BACKUP_NAME",
            SessionState::AwaitingCaptionInput { .. } => "AWAITING_CAPTION_INPUT",
        }
    }

    /// The channel this state has bound, if any (§4.8 invariant: "every state carries a
    /// channel reference once selected").
    pub fn channel_id(&self) -> Option<i64> {
        match self {
            SessionState::Mode1Uploading { channel_id }
            | SessionState::Mode2Uploading { channel_id }
            | SessionState::RecurringAwaitingMedia { channel_id }
            | SessionState::RecurringAwaitingDescription { channel_id, .. }
            | SessionState::AwaitingScheduleInput { channel_id }
            | SessionState::AwaitingDateInput { channel_id, .. }
            | SessionState::AwaitingBatchName { channel_id }
            | SessionState::AwaitingCaptionInput { channel_id, .. } => Some(*channel_id),
            _ => None,
        }
    }

    pub fn to_record(&self, user_id: i64, updated_at: DateTime<Utc>) -> SessionResult<SessionRecord> {
        Ok(SessionRecord {
            user_id,
            state_tag: self.tag().to_string(),
            state_json: serde_json::to_value(self)?,
            updated_at,
        })
    }

    pub fn from_record(record: &SessionRecord) -> SessionResult<Self> {
        serde_json::from_value(record.state_json.clone()).map_err(|e| SessionError::Corrupt {
            user_id: record.user_id,
            reason: e.to_string(),
        })
    }
}
