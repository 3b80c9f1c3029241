use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::MarkType;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PostHistory {
    pub id: i64,
    #[serde(rename = "post")]
    pub post_id: i64,
    pub commented: Option<DateTime<Utc>>,
    pub up_voted: Option<DateTime<Utc>>,
    pub down_voted: Option<DateTime<Utc>>,
    pub un_voted: Option<DateTime<Utc>>,
    pub last_action: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEvent {
    Created,
    Commented,
    UpVoted,
    DownVoted,
    UnVoted,
}

impl HistoryEvent {
    pub fn placed(mark_type: MarkType) -> Self {
        match mark_type {
            MarkType::Like => HistoryEvent::UpVoted,
            MarkType::Dislike => HistoryEvent::DownVoted,
        }
    }
}

impl PostHistory {
    /// Stamps `at` on the field matching `event` and recomputes `last_action`.
    pub fn apply(&mut self, event: HistoryEvent, at: DateTime<Utc>, post_created: DateTime<Utc>) {
        match event {
            HistoryEvent::Created => {}
            // An edited or late-committing older comment never moves it back
            HistoryEvent::Commented => {
                self.commented = Some(self.commented.map_or(at, |latest| latest.max(at)))
            }
            HistoryEvent::UpVoted => self.up_voted = Some(at),
            HistoryEvent::DownVoted => self.down_voted = Some(at),
            HistoryEvent::UnVoted => self.un_voted = Some(at),
        }

        self.last_action = Some(Self::last_action_for(post_created, self.commented));
    }

    /// Votes never bump a post: only its creation and its latest comment count.
    pub fn last_action_for(
        post_created: DateTime<Utc>,
        commented: Option<DateTime<Utc>>,
    ) -> DateTime<Utc> {
        match commented {
            Some(commented) => post_created.max(commented),
            None => post_created,
        }
    }
}
