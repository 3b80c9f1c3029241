use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kind of vote a user can leave on a post. Stored as SMALLINT (1 = like, 2 = dislike).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(into = "i16", try_from = "i16")]
#[repr(i16)]
pub enum MarkType {
    Like = 1,
    Dislike = 2,
}

impl MarkType {
    /// Wire value of the `rated` field: the mark type, or 0 when there is no mark.
    pub fn rated(mark: Option<MarkType>) -> i16 {
        mark.map(i16::from).unwrap_or(0)
    }

    pub fn from_rated(rated: i16) -> Result<Option<MarkType>, String> {
        match rated {
            0 => Ok(None),
            other => MarkType::try_from(other).map(Some),
        }
    }
}

impl From<MarkType> for i16 {
    fn from(mark: MarkType) -> Self {
        mark as i16
    }
}

impl TryFrom<i16> for MarkType {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MarkType::Like),
            2 => Ok(MarkType::Dislike),
            _ => Err(format!("Unknown mark type: {}", value)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PostMark {
    pub id: i64,
    pub created: DateTime<Utc>,
    #[serde(rename = "post")]
    pub post_id: i64,
    pub mark_type: MarkType,
    #[serde(rename = "user")]
    pub user_id: i64,
}

// Create mark request
#[derive(Debug, Deserialize)]
pub struct CreateMarkRequest {
    pub post: i64,
    pub mark_type: MarkType,
}

// Update mark request
#[derive(Debug, Deserialize)]
pub struct UpdateMarkRequest {
    pub mark_type: MarkType,
}

// Rate post request; `rated` carries a mark type, 0 leaves the post untouched
#[derive(Debug, Deserialize)]
pub struct RatePostRequest {
    pub rated: i16,
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub post: i64,
    pub rated: i16,
    pub liked_count: i64,
    pub disliked_count: i64,
}

/// What a mark submission does to the (post, user) pair, decided before anything
/// is written so the same rules hold for every caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarkPlan {
    /// Existing marks of the voter on the post that must go.
    pub stale: Vec<i64>,
    /// The removal is a deliberate un-vote and is recorded in the post history.
    pub withdrawn: bool,
    /// Mark to insert once the stale ones are gone.
    pub place: Option<MarkType>,
}

impl MarkPlan {
    /// Raw submission: drop every mark the voter holds on the post, then place the
    /// new one unless the voter owns the post.
    pub fn submit(
        existing: &[PostMark],
        requested: MarkType,
        voter_id: i64,
        owner_id: Option<i64>,
    ) -> Self {
        let stale = existing
            .iter()
            .filter(|mark| mark.user_id == voter_id)
            .map(|mark| mark.id)
            .collect();

        let place = if owner_id == Some(voter_id) {
            None
        } else {
            Some(requested)
        };

        Self {
            stale,
            withdrawn: false,
            place,
        }
    }

    /// Toggle submission used by the rate endpoint. Re-submitting the mark the voter
    /// already holds withdraws it, any other case behaves like `submit`.
    pub fn rate(
        existing: &[PostMark],
        requested: MarkType,
        voter_id: i64,
        owner_id: Option<i64>,
    ) -> Self {
        let held: Vec<&PostMark> = existing
            .iter()
            .filter(|mark| mark.user_id == voter_id)
            .collect();

        match held.as_slice() {
            [only] if only.mark_type == requested => Self {
                stale: vec![only.id],
                withdrawn: true,
                place: None,
            },
            _ => Self::submit(existing, requested, voter_id, owner_id),
        }
    }

    /// `rated` value the voter ends up with once the plan is applied.
    pub fn rated(&self) -> i16 {
        MarkType::rated(self.place)
    }
}

/// The viewer's own mark on a post. Anonymous viewers never have one.
pub fn rated_for(marks: &[PostMark], viewer_id: Option<i64>) -> Option<MarkType> {
    let viewer_id = viewer_id?;

    marks
        .iter()
        .filter(|mark| mark.user_id == viewer_id)
        .max_by_key(|mark| mark.id)
        .map(|mark| mark.mark_type)
}
