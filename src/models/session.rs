// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Playing session model for storage and API.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One scheduled playing slot.
///
/// Sessions are created by an organizer and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (also used as document ID)
    pub id: Uuid,
    /// Calendar date of the session
    pub date: NaiveDate,
    /// Local start time
    pub start_time: NaiveTime,
    /// Local end time
    pub end_time: NaiveTime,
    /// Capacity; always at least 1
    pub max_players: u32,
    /// Free-text venue description
    pub venue: String,
    /// Organizer who created the session
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Remaining capacity given the current confirmed booking count.
    ///
    /// Strict booking keeps this non-negative, but rows written before
    /// enforcement existed may overbook, so the result is signed.
    pub fn spots_left(&self, confirmed_count: u32) -> i64 {
        self.max_players as i64 - confirmed_count as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session(max_players: u32) -> Session {
        Session {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 8, 14).unwrap(),
            start_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            max_players,
            venue: "Sports Complex, Court 1-3".to_string(),
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_spots_left() {
        let session = make_session(12);
        assert_eq!(session.spots_left(0), 12);
        assert_eq!(session.spots_left(9), 3);
        assert_eq!(session.spots_left(12), 0);
        // Overbooked legacy data still reports honestly
        assert_eq!(session.spots_left(14), -2);
    }
}
