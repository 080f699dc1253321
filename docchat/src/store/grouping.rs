//! Bucketing sessions by recency for the session list.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::models::Session;

/// Sections of the session list, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Pinned,
    Today,
    Yesterday,
    PreviousWeek,
    PreviousMonth,
    Older,
}

impl Bucket {
    pub const ALL: [Self; 6] = [
        Self::Pinned,
        Self::Today,
        Self::Yesterday,
        Self::PreviousWeek,
        Self::PreviousMonth,
        Self::Older,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pinned => "Pinned",
            Self::Today => "Today",
            Self::Yesterday => "Yesterday",
            Self::PreviousWeek => "Previous 7 Days",
            Self::PreviousMonth => "Last 30 Days",
            Self::Older => "Older",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One section of the grouped list.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionGroup {
    pub bucket: Bucket,
    pub sessions: Vec<Session>,
}

/// Midnight at the start of `date` in `tz`, as UTC.
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .map_or_else(|| Utc.from_utc_datetime(&midnight), |dt| dt.with_timezone(&Utc))
}

/// Group `sessions` for display as of `now`.
///
/// Day boundaries are midnights in `now`'s time zone. Pinned sessions all go
/// to `Pinned`; the rest by `updated_at`. Each group is sorted newest first.
/// Empty groups are left out, except `Pinned`, which is always first.
pub fn group_sessions<Tz: TimeZone>(sessions: &[Session], now: &DateTime<Tz>) -> Vec<SessionGroup> {
    let tz = now.timezone();
    let today = now.date_naive();
    let start_of_today = local_midnight(&tz, today);
    let start_of_yesterday = local_midnight(&tz, today - Duration::days(1));
    let week_ago = local_midnight(&tz, today - Duration::days(7));
    let month_ago = local_midnight(&tz, today - Duration::days(30));

    let mut groups: Vec<SessionGroup> = Bucket::ALL
        .iter()
        .map(|&bucket| SessionGroup {
            bucket,
            sessions: Vec::new(),
        })
        .collect();

    for session in sessions {
        let updated = session.updated_at;
        let bucket = if session.is_pinned {
            Bucket::Pinned
        } else if updated >= start_of_today {
            Bucket::Today
        } else if updated >= start_of_yesterday {
            Bucket::Yesterday
        } else if updated >= week_ago {
            Bucket::PreviousWeek
        } else if updated >= month_ago {
            Bucket::PreviousMonth
        } else {
            Bucket::Older
        };
        if let Some(group) = groups.iter_mut().find(|g| g.bucket == bucket) {
            group.sessions.push(session.clone());
        }
    }

    for group in &mut groups {
        group
            .sessions
            .sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }

    groups.retain(|g| g.bucket == Bucket::Pinned || !g.sessions.is_empty());
    groups
}
