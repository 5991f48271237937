use chrono::{NaiveTime, Timelike};

use crate::error::ApiError;

/// Candidate slots are generated on a fixed grid inside operating hours.
pub const SLOT_INCREMENT_MIN: i64 = 30;

#[derive(Clone, Copy, Debug)]
pub struct OperatingHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl OperatingHours {
    /// Parses the `open_time`/`close_time` columns of an establishment.
    /// `None` columns mean the owner never configured hours, which callers
    /// must treat as a configuration error, not an empty schedule.
    pub fn from_columns(
        open: Option<&str>,
        close: Option<&str>,
    ) -> Result<OperatingHours, ApiError> {
        let (open, close) = match (open, close) {
            (Some(open), Some(close)) => (open, close),
            _ => {
                return Err(ApiError::Configuration(
                    "establishment operating hours are not set".to_string(),
                ))
            }
        };
        let open = NaiveTime::parse_from_str(open, "%H:%M")
            .map_err(|_| ApiError::Configuration(format!("invalid open_time '{open}'")))?;
        let close = NaiveTime::parse_from_str(close, "%H:%M")
            .map_err(|_| ApiError::Configuration(format!("invalid close_time '{close}'")))?;
        if close <= open {
            return Err(ApiError::Configuration(
                "close_time must be after open_time".to_string(),
            ));
        }
        Ok(OperatingHours { open, close })
    }
}

/// An already-booked interval on the day under consideration.
#[derive(Clone, Copy, Debug)]
pub struct BookedSlot {
    pub start: NaiveTime,
    pub duration_min: i64,
}

fn minutes_of(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight()) / 60
}

/// Half-open interval intersection: [s1, s1+d1) and [s2, s2+d2) conflict
/// iff they overlap. Back-to-back slots do not conflict.
fn overlaps(s1: i64, d1: i64, s2: i64, d2: i64) -> bool {
    s1 < s2 + d2 && s2 < s1 + d1
}

/// Returns the ordered start times within operating hours at which a service
/// of `duration_min` minutes fits without touching any booked interval.
pub fn free_slots(
    hours: OperatingHours,
    booked: &[BookedSlot],
    duration_min: i64,
) -> Result<Vec<NaiveTime>, ApiError> {
    if duration_min <= 0 {
        return Err(ApiError::invalid("service duration must be positive"));
    }

    let open = minutes_of(hours.open);
    let close = minutes_of(hours.close);
    let taken: Vec<(i64, i64)> = booked
        .iter()
        .map(|slot| (minutes_of(slot.start), slot.duration_min))
        .collect();

    let mut slots = Vec::new();
    let mut start = open;
    while start + duration_min <= close {
        let conflict = taken
            .iter()
            .any(|&(s, d)| overlaps(start, duration_min, s, d));
        if !conflict {
            if let Some(time) =
                NaiveTime::from_num_seconds_from_midnight_opt((start * 60) as u32, 0)
            {
                slots.push(time);
            }
        }
        start += SLOT_INCREMENT_MIN;
    }
    Ok(slots)
}
