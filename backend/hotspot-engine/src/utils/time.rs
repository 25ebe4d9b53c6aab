use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Combines the form's `YYYY-MM-DD` date and optional `HH:MM` time into a
/// UTC timestamp. A blank time means midnight. `Ok(None)` for a blank date.
pub fn combine_due_date(date: &str, time: &str) -> Result<Option<DateTime<Utc>>, String> {
    let date = date.trim();
    if date.is_empty() {
        return Ok(None);
    }

    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| format!("Due date '{}' is not a valid YYYY-MM-DD date.", date))?;

    let time = time.trim();
    let at = if time.is_empty() {
        NaiveTime::MIN
    } else {
        NaiveTime::parse_from_str(time, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
            .map_err(|_| format!("Due time '{}' is not a valid HH:MM time.", time))?
    };

    Ok(Some(day.and_time(at).and_utc()))
}
