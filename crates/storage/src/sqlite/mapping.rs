use chrono::NaiveDate;
use sqlx::Row;
use tracker_core::model::{CourseCompletionData, CourseId, Settings, SettingsDraft};
use tracker_core::time::{DATE_KEY_FORMAT, parse_date_key};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn revision_to_i64(revision: u64) -> Result<i64, StorageError> {
    i64::try_from(revision).map_err(|_| StorageError::Serialization("revision overflow".into()))
}

pub(crate) fn revision_from_i64(v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid revision: {v}")))
}

pub(crate) fn seconds_to_i64(seconds: u64) -> Result<i64, StorageError> {
    i64::try_from(seconds).map_err(|_| StorageError::Serialization("seconds overflow".into()))
}

pub(crate) fn seconds_from_i64(v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid seconds: {v}")))
}

pub(crate) fn date_to_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

pub(crate) fn date_from_key(key: &str) -> Result<NaiveDate, StorageError> {
    parse_date_key(key).map_err(|e| StorageError::Serialization(format!("invalid date {key}: {e}")))
}

pub(crate) fn course_id_from_key(key: &str) -> Result<CourseId, StorageError> {
    key.parse()
        .map_err(|e| StorageError::Serialization(format!("invalid course id {key}: {e}")))
}

pub(crate) fn encode_completion(data: &CourseCompletionData) -> Result<String, StorageError> {
    serde_json::to_string(data).map_err(ser)
}

pub(crate) fn decode_completion(payload: &str) -> Result<CourseCompletionData, StorageError> {
    serde_json::from_str(payload).map_err(ser)
}

pub(crate) fn map_settings_row(row: &sqlx::sqlite::SqliteRow) -> Result<Settings, StorageError> {
    let show_course_clock: bool = row.try_get("show_course_clock").map_err(ser)?;
    let maximum_course_time: i64 = row.try_get("maximum_course_time").map_err(ser)?;
    let maximum_daily_time: i64 = row.try_get("maximum_daily_time").map_err(ser)?;
    let maximum_daily_chapters: f64 = row.try_get("maximum_daily_chapters").map_err(ser)?;
    let weeks_displayed: i64 = row.try_get("weeks_displayed").map_err(ser)?;
    let tick_interval_secs: i64 = row.try_get("tick_interval_secs").map_err(ser)?;

    #[allow(clippy::cast_possible_truncation)]
    let maximum_daily_chapters = maximum_daily_chapters as f32;

    Settings::from_persisted(SettingsDraft {
        show_course_clock: Some(show_course_clock),
        maximum_course_time: u16::try_from(maximum_course_time).ok(),
        maximum_daily_time: u16::try_from(maximum_daily_time).ok(),
        maximum_daily_chapters: Some(maximum_daily_chapters),
        weeks_displayed: u8::try_from(weeks_displayed).ok(),
        tick_interval_secs: u16::try_from(tick_interval_secs).ok(),
    })
    .map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_keys_round_trip_through_text() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(date_to_key(date), "2024-02-29");
        assert_eq!(date_from_key("2024-02-29").unwrap(), date);
        assert!(matches!(
            date_from_key("29/02/2024"),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn negative_columns_are_rejected() {
        assert!(revision_from_i64(-1).is_err());
        assert!(seconds_from_i64(-5).is_err());
        assert_eq!(seconds_from_i64(90).unwrap(), 90);
    }
}
