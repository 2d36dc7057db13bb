use chrono::{DateTime, NaiveDateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;

/// Wire format for every date exchanged with clients, e.g. `02.12.2007 15:46`.
pub const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

pub fn chrono_to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

/// Parses a `DD.MM.YYYY HH:MM` string, interpreted as UTC.
pub fn parse_quiz_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_quiz_date(value: &DateTime<Utc>) -> String {
    value.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_day_month_year_hour_minute() {
        let parsed = parse_quiz_date("12.02.2007 10:10").unwrap();
        assert_eq!(parsed.day(), 12);
        assert_eq!(parsed.month(), 2);
        assert_eq!(parsed.year(), 2007);
        assert_eq!(parsed.hour(), 10);
        assert_eq!(parsed.minute(), 10);
    }

    #[test]
    fn rejects_other_layouts() {
        assert!(parse_quiz_date("2007-02-12 10:10").is_none());
        assert!(parse_quiz_date("12.02.2007").is_none());
        assert!(parse_quiz_date("31.02.2007 10:10").is_none());
        assert!(parse_quiz_date("").is_none());
    }

    #[test]
    fn formatting_is_the_inverse_of_parsing() {
        let parsed = parse_quiz_date("02.12.2007 15:46").unwrap();
        assert_eq!(format_quiz_date(&parsed), "02.12.2007 15:46");
    }
}
