//! Single-line decoder for exported chat logs.
//!
//! A line has the shape `A/B/YY, HH:MM[ am|pm] - sender: content`, where `A` and `B` are the day
//! and month in the order selected by [`DateOrder`].  Decoding never fails loudly: a line either
//! yields a [`DecodedLine`] or an explicit [`Rejection`].

use chrono::{Duration, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::config::{ClockZone, DateOrder, DecoderConfig};

/// Fields extracted from one accepted log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLine {
    /// Hours since the Unix epoch.
    pub time: i64,
    /// Lowercase sender display name.
    pub sender: String,
    /// Lowercase message body.
    pub content: String,
}

/// Reason a line did not produce a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The line contains an exporter placeholder such as `<media omitted>`.
    Placeholder,
    /// The line does not follow the field grammar or a field is not numeric.
    Malformed,
    /// The fields are numeric but do not name a valid instant.
    InvalidTimestamp,
}

/// Outcome of decoding a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// The line parsed into a message.
    Message(DecodedLine),
    /// The line was dropped.
    Rejected(Rejection),
}

impl Decoded {
    /// Converts the outcome into an `Option`, discarding the rejection reason.
    #[must_use]
    pub fn accepted(self) -> Option<DecodedLine> {
        match self {
            Decoded::Message(line) => Some(line),
            Decoded::Rejected(_) => None,
        }
    }
}

/// Stateless decoder shared read-only by all parser workers.
#[derive(Debug, Clone)]
pub struct LineDecoder {
    date_order: DateOrder,
    clock_zone: ClockZone,
    omitted_phrases: Vec<String>,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(&DecoderConfig::default())
    }
}

impl LineDecoder {
    /// Creates a decoder for the supplied configuration.
    #[must_use]
    pub fn new(cfg: &DecoderConfig) -> Self {
        Self {
            date_order: cfg.date_order,
            clock_zone: cfg.clock_zone,
            omitted_phrases: cfg
                .omitted_phrases
                .iter()
                .map(|phrase| phrase.to_lowercase())
                .collect(),
        }
    }

    /// Decodes one raw line, with or without its trailing line terminator.
    #[must_use]
    pub fn decode(&self, raw: &str) -> Decoded {
        let line = raw.to_lowercase();
        if self
            .omitted_phrases
            .iter()
            .any(|phrase| line.contains(phrase.as_str()))
        {
            return Decoded::Rejected(Rejection::Placeholder);
        }
        match self.decode_fields(strip_terminator(&line)) {
            Ok(decoded) => Decoded::Message(decoded),
            Err(rejection) => Decoded::Rejected(rejection),
        }
    }

    fn decode_fields(&self, line: &str) -> Result<DecodedLine, Rejection> {
        let mut date = line.splitn(3, '/');
        let first = date.next().ok_or(Rejection::Malformed)?;
        let second = date.next().ok_or(Rejection::Malformed)?;
        let rest = date.next().ok_or(Rejection::Malformed)?;
        let (year, rest) = rest.split_once(", ").ok_or(Rejection::Malformed)?;
        let (hour, rest) = rest.split_once(':').ok_or(Rejection::Malformed)?;
        let (minute, rest) = rest.split_once(" - ").ok_or(Rejection::Malformed)?;
        let (sender, content) = rest.split_once(": ").ok_or(Rejection::Malformed)?;

        let (day, month) = match self.date_order {
            DateOrder::DayMonthYear => (first, second),
            DateOrder::MonthDayYear => (second, first),
        };
        let day: u32 = parse_field(day)?;
        let month: u32 = parse_field(month)?;
        let mut year: i32 = parse_field(year)?;
        let mut hour: u32 = parse_field(hour)?;

        let minute = minute.trim_end();
        let minute = if let Some(marked) = minute.strip_suffix('m') {
            if marked.ends_with('p') {
                hour = hour.checked_add(12).ok_or(Rejection::InvalidTimestamp)?;
            }
            minute.get(..2).ok_or(Rejection::Malformed)?
        } else {
            minute
        };
        let minute: u32 = parse_field(minute)?;

        if year < 2000 {
            year += 2000;
        }

        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .ok_or(Rejection::InvalidTimestamp)?;
        let seconds = match self.clock_zone {
            ClockZone::Utc => Utc.from_utc_datetime(&naive).timestamp(),
            ClockZone::Local => resolve_wall_clock(&naive, |dt| Local.from_local_datetime(dt))
                .ok_or(Rejection::InvalidTimestamp)?
                .timestamp(),
        };

        Ok(DecodedLine {
            time: seconds.div_euclid(3600),
            sender: sender.to_string(),
            content: content.to_string(),
        })
    }
}

/// Maps a wall-clock time to an instant, taking the earlier instant when the time is ambiguous.
///
/// Times skipped by a daylight-saving jump are read with the offset in force before the jump,
/// which is the same instant as one hour later on the new offset.
fn resolve_wall_clock<T, F>(naive: &NaiveDateTime, resolve: F) -> Option<T>
where
    F: Fn(&NaiveDateTime) -> LocalResult<T>,
{
    resolve(naive).earliest().or_else(|| {
        let shifted = naive.checked_add_signed(Duration::hours(1))?;
        resolve(&shifted).earliest()
    })
}

fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

fn parse_field<T: std::str::FromStr>(field: &str) -> Result<T, Rejection> {
    field.trim().parse().map_err(|_| Rejection::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc_decoder(order: DateOrder) -> LineDecoder {
        LineDecoder::new(&DecoderConfig {
            date_order: order,
            clock_zone: ClockZone::Utc,
            ..DecoderConfig::default()
        })
    }

    fn utc_hours(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> i64 {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
            .unwrap()
            .timestamp()
            .div_euclid(3600)
    }

    #[test]
    fn rejects_free_text() {
        let decoder = LineDecoder::default();
        assert_eq!(
            decoder.decode("not a valid log line"),
            Decoded::Rejected(Rejection::Malformed)
        );
    }

    #[test]
    fn decodes_twelve_hour_line_in_local_time() {
        let decoder = LineDecoder::default();
        let decoded = decoder
            .decode("1/2/23, 10:30 am - alice: hello")
            .accepted()
            .expect("line should decode");
        let expected = Local
            .with_ymd_and_hms(2023, 2, 1, 10, 30, 0)
            .earliest()
            .unwrap()
            .timestamp()
            .div_euclid(3600);
        assert_eq!(decoded.time, expected);
        assert_eq!(decoded.sender, "alice");
        assert_eq!(decoded.content, "hello");
    }

    #[test]
    fn strips_line_terminator_and_lowercases() {
        let decoder = utc_decoder(DateOrder::DayMonthYear);
        let decoded = decoder
            .decode("15/03/2021, 09:05 - Bob: See You Soon\r\n")
            .accepted()
            .unwrap();
        assert_eq!(decoded.sender, "bob");
        assert_eq!(decoded.content, "see you soon");
        assert_eq!(decoded.time, utc_hours(2021, 3, 15, 9, 5));
    }

    #[test]
    fn pm_marker_shifts_hour() {
        let decoder = utc_decoder(DateOrder::DayMonthYear);
        let decoded = decoder
            .decode("1/2/23, 3:45 pm - carol: late lunch\n")
            .accepted()
            .unwrap();
        assert_eq!(decoded.time, utc_hours(2023, 2, 1, 15, 45));
    }

    #[test]
    fn noon_pm_overflows_and_is_rejected() {
        let decoder = utc_decoder(DateOrder::DayMonthYear);
        assert_eq!(
            decoder.decode("1/2/23, 12:10 pm - carol: noon"),
            Decoded::Rejected(Rejection::InvalidTimestamp)
        );
    }

    #[test]
    fn oversized_pm_hour_is_rejected() {
        let decoder = utc_decoder(DateOrder::DayMonthYear);
        assert_eq!(
            decoder.decode("1/2/23, 4294967295:30 pm - a: b"),
            Decoded::Rejected(Rejection::InvalidTimestamp)
        );
        assert_eq!(
            decoder.decode("1/2/23, 4294967284:30 pm - a: b"),
            Decoded::Rejected(Rejection::InvalidTimestamp)
        );
    }

    #[test]
    fn skipped_wall_clock_times_resolve_past_the_gap() {
        // Clocks jump from 02:00 to 03:00; the offset is +1h before and +2h after.
        let lookup = |dt: &NaiveDateTime| {
            let before = NaiveDate::from_ymd_opt(2023, 3, 26)
                .unwrap()
                .and_hms_opt(2, 0, 0)
                .unwrap();
            let after = before + Duration::hours(1);
            if *dt >= before && *dt < after {
                LocalResult::None
            } else {
                let offset = if *dt < before { 1 } else { 2 };
                LocalResult::Single(Utc.from_utc_datetime(&(*dt - Duration::hours(offset))))
            }
        };
        let naive = |hour, minute| {
            NaiveDate::from_ymd_opt(2023, 3, 26)
                .unwrap()
                .and_hms_opt(hour, minute, 0)
                .unwrap()
        };

        let gap = resolve_wall_clock(&naive(2, 30), lookup).expect("gap time resolves");
        assert_eq!(gap, Utc.with_ymd_and_hms(2023, 3, 26, 1, 30, 0).unwrap());
        let regular = resolve_wall_clock(&naive(4, 0), lookup).unwrap();
        assert_eq!(regular, Utc.with_ymd_and_hms(2023, 3, 26, 2, 0, 0).unwrap());
    }

    #[test]
    fn month_first_order_swaps_fields() {
        let decoder = utc_decoder(DateOrder::MonthDayYear);
        let decoded = decoder
            .decode("12/31/22, 23:59 - dave: happy new year")
            .accepted()
            .unwrap();
        assert_eq!(decoded.time, utc_hours(2022, 12, 31, 23, 59));

        let day_first = utc_decoder(DateOrder::DayMonthYear);
        assert_eq!(
            day_first.decode("12/31/22, 23:59 - dave: happy new year"),
            Decoded::Rejected(Rejection::InvalidTimestamp)
        );
    }

    #[test]
    fn content_may_contain_separators() {
        let decoder = utc_decoder(DateOrder::DayMonthYear);
        let decoded = decoder
            .decode("1/2/2023, 10:30 - eve: see https://a/b: it's 10:30 - ok")
            .accepted()
            .unwrap();
        assert_eq!(decoded.sender, "eve");
        assert_eq!(decoded.content, "see https://a/b: it's 10:30 - ok");
    }

    #[test]
    fn placeholder_phrases_are_rejected() {
        let decoder = LineDecoder::default();
        for line in [
            "1/2/23, 10:30 - alice: <Media omitted>",
            "1/2/23, 10:30 - alice: This message was deleted",
            "1/2/23, 10:30 - alice: Missed voice call",
        ] {
            assert_eq!(
                decoder.decode(line),
                Decoded::Rejected(Rejection::Placeholder),
                "{line}"
            );
        }
    }

    #[test]
    fn invalid_calendar_dates_are_rejected() {
        let decoder = utc_decoder(DateOrder::DayMonthYear);
        assert_eq!(
            decoder.decode("31/02/23, 10:30 - alice: hi"),
            Decoded::Rejected(Rejection::InvalidTimestamp)
        );
        assert_eq!(
            decoder.decode("xx/02/23, 10:30 - alice: hi"),
            Decoded::Rejected(Rejection::Malformed)
        );
        assert_eq!(
            decoder.decode("1/2/23, 10:m - alice: hi"),
            Decoded::Rejected(Rejection::Malformed)
        );
    }
}
