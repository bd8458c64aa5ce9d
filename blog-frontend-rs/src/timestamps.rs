use std::fmt::Display;

use chrono::TimeZone;
use docsync::ServerTimestamp;

/// `3/14/2025, 9:05:07 PM`, used where no browser locale is available.
pub const DISPLAY_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Formats a creation time for the user. Pending timestamps show the estimate taken when the post was
/// submitted, in the same format, so the switch to the stored value is not noticeable.
///
/// In the browser this is the locale's own date/time format. Natively it is [`DISPLAY_FORMAT`] in
/// the local time zone.
pub fn format_timestamp(timestamp: &ServerTimestamp) -> String {
    #[cfg(target_arch = "wasm32")]
    {
        let millis = timestamp.best_known().timestamp_millis() as f64;
        let date = js_sys::Date::new(&wasm_bindgen::JsValue::from_f64(millis));
        date.to_locale_string("default", &wasm_bindgen::JsValue::UNDEFINED)
            .into()
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        format_in(timestamp, &chrono::Local)
    }
}

/// [`DISPLAY_FORMAT`] in the given time zone.
pub fn format_in<Tz>(timestamp: &ServerTimestamp, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    timestamp
        .best_known()
        .with_timezone(tz)
        .format(DISPLAY_FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_format() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 21, 5, 7).unwrap();
        assert_eq!(
            format_in(&ServerTimestamp::Resolved(at), &Utc),
            "3/14/2025, 9:05:07 PM"
        );

        let east = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(
            format_in(&ServerTimestamp::Resolved(at), &east),
            "3/14/2025, 11:05:07 PM"
        );
    }

    #[test]
    fn test_pending_uses_estimate() {
        let at = Utc.with_ymd_and_hms(2024, 12, 1, 0, 30, 0).unwrap();
        let pending = ServerTimestamp::Pending { estimate: at };
        assert_eq!(format_in(&pending, &Utc), "12/1/2024, 12:30:00 AM");
        assert_eq!(
            format_timestamp(&pending),
            format_timestamp(&ServerTimestamp::Resolved(at))
        );
    }
}
