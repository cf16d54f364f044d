//! Excel serial date <-> civil timestamp conversion (§4.3).

use chrono::{NaiveDate, NaiveDateTime};

fn epoch(date1904: bool) -> NaiveDateTime {
    if date1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)
            .expect("valid date")
            .and_hms_opt(0, 0, 0)
            .expect("valid time")
    } else {
        // 1900 mode's epoch is one day before the nominal 1900-01-01 start,
        // compensating for Lotus 1-2-3's phantom 1900-02-29.
        NaiveDate::from_ymd_opt(1899, 12, 30)
            .expect("valid date")
            .and_hms_opt(0, 0, 0)
            .expect("valid time")
    }
}

/// Map an Excel serial-day float to a civil timestamp under the 1900 or 1904
/// epoch. The whole part is a day count; the fractional part is a time of
/// day in nanoseconds. No timezone is applied.
pub fn excel_serial_to_timestamp(serial: f64, date1904: bool) -> NaiveDateTime {
    let whole_days = serial.trunc() as i64;
    let nanos_in_day = 86_400_000_000_000f64;
    let nanos = (nanos_in_day * (serial - serial.trunc())).round() as i64;

    epoch(date1904) + chrono::Duration::days(whole_days) + chrono::Duration::nanoseconds(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_1900_mode() {
        let ts = excel_serial_to_timestamp(1.0, false);
        assert_eq!(ts.format("%Y-%m-%dT%H:%M:%S").to_string(), "1899-12-31T00:00:00");
    }

    #[test]
    fn epoch_1904_mode() {
        let ts = excel_serial_to_timestamp(0.0, true);
        assert_eq!(ts.format("%Y-%m-%dT%H:%M:%S").to_string(), "1904-01-01T00:00:00");
    }

    #[test]
    fn fractional_part_is_time_of_day() {
        let ts = excel_serial_to_timestamp(1.5, false);
        assert_eq!(ts.format("%Y-%m-%dT%H:%M:%S").to_string(), "1899-12-31T12:00:00");
    }

    #[test]
    fn zero_serial_in_1900_mode_is_the_pseudo_epoch_day() {
        let ts = excel_serial_to_timestamp(0.0, false);
        assert_eq!(ts.format("%Y-%m-%d").to_string(), "1899-12-30");
    }
}
