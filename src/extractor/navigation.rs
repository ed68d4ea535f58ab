use crate::echodata::NavigationFix;
use crate::extractor::numeric::{nan_median, round_to};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeSet;

/// NMEA sentences that carry a position fix.
pub const RECOGNIZED_SENTENCES: [&str; 3] = ["GGA", "GLL", "RMC"];

const MAX_WINDOW: usize = 10;
const POSITION_DECIMALS: i32 = 5;

/// Number of fixes averaged at each end of the track.
pub fn position_window(fix_count: usize) -> usize {
    (fix_count / 2).saturating_sub(1).clamp(1, MAX_WINDOW)
}

/// Start and end of the vessel track during one acquisition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationSummary {
    pub sentence_type: String,
    pub fix_count: usize,
    pub window: usize,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub start_latitude: f64,
    pub end_latitude: f64,
    pub start_longitude: f64,
    pub end_longitude: f64,
}

/// Reduce the navigation log to track bounds, using only fixes of the first
/// recognized sentence type (in sorted order) present in the log.
///
/// Returns `None` when the log has no recognized fixes, or when the first or
/// last of them carries no timestamp.
pub fn summarize(fixes: &[NavigationFix]) -> Option<NavigationSummary> {
    let present: BTreeSet<&str> = fixes.iter().map(|f| f.sentence_type.as_str()).collect();
    let sentence_type = present
        .into_iter()
        .find(|st| RECOGNIZED_SENTENCES.contains(st))?;

    let selected: Vec<&NavigationFix> = fixes
        .iter()
        .filter(|f| f.sentence_type == sentence_type)
        .collect();
    let start_time = selected.first()?.time?;
    let end_time = selected.last()?.time?;

    let fix_count = selected.len();
    let window = position_window(fix_count).min(fix_count);

    let latitudes: Vec<f64> = selected.iter().map(|f| f.latitude).collect();
    let longitudes: Vec<f64> = selected.iter().map(|f| f.longitude).collect();
    let head = |values: &[f64]| round_to(nan_median(&values[..window]), POSITION_DECIMALS);
    let tail = |values: &[f64]| {
        round_to(
            nan_median(&values[values.len() - window..]),
            POSITION_DECIMALS,
        )
    };

    Some(NavigationSummary {
        sentence_type: sentence_type.to_string(),
        fix_count,
        window,
        start_time,
        end_time,
        start_latitude: head(&latitudes),
        end_latitude: tail(&latitudes),
        start_longitude: head(&longitudes),
        end_longitude: tail(&longitudes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fix(sentence_type: &str, second: u32, latitude: f64, longitude: f64) -> NavigationFix {
        NavigationFix {
            sentence_type: sentence_type.to_string(),
            time: NaiveDate::from_ymd_opt(2018, 7, 18)
                .and_then(|d| d.and_hms_opt(2, 3, second)),
            latitude,
            longitude,
        }
    }

    #[test]
    fn test_position_window() {
        assert_eq!(position_window(0), 1);
        assert_eq!(position_window(1), 1);
        assert_eq!(position_window(4), 1);
        assert_eq!(position_window(20), 9);
        assert_eq!(position_window(30), 10);
        assert_eq!(position_window(1000), 10);
    }

    #[test]
    fn test_first_recognized_type_wins() {
        let fixes = vec![
            fix("RMC", 0, 10.0, 20.0),
            fix("VTG", 1, 99.0, 99.0),
            fix("GLL", 2, 11.0, 21.0),
            fix("RMC", 3, 12.0, 22.0),
            fix("GLL", 4, 13.0, 23.0),
        ];
        let summary = summarize(&fixes).unwrap();
        assert_eq!(summary.sentence_type, "GLL");
        assert_eq!(summary.fix_count, 2);
        assert_eq!(summary.start_latitude, 11.0);
        assert_eq!(summary.end_longitude, 23.0);
        assert_eq!(Some(summary.start_time), fixes[2].time);
        assert_eq!(Some(summary.end_time), fixes[4].time);
    }

    #[test]
    fn test_no_recognized_fixes() {
        let fixes = vec![fix("VTG", 0, 1.0, 1.0), fix("ZDA", 1, 1.0, 1.0)];
        assert!(summarize(&fixes).is_none());
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_untimed_track_ends_are_rejected() {
        let mut fixes = vec![
            fix("GGA", 0, 10.0, 20.0),
            fix("GGA", 1, 11.0, 21.0),
            fix("GGA", 2, 12.0, 22.0),
        ];
        fixes[2].time = None;
        assert!(summarize(&fixes).is_none());

        for f in fixes.iter_mut() {
            f.time = None;
        }
        assert!(summarize(&fixes).is_none());
    }

    #[test]
    fn test_untimed_inner_fix_is_kept() {
        let mut fixes = vec![
            fix("RMC", 0, 10.0, 20.0),
            fix("RMC", 1, 11.0, 21.0),
            fix("RMC", 2, 12.0, 22.0),
        ];
        fixes[1].time = None;
        let summary = summarize(&fixes).unwrap();
        assert_eq!(summary.fix_count, 3);
        assert_eq!(Some(summary.end_time), fixes[2].time);
    }

    #[test]
    fn test_medians_over_window() {
        // 20 fixes -> window of 9 at each end
        let fixes: Vec<NavigationFix> = (0..20)
            .map(|i| fix("RMC", i, -54.0 - i as f64 * 0.001, -36.0 + i as f64 * 0.002))
            .collect();
        let summary = summarize(&fixes).unwrap();
        assert_eq!(summary.window, 9);
        // median of the first 9 is fix 4, of the last 9 is fix 15
        assert_eq!(summary.start_latitude, -54.004);
        assert_eq!(summary.end_latitude, -54.015);
        assert_eq!(summary.start_longitude, -35.992);
        assert_eq!(summary.end_longitude, -35.97);
    }

    #[test]
    fn test_undefined_positions_are_ignored() {
        let fixes = vec![
            fix("GGA", 0, f64::NAN, f64::NAN),
            fix("GGA", 1, 50.123_456_7, 8.765_432_1),
        ];
        let summary = summarize(&fixes).unwrap();
        // two fixes -> window of one
        assert_eq!(summary.window, 1);
        assert!(summary.start_latitude.is_nan());
        assert_eq!(summary.end_latitude, 50.12346);
        assert_eq!(summary.end_longitude, 8.76543);
    }
}
