use chrono::{DateTime, TimeDelta, Utc};
use proptest::prelude::*;
use tally_core::{TimeWindow, Windows};

fn arb_ts() -> impl Strategy<Value = DateTime<Utc>> {
    (1_500_000_000i64..1_800_000_000i64).prop_map(|s| DateTime::from_timestamp(s, 0).unwrap())
}

proptest! {
    #[test]
    fn windows_tile_the_range(
        start in arb_ts(),
        len_secs in 1i64..(90 * 86_400),
        step_secs in 1i64..(10 * 86_400),
    ) {
        let end = start + TimeDelta::seconds(len_secs);
        let range = TimeWindow::new(start, end).unwrap();
        let windows: Vec<_> = Windows::new(range, TimeDelta::seconds(step_secs)).unwrap().collect();

        prop_assert!(!windows.is_empty());
        prop_assert_eq!(windows[0].start(), start);
        prop_assert_eq!(windows[windows.len() - 1].end(), end);
        for pair in windows.windows(2) {
            prop_assert_eq!(pair[0].end(), pair[1].start());
        }
        for w in &windows {
            prop_assert!(w.start() < w.end());
            prop_assert!(w.end() - w.start() <= TimeDelta::seconds(step_secs));
        }
        let expected = (len_secs + step_secs - 1) / step_secs;
        prop_assert_eq!(windows.len() as i64, expected);
    }
}
