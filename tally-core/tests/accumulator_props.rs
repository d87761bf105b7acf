use proptest::prelude::*;
use tally_core::{Accumulator, DedupPolicy, MetricValue, NormalizedRow};

fn arb_row() -> impl Strategy<Value = NormalizedRow> {
    (
        prop::sample::select(vec!["/a", "/b", "/c"]),
        0i64..1_000,
        0u32..1_000u32,
    )
        .prop_map(|(path, views, rate)| {
            NormalizedRow::new(
                vec![path.to_string()],
                vec![MetricValue::Int(views), MetricValue::Float(f64::from(rate))],
            )
        })
}

fn merged(policy: DedupPolicy, rows: &[NormalizedRow]) -> Vec<NormalizedRow> {
    let mut acc = Accumulator::new(policy);
    acc.extend(rows.iter().cloned()).unwrap();
    acc.into_rows()
}

proptest! {
    #[test]
    fn sum_of_doubled_input_doubles(rows in proptest::collection::vec(arb_row(), 0..50)) {
        let once = merged(DedupPolicy::SumByKey, &rows);
        let doubled: Vec<_> = rows.iter().chain(rows.iter()).cloned().collect();
        let twice = merged(DedupPolicy::SumByKey, &doubled);
        prop_assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(&twice) {
            prop_assert_eq!(&a.dimensions, &b.dimensions);
            prop_assert_eq!(a.metrics[0].as_int().unwrap() * 2, b.metrics[0].as_int().unwrap());
            prop_assert_eq!(a.metrics[1].as_float().unwrap() * 2.0, b.metrics[1].as_float().unwrap());
        }
    }

    #[test]
    fn set_by_identity_is_idempotent(rows in proptest::collection::vec(arb_row(), 0..50)) {
        let once = merged(DedupPolicy::SetByIdentity, &rows);
        let doubled: Vec<_> = rows.iter().chain(rows.iter()).cloned().collect();
        prop_assert_eq!(&once, &merged(DedupPolicy::SetByIdentity, &doubled));
        prop_assert_eq!(&once, &merged(DedupPolicy::SetByIdentity, &once));
    }

    #[test]
    fn output_is_sorted_and_unique(rows in proptest::collection::vec(arb_row(), 0..50)) {
        for policy in [DedupPolicy::SumByKey, DedupPolicy::SetByIdentity] {
            let out = merged(policy, &rows);
            let keys: Vec<_> = out.iter().map(|r| r.dimensions.clone()).collect();
            let mut sorted = keys.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(keys, sorted);
        }
    }
}

#[test]
fn empty_input_is_a_noop() {
    assert!(merged(DedupPolicy::SumByKey, &[]).is_empty());
    assert!(merged(DedupPolicy::SetByIdentity, &[]).is_empty());
}

#[test]
fn text_metrics_keep_first_value() {
    let rows = vec![
        NormalizedRow::new(vec!["k".into()], vec![MetricValue::Text("first".into())]),
        NormalizedRow::new(vec!["k".into()], vec![MetricValue::Text("second".into())]),
    ];
    let out = merged(DedupPolicy::SumByKey, &rows);
    assert_eq!(out[0].metrics[0].as_text(), Some("first"));
}

#[test]
fn mismatched_widths_are_rejected() {
    let mut acc = Accumulator::new(DedupPolicy::SumByKey);
    acc.push(NormalizedRow::new(vec!["k".into()], vec![MetricValue::Int(1)]))
        .unwrap();
    let err = acc
        .push(NormalizedRow::new(
            vec!["k".into()],
            vec![MetricValue::Int(1), MetricValue::Int(2)],
        ))
        .unwrap_err();
    assert!(matches!(err, tally_core::TallyError::Data(_)));
}
