//! Ordering of one recipient's report rows.
//!
//! Rows are first sorted by open duration, longest first (stable, so ties keep
//! their routing order). They are then emitted grouped by SIG, SIGs in
//! ascending name order, scanning the duration-sorted rows once per SIG.
//! While scanning, a row whose duration exceeds the row written just before it
//! for the same SIG is placed in front of that row instead of after it.
//!
//! The insertion only ever looks one row back. It is not a two-key sort and
//! must not be replaced by one: reports are compared line by line across runs.

use crate::ReportRow;

/// Orders `rows` for display.
///
/// Because each SIG's rows are scanned in descending duration order, the
/// one-row-back insertion never fires on today's inputs; it is retained so the
/// output stays line-for-line identical to existing reports if the pre-sort
/// ever changes.
pub fn order_rows(rows: Vec<ReportRow>) -> Vec<ReportRow> {
    let mut remaining = rows;
    remaining.sort_by(|a, b| b.duration_days.cmp(&a.duration_days));

    let mut sigs: Vec<_> = remaining.iter().map(|r| r.sig.clone()).collect();
    sigs.sort();
    sigs.dedup();

    let mut ordered: Vec<ReportRow> = Vec::with_capacity(remaining.len());
    for sig in &sigs {
        let (group, rest): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|r| &r.sig == sig);
        remaining = rest;
        for row in group {
            match ordered.last() {
                Some(last) if last.sig == row.sig && row.duration_days > last.duration_days => {
                    let at = ordered.len() - 1;
                    ordered.insert(at, row);
                }
                _ => ordered.push(row),
            }
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use crate::{BranchName, DurationDays, PullNumber, RepositoryId, SigName};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn row(sig: &str, number: u64, days: u64) -> ReportRow {
        ReportRow {
            sig: SigName::new(sig).unwrap(),
            repo: RepositoryId::new(format!("openeuler/{}", sig.to_lowercase())).unwrap(),
            branch: BranchName::new("master").unwrap(),
            number: PullNumber::new(number),
            title: format!("change {number}"),
            url: format!("https://gitee.com/openeuler/x/pulls/{number}"),
            status: Status::ready(),
            duration_days: DurationDays::new(days),
        }
    }

    fn keys(rows: &[ReportRow]) -> Vec<(String, u64, u64)> {
        rows.iter()
            .map(|r| (r.sig.to_string(), r.number.as_u64(), r.duration_days.as_u64()))
            .collect()
    }

    #[test]
    fn groups_by_sig_then_longest_first() {
        // Three SIGs, five rows, one duration tie inside "Kernel".
        let rows = vec![
            row("Kernel", 1, 3),
            row("Compiler", 2, 12),
            row("Kernel", 3, 30),
            row("Docs", 4, 7),
            row("Kernel", 5, 3),
        ];
        let ordered = order_rows(rows);
        assert_eq!(
            keys(&ordered),
            vec![
                ("Compiler".to_string(), 2, 12),
                ("Docs".to_string(), 4, 7),
                ("Kernel".to_string(), 3, 30),
                ("Kernel".to_string(), 1, 3),
                ("Kernel".to_string(), 5, 3),
            ]
        );
    }

    #[test]
    fn longer_duration_comes_first_within_a_sig() {
        let ordered = order_rows(vec![row("TC", 1, 5), row("TC", 2, 40)]);
        assert_eq!(keys(&ordered), vec![("TC".to_string(), 2, 40), ("TC".to_string(), 1, 5)]);
    }

    #[test]
    fn ordering_is_deterministic() {
        let rows = vec![
            row("B", 1, 1),
            row("A", 2, 1),
            row("B", 3, 1),
            row("A", 4, 9),
        ];
        let first = order_rows(rows.clone());
        for _ in 0..10 {
            assert_eq!(order_rows(rows.clone()), first);
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(order_rows(Vec::new()).is_empty());
    }

    fn rows_strategy() -> impl Strategy<Value = Vec<ReportRow>> {
        prop::collection::vec((0usize..4, 0u64..50), 0..24).prop_map(|picks| {
            picks.into_iter()
                .enumerate()
                .map(|(i, (sig, days))| row(["A", "B", "C", "D"][sig], i as u64, days))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn output_is_a_permutation_grouped_by_sig(rows in rows_strategy()) {
            let ordered = order_rows(rows.clone());
            prop_assert_eq!(ordered.len(), rows.len());

            let sigs: Vec<_> = ordered.iter().map(|r| r.sig.clone()).collect();
            let mut sorted = sigs.clone();
            sorted.sort();
            prop_assert_eq!(sigs, sorted);

            for pair in ordered.windows(2) {
                if pair[0].sig == pair[1].sig {
                    prop_assert!(pair[0].duration_days >= pair[1].duration_days);
                }
            }
        }

        /// Differential check against the two-key stable sort. Because the
        /// rows are already duration-sorted when the one-row lookback runs,
        /// the lookback never fires on whole-day durations and both orderings
        /// agree.
        #[test]
        fn agrees_with_two_key_sort_on_whole_days(rows in rows_strategy()) {
            let mut two_key = rows.clone();
            two_key.sort_by(|a, b| b.duration_days.cmp(&a.duration_days));
            two_key.sort_by(|a, b| a.sig.cmp(&b.sig));
            prop_assert_eq!(order_rows(rows), two_key);
        }
    }
}
