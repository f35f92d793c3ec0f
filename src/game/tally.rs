use std::collections::BTreeMap;

/// Outcome of tallying one day's votes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TallyOutcome {
    /// Exactly one candidate held the maximum vote count.
    Eliminated(String),
    /// Two or more candidates tied for the maximum; a revote is required.
    Tie,
    /// Nobody voted.
    NoVotes,
}

/// Tallies a day's votes (voter -> target). A single maximum-count candidate
/// wins regardless of how many votes were cast in total; any larger set of
/// candidates at the maximum is a tie. No tie-break is applied.
///
/// The vote map iterates in voter-id order and the count sort is stable, so
/// the same votes always produce the same candidate ordering.
pub fn tally_votes(votes: &BTreeMap<String, String>) -> TallyOutcome {
    if votes.is_empty() {
        return TallyOutcome::NoVotes;
    }

    let mut counts: Vec<(&str, usize)> = Vec::new();
    for target in votes.values() {
        match counts.iter_mut().find(|(t, _)| *t == target) {
            Some((_, n)) => *n += 1,
            None => counts.push((target, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let max = counts[0].1;
    if counts.iter().filter(|(_, n)| *n == max).count() > 1 {
        TallyOutcome::Tie
    } else {
        TallyOutcome::Eliminated(counts[0].0.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn votes(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(voter, target)| (voter.to_string(), target.to_string()))
            .collect()
    }

    #[test]
    fn empty_map_is_no_votes() {
        assert_eq!(tally_votes(&BTreeMap::new()), TallyOutcome::NoVotes);
    }

    #[test]
    fn single_vote_wins_outright() {
        assert_eq!(
            tally_votes(&votes(&[("a", "x")])),
            TallyOutcome::Eliminated("x".to_string())
        );
    }

    #[rstest]
    #[case(&[("a", "x"), ("b", "y")])]
    #[case(&[("a", "x"), ("b", "y"), ("c", "z")])]
    #[case(&[("a", "x"), ("b", "x"), ("c", "y"), ("d", "y")])]
    fn equal_maximums_tie(#[case] pairs: &[(&str, &str)]) {
        assert_eq!(tally_votes(&votes(pairs)), TallyOutcome::Tie);
    }

    #[test]
    fn majority_target_is_eliminated() {
        assert_eq!(
            tally_votes(&votes(&[("a", "x"), ("b", "x"), ("c", "y")])),
            TallyOutcome::Eliminated("x".to_string())
        );
    }

    #[test]
    fn plurality_is_enough() {
        // x has 2 of 5 votes; still a unique maximum.
        assert_eq!(
            tally_votes(&votes(&[
                ("a", "x"),
                ("b", "x"),
                ("c", "y"),
                ("d", "z"),
                ("e", "w"),
            ])),
            TallyOutcome::Eliminated("x".to_string())
        );
    }

    #[test]
    fn same_votes_same_outcome() {
        let map = votes(&[("a", "x"), ("b", "y"), ("c", "x")]);
        let first = tally_votes(&map);
        for _ in 0..10 {
            assert_eq!(tally_votes(&map), first);
        }
    }
}
