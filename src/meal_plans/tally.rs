//! Borda count over ranked ballots.
//!
//! In an event with `n` options a rank-`r` vote is worth `n - 1 - r` points;
//! abstentions are worth nothing. Ties on points go to the option with more
//! rank-0 votes, then more rank-1 votes and so on, and finally to the
//! lexicographically smallest option id.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::errors::{LarderError, Result};

/// One ranked entry of a ballot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedVote {
    pub option_id: String,
    pub rank: u32,
    pub abstain: bool,
}

/// Outcome of one event's tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub winner: String,
    /// Whether the winner shared the top score with another option.
    pub tiebroken: bool,
    pub scores: BTreeMap<String, u64>,
}

#[derive(Debug)]
struct Standing<'a> {
    option_id: &'a str,
    score: u64,
    rank_counts: Vec<u64>,
}

/// Check that one voter's entries rank every option of the event exactly once.
///
/// Non-abstaining ranks must be distinct and below the option count.
pub fn check_ballot(option_ids: &[String], entries: &[RankedVote]) -> Result<()> {
    let n = option_ids.len() as u32;
    if entries.len() != option_ids.len() {
        return Err(LarderError::validation_field("a ballot must rank every option of the event", "votes"));
    }

    let mut seen = HashSet::new();
    let mut ranks = HashSet::new();
    for entry in entries {
        if !option_ids.contains(&entry.option_id) {
            return Err(LarderError::validation_field(
                format!("option '{}' is not part of this event", entry.option_id),
                "mealPlanOptionID",
            ));
        }
        if !seen.insert(entry.option_id.as_str()) {
            return Err(LarderError::validation_field(
                format!("option '{}' is ranked twice", entry.option_id),
                "mealPlanOptionID",
            ));
        }
        if entry.abstain {
            continue;
        }
        if entry.rank >= n {
            return Err(LarderError::validation_field(format!("rank must be below {n}"), "rank"));
        }
        if !ranks.insert(entry.rank) {
            return Err(LarderError::validation_field("ranks must be distinct", "rank"));
        }
    }
    Ok(())
}

/// Pick the winning option; `None` when nobody cast a non-abstaining vote.
pub fn decide(option_ids: &[String], votes: &[RankedVote]) -> Option<Decision> {
    let n = option_ids.len();
    let mut standings: Vec<Standing<'_>> = option_ids
        .iter()
        .map(|id| Standing { option_id: id.as_str(), score: 0, rank_counts: vec![0; n] })
        .collect();

    let mut counted = 0usize;
    for vote in votes.iter().filter(|vote| !vote.abstain) {
        let rank = vote.rank as usize;
        let Some(standing) = standings.iter_mut().find(|s| s.option_id == vote.option_id) else {
            continue;
        };
        if rank >= n {
            continue;
        }
        standing.score += (n - 1 - rank) as u64;
        standing.rank_counts[rank] += 1;
        counted += 1;
    }
    if counted == 0 {
        return None;
    }

    standings.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| compare_rank_counts(&b.rank_counts, &a.rank_counts))
            .then_with(|| a.option_id.cmp(b.option_id))
    });

    let top = standings.first()?;
    let tiebroken = standings.get(1).is_some_and(|runner_up| runner_up.score == top.score);
    Some(Decision {
        winner: top.option_id.to_string(),
        tiebroken,
        scores: standings.iter().map(|s| (s.option_id.to_string(), s.score)).collect(),
    })
}

fn compare_rank_counts(a: &[u64], b: &[u64]) -> Ordering {
    a.iter().zip(b).map(|(x, y)| x.cmp(y)).find(|o| o.is_ne()).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn ballot(ranking: &[(&str, u32)]) -> Vec<RankedVote> {
        ranking
            .iter()
            .map(|(id, rank)| RankedVote { option_id: id.to_string(), rank: *rank, abstain: false })
            .collect()
    }

    #[test]
    fn unanimous_ballots_pick_the_shared_favourite() {
        let options = ids(&["o1", "o2", "o3"]);
        let mut votes = Vec::new();
        for _ in 0..3 {
            votes.extend(ballot(&[("o1", 0), ("o2", 2), ("o3", 1)]));
        }
        let decision = decide(&options, &votes).unwrap();
        assert_eq!(decision.winner, "o1");
        assert!(!decision.tiebroken);
        assert_eq!(decision.scores["o1"], 6);
        assert_eq!(decision.scores["o3"], 3);
        assert_eq!(decision.scores["o2"], 0);
    }

    #[test]
    fn equal_scores_fall_back_to_first_choices_then_id() {
        let options = ids(&["o1", "o2", "o3"]);

        // o1 and o2 both score 3 with one first place each; o1 wins on id.
        let mut votes = ballot(&[("o1", 0), ("o2", 1), ("o3", 2)]);
        votes.extend(ballot(&[("o2", 0), ("o1", 1), ("o3", 2)]));
        let decision = decide(&options, &votes).unwrap();
        assert_eq!(decision.winner, "o1");
        assert!(decision.tiebroken);

        // o2 and o3 tie on points (2 each) but only o3 has a first place.
        let mut votes = ballot(&[("o3", 0), ("o2", 1), ("o1", 2)]);
        votes.extend(ballot(&[("o2", 1)]));
        votes.push(RankedVote { option_id: "o1".into(), rank: 0, abstain: true });
        votes.push(RankedVote { option_id: "o3".into(), rank: 0, abstain: true });
        let decision = decide(&options, &votes).unwrap();
        assert_eq!(decision.scores["o3"], 2);
        assert_eq!(decision.scores["o2"], 2);
        assert_eq!(decision.winner, "o3");
        assert!(decision.tiebroken);
    }

    #[test]
    fn abstentions_only_means_no_decision() {
        let options = ids(&["o1", "o2"]);
        let votes = vec![
            RankedVote { option_id: "o1".into(), rank: 0, abstain: true },
            RankedVote { option_id: "o2".into(), rank: 1, abstain: true },
        ];
        assert!(decide(&options, &votes).is_none());
        assert!(decide(&options, &[]).is_none());
    }

    #[test]
    fn ballots_must_be_complete_and_well_ranked() {
        let options = ids(&["o1", "o2", "o3"]);
        assert!(check_ballot(&options, &ballot(&[("o1", 0), ("o2", 1), ("o3", 2)])).is_ok());
        assert!(check_ballot(&options, &ballot(&[("o1", 0), ("o2", 1)])).is_err());
        assert!(check_ballot(&options, &ballot(&[("o1", 0), ("o1", 1), ("o3", 2)])).is_err());
        assert!(check_ballot(&options, &ballot(&[("o1", 0), ("o2", 0), ("o3", 2)])).is_err());
        assert!(check_ballot(&options, &ballot(&[("o1", 0), ("o2", 1), ("o3", 3)])).is_err());
        assert!(check_ballot(&options, &ballot(&[("o1", 0), ("o2", 1), ("ox", 2)])).is_err());

        let mut with_abstention = ballot(&[("o1", 0), ("o2", 0)]);
        with_abstention.push(RankedVote { option_id: "o3".into(), rank: 0, abstain: true });
        assert!(check_ballot(&options, &with_abstention).is_ok());
    }

    fn arb_ballots() -> impl Strategy<Value = (usize, Vec<Vec<usize>>)> {
        (2usize..6).prop_flat_map(|n| {
            let permutation = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
            (Just(n), prop::collection::vec(permutation, 1..8))
        })
    }

    fn expand(n: usize, ballots: &[Vec<usize>]) -> (Vec<String>, Vec<RankedVote>) {
        let options: Vec<String> = (0..n).map(|i| format!("opt-{i}")).collect();
        let votes = ballots
            .iter()
            .flat_map(|order| {
                order.iter().enumerate().map(|(rank, &option)| RankedVote {
                    option_id: options[option].clone(),
                    rank: rank as u32,
                    abstain: false,
                })
            })
            .collect();
        (options, votes)
    }

    proptest! {
        #[test]
        fn winner_has_the_top_score((n, ballots) in arb_ballots()) {
            let (options, votes) = expand(n, &ballots);
            let decision = decide(&options, &votes).unwrap();
            let best = decision.scores.values().copied().max().unwrap();
            prop_assert_eq!(decision.scores[&decision.winner], best);
            let leaders = decision.scores.values().filter(|&&s| s == best).count();
            prop_assert_eq!(decision.tiebroken, leaders > 1);
        }

        #[test]
        fn vote_order_does_not_matter((n, ballots) in arb_ballots()) {
            let (options, votes) = expand(n, &ballots);
            let mut reversed = votes.clone();
            reversed.reverse();
            prop_assert_eq!(decide(&options, &votes), decide(&options, &reversed));
        }

        #[test]
        fn total_points_are_conserved((n, ballots) in arb_ballots()) {
            let (options, votes) = expand(n, &ballots);
            let decision = decide(&options, &votes).unwrap();
            let total: u64 = decision.scores.values().sum();
            prop_assert_eq!(total, (ballots.len() * n * (n - 1) / 2) as u64);
        }
    }
}
