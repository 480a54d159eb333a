//! Team ranking for full rounds and tie-break rounds.

use std::cmp::Ordering;

/// A team's position after ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    /// Team id.
    pub team: u64,
    /// Team name, used to order equal totals.
    pub name: String,
    /// Cumulative score over full rounds.
    pub total: f64,
    /// Shared by teams on equal totals.
    pub rank: u32,
}

/// Outcome of a ranking pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    /// Teams from first to last.
    pub standings: Vec<Standing>,
    /// Teams tied across the winners' cut-off.
    pub is_tied: bool,
}

fn by_score_then_name(a: (f64, &str), b: (f64, &str)) -> Ordering {
    b.0.partial_cmp(&a.0)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.1.cmp(b.1))
}

/// Standard competition ranking of every team by total.
///
/// With `check_cutoff`, a tie is flagged when teams sharing a total sit on both sides of the
/// `n_winners` cutoff.
pub fn rank_full(totals: Vec<(u64, String, f64)>, n_winners: u32, check_cutoff: bool) -> Ranking {
    let mut standings: Vec<Standing> = totals
        .into_iter()
        .map(|(team, name, total)| Standing {
            team,
            name,
            total,
            rank: 0,
        })
        .collect();
    standings.sort_by(|a, b| by_score_then_name((a.total, &a.name), (b.total, &b.name)));

    let mut prior: Option<f64> = None;
    let mut rank = 0;
    for (position, standing) in standings.iter_mut().enumerate() {
        if prior != Some(standing.total) {
            rank = position as u32 + 1;
            prior = Some(standing.total);
        }
        standing.rank = rank;
    }

    let cutoff = n_winners as usize;
    let is_tied = check_cutoff
        && cutoff > 0
        && cutoff < standings.len()
        && standings[cutoff - 1].total == standings[cutoff].total;

    Ranking { standings, is_tied }
}

/// Adjust ranks by the scores of one tie-break round.
///
/// Only teams in `scores` take part. The top-scoring group keeps its rank and each lower group
/// moves down by the number of participants placed above it. Returns true when the top group
/// is still tied.
pub fn apply_tie_break(standings: &mut [Standing], scores: &[(u64, f64)]) -> bool {
    let mut participants: Vec<(usize, f64)> = scores
        .iter()
        .filter_map(|(team, value)| {
            standings
                .iter()
                .position(|standing| standing.team == *team)
                .map(|at| (at, *value))
        })
        .collect();
    participants.sort_by(|a, b| {
        by_score_then_name(
            (a.1, &standings[a.0].name),
            (b.1, &standings[b.0].name),
        )
    });

    let mut prior: Option<f64> = None;
    let mut delta = 0;
    let mut top_group = 0;
    for (position, (at, value)) in participants.into_iter().enumerate() {
        if prior != Some(value) {
            delta = position as u32;
            prior = Some(value);
        }
        if delta == 0 {
            top_group += 1;
        }
        standings[at].rank += delta;
    }

    top_group > 1
}

/// Sort standings for display: by rank, then name.
pub fn sort_by_rank(standings: &mut [Standing]) {
    standings.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.name.cmp(&b.name)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(values: &[f64]) -> Vec<(u64, String, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(i, value)| (i as u64 + 1, format!("Team {}", i + 1), *value))
            .collect()
    }

    fn ranks(ranking: &Ranking) -> Vec<u32> {
        ranking.standings.iter().map(|s| s.rank).collect()
    }

    #[test]
    fn competition_ranking_shares_positions() {
        let ranking = rank_full(totals(&[12.0, 9.0, 9.0, 5.0]), 1, true);
        assert_eq!(ranks(&ranking), vec![1, 2, 2, 4]);
        assert!(!ranking.is_tied);
    }

    #[test]
    fn order_is_by_total_then_name() {
        let ranking = rank_full(
            vec![
                (1, "Zebras".into(), 4.0),
                (2, "Aardvarks".into(), 4.0),
                (3, "Moles".into(), 7.5),
            ],
            1,
            false,
        );
        let names: Vec<&str> = ranking.standings.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Moles", "Aardvarks", "Zebras"]);
    }

    #[test]
    fn tie_detected_only_across_cutoff() {
        assert!(rank_full(totals(&[10.0, 10.0, 8.0]), 1, true).is_tied);
        assert!(!rank_full(totals(&[10.0, 10.0, 8.0]), 2, true).is_tied);
        assert!(rank_full(totals(&[10.0, 10.0, 10.0]), 2, true).is_tied);
        // only checked after the final full round
        assert!(!rank_full(totals(&[10.0, 10.0, 8.0]), 1, false).is_tied);
        // everyone wins
        assert!(!rank_full(totals(&[3.0, 3.0]), 2, true).is_tied);
    }

    #[test]
    fn tie_break_moves_lower_teams_down() {
        // four teams tied second
        let mut ranking = rank_full(totals(&[20.0, 15.0, 15.0, 15.0, 15.0]), 2, true);
        assert!(ranking.is_tied);

        let still_tied = apply_tie_break(
            &mut ranking.standings,
            &[(2, 3.0), (3, 2.0), (4, 2.0), (5, 1.0)],
        );
        assert!(!still_tied);
        assert_eq!(ranks(&ranking), vec![1, 2, 3, 3, 5]);
    }

    #[test]
    fn repeated_tie_is_reported() {
        let mut ranking = rank_full(totals(&[10.0, 10.0, 4.0]), 1, true);
        assert!(apply_tie_break(&mut ranking.standings, &[(1, 2.0), (2, 2.0)]));
        assert_eq!(ranks(&ranking), vec![1, 1, 3]);

        assert!(!apply_tie_break(&mut ranking.standings, &[(1, 1.0), (2, 3.0)]));
        sort_by_rank(&mut ranking.standings);
        let order: Vec<u64> = ranking.standings.iter().map(|s| s.team).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn non_participants_keep_rank() {
        let mut ranking = rank_full(totals(&[10.0, 10.0, 4.0]), 1, true);
        apply_tie_break(&mut ranking.standings, &[]);
        assert_eq!(ranks(&ranking), vec![1, 1, 3]);
    }
}
