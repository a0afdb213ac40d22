//! Prefix completion and "did you mean" ranking over small catalogs.

use crate::config::EngineConfig;
use strsim::levenshtein;

/// Ranks `candidates` by edit distance to `term`.
///
/// Matching is case-insensitive. A candidate is kept when its distance is
/// within both the configured cutoff and half the length of the longer of
/// the two words, so short terms don't match everything. Results are ordered
/// by distance, then lexically, and capped at `max_suggestions`.
#[must_use]
pub fn rank<'a, I>(term: &str, candidates: I, config: &EngineConfig) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    finish(scored(term, candidates, 0), config)
}

/// Like [`rank`], but names in `preferred` win ties against `others`.
#[must_use]
pub fn rank_preferring<'a, P, O>(
    term: &str,
    preferred: P,
    others: O,
    config: &EngineConfig,
) -> Vec<String>
where
    P: IntoIterator<Item = &'a str>,
    O: IntoIterator<Item = &'a str>,
{
    let mut scores = scored(term, preferred, 0);
    scores.extend(scored(term, others, 1));
    finish(scores, config)
}

/// Candidates starting with `prefix`, case-insensitively.
///
/// Ordered by the length of the case-sensitive common prefix (longest
/// first), then by position in `candidates`. An empty prefix returns every
/// candidate in order.
#[must_use]
pub fn complete<'a, I>(prefix: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let lower = prefix.to_lowercase();
    let mut matches: Vec<(usize, &str)> = Vec::new();

    for candidate in candidates {
        if matches.iter().any(|(_, c)| *c == candidate) {
            continue;
        }
        if candidate.to_lowercase().starts_with(&lower) {
            matches.push((common_prefix_len(prefix, candidate), candidate));
        }
    }

    // stable: equal lengths keep declaration order
    matches.sort_by(|a, b| b.0.cmp(&a.0));
    matches.into_iter().map(|(_, c)| c.to_string()).collect()
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

fn scored<'a, I>(term: &str, candidates: I, tier: u8) -> Vec<(usize, u8, &'a str)>
where
    I: IntoIterator<Item = &'a str>,
{
    let term_lower = term.to_lowercase();
    let term_len = term_lower.chars().count();

    candidates
        .into_iter()
        .filter_map(|candidate| {
            let lower = candidate.to_lowercase();
            let distance = levenshtein(&term_lower, &lower);
            let longest = term_len.max(lower.chars().count());
            (distance <= (longest / 2).max(1)).then_some((distance, tier, candidate))
        })
        .collect()
}

fn finish(mut scores: Vec<(usize, u8, &str)>, config: &EngineConfig) -> Vec<String> {
    scores.retain(|(distance, _, _)| *distance <= config.max_suggestion_distance);
    scores.sort_unstable();

    let mut out: Vec<String> = Vec::new();
    for (_, _, candidate) in scores {
        if out.len() == config.max_suggestions {
            break;
        }
        if !out.iter().any(|c| c == candidate) {
            out.push(candidate.to_string());
        }
    }
    out
}
