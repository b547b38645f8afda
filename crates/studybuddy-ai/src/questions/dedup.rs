use std::collections::HashSet;
use studybuddy_core::{DedupMode, Question};

/// Decides when two questions count as the same question.
pub trait DedupPolicy: Send + Sync {
    /// Comparison key; `None` means the question is never merged.
    fn key(&self, text: &str) -> Option<String>;

    fn name(&self) -> &'static str;
}

/// Byte-for-byte equality after trimming.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactMatch;

impl DedupPolicy for ExactMatch {
    fn key(&self, text: &str) -> Option<String> {
        Some(text.trim().to_string())
    }

    fn name(&self) -> &'static str {
        "exact"
    }
}

/// Equality ignoring case, punctuation and runs of whitespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct Normalized;

impl DedupPolicy for Normalized {
    fn key(&self, text: &str) -> Option<String> {
        let cleaned: String = text
            .chars()
            .map(|c| {
                if c.is_alphanumeric() {
                    c.to_lowercase().next().unwrap_or(c)
                } else {
                    ' '
                }
            })
            .collect();
        Some(cleaned.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    fn name(&self) -> &'static str {
        "normalized"
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoDedup;

impl DedupPolicy for NoDedup {
    fn key(&self, _text: &str) -> Option<String> {
        None
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

pub fn dedup_policy_for(mode: DedupMode) -> Box<dyn DedupPolicy> {
    match mode {
        DedupMode::Exact => Box::new(ExactMatch),
        DedupMode::Normalized => Box::new(Normalized),
        DedupMode::None => Box::new(NoDedup),
    }
}

/// Merge duplicates (first occurrence wins) and renumber 1..N.
///
/// Applying it to its own output changes nothing.
pub fn refine_questions(questions: &[Question], policy: &dyn DedupPolicy) -> Vec<Question> {
    let mut seen = HashSet::new();
    questions
        .iter()
        .filter(|q| match policy.key(&q.text) {
            Some(key) => seen.insert(key),
            None => true,
        })
        .enumerate()
        .map(|(i, q)| Question::new(i + 1, q.text.trim()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(texts: &[&str]) -> Vec<Question> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Question::new(i + 1, *t))
            .collect()
    }

    #[test]
    fn test_normalized_merges_case_and_punctuation() {
        let input = questions(&[
            "What is ATP?",
            "what is  ATP",
            "Define osmosis.",
            "WHAT IS ATP?!",
        ]);
        let refined = refine_questions(&input, &Normalized);
        assert_eq!(refined.len(), 2);
        assert_eq!(refined[0], Question::new(1, "What is ATP?"));
        assert_eq!(refined[1], Question::new(2, "Define osmosis."));
    }

    #[test]
    fn test_exact_keeps_case_variants() {
        let input = questions(&["What is ATP?", "what is ATP?", "What is ATP?"]);
        let refined = refine_questions(&input, &ExactMatch);
        assert_eq!(refined.len(), 2);
    }

    #[test]
    fn test_no_dedup_only_renumbers() {
        let input = vec![Question::new(4, "A?"), Question::new(9, "A?")];
        let refined = refine_questions(&input, &NoDedup);
        assert_eq!(refined, vec![Question::new(1, "A?"), Question::new(2, "A?")]);
    }

    #[test]
    fn test_refinement_is_idempotent() {
        let input = questions(&["One?", "one", " Two? ", "Three?", "two?"]);
        for mode in [DedupMode::Exact, DedupMode::Normalized, DedupMode::None] {
            let policy = dedup_policy_for(mode);
            let once = refine_questions(&input, policy.as_ref());
            let twice = refine_questions(&once, policy.as_ref());
            assert_eq!(once, twice, "policy {}", policy.name());
        }
    }
}
