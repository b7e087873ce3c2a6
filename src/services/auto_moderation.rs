//! Keyword and length heuristics applied to new workshop items.

const KEYWORD_PENALTY: f64 = 0.35;
const LONG_DESCRIPTION_CHARS: usize = 3500;
const LONG_DESCRIPTION_PENALTY: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub score: f64,
    pub flagged: bool,
    pub reasons: Vec<String>,
}

/// Score an item between 0 and 1; anything with a reason is flagged.
pub fn score_content(
    title: &str,
    description: &str,
    tags: &[String],
    banned_keywords: &[String],
    approval_threshold: f64,
) -> Verdict {
    let text = format!("{title} {description} {}", tags.join(" ")).to_lowercase();
    let mut reasons = Vec::new();
    let mut hits = 0u32;
    for keyword in banned_keywords {
        let keyword = keyword.trim().to_lowercase();
        if !keyword.is_empty() && contains_word(&text, &keyword) {
            hits += 1;
            reasons.push(format!("Contains banned keyword '{keyword}'"));
        }
    }

    let mut penalty = f64::from(hits) * KEYWORD_PENALTY;
    if description.chars().count() > LONG_DESCRIPTION_CHARS {
        penalty += LONG_DESCRIPTION_PENALTY;
        reasons.push("Description is very long and may require manual review".into());
    }

    let score = (1.0 - penalty).max(0.0);
    Verdict {
        score,
        flagged: score < approval_threshold || !reasons.is_empty(),
        reasons,
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Whole-word occurrence of `word` in `text`.
fn contains_word(text: &str, word: &str) -> bool {
    text.match_indices(word).any(|(start, matched)| {
        let before = text[..start].chars().next_back();
        let after = text[start + matched.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn banned() -> Vec<String> {
        vec!["cheat".into(), "virus".into()]
    }

    #[test]
    fn clean_items_pass() {
        let verdict = score_content("Texture pack", "Sharper grass", &[], &banned(), 0.65);
        assert_eq!(verdict.score, 1.0);
        assert!(!verdict.flagged);
    }

    #[test]
    fn keywords_match_whole_words_only() {
        let verdict = score_content(
            "Cheat menu",
            "Totally not a VIRUS",
            &["cheaters".into()],
            &banned(),
            0.65,
        );
        assert_eq!(verdict.reasons.len(), 2);
        assert!((verdict.score - 0.3).abs() < 1e-9);
        assert!(verdict.flagged);

        let partial = score_content("Cheaters guide", "", &[], &banned(), 0.65);
        assert!(!partial.flagged);
    }

    #[test]
    fn long_descriptions_need_review() {
        let verdict = score_content("Saga", &"a".repeat(3501), &[], &banned(), 0.65);
        assert!((verdict.score - 0.9).abs() < 1e-9);
        assert!(verdict.flagged);
    }
}
