//! Canonical pipeline transitions, spec §4.H. `Store::promote_candidate_status`
//! and `Store::promote_article_status` consult these tables so the invariant
//! holds everywhere regardless of which component is writing.

use crawler_common::{ArticleStatus, CandidateStatus};

/// Is `from -> to` an allowed candidate-link transition?
pub fn candidate_transition_allowed(from: CandidateStatus, to: CandidateStatus) -> bool {
    use CandidateStatus::*;
    matches!(
        (from, to),
        (Discovered, Verified)
            | (Verified, Article)
            | (Verified, NotArticle)
            | (Verified, VerifyFailed)
            | (Article, Extracted)
            | (Article, Paused)
    )
}

/// Is `from -> to` an allowed article transition?
pub fn article_transition_allowed(from: ArticleStatus, to: ArticleStatus) -> bool {
    use ArticleStatus::*;
    matches!(
        (from, to),
        (Extracted, Cleaned)
            | (Cleaned, Local)
            | (Cleaned, Wire)
            | (Local, Labeled)
            | (Wire, Labeled)
            | (Extracted, Paused)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use CandidateStatus::*;

    #[test]
    fn allows_documented_candidate_transitions() {
        assert!(candidate_transition_allowed(Discovered, Verified));
        assert!(candidate_transition_allowed(Verified, Article));
        assert!(candidate_transition_allowed(Verified, NotArticle));
        assert!(candidate_transition_allowed(Verified, VerifyFailed));
        assert!(candidate_transition_allowed(Article, Extracted));
        assert!(candidate_transition_allowed(Article, Paused));
    }

    #[test]
    fn rejects_everything_else() {
        assert!(!candidate_transition_allowed(Discovered, Article));
        assert!(!candidate_transition_allowed(Extracted, Discovered));
        assert!(!candidate_transition_allowed(NotArticle, Discovered));
        assert!(!candidate_transition_allowed(Paused, Article));
    }

    #[test]
    fn terminal_statuses_have_no_outgoing_transitions() {
        for to in [
            Discovered, Verified, Article, Extracted, NotArticle, VerifyFailed, Paused,
        ] {
            for from in [NotArticle, VerifyFailed, Paused] {
                assert!(!candidate_transition_allowed(from, to), "{from} -> {to} should be rejected");
            }
        }
    }

    #[test]
    fn article_transitions() {
        use ArticleStatus::*;
        assert!(article_transition_allowed(Extracted, Cleaned));
        assert!(article_transition_allowed(Cleaned, Local));
        assert!(article_transition_allowed(Cleaned, Wire));
        assert!(article_transition_allowed(Local, Labeled));
        assert!(article_transition_allowed(Wire, Labeled));
        assert!(article_transition_allowed(Extracted, Paused));
        assert!(!article_transition_allowed(Extracted, Labeled));
        assert!(!article_transition_allowed(Labeled, Extracted));
    }
}
