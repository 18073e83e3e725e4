//! Word-level diff for reviewing a suggested edit.
//!
//! Display only. The patcher never consults these spans.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Unchanged,
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffSpan {
    pub kind: SpanKind,
    pub text: String,
}

impl DiffSpan {
    fn new(kind: SpanKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
        }
    }
}

/// Greedy two-cursor word diff. Equal tokens are unchanged; otherwise the
/// improved side is consumed first as additions, then leftover original
/// tokens as removals. No backtracking, so this is not a minimal diff.
pub fn render(original: &str, improved: &str) -> Vec<DiffSpan> {
    let old: Vec<&str> = original.split_whitespace().collect();
    let new: Vec<&str> = improved.split_whitespace().collect();

    let mut spans = Vec::with_capacity(old.len().max(new.len()));
    let (mut i, mut j) = (0, 0);

    while i < old.len() || j < new.len() {
        if i < old.len() && j < new.len() && old[i] == new[j] {
            spans.push(DiffSpan::new(SpanKind::Unchanged, old[i]));
            i += 1;
            j += 1;
        } else if j < new.len() {
            spans.push(DiffSpan::new(SpanKind::Added, new[j]));
            j += 1;
        } else {
            spans.push(DiffSpan::new(SpanKind::Removed, old[i]));
            i += 1;
        }
    }

    spans
}

/// Line-level view for multi-line (bullet list) edits: lines present in both
/// are unchanged, the rest are removed or added. Order follows the improved
/// text, with removed lines listed first.
pub fn render_bullets(original: &str, improved: &str) -> Vec<DiffSpan> {
    let old: Vec<&str> = original.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let new: Vec<&str> = improved.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let removed = old
        .iter()
        .filter(|l| !new.contains(l))
        .map(|l| DiffSpan::new(SpanKind::Removed, l));
    let kept_or_added = new.iter().map(|l| {
        let kind = if old.contains(l) {
            SpanKind::Unchanged
        } else {
            SpanKind::Added
        };
        DiffSpan::new(kind, l)
    });

    removed.chain(kept_or_added).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(spans: &[DiffSpan]) -> Vec<(SpanKind, &str)> {
        spans.iter().map(|s| (s.kind, s.text.as_str())).collect()
    }

    #[test]
    fn test_insertion_in_the_middle() {
        let spans = render("Managed projects", "Managed 5 cross-functional projects");
        assert_eq!(
            kinds(&spans),
            vec![
                (SpanKind::Unchanged, "Managed"),
                (SpanKind::Added, "5"),
                (SpanKind::Added, "cross-functional"),
                (SpanKind::Unchanged, "projects"),
            ]
        );
    }

    #[test]
    fn test_removed_tail() {
        let spans = render("Led a team of 5", "Led a team");
        assert_eq!(
            kinds(&spans),
            vec![
                (SpanKind::Unchanged, "Led"),
                (SpanKind::Unchanged, "a"),
                (SpanKind::Unchanged, "team"),
                (SpanKind::Removed, "of"),
                (SpanKind::Removed, "5"),
            ]
        );
    }

    #[test]
    fn test_greedy_does_not_backtrack() {
        // "wrote" is consumed as an addition before "code" is seen again.
        let spans = render("wrote code", "reviewed code");
        assert_eq!(
            kinds(&spans),
            vec![
                (SpanKind::Added, "reviewed"),
                (SpanKind::Added, "code"),
                (SpanKind::Removed, "wrote"),
                (SpanKind::Removed, "code"),
            ]
        );
    }

    #[test]
    fn test_whitespace_runs_are_ignored() {
        let spans = render("  a   b ", "a b");
        assert!(spans.iter().all(|s| s.kind == SpanKind::Unchanged));
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn test_bullet_view() {
        let spans = render_bullets("• Rust\n• Go\n", "• Rust\n• Kubernetes");
        assert_eq!(
            kinds(&spans),
            vec![
                (SpanKind::Removed, "• Go"),
                (SpanKind::Unchanged, "• Rust"),
                (SpanKind::Added, "• Kubernetes"),
            ]
        );
    }
}
