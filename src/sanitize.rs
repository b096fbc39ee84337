//! Bounds conversation history before it leaves the process.
//!
//! Every call re-sanitizes the caller's history: roles are normalised, text is
//! pulled out of whichever shape the caller used, empty turns are dropped,
//! each text is clamped to [`MAX_CHARS_PER_PART`] characters and only the
//! last [`MAX_TURNS`] turns are kept.

use crate::gemini::{Content, Part};
use crate::types::{HistoryTurn, Role};

/// Most recent turns kept.
pub const MAX_TURNS: usize = 8;

/// Maximum characters per text part.
pub const MAX_CHARS_PER_PART: usize = 1500;

/// Limits applied by [`sanitize_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    pub max_turns: usize,
    pub max_chars: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_turns: MAX_TURNS,
            max_chars: MAX_CHARS_PER_PART,
        }
    }
}

/// Truncate `text` to at most `max_chars` characters (not bytes).
pub fn clamp_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Sanitize with the default limits.
pub fn sanitize(history: &[HistoryTurn]) -> Vec<Content> {
    sanitize_with(history, HistoryLimits::default())
}

/// Sanitize with explicit limits.
pub fn sanitize_with(history: &[HistoryTurn], limits: HistoryLimits) -> Vec<Content> {
    let turns: Vec<Content> = history
        .iter()
        .filter_map(|turn| {
            let parts = turn_texts(turn)
                .into_iter()
                .map(|t| clamp_text(t, limits.max_chars))
                .filter(|t| !t.is_empty())
                .map(Part::text)
                .collect::<Vec<_>>();
            (!parts.is_empty()).then(|| Content {
                role: Role::from_label(&turn.role),
                parts,
            })
        })
        .collect();

    let skip = turns.len().saturating_sub(limits.max_turns);
    turns.into_iter().skip(skip).collect()
}

fn turn_texts(turn: &HistoryTurn) -> Vec<&str> {
    match &turn.parts {
        Some(parts) => parts.iter().map(|p| p.as_text()).collect(),
        None => {
            let text = turn
                .content
                .as_deref()
                .filter(|t| !t.is_empty())
                .or(turn.text.as_deref())
                .unwrap_or_default();
            vec![text]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HistoryPart;

    #[test]
    fn clamp_counts_chars() {
        assert_eq!(clamp_text("héllo", 2), "hé");
        assert_eq!(clamp_text("abc", 5), "abc");
        assert_eq!(clamp_text("", 5), "");
    }

    #[test]
    fn bounds_long_history() {
        let long = "x".repeat(3000);
        let history: Vec<HistoryTurn> = (0..20).map(|_| HistoryTurn::user(long.clone())).collect();

        let out = sanitize(&history);
        assert!(out.len() <= 8);
        for turn in &out {
            for part in &turn.parts {
                assert!(part.as_text().unwrap().chars().count() <= 1500);
            }
        }
    }

    #[test]
    fn keeps_most_recent_turns() {
        let history: Vec<HistoryTurn> = (0..10)
            .map(|i| HistoryTurn::user(format!("turn {i}")))
            .collect();
        let out = sanitize(&history);
        assert_eq!(out.len(), 8);
        assert_eq!(out[0].parts[0].as_text(), Some("turn 2"));
        assert_eq!(out[7].parts[0].as_text(), Some("turn 9"));
    }

    #[test]
    fn drops_empty_turns_and_parts() {
        let history = vec![
            HistoryTurn::user(""),
            HistoryTurn {
                role: "assistant".into(),
                parts: Some(vec![
                    HistoryPart::default(),
                    HistoryPart {
                        text: Some("kept".into()),
                        content: None,
                    },
                ]),
                ..HistoryTurn::default()
            },
            HistoryTurn {
                role: "model".into(),
                parts: Some(vec![]),
                ..HistoryTurn::default()
            },
        ];
        let out = sanitize(&history);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].role, Role::Model);
        assert_eq!(out[0].parts, vec![Part::text("kept")]);
    }

    #[test]
    fn content_field_preferred_over_text() {
        let turn = HistoryTurn {
            role: "user".into(),
            content: Some("from content".into()),
            text: Some("from text".into()),
            ..HistoryTurn::default()
        };
        let out = sanitize(&[turn]);
        assert_eq!(out[0].parts[0].as_text(), Some("from content"));
    }

    #[test]
    fn custom_limits() {
        let history: Vec<HistoryTurn> = (0..5).map(|_| HistoryTurn::assistant("abcdef")).collect();
        let out = sanitize_with(
            &history,
            HistoryLimits {
                max_turns: 2,
                max_chars: 3,
            },
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].parts[0].as_text(), Some("abc"));
        assert_eq!(out[0].role, Role::Model);
    }
}
