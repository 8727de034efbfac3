// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short ambiguous-reply resolution against recent conversation context.
//!
//! A bare "yes" or "no" carries no proposition of its own. When the user's
//! message matches the closed acknowledgement token set, this module resolves
//! it against the most recent assistant turn that asked something, and the
//! pipeline skips the cascade and the tool loop entirely for that turn.
//! Hard rule: the short-circuit path never invokes a tool.

use parley_core::types::{ChatMessage, ChatRole};

/// Closed set of affirmation tokens. Matched case-insensitively on the
/// trimmed message; a match requires the message to contain nothing else.
const AFFIRMATIONS: &[&str] = &[
    "yes", "yes.", "yes!", "y", "yeah", "yep", "yup", "sure", "ok", "okay", "k", "sounds good",
    "go ahead", "do it", "please do", "confirm", "confirmed", "correct", "right", "exactly",
];

/// Closed set of negation tokens.
const NEGATIONS: &[&str] = &[
    "no", "no.", "no!", "n", "nope", "nah", "don't", "dont", "stop", "cancel", "never mind",
    "nevermind", "no thanks", "negative", "wrong", "incorrect",
];

/// The outcome of ambiguity resolution for one user message.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Message carries its own content; run the full pipeline.
    NotAmbiguous,
    /// Message was a bare acknowledgement; reply directly with this text.
    Resolved(String),
}

/// Resolves a user message against recent turns.
///
/// `recent_turns` is the conversation in chronological order, newest last.
pub fn resolve(user_text: &str, recent_turns: &[ChatMessage]) -> Resolution {
    let Some(stance) = classify(user_text) else {
        return Resolution::NotAmbiguous;
    };

    let proposition = find_proposition(recent_turns);

    let reply = match (stance, proposition) {
        (Stance::Affirm, Some(prop)) => format!(
            "Understood — taking that as a yes to: \"{}\". Let me know if I misread which part you were agreeing to.",
            prop
        ),
        (Stance::Decline, Some(prop)) => format!(
            "Understood — taking that as a no to: \"{}\". Tell me what you'd like instead.",
            prop
        ),
        (Stance::Affirm, None) => {
            "I'm not sure what you're agreeing to yet — could you say a bit more?".to_string()
        }
        (Stance::Decline, None) => {
            "I'm not sure what you're declining — could you say a bit more?".to_string()
        }
    };

    Resolution::Resolved(reply)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stance {
    Affirm,
    Decline,
}

/// Classifies a message against the closed token sets, or `None` when the
/// message carries its own content.
fn classify(user_text: &str) -> Option<Stance> {
    let normalized = user_text.trim().to_lowercase();
    if AFFIRMATIONS.contains(&normalized.as_str()) {
        return Some(Stance::Affirm);
    }
    if NEGATIONS.contains(&normalized.as_str()) {
        return Some(Stance::Decline);
    }
    None
}

/// Scans turns backward for the assistant turn the acknowledgement most
/// plausibly answers: the most recent one containing a question mark or
/// enumerated options, else the most recent assistant turn at all.
fn find_proposition(recent_turns: &[ChatMessage]) -> Option<String> {
    let assistant_turns = || {
        recent_turns
            .iter()
            .rev()
            .filter(|m| m.role == ChatRole::Assistant)
    };

    let target = assistant_turns()
        .find(|m| asks_something(&m.content))
        .or_else(|| assistant_turns().next())?;

    Some(condense(&target.content))
}

fn asks_something(content: &str) -> bool {
    if content.contains('?') {
        return true;
    }
    // Enumerated options: "1." / "2)" / "- option" list markers on
    // separate lines.
    let list_lines = content
        .lines()
        .map(str::trim_start)
        .filter(|line| {
            line.starts_with("- ")
                || line
                    .split_once(['.', ')'])
                    .is_some_and(|(head, _)| head.chars().all(|c| c.is_ascii_digit()) && !head.is_empty())
        })
        .count();
    list_lines >= 2
}

/// Trims a proposition to a single quotable line.
fn condense(content: &str) -> String {
    let line = content
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    const MAX: usize = 140;
    if line.chars().count() <= MAX {
        line.to_string()
    } else {
        let truncated: String = line.chars().take(MAX).collect();
        format!("{truncated}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_question_is_not_ambiguous() {
        assert_eq!(
            resolve("what is the refund policy?", &[]),
            Resolution::NotAmbiguous
        );
    }

    #[test]
    fn affirmation_with_extra_content_is_not_ambiguous() {
        // "yes" alone matches; "yes, and also..." carries its own content.
        assert_eq!(
            resolve("yes, and also check the logs", &[]),
            Resolution::NotAmbiguous
        );
    }

    #[test]
    fn yes_resolves_against_last_question_turn() {
        let turns = vec![
            ChatMessage::user("can you clean up?"),
            ChatMessage::assistant("Should I proceed with deleting the file?"),
        ];
        let Resolution::Resolved(reply) = resolve("yes", &turns) else {
            panic!("expected resolution");
        };
        assert!(reply.contains("deleting the file"), "got: {reply}");
        assert!(reply.to_lowercase().contains("yes"));
    }

    #[test]
    fn no_resolves_with_decline_phrasing() {
        let turns = vec![ChatMessage::assistant("Want me to send the email now?")];
        let Resolution::Resolved(reply) = resolve("  NO  ", &turns) else {
            panic!("expected resolution");
        };
        assert!(reply.contains("send the email now?"));
        assert!(reply.to_lowercase().contains("no"));
    }

    #[test]
    fn question_turn_preferred_over_newer_statement() {
        let turns = vec![
            ChatMessage::assistant("Should I archive the old reports?"),
            ChatMessage::user("hmm"),
            ChatMessage::assistant("Archiving keeps them searchable."),
        ];
        let Resolution::Resolved(reply) = resolve("yes", &turns) else {
            panic!("expected resolution");
        };
        assert!(reply.contains("archive the old reports?"), "got: {reply}");
    }

    #[test]
    fn enumerated_options_count_as_a_question() {
        let turns = vec![ChatMessage::assistant(
            "Here are your options:\n1. retry the upload\n2. skip the file",
        )];
        let Resolution::Resolved(reply) = resolve("ok", &turns) else {
            panic!("expected resolution");
        };
        assert!(reply.contains("skip the file"), "got: {reply}");
    }

    #[test]
    fn falls_back_to_latest_assistant_turn_without_questions() {
        let turns = vec![
            ChatMessage::assistant("I finished indexing the wiki."),
            ChatMessage::assistant("The index covers 300 pages."),
        ];
        let Resolution::Resolved(reply) = resolve("ok", &turns) else {
            panic!("expected resolution");
        };
        assert!(reply.contains("The index covers 300 pages."));
    }

    #[test]
    fn empty_history_gets_generic_placeholder() {
        let Resolution::Resolved(reply) = resolve("yes", &[]) else {
            panic!("expected resolution");
        };
        assert!(reply.contains("not sure"), "got: {reply}");
    }

    #[test]
    fn long_proposition_is_truncated() {
        let long = "x".repeat(400);
        let turns = vec![ChatMessage::assistant(format!("Proceed with {long}?"))];
        let Resolution::Resolved(reply) = resolve("yes", &turns) else {
            panic!("expected resolution");
        };
        assert!(reply.contains('…'));
    }
}
