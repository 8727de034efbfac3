// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous heuristic conversation summarizer.
//!
//! Cheap enough to run inline on every save: word-frequency topics with a
//! stopword filter, lexicon-based sentiment, and a deterministic one-line
//! text. A richer summary may later replace it out of band; this one is
//! always written first.

use chrono::Utc;

use parley_core::types::{ChatMessage, ChatRole, ConversationSummary, Sentiment};

const MAX_TOPICS: usize = 5;
const SNIPPET_LEN: usize = 80;

const STOPWORDS: &[&str] = &[
    "about", "after", "again", "also", "been", "before", "being", "could", "does", "doing",
    "down", "each", "from", "have", "having", "here", "into", "just", "like", "more", "most",
    "only", "other", "over", "please", "same", "should", "some", "such", "than", "that", "them",
    "then", "there", "these", "they", "this", "those", "very", "want", "were", "what", "when",
    "where", "which", "while", "will", "with", "would", "your",
];

const POSITIVE_WORDS: &[&str] = &[
    "appreciate", "awesome", "excellent", "fantastic", "glad", "good", "great", "happy",
    "helpful", "love", "nice", "perfect", "thank", "thanks", "wonderful",
];

const NEGATIVE_WORDS: &[&str] = &[
    "angry", "annoyed", "awful", "bad", "broken", "confused", "disappointed", "error", "fail",
    "failed", "frustrated", "hate", "problem", "terrible", "unhappy", "wrong",
];

/// Produce the heuristic summary for a conversation's message history.
///
/// Deterministic for a fixed input: topic and sentiment extraction use only
/// the message text; the timestamp is the single non-pure component.
pub fn summarize(messages: &[ChatMessage]) -> ConversationSummary {
    let topics = extract_topics(messages);
    let sentiment = detect_sentiment(messages);
    let text = render_text(messages, &topics);

    ConversationSummary {
        text,
        topics,
        sentiment,
        created_at: Utc::now(),
    }
}

fn tokenize(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 4)
        .map(|w| w.to_lowercase())
}

/// Most frequent non-stopword terms across user and assistant turns.
///
/// Ties break alphabetically so repeated runs over the same history agree.
fn extract_topics(messages: &[ChatMessage]) -> Vec<String> {
    let mut counts: std::collections::BTreeMap<String, usize> = std::collections::BTreeMap::new();
    for message in messages {
        if !matches!(message.role, ChatRole::User | ChatRole::Assistant) {
            continue;
        }
        for word in tokenize(&message.content) {
            if STOPWORDS.contains(&word.as_str()) {
                continue;
            }
            *counts.entry(word).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    // BTreeMap iteration is alphabetical, so a stable sort by count keeps
    // the alphabetical order within equal counts.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .take(MAX_TOPICS)
        .map(|(word, _)| word)
        .collect()
}

/// Lexicon-based sentiment over user turns only.
///
/// Returns `None` when no lexicon word appears at all: absence of signal is
/// not neutrality.
fn detect_sentiment(messages: &[ChatMessage]) -> Option<Sentiment> {
    let mut positive = 0usize;
    let mut negative = 0usize;
    for message in messages {
        if message.role != ChatRole::User {
            continue;
        }
        for word in tokenize(&message.content) {
            if POSITIVE_WORDS.contains(&word.as_str()) {
                positive += 1;
            }
            if NEGATIVE_WORDS.contains(&word.as_str()) {
                negative += 1;
            }
        }
    }

    if positive == 0 && negative == 0 {
        return None;
    }
    Some(match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    })
}

fn render_text(messages: &[ChatMessage], topics: &[String]) -> String {
    let user_turns = messages.iter().filter(|m| m.role == ChatRole::User).count();
    let last_user = messages
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::User)
        .map(|m| snippet(&m.content));

    let mut text = format!(
        "Conversation of {} message(s) ({user_turns} from the user)",
        messages.len()
    );
    if !topics.is_empty() {
        text.push_str(&format!("; topics: {}", topics.join(", ")));
    }
    if let Some(last) = last_user {
        text.push_str(&format!("; latest user message: \"{last}\""));
    }
    text.push('.');
    text
}

fn snippet(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= SNIPPET_LEN {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(SNIPPET_LEN).collect();
    format!("{cut}...")
}
