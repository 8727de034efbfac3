// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic fallback rendering of tool results.
//!
//! Invoked only when the tool loop ends with empty final text but at least
//! one tool was executed: the model produced calls and then no closing
//! narration. This is a pure string rendering, never a model call.

use parley_core::types::ToolResult;

/// Broad category inferred from a tool's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolCategory {
    Informational,
    Generation,
    Communication,
    Other,
}

impl ToolCategory {
    fn of(tool_name: &str) -> Self {
        let name = tool_name.to_lowercase();
        let has = |prefixes: &[&str]| prefixes.iter().any(|p| name.contains(p));
        if has(&["search", "query", "lookup", "get", "list", "fetch", "read", "find"]) {
            Self::Informational
        } else if has(&["create", "generate", "write", "compose", "draft", "build"]) {
            Self::Generation
        } else if has(&["send", "email", "notify", "post", "message", "publish"]) {
            Self::Communication
        } else {
            Self::Other
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Informational => "Lookups",
            Self::Generation => "Content generation",
            Self::Communication => "Communication",
            Self::Other => "Other actions",
        }
    }
}

const CATEGORY_ORDER: [ToolCategory; 4] = [
    ToolCategory::Informational,
    ToolCategory::Generation,
    ToolCategory::Communication,
    ToolCategory::Other,
];

/// Renders a structured narrative from tool results.
///
/// Deterministic and side-effect-free: identical inputs always produce the
/// identical string.
pub fn synthesize(tool_results: &[ToolResult], original_query: &str) -> String {
    if tool_results.is_empty() {
        return format!(
            "I wasn't able to take any action on \"{}\".",
            condense_query(original_query)
        );
    }

    let mut lines = vec![format!(
        "Here's what I did for \"{}\":",
        condense_query(original_query)
    )];

    for category in CATEGORY_ORDER {
        let group: Vec<&ToolResult> = tool_results
            .iter()
            .filter(|r| ToolCategory::of(&r.name) == category)
            .collect();
        if group.is_empty() {
            continue;
        }
        let succeeded = group.iter().filter(|r| r.success).count();
        lines.push(format!(
            "\n{} ({} of {} succeeded):",
            category.label(),
            succeeded,
            group.len()
        ));
        for result in group {
            lines.push(render_result(result));
        }
    }

    lines.push(format!("\n{}", status_line(tool_results)));
    lines.join("\n")
}

fn render_result(result: &ToolResult) -> String {
    if result.success {
        match key_detail(result) {
            Some(detail) => format!("- {}: {}", result.name, detail),
            None => format!("- {}: completed", result.name),
        }
    } else {
        format!(
            "- {}: failed ({})",
            result.name,
            result.error.as_deref().unwrap_or("unknown error")
        )
    }
}

/// Pulls one recognizable field out of a success payload.
fn key_detail(result: &ToolResult) -> Option<String> {
    let payload = result.payload.as_ref()?.as_object()?;
    for field in ["count", "results", "id", "url", "status", "message"] {
        if let Some(value) = payload.get(field) {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Array(items) => format!("{} item(s)", items.len()),
                other => other.to_string(),
            };
            return Some(format!("{field} = {rendered}"));
        }
    }
    None
}

fn status_line(results: &[ToolResult]) -> String {
    let total = results.len();
    let succeeded = results.iter().filter(|r| r.success).count();
    if succeeded == total {
        format!("All {total} action(s) completed successfully.")
    } else if succeeded == 0 {
        format!("None of the {total} action(s) succeeded. You may want to try again.")
    } else {
        format!("{succeeded} of {total} action(s) succeeded; the rest failed as noted above.")
    }
}

fn condense_query(query: &str) -> String {
    const MAX: usize = 80;
    let trimmed = query.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        let truncated: String = trimmed.chars().take(MAX).collect();
        format!("{truncated}…")
    }
}
