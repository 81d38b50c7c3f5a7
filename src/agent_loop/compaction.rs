//! History compaction that keeps tool calls paired with their results.

use std::collections::HashSet;

use crate::types::{ContentBlock, Role, Turn};

/// Trim `history` to its last `window` turns and drop unpaired tool blocks.
///
/// A `ToolUse` survives only if a later retained turn carries a `ToolResult`
/// for its id, and a `ToolResult` only if an earlier retained turn carries the
/// matching `ToolUse`. Pairing is positional, so a result cut loose by the
/// window is dropped even when a later call reuses its id. Assistant turns
/// left without blocks are removed; other turns are removed only when nothing
/// remains. Histories no longer than the window are not truncated but are
/// still filtered, so a well-formed short history comes back unchanged.
pub fn compact(history: &[Turn], window: usize) -> Vec<Turn> {
    let start = history.len().saturating_sub(window);
    let retained = &history[start..];

    // Ids answered by a result in some later turn, per turn.
    let mut answered_after: Vec<HashSet<&str>> = vec![HashSet::new(); retained.len()];
    let mut results_seen: HashSet<&str> = HashSet::new();
    for (idx, turn) in retained.iter().enumerate().rev() {
        answered_after[idx] = results_seen.clone();
        for block in &turn.content {
            if let ContentBlock::ToolResult(result) = block {
                results_seen.insert(result.tool_use_id.as_str());
            }
        }
    }

    let mut compacted = Vec::with_capacity(retained.len());
    let mut issued_before: HashSet<&str> = HashSet::new();
    for (idx, turn) in retained.iter().enumerate() {
        let had_text = turn.has_text();
        let content: Vec<ContentBlock> = turn
            .content
            .iter()
            .filter(|block| match block {
                ContentBlock::ToolUse(tool_use) => {
                    answered_after[idx].contains(tool_use.id.as_str())
                }
                ContentBlock::ToolResult(result) => {
                    issued_before.contains(result.tool_use_id.as_str())
                }
                ContentBlock::Text { .. } => true,
            })
            .cloned()
            .collect();
        for tool_use in turn.tool_uses() {
            issued_before.insert(tool_use.id.as_str());
        }

        let keep = match turn.role {
            Role::Assistant => !content.is_empty(),
            Role::User | Role::Tool => !content.is_empty() || had_text,
        };
        if keep {
            compacted.push(Turn {
                content,
                ..turn.clone()
            });
        }
    }

    if compacted.len() != history.len() {
        tracing::debug!(
            before = history.len(),
            after = compacted.len(),
            window,
            "compacted history"
        );
    }
    compacted
}
