//! History compaction: windowing and tool call/result pairing.

use std::collections::HashSet;

use pretty_assertions::assert_eq;
use serde_json::json;

use mcpchat::agent_loop::compact;
use mcpchat::types::{ContentBlock, Role, ToolResult, ToolUse, Turn};

fn tool_use(id: &str) -> ContentBlock {
    ContentBlock::ToolUse(ToolUse {
        id: id.to_string(),
        name: "fs__read".to_string(),
        arguments: json!({"path": "/tmp/x"}),
    })
}

fn tool_result(id: &str) -> ContentBlock {
    ContentBlock::ToolResult(ToolResult::error(id, "nope"))
}

fn ids(history: &[Turn]) -> (HashSet<String>, HashSet<String>) {
    let mut uses = HashSet::new();
    let mut results = HashSet::new();
    for turn in history {
        for block in &turn.content {
            match block {
                ContentBlock::ToolUse(u) => {
                    uses.insert(u.id.clone());
                }
                ContentBlock::ToolResult(r) => {
                    results.insert(r.tool_use_id.clone());
                }
                ContentBlock::Text { .. } => {}
            }
        }
    }
    (uses, results)
}

/// Deterministic pseudo-random history: text turns, tool calls, and results
/// that may or may not answer an earlier call.
fn generated_history(seed: u64, len: usize) -> Vec<Turn> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as usize
    };

    let mut history = Vec::with_capacity(len);
    let mut issued: Vec<String> = Vec::new();
    for i in 0..len {
        let turn = match next() % 4 {
            0 => Turn::user(format!("question {i}")),
            1 => Turn::assistant(format!("answer {i}")),
            2 => {
                let id = format!("t{i}");
                issued.push(id.clone());
                let mut content = vec![tool_use(&id)];
                if next() % 2 == 0 {
                    content.insert(0, ContentBlock::text("calling"));
                }
                Turn::new(Role::Assistant, content)
            }
            _ => {
                let id = if !issued.is_empty() && next() % 3 != 0 {
                    issued[next() % issued.len()].clone()
                } else {
                    format!("stray{i}")
                };
                Turn::new(Role::User, vec![tool_result(&id)])
            }
        };
        history.push(turn);
    }
    history
}

#[test]
fn unanswered_single_tool_use_compacts_to_nothing() {
    let history = vec![Turn::new(Role::Assistant, vec![tool_use("a")])];
    assert!(compact(&history, 1).is_empty());
}

#[test]
fn result_without_call_is_dropped_with_its_turn() {
    let history = vec![
        Turn::new(Role::User, vec![tool_result("ghost")]),
        Turn::assistant("hello"),
    ];
    let compacted = compact(&history, 10);
    assert_eq!(compacted.len(), 1);
    assert_eq!(compacted[0].text(), "hello");
}

#[test]
fn window_keeps_most_recent_turns() {
    let history: Vec<Turn> = (0..6).map(|i| Turn::user(format!("m{i}"))).collect();
    let compacted = compact(&history, 3);
    let texts: Vec<String> = compacted.iter().map(Turn::text).collect();
    assert_eq!(texts, vec!["m3", "m4", "m5"]);
}

#[test]
fn zero_window_empties_history() {
    let history = vec![Turn::user("a"), Turn::assistant("b")];
    assert!(compact(&history, 0).is_empty());
}

#[test]
fn compacted_histories_are_always_paired() {
    for seed in 0..200u64 {
        let history = generated_history(seed, 4 + (seed as usize % 20));
        for window in [1usize, 2, 3, 5, 8, 40] {
            let compacted = compact(&history, window);
            assert!(compacted.len() <= window);

            let (uses, results) = ids(&compacted);
            assert_eq!(uses, results, "seed {seed} window {window}");

            for turn in &compacted {
                if turn.role == Role::Assistant {
                    assert!(!turn.content.is_empty(), "seed {seed}: empty assistant turn kept");
                }
            }
        }
    }
}

#[test]
fn compaction_is_idempotent() {
    for seed in 0..50u64 {
        let history = generated_history(seed, 16);
        let once = compact(&history, 6);
        let twice = compact(&once, 6);
        assert_eq!(once, twice, "seed {seed}");
    }
}
