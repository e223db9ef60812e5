use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TracedeckError};
use crate::model::span::SpanRecord;

/// A span plus its ordered children. Derived per render from the flat
/// span set; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderedSpanNode {
    pub span: SpanRecord,
    pub children: Vec<OrderedSpanNode>,
}

/// Reconstruct the ordered forest for one trace from its flat,
/// unordered span set.
///
/// Sibling groups are sorted by `started_at` ascending; equal starts
/// keep their input order, so the same span set always renders the
/// same way. A span whose `parent_id` references no span in the input
/// is dropped along with its subtree (partially ingested traces are
/// tolerated, not rejected). Any cycle in the parent graph fails the
/// whole build with `MalformedTrace`.
pub fn build_forest(spans: &[SpanRecord]) -> Result<Vec<OrderedSpanNode>> {
    if spans.is_empty() {
        return Ok(Vec::new());
    }
    check_parent_chains(spans)?;

    let mut by_parent: HashMap<Option<String>, Vec<SpanRecord>> = HashMap::new();
    for span in spans {
        by_parent
            .entry(parent_key(span).map(str::to_string))
            .or_default()
            .push(span.clone());
    }
    for group in by_parent.values_mut() {
        // sort_by_key is stable, which is what keeps equal-start
        // siblings in input order
        group.sort_by_key(|s| s.started_at);
    }

    Ok(attach(&by_parent, None))
}

/// Depth-first flatten in render order.
pub fn flatten(forest: &[OrderedSpanNode]) -> Vec<&SpanRecord> {
    let mut out = Vec::new();
    let mut stack: Vec<&OrderedSpanNode> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(&node.span);
        stack.extend(node.children.iter().rev());
    }
    out
}

fn attach(
    by_parent: &HashMap<Option<String>, Vec<SpanRecord>>,
    parent: Option<&str>,
) -> Vec<OrderedSpanNode> {
    let Some(siblings) = by_parent.get(&parent.map(str::to_string)) else {
        return Vec::new();
    };
    siblings
        .iter()
        .map(|span| OrderedSpanNode {
            span: span.clone(),
            children: attach(by_parent, Some(span.span_id.as_str())),
        })
        .collect()
}

/// The SQLite tracer stores roots as NULL but has been seen writing
/// empty strings; both mean "no parent".
fn parent_key(span: &SpanRecord) -> Option<&str> {
    span.parent_id.as_deref().filter(|p| !p.is_empty())
}

/// Walk every span's ancestor chain once (memoized) and fail on any
/// chain that loops back on itself. After this check the recursive
/// attach in `build_forest` is guaranteed to terminate.
fn check_parent_chains(spans: &[SpanRecord]) -> Result<()> {
    let by_id: HashMap<&str, &SpanRecord> = spans
        .iter()
        .map(|s| (s.span_id.as_str(), s))
        .collect();

    let mut resolved: HashSet<&str> = HashSet::new();
    for span in spans {
        let mut path: Vec<&str> = Vec::new();
        let mut on_path: HashSet<&str> = HashSet::new();
        let mut cursor = span;
        loop {
            if resolved.contains(cursor.span_id.as_str()) {
                break;
            }
            if !on_path.insert(cursor.span_id.as_str()) {
                return Err(TracedeckError::MalformedTrace(format!(
                    "span {} is its own ancestor",
                    cursor.span_id
                )));
            }
            path.push(cursor.span_id.as_str());
            match parent_key(cursor).and_then(|p| by_id.get(p)) {
                Some(parent) => cursor = parent,
                // terminated at a root or at a dangling parent
                None => break,
            }
        }
        resolved.extend(path);
    }
    Ok(())
}
