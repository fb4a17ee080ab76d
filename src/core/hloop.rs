//! Purpose: Rebuild hierarchical loop trees from flat HL parent references.
//! Exports: `LoopNode`, `LoopTree`, `reconstruct`.
//! Role: Runs once per sealed transaction set, over its body segments.
//! Invariants: Parents are declared before children (file order); no lookahead.
//! Invariants: Ownership stays in the tree; the id index is non-owning.
use std::collections::HashMap;

use crate::core::error::{Error, ErrorKind};
use crate::core::parse::Mode;
use crate::core::segment::Segment;
use crate::core::warning::Warning;

/// One hierarchical level: directly attached segments plus child loops,
/// both in encounter order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoopNode {
    pub id: String,
    pub level_code: String,
    pub segments: Vec<Segment>,
    pub children: Vec<LoopNode>,
}

/// Result of loop reconstruction for one transaction set body.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LoopTree {
    /// Segments appearing before the first HL segment.
    pub leading: Vec<Segment>,
    pub roots: Vec<LoopNode>,
    pub warnings: Vec<Warning>,
}

// Arena entry while the tree is under construction. Children always carry a
// larger arena index than their parent, since HL forbids forward references.
struct Entry {
    id: String,
    level_code: String,
    segments: Vec<Segment>,
    children: Vec<usize>,
}

pub fn reconstruct(body: Vec<Segment>, mode: Mode) -> Result<LoopTree, Error> {
    let mut entries: Vec<Entry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut leading: Vec<Segment> = Vec::new();
    let mut warnings: Vec<Warning> = Vec::new();
    let mut current: Option<usize> = None;

    for segment in body {
        if segment.id != "HL" {
            match current {
                Some(idx) => entries[idx].segments.push(segment),
                None => leading.push(segment),
            }
            continue;
        }

        let loop_id = segment.value(1).unwrap_or("").trim().to_string();
        let parent_id = segment.value(2).unwrap_or("").trim().to_string();
        let level_code = segment.value(3).unwrap_or("").trim().to_string();

        let duplicate = index.contains_key(&loop_id);
        if duplicate && mode == Mode::Strict {
            return Err(Error::new(ErrorKind::DuplicateLoopId)
                .with_message(format!("loop id {loop_id:?} declared twice"))
                .with_segment_index(segment.index)
                .with_offset(segment.offset));
        }

        let parent = if parent_id.is_empty() {
            None
        } else {
            match index.get(&parent_id) {
                Some(&idx) => Some(idx),
                None if mode == Mode::Strict => {
                    return Err(Error::new(ErrorKind::UnknownParentLoop)
                        .with_message(format!(
                            "loop {loop_id:?} references undeclared parent {parent_id:?}"
                        ))
                        .with_segment_index(segment.index)
                        .with_offset(segment.offset)
                        .with_hint("HL parents must be declared before their children."));
                }
                None => {
                    warnings.push(
                        Warning::new(
                            "unknown_parent_loop",
                            format!(
                                "loop {loop_id:?} references undeclared parent {parent_id:?}; \
                                 attached at top level"
                            ),
                        )
                        .with_segment_index(segment.index),
                    );
                    None
                }
            }
        };

        let idx = entries.len();
        entries.push(Entry {
            id: loop_id.clone(),
            level_code,
            segments: Vec::new(),
            children: Vec::new(),
        });
        if duplicate {
            warnings.push(
                Warning::new(
                    "duplicate_loop_id",
                    format!("loop id {loop_id:?} declared twice; attached at top level"),
                )
                .with_segment_index(segment.index),
            );
            roots.push(idx);
        } else {
            match parent {
                Some(parent_idx) => entries[parent_idx].children.push(idx),
                None => roots.push(idx),
            }
            index.insert(loop_id, idx);
        }
        current = Some(idx);
    }

    Ok(LoopTree {
        leading,
        roots: assemble(entries, &roots),
        warnings,
    })
}

// Fold the arena into owned nodes. Walking indices high-to-low guarantees a
// node's children are already built when the node itself is.
fn assemble(entries: Vec<Entry>, roots: &[usize]) -> Vec<LoopNode> {
    let mut built: Vec<Option<LoopNode>> = Vec::with_capacity(entries.len());
    let child_lists: Vec<Vec<usize>> = entries
        .iter()
        .map(|entry| entry.children.clone())
        .collect();
    for entry in entries {
        built.push(Some(LoopNode {
            id: entry.id,
            level_code: entry.level_code,
            segments: entry.segments,
            children: Vec::new(),
        }));
    }
    for idx in (0..built.len()).rev() {
        let children = child_lists[idx]
            .iter()
            .map(|&child| match built[child].take() {
                Some(node) => node,
                None => unreachable!("every index is linked exactly once"),
            })
            .collect();
        if let Some(node) = built[idx].as_mut() {
            node.children = children;
        }
    }
    roots
        .iter()
        .map(|&idx| match built[idx].take() {
            Some(node) => node,
            None => unreachable!("every index is linked exactly once"),
        })
        .collect()
}
