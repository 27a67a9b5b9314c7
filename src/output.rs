//! CLI output formatting for `check`, `gen` and `plugins`.
//!
//! # Information-First Display
//!
//! Output is a content inventory first and a file list second. Every node is
//! shown by its position in the walk and its path, with its own metadata
//! title as an indented context line, followed by the resources it directly
//! contains.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Nodes
//! 001 / (3 resources)
//!     Title: Scenario
//!     about.html (text)
//!     favicon.ico (binary)
//!     index.html (text)
//!     002 /a (3 resources)
//!         Title: Section A
//!         logo.png (binary)
//!         notes.txt (text)
//!         page.md (text)
//!         003 /a/b (1 resource)
//!             deep.html (text)
//!
//! 3 nodes, 5 text resources, 2 binary resources
//! ```
//!
//! ## Gen
//!
//! ```text
//! Generated site
//!     Nodes: 3
//!     about.html
//!     a/page.html
//!     a/b/deep.html (fresh)
//! Cache: 1 fresh, 2 rendered (3 total)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::session::GenerationReport;
use crate::source::ResourceKind;
use crate::tree::{ContentTree, NodeId};

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, singular: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {singular}s")
    }
}

/// Format a node header: positional index + rooted path + resource count.
///
/// ```text
/// 001 / (3 resources)
/// 002 /a/b (1 resource)
/// ```
fn node_header(index: usize, path: &str, resources: usize) -> String {
    format!(
        "{} /{} ({})",
        format_index(index),
        path,
        plural(resources, "resource")
    )
}

fn kind_label(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Text => "text",
        ResourceKind::Binary => "binary",
    }
}

// ============================================================================
// Check: content tree inventory
// ============================================================================

pub fn format_tree(tree: &ContentTree) -> Vec<String> {
    let mut lines = vec!["Nodes".to_string()];
    let mut index = 0;
    format_node(tree, tree.root().id, 0, &mut index, &mut lines);

    let text = tree.resources().filter(|r| r.is_text()).count();
    let binary = tree.resource_count() - text;
    lines.push(String::new());
    lines.push(format!(
        "{}, {}, {}",
        plural(tree.node_count(), "node"),
        plural(text, "text resource"),
        plural(binary, "binary resource")
    ));
    lines
}

fn format_node(
    tree: &ContentTree,
    id: NodeId,
    depth: usize,
    index: &mut usize,
    lines: &mut Vec<String>,
) {
    let node = tree.node(id);
    *index += 1;
    let path = node.path.to_string_lossy().replace('\\', "/");
    lines.push(format!(
        "{}{}",
        indent(depth),
        node_header(*index, &path, node.resources.len())
    ));

    if let Some(title) = node
        .meta
        .as_ref()
        .and_then(|m| m.get("title"))
        .and_then(|v| v.as_str())
    {
        lines.push(format!("{}Title: {}", indent(depth + 1), title));
    }
    for &rid in &node.resources {
        let resource = tree.resource(rid);
        lines.push(format!(
            "{}{} ({})",
            indent(depth + 1),
            resource.name(),
            kind_label(resource.kind)
        ));
    }
    for &child in &node.children {
        format_node(tree, child, depth + 1, index, lines);
    }
}

pub fn print_tree(tree: &ContentTree) {
    for line in format_tree(tree) {
        println!("{}", line);
    }
}

// ============================================================================
// Gen: generation report
// ============================================================================

pub fn format_report(report: &GenerationReport) -> Vec<String> {
    let mut lines = vec![format!("Generated {}", report.scope)];
    if report.nodes > 0 {
        lines.push(format!("{}Nodes: {}", indent(1), report.nodes));
    }
    for path in &report.written {
        lines.push(format!("{}{}", indent(1), path.display()));
    }
    for path in &report.fresh {
        lines.push(format!("{}{} (fresh)", indent(1), path.display()));
    }
    lines.push(format!("Cache: {}", report.cache_stats()));
    lines
}

pub fn print_report(report: &GenerationReport) {
    for line in format_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Plugins: registry listing
// ============================================================================

pub fn format_plugins<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut lines = vec!["Plugins".to_string()];
    lines.extend(ids.into_iter().map(|id| format!("{}{}", indent(1), id)));
    lines
}

pub fn print_plugins<'a>(ids: impl IntoIterator<Item = &'a str>) {
    for line in format_plugins(ids) {
        println!("{}", line);
    }
}
