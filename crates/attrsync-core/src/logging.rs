//! Logging and debugging facilities for attrsync.
//!
//! This module provides:
//! - Target names for filtering `tracing` output by subsystem
//! - A debug formatter for JSON model trees
//!
//! # Tracing Integration
//!
//! attrsync uses the `tracing` crate for instrumentation. To see logs,
//! install a subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("attrsync=debug,attrsync_core::actor=info")
//!     .init();
//! ```
//!
//! # Debug Visualization
//!
//! ```
//! use attrsync_core::json_tree::{json_to_tree, DEFAULT_CHILDREN_KEY};
//! use attrsync_core::logging::JsonTreeDebug;
//! use serde_json::json;
//!
//! let tree = json_to_tree(
//!     &json!({"name": "menu", "children": [{"name": "Loop"}]}),
//!     DEFAULT_CHILDREN_KEY,
//! );
//! let text = JsonTreeDebug::new().format(&tree, tree.root());
//! assert!(text.contains("Loop"));
//! ```

use std::fmt::Write as FmtWrite;

use serde_json::Value;

use crate::json_tree::JsonTree;
use crate::tree::NodeId;

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "attrsync_core";
    /// Tree and JSON tree target.
    pub const TREE: &str = "attrsync_core::tree";
    /// Actor runtime target.
    pub const ACTOR: &str = "attrsync_core::actor";
    /// Event group target.
    pub const GROUP: &str = "attrsync_core::group";
    /// Timer target.
    pub const TIMER: &str = "attrsync_core::timer";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Indentation only.
    Compact,
}

/// Configuration for JSON tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Payload keys tried in order to label a node.
    pub label_keys: Vec<String>,
    /// Whether to print the full payload after the label.
    pub show_payload: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level in compact style.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            label_keys: vec!["name".into(), "title".into(), "uuid".into()],
            show_payload: false,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Options that also print every payload.
    pub fn detailed() -> Self {
        Self {
            show_payload: true,
            ..Default::default()
        }
    }

    /// ASCII-only output.
    pub fn ascii() -> Self {
        Self {
            style: TreeStyle::Ascii,
            ..Default::default()
        }
    }
}

/// Pretty-printer for [`JsonTree`]s.
#[derive(Debug, Clone, Default)]
pub struct JsonTreeDebug {
    options: TreeFormatOptions,
}

impl JsonTreeDebug {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format the subtree rooted at `node`.
    pub fn format(&self, tree: &JsonTree, node: NodeId) -> String {
        let mut out = String::new();
        self.format_node(tree, node, "", true, 0, &mut out);
        out
    }

    fn label(&self, payload: &Value) -> String {
        for key in &self.options.label_keys {
            if let Some(v) = payload.get(key) {
                return match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
            }
        }
        match payload {
            Value::Object(map) if map.is_empty() => "{}".to_string(),
            Value::Object(_) => "{..}".to_string(),
            other => other.to_string(),
        }
    }

    fn format_node(
        &self,
        tree: &JsonTree,
        node: NodeId,
        prefix: &str,
        is_last: bool,
        depth: usize,
        out: &mut String,
    ) {
        let Some(payload) = tree.data(node) else {
            return;
        };

        let (branch, continuation) = match self.options.style {
            TreeStyle::Unicode => {
                if is_last {
                    ("└── ", "    ")
                } else {
                    ("├── ", "│   ")
                }
            }
            TreeStyle::Ascii => {
                if is_last {
                    ("`-- ", "    ")
                } else {
                    ("|-- ", "|   ")
                }
            }
            TreeStyle::Compact => ("", ""),
        };

        let _ = match self.options.style {
            TreeStyle::Compact => write!(
                out,
                "{}{}",
                " ".repeat(depth * self.options.indent_size),
                self.label(payload)
            ),
            _ if depth == 0 => write!(out, "{}", self.label(payload)),
            _ => write!(out, "{prefix}{branch}{}", self.label(payload)),
        };
        if self.options.show_payload {
            let _ = write!(out, " {payload}");
        }
        out.push('\n');

        if self.options.max_depth.is_some_and(|max| depth >= max) {
            return;
        }

        let child_prefix = if depth == 0 {
            String::new()
        } else {
            format!("{prefix}{continuation}")
        };
        let children = tree.children(node);
        for (i, &child) in children.iter().enumerate() {
            self.format_node(
                tree,
                child,
                &child_prefix,
                i + 1 == children.len(),
                depth + 1,
                out,
            );
        }
    }
}
