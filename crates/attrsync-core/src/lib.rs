//! Core systems for attrsync.
//!
//! This crate provides the foundational pieces the attribute synchronization
//! layer is built on:
//!
//! - **Tree**: ordered n-ary trees in a slot-map arena with stable node ids
//! - **JSON Trees**: lossless conversion between JSON documents and trees,
//!   plus JSON-pointer addressing of nodes
//! - **Actors**: thread-per-actor message processing with addresses,
//!   type-erased recipients and blocking request/response
//! - **Event Groups**: broadcast fan-out to sets of recipients
//! - **Timers**: rearmable single-shot deadlines for debouncing
//!
//! # Tree Example
//!
//! ```
//! use attrsync_core::json_tree::{json_to_tree, pointer_to_node, to_json, DEFAULT_CHILDREN_KEY};
//! use serde_json::json;
//!
//! let doc = json!({"name": "root", "children": [{"name": "a"}, {"name": "b"}]});
//! let tree = json_to_tree(&doc, DEFAULT_CHILDREN_KEY);
//! let b = pointer_to_node(&tree, DEFAULT_CHILDREN_KEY, "/children/1").unwrap();
//! assert_eq!(tree.data(b).unwrap()["name"], "b");
//! assert_eq!(to_json(&tree, DEFAULT_CHILDREN_KEY), doc);
//! ```

pub mod actor;
mod error;
pub mod group;
pub mod json_tree;
pub mod logging;
pub mod timer;
pub mod tree;

pub use actor::{
    Actor, ActorConfig, ActorHandle, ActorId, Addr, Context, Recipient, Reply, RequestTimeout,
    spawn,
};
pub use error::{ActorError, ActorResult};
pub use group::EventGroup;
pub use json_tree::{DEFAULT_CHILDREN_KEY, JsonTree};
pub use logging::{JsonTreeDebug, TreeFormatOptions, TreeStyle};
pub use timer::Debouncer;
pub use tree::{NodeId, Tree};
