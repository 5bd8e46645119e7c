//! Tracing targets for the attribute layer.
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("attrsync::registry=debug,attrsync::module=info")
//!     .init();
//! ```

/// Target names for log filtering.
pub mod targets {
    /// Attribute role data target.
    pub const ATTRIBUTE: &str = "attrsync::attribute";
    /// Module change propagation, linking and menus target.
    pub const MODULE: &str = "attrsync::module";
    /// Central model registry target.
    pub const REGISTRY: &str = "attrsync::registry";
    /// Preference store target.
    pub const PREFERENCES: &str = "attrsync::preferences";
    /// Application bootstrap target.
    pub const APP: &str = "attrsync::app";
}

pub use attrsync_core::logging::{JsonTreeDebug, TreeFormatOptions, TreeStyle};
