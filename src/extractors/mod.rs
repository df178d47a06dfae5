// src/extractors/mod.rs
pub mod context;
pub mod heading;
pub mod section;
pub mod toc;

// Re-export key extraction types for convenience
pub use heading::HeadingRules;
pub use section::{LocatorOptions, SectionLocator};
pub use toc::{Scope, TableOfContents};
