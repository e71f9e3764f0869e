//! Registry entry synthesis, curated overrides, and artifact output.

mod artifact;
mod entry;
mod merge;

pub use artifact::{Manifest, sort_entries, write_artifacts};
pub use entry::{RegistryEntry, Variant, build_entry, extract_colorschemes};
pub use merge::{Overrides, apply_overrides};
