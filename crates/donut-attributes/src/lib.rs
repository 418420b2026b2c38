//! Donut Attributes: custom report attribute resolution
//!
//! Turns a user-authored `key=value` block into the attribute map handed to
//! the report generator:
//!
//! 1. [`parse`] escapes whitespace runs and reads the block with
//!    property-file rules.
//! 2. An [`Environment`] is assembled from the build environment and, for
//!    names it does not define, the `<properties>` of the workspace `pom.xml`.
//! 3. [`expand`] resolves each value: a value that is just a variable name
//!    (with or without `${}`) is replaced outright, anything else gets
//!    embedded `${NAME}` references substituted.
//!
//! Everything here is synchronous and side-effect free apart from reading
//! the manifest.

pub mod environment;
pub mod error;
pub mod expand;
pub mod manifest;
pub mod properties;

pub use environment::Environment;
pub use error::{AttributeError, ManifestError};
pub use expand::{bare_name, expand, expand_value, resolve};
pub use manifest::{parse_manifest_properties, read_manifest_properties, MANIFEST_FILE_NAME};
pub use properties::{escape_whitespace, parse, parse_properties, Attributes};
