//! Error types for donut-attributes

use thiserror::Error;

/// Errors raised while turning a raw attribute block into key/value pairs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    /// The block could not be read as property syntax
    #[error("malformed custom attributes at line {line}: {reason}")]
    MalformedSpec { line: usize, reason: String },
}

/// Errors raised while reading properties out of a build manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The manifest is not well-formed UTF-8 XML
    #[error("malformed manifest XML: {0}")]
    Xml(String),

    /// The document root is something other than `<project>`
    #[error("expected <project> as manifest root, found <{0}>")]
    UnexpectedRoot(String),

    /// The document ended with open elements
    #[error("manifest ended before all elements were closed")]
    Unclosed,
}

impl From<quick_xml::Error> for ManifestError {
    fn from(err: quick_xml::Error) -> Self {
        ManifestError::Xml(err.to_string())
    }
}
