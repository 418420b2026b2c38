//! Build manifest (`pom.xml`) property extraction.
//!
//! Only `/project/properties/*` is read. Each child element contributes one
//! property named after the element's local name.

use std::collections::BTreeMap;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::error::ManifestError;

/// File name of the manifest looked up in the build workspace.
pub const MANIFEST_FILE_NAME: &str = "pom.xml";

const ROOT_ELEMENT: &str = "project";
const PROPERTIES_ELEMENT: &str = "properties";

fn element_name(element: &BytesStart<'_>) -> Result<String, ManifestError> {
    let local = element.local_name();
    std::str::from_utf8(local.as_ref())
        .map(str::to_string)
        .map_err(|e| ManifestError::Xml(e.to_string()))
}

fn in_properties(path: &[String]) -> bool {
    path.len() == 2 && path[0] == ROOT_ELEMENT && path[1] == PROPERTIES_ELEMENT
}

/// Extract the declared properties from manifest XML.
///
/// A property declared twice keeps its last value.
pub fn parse_manifest_properties(xml: &str) -> Result<BTreeMap<String, String>, ManifestError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut properties = BTreeMap::new();
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<(String, String)> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                let name = element_name(&element)?;
                if path.is_empty() {
                    if saw_root || name != ROOT_ELEMENT {
                        return Err(ManifestError::UnexpectedRoot(name));
                    }
                    saw_root = true;
                }
                if in_properties(&path) {
                    current = Some((name.clone(), String::new()));
                }
                path.push(name);
            }
            Event::Empty(element) => {
                let name = element_name(&element)?;
                if path.is_empty() {
                    if saw_root || name != ROOT_ELEMENT {
                        return Err(ManifestError::UnexpectedRoot(name));
                    }
                    saw_root = true;
                } else if in_properties(&path) {
                    properties.insert(name, String::new());
                }
            }
            Event::Text(text) => {
                if path.len() == 3 {
                    if let Some((_, value)) = current.as_mut() {
                        value.push_str(&text.unescape()?);
                    }
                }
            }
            Event::CData(data) => {
                if path.len() == 3 {
                    if let Some((_, value)) = current.as_mut() {
                        let raw = std::str::from_utf8(&data)
                            .map_err(|e| ManifestError::Xml(e.to_string()))?;
                        value.push_str(raw);
                    }
                }
            }
            Event::End(_) => {
                path.pop();
                if in_properties(&path) {
                    if let Some((name, value)) = current.take() {
                        properties.insert(name, value.trim().to_string());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !path.is_empty() {
        return Err(ManifestError::Unclosed);
    }
    if !saw_root {
        return Err(ManifestError::Xml("document has no root element".to_string()));
    }

    Ok(properties)
}

/// Read the manifest at `path`.
///
/// Returns `Ok(None)` when the file is missing or cannot be read; only a
/// manifest that was read but does not parse is an error.
pub fn read_manifest_properties(
    path: &Path,
) -> Result<Option<BTreeMap<String, String>>, ManifestError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(manifest = %path.display(), "No manifest found");
            return Ok(None);
        }
        Err(e) => {
            warn!(manifest = %path.display(), error = %e, "Ignoring unreadable manifest");
            return Ok(None);
        }
    };

    let xml = String::from_utf8(bytes).map_err(|e| ManifestError::Xml(e.to_string()))?;
    parse_manifest_properties(&xml).map(Some)
}
