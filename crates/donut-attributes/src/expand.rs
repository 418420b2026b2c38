//! Attribute value resolution against an [`Environment`].

use tracing::debug;

use crate::environment::Environment;
use crate::error::AttributeError;
use crate::properties::{parse, Attributes};

/// Drop every `$`, `{` and `}` from a value.
///
/// `${BRANCH}` and `BRANCH` both become `BRANCH`; `${A} and ${B}` becomes
/// `A and B`.
pub fn bare_name(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '$' | '{' | '}'))
        .collect()
}

/// Resolve a single attribute value.
///
/// If the value with placeholder punctuation stripped is exactly a variable
/// name, the whole value is replaced by that variable. Otherwise references
/// embedded in the original value are substituted, with undefined ones
/// becoming empty. A multi-token value such as `${A} and ${B}` therefore
/// never takes the first branch.
pub fn expand_value(value: &str, env: &Environment) -> String {
    match env.get(&bare_name(value)) {
        Some(resolved) => resolved.to_string(),
        None => env.expand(value),
    }
}

/// Resolve every parsed attribute. Keys are kept as they are.
pub fn expand(parsed: Attributes, env: &Environment) -> Attributes {
    parsed
        .into_iter()
        .map(|(name, value)| {
            let resolved = expand_value(&value, env);
            debug!(attribute = %name, "Resolved custom attribute");
            (name, resolved)
        })
        .collect()
}

/// Parse a raw attribute block and resolve it against `env`.
pub fn resolve(raw: &str, env: &Environment) -> Result<Attributes, AttributeError> {
    Ok(expand(parse(raw)?, env))
}
