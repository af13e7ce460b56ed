use serde::{Deserialize, Serialize};
use thiserror::Error;

use redraft_critic::DocumentContext;

/// A protected value present before a revision and absent after it
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Protected field '{field}' was altered (expected \"{value}\" verbatim)")]
pub struct ProtectedFieldViolation {
    pub field: String,
    pub value: String,
}

/// Check that every protected value found in `before` survives in `after`.
///
/// Values the original text never contained are not enforced, and empty
/// values are ignored. Fields are checked in name order; the first violation
/// is returned.
pub fn verify_protected_fields(
    context: &DocumentContext,
    before: &str,
    after: &str,
) -> Result<(), ProtectedFieldViolation> {
    for (field, value) in &context.protected_fields {
        if value.is_empty() || !before.contains(value.as_str()) {
            continue;
        }
        if !after.contains(value.as_str()) {
            return Err(ProtectedFieldViolation {
                field: field.clone(),
                value: value.clone(),
            });
        }
    }
    Ok(())
}
