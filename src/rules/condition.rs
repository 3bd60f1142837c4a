//! Property conditions shared by exclusion and strip rules.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A predicate "the field at `path` equals `equals`".
///
/// `path` is a JSON pointer into the exported resource object, e.g.
/// `/properties/enablePriorityBasedExecution`. A missing field never matches,
/// so a rule conditional on `false` does not fire when the flag is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyCondition {
    /// JSON pointer to the inspected field
    pub path: String,
    /// Value the field must equal
    pub equals: Value,
}

impl PropertyCondition {
    /// Create a new condition.
    pub fn new(path: impl Into<String>, equals: Value) -> Self {
        Self {
            path: path.into(),
            equals,
        }
    }

    /// Evaluate against an exported resource object.
    #[must_use]
    pub fn matches(&self, resource: &Value) -> bool {
        resource.pointer(&self.path).is_some_and(|v| *v == self.equals)
    }
}

/// Remove the field at a JSON pointer. Returns the removed value.
pub(crate) fn remove_pointer(resource: &mut Value, pointer: &str) -> Option<Value> {
    let (parent, last) = pointer.rsplit_once('/')?;
    let key = last.replace("~1", "/").replace("~0", "~");
    let container = if parent.is_empty() {
        resource
    } else {
        resource.pointer_mut(parent)?
    };
    container.as_object_mut()?.remove(&key)
}
