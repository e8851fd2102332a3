mod inheritance;

pub use inheritance::{InheritanceViolation, ViolationKind, check_inheritance};

use crate::event::EventRecord;

/// Run the built-in design rules and render each finding as `rule: message`.
pub fn lint_builtin_rules(records: &[EventRecord]) -> Vec<String> {
    check_inheritance(records)
        .iter()
        .map(|violation| format!("inheritance: {violation}"))
        .collect()
}
