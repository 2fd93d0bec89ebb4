use crate::diff::EditOperation;

/// Format edit operations as JSON.
pub fn format_json(operations: &[EditOperation]) -> String {
    serde_json::to_string_pretty(operations).unwrap_or_else(|_| "[]".to_string())
}

/// Read edit operations written by [`format_json`].
pub fn parse_json(input: &str) -> Result<Vec<EditOperation>, serde_json::Error> {
    serde_json::from_str(input)
}
