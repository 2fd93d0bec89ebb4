use crate::diff::text::is_unified;
use crate::diff::{Command, EditOperation};
use crate::tree::Node;

/// Format edit operations as plain text.
pub fn format_text(operations: &[EditOperation]) -> String {
    let mut lines = Vec::with_capacity(operations.len());
    for operation in operations {
        let path = &operation.path;
        let value = operation
            .value
            .as_ref()
            .map_or_else(|| "null".to_string(), Node::to_string);
        match operation.command {
            Command::Set => {
                let hunks = operation
                    .value
                    .as_ref()
                    .and_then(Node::text)
                    .filter(|text| is_unified(text));
                if let Some(hunks) = hunks {
                    lines.push(format!("~ {path}"));
                    lines.extend(hunks.lines().map(|line| format!("  {line}")));
                } else if let Some(old) = &operation.old {
                    lines.push(format!("~ {path}: {old} -> {value}"));
                } else {
                    lines.push(format!("~ {path} = {value}"));
                }
            }
            Command::Insert => lines.push(format!("+ {path} = {value}")),
            Command::Delete => lines.push(format!("- {path}")),
        }
    }
    lines.join("\n")
}

/// Format a simple summary of operation counts.
pub fn format_summary(operations: &[EditOperation]) -> String {
    let mut set = 0;
    let mut insert = 0;
    let mut delete = 0;

    for operation in operations {
        match operation.command {
            Command::Set => set += 1,
            Command::Insert => insert += 1,
            Command::Delete => delete += 1,
        }
    }

    format!("set={set} insert={insert} delete={delete}")
}
