//! Serializable outline of a part tree, for listing and JSON output.

use serde::Serialize;

use crate::parser::part::Part;

/// One node of a part tree outline.
#[derive(Debug, Clone, Serialize)]
pub struct PartSummary {
    /// Dotted position in the tree (`"1"`, `"1.2"`); the root is `""`.
    pub path: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Decoded size for leaves, raw body size for multipart nodes.
    pub size: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PartSummary>,
}

impl PartSummary {
    /// Outline `part` and its descendants.
    pub fn from_part(part: &Part) -> Self {
        Self::at(part, String::new())
    }

    fn at(part: &Part, path: String) -> Self {
        let children = part
            .children()
            .iter()
            .enumerate()
            .map(|(i, child)| {
                let child_path = if path.is_empty() {
                    (i + 1).to_string()
                } else {
                    format!("{path}.{}", i + 1)
                };
                Self::at(child, child_path)
            })
            .collect();

        let size = if part.is_leaf() {
            part.content().len()
        } else {
            part.raw_body().len()
        };

        Self {
            path,
            mime_type: part.mime_type(),
            filename: part.filename(),
            content_id: part.content_id().map(str::to_string),
            encoding: part.transfer_encoding(),
            size: size as u64,
            children,
        }
    }

    /// Flatten into `(depth, node)` pairs in display order.
    pub fn flatten(&self) -> Vec<(usize, &PartSummary)> {
        let mut out = Vec::new();
        self.flatten_into(0, &mut out);
        out
    }

    fn flatten_into<'a>(&'a self, depth: usize, out: &mut Vec<(usize, &'a PartSummary)>) {
        out.push((depth, self));
        for child in &self.children {
            child.flatten_into(depth + 1, out);
        }
    }
}
