use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The wire unit crossing the application boundary: `{"tag": ..., "data": ...}`.
///
/// `tag` selects the handler on the receiving side; `data` is an arbitrary
/// JSON payload whose shape the two ends agree on out of band. A missing
/// `data` field decodes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub tag: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(tag: impl Into<String>, data: Value) -> Self {
        Self {
            tag: tag.into(),
            data,
        }
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.tag, self.data)
    }
}
