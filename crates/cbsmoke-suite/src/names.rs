//! Names for the search index, design document and view a run creates

use uuid::Uuid;

/// Per-run artifact names. Each carries a short random suffix so concurrent
/// runs against one bucket do not collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    pub search_index: String,
    pub design_document: String,
    pub view: String,
}

impl ArtifactNames {
    pub fn generate() -> Self {
        Self {
            search_index: format!("idx-{}", short_id()),
            design_document: format!("dd-{}", short_id()),
            view: format!("view-{}", short_id()),
        }
    }

    /// Fixed names, for reproducible runs
    pub fn with_suffix(suffix: &str) -> Self {
        Self {
            search_index: format!("idx-{}", suffix),
            design_document: format!("dd-{}", suffix),
            view: format!("view-{}", suffix),
        }
    }
}

fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
