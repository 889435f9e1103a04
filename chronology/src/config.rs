use std::path::PathBuf;

/// Where a chronology keeps its segments.
#[derive(Debug, Clone)]
pub struct ChronologyConfig {
    /// Store directory; `None` keeps the segments in memory.
    pub storage_path: Option<PathBuf>,
    /// Segment file name prefix.
    pub prefix: String,
}

impl Default for ChronologyConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            prefix: "chron".to_string(),
        }
    }
}
