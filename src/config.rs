//! Engine settings.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 15;
pub const ENROLLMENT_COMMENT: &str = "Initial pipeline assignment";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeline page size when the caller does not ask for one.
    pub default_page_size: usize,
    /// Comment written on the enrollment timeline row.
    pub enrollment_comment: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            enrollment_comment: ENROLLMENT_COMMENT.to_string(),
        }
    }
}
