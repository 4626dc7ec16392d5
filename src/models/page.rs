use std::fmt;

use serde::{Deserialize, Serialize};

/// A physical notebook page: the smartpen book id plus the page number inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRef {
    pub book_id: String,
    pub page: u32,
}

impl PageRef {
    pub fn new(book_id: impl Into<String>, page: u32) -> Self {
        Self {
            book_id: book_id.into(),
            page,
        }
    }

    /// Knowledge-base page title, e.g. `Smartpen Data/B3017/P42`.
    pub fn page_name(&self, prefix: &str) -> String {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            self.to_string()
        } else {
            format!("{prefix}/{self}")
        }
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}/P{}", self.book_id, self.page)
    }
}
