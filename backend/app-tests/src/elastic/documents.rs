use crate::utils::random_string;
use serde::{Deserialize, Serialize};

pub const DOCUMENT_TYPES: u32 = 10;
pub const BODY_LEN: usize = 15;

/// Synthetic document written by the index-and-search test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "type")]
    pub doc_type: u32,
    pub body: String,
}

/// Lazily yields exactly `total` documents, one at a time.
///
/// The i-th document has `type == i % 10` and a fresh random 15-character body.
#[derive(Debug)]
pub struct DocumentGenerator {
    next: usize,
    total: usize,
}

impl DocumentGenerator {
    pub fn new(total: usize) -> Self {
        Self { next: 0, total }
    }
}

impl Iterator for DocumentGenerator {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        if self.next >= self.total {
            return None;
        }
        let doc = Document {
            doc_type: (self.next % DOCUMENT_TYPES as usize) as u32,
            body: random_string(BODY_LEN),
        };
        self.next += 1;
        Some(doc)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DocumentGenerator {}

impl std::iter::FusedIterator for DocumentGenerator {}
