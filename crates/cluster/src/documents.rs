//! In-memory book document store.

use std::collections::HashMap;
use std::sync::Arc;

use domain::{BookDocument, seed_documents};
use tokio::sync::RwLock;

/// Book documents keyed by title.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: Arc<RwLock<HashMap<String, BookDocument>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the bookstore's initial stock.
    pub fn seeded() -> Self {
        let documents = seed_documents()
            .into_iter()
            .map(|doc| (doc.title.clone(), doc))
            .collect();
        Self {
            documents: Arc::new(RwLock::new(documents)),
        }
    }

    pub async fn get(&self, title: &str) -> Option<BookDocument> {
        self.documents.read().await.get(title).cloned()
    }

    /// Inserts or replaces the document with the same title.
    pub async fn put(&self, document: BookDocument) {
        self.documents
            .write()
            .await
            .insert(document.title.clone(), document);
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
