//! # Context
//!
//! The set of open documents. It owns the documents, handing out shared handles to them, and is where
//! [`DocDestroyer`](crate::document::access::DocDestroyer) removes them from when they're closed.

use std::sync::Arc;

use crate::document::{Document, DocumentID};

#[derive(Default)]
pub struct Context {
    // Only write-locked when a document is opened or closed.
    documents: parking_lot::RwLock<hashbrown::HashMap<DocumentID, Arc<Document>>>,
}
impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Take ownership of a document, returning a handle to it.
    /// If a document with this ID is already open, that one is kept and returned instead.
    pub fn add_document(&self, document: Document) -> Arc<Document> {
        let id = document.id();
        match self.documents.write().entry(id) {
            hashbrown::hash_map::Entry::Occupied(o) => {
                log::warn!("{id} is already open");
                o.get().clone()
            }
            hashbrown::hash_map::Entry::Vacant(v) => {
                log::debug!("Opened {id}");
                v.insert(Arc::new(document)).clone()
            }
        }
    }
    #[must_use]
    pub fn document(&self, id: DocumentID) -> Option<Arc<Document>> {
        self.documents.read().get(&id).cloned()
    }
    /// Handles to every open document, in no particular order.
    #[must_use]
    pub fn documents(&self) -> Vec<Arc<Document>> {
        self.documents.read().values().cloned().collect()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
    /// Forget a document. Outstanding handles keep it alive until they're dropped.
    pub(crate) fn remove_document(&self, id: DocumentID) -> Option<Arc<Document>> {
        self.documents.write().remove(&id)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document::access::DocDestroyer;
    use crate::document::DEFAULT_LOCK_TIMEOUT;
    use crate::sprite::Sprite;
    use crate::transaction::Modification;
    use crate::tx::Tx;

    fn edited(context: &Context) -> Arc<Document> {
        let doc = context.add_document(Document::new("doc", Sprite::new(4, 4)));
        let mut tx = Tx::new(&doc, "resize", Modification::ModifyDocument, DEFAULT_LOCK_TIMEOUT).unwrap();
        tx.execute(crate::commands::SpriteCommand::SpriteResized {
            from: (4, 4),
            to: (8, 8),
        })
        .unwrap();
        tx.commit();
        doc
    }

    #[test]
    fn add_and_find() {
        let context = Context::new();
        assert!(context.is_empty());
        let a = context.add_document(Document::new("a", Sprite::new(1, 1)));
        let b = context.add_document(Document::new("b", Sprite::new(1, 1)));
        assert_eq!(context.len(), 2);
        assert!(Arc::ptr_eq(&context.document(a.id()).unwrap(), &a));
        assert!(Arc::ptr_eq(&context.document(b.id()).unwrap(), &b));
        assert_eq!(context.documents().len(), 2);
    }
    #[test]
    fn destroy_inhibits_backup() {
        let context = Context::new();
        let doc = edited(&context);
        let id = doc.id();
        DocDestroyer::new(&context, &doc, DEFAULT_LOCK_TIMEOUT)
            .unwrap()
            .destroy_document();
        assert!(context.document(id).is_none());
        // Still alive through our handle, unlocked, and excluded from backups.
        let reader = doc.read(DEFAULT_LOCK_TIMEOUT).unwrap();
        assert!(reader.needs_backup());
        assert!(reader.inhibit_backup());
    }
    #[test]
    fn close_hands_document_back() {
        let context = Context::new();
        let doc = edited(&context);
        let closed = DocDestroyer::new(&context, &doc, DEFAULT_LOCK_TIMEOUT)
            .unwrap()
            .close_document()
            .unwrap();
        assert!(Arc::ptr_eq(&closed, &doc));
        assert!(context.is_empty());
        assert!(!closed.read(DEFAULT_LOCK_TIMEOUT).unwrap().inhibit_backup());
    }
    #[test]
    fn destroyer_waits_for_readers() {
        let context = Context::new();
        let doc = edited(&context);
        let reader = doc.read(DEFAULT_LOCK_TIMEOUT).unwrap();
        assert_eq!(
            DocDestroyer::new(&context, &doc, std::time::Duration::ZERO).err(),
            Some(crate::document::DocAccessError::CannotWrite)
        );
        drop(reader);
        // Dropping without destroying just unlocks.
        drop(DocDestroyer::new(&context, &doc, DEFAULT_LOCK_TIMEOUT).unwrap());
        assert_eq!(context.len(), 1);
    }
}
