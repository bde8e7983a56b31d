//! Scoped access to a document's state.
//!
//! * [`DocReader`]: shared access, which can be temporarily elevated to exclusive access.
//! * [`DocWriter`]: exclusive access, required for any change including undo and redo.
//! * [`DocDestroyer`]: exclusive access that ends by removing the document from its context.
//! * [`WeakDocReader`]: shared access for background work that never waits and steps aside as soon
//!   as a writer asks.
//!
//! Every guard releases what it acquired when dropped. Failing to acquire a lock within the timeout
//! is an ordinary, recoverable condition reported as a [`DocAccessError`].

use std::sync::Arc;
use std::time::Duration;

use super::lock::WeakLock;
use super::{DocState, Document, DocumentID};
use crate::context::Context;

type ReadGuard = parking_lot::ArcRwLockReadGuard<parking_lot::RawRwLock, DocState>;
type UpgradableGuard = parking_lot::ArcRwLockUpgradableReadGuard<parking_lot::RawRwLock, DocState>;
type WriteGuard = parking_lot::ArcRwLockWriteGuard<parking_lot::RawRwLock, DocState>;
type RwLock = parking_lot::RwLock<DocState>;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocAccessError {
    #[error("the document is busy with another operation, try again later")]
    CannotRead,
    #[error("the document is in use and cannot be modified right now, try again later")]
    CannotWrite,
    #[error("the document is read-only")]
    ReadOnly,
}

/// Shared read access to a document.
///
/// Any number of `DocReader`s (and a [`WeakDocReader`]) may coexist. A reader can be temporarily
/// elevated to exclusive access with [`Self::elevate_with`], which waits for every other reader to leave.
pub struct DocReader {
    id: DocumentID,
    state: Arc<RwLock>,
    // Vacant only for the duration of `elevate_with`.
    guard: Option<ReadGuard>,
    weak: Arc<WeakLock>,
}
impl DocReader {
    pub(super) fn new(doc: &Document, timeout: Duration) -> Result<Self, DocAccessError> {
        let Some(guard) = doc.state.try_read_arc_for(timeout) else {
            log::debug!("Timed out reading {}", doc.id);
            return Err(DocAccessError::CannotRead);
        };
        Ok(Self {
            id: doc.id,
            state: doc.state.clone(),
            guard: Some(guard),
            weak: doc.weak.clone(),
        })
    }
    #[must_use]
    pub fn id(&self) -> DocumentID {
        self.id
    }
    /// Temporarily upgrade to write access, and downgrade back to read access afterwards.
    ///
    /// Fails with [`DocAccessError::CannotWrite`] if another reader is elevating, or if other readers
    /// don't leave within `timeout`. In that case the read lock is still held and nothing happened.
    pub fn elevate_with<R>(
        &mut self,
        timeout: Duration,
        f: impl FnOnce(&mut DocWriter) -> R,
    ) -> Result<R, DocAccessError> {
        if self.guard.is_none() {
            return Err(DocAccessError::CannotWrite);
        }
        // Taken while still reading, so no writer can slip in between releasing the read lock and upgrading.
        let Some(upgradable) = self.state.try_upgradable_read_arc_for(timeout) else {
            log::debug!("Timed out elevating {}, another reader is elevating", self.id);
            return Err(DocAccessError::CannotWrite);
        };
        self.guard = None;
        self.weak.request_yield();
        match UpgradableGuard::try_upgrade_for(upgradable, timeout) {
            Ok(write) => {
                let mut writer = DocWriter {
                    id: self.id,
                    guard: write,
                };
                let result = f(&mut writer);
                // A transaction can't outlive the write access it was opened under.
                if writer.transaction.is_some() {
                    log::warn!("Elevated access to {} ended with an open transaction", self.id);
                    writer.rollback_transaction();
                }
                self.guard = Some(WriteGuard::downgrade(writer.guard));
                Ok(result)
            }
            Err(upgradable) => {
                log::debug!("Timed out elevating {} to write", self.id);
                self.guard = Some(UpgradableGuard::downgrade(upgradable));
                Err(DocAccessError::CannotWrite)
            }
        }
    }
}
impl std::ops::Deref for DocReader {
    type Target = DocState;
    fn deref(&self) -> &DocState {
        match &self.guard {
            Some(guard) => &**guard,
            // `elevate_with` always puts the guard back, unless the closure panicked, which
            // unwinds past every user of this reader.
            None => unreachable!("DocReader used while elevated"),
        }
    }
}

/// Exclusive access to a document.
pub struct DocWriter {
    id: DocumentID,
    guard: WriteGuard,
}
impl DocWriter {
    pub(super) fn new(doc: &Document, timeout: Duration) -> Result<Self, DocAccessError> {
        if doc.weak.request_yield() {
            log::trace!("Asked weak reader of {} to yield", doc.id);
        }
        let Some(guard) = doc.state.try_write_arc_for(timeout) else {
            log::debug!("Timed out writing {}", doc.id);
            return Err(DocAccessError::CannotWrite);
        };
        Ok(Self { id: doc.id, guard })
    }
    #[must_use]
    pub fn id(&self) -> DocumentID {
        self.id
    }
}
impl std::ops::Deref for DocWriter {
    type Target = DocState;
    fn deref(&self) -> &DocState {
        &self.guard
    }
}
impl std::ops::DerefMut for DocWriter {
    fn deref_mut(&mut self) -> &mut DocState {
        &mut self.guard
    }
}

/// Write access that ends by taking the document out of its context.
///
/// If neither [`Self::destroy_document`] nor [`Self::close_document`] is called, this is an
/// ordinary writer and dropping it just unlocks.
pub struct DocDestroyer<'ctx> {
    context: &'ctx Context,
    writer: DocWriter,
}
impl<'ctx> DocDestroyer<'ctx> {
    pub fn new(context: &'ctx Context, doc: &Document, timeout: Duration) -> Result<Self, DocAccessError> {
        Ok(Self {
            context,
            writer: DocWriter::new(doc, timeout)?,
        })
    }
    /// Remove the document for good. Unsaved work is excluded from future backups.
    pub fn destroy_document(mut self) {
        if self.writer.needs_backup() {
            self.writer.set_inhibit_backup(true);
        }
        let id = self.writer.id();
        let removed = self.context.remove_document(id);
        // Unlock before the last handle can go away.
        drop(self.writer);
        drop(removed);
        log::debug!("Destroyed {id}");
    }
    /// Remove the document from the context and hand it to the caller.
    #[must_use]
    pub fn close_document(self) -> Option<Arc<Document>> {
        let id = self.writer.id();
        let closed = self.context.remove_document(id);
        drop(self.writer);
        log::debug!("Closed {id}");
        closed
    }
}
impl std::ops::Deref for DocDestroyer<'_> {
    type Target = DocWriter;
    fn deref(&self) -> &DocWriter {
        &self.writer
    }
}
impl std::ops::DerefMut for DocDestroyer<'_> {
    fn deref_mut(&mut self) -> &mut DocWriter {
        &mut self.writer
    }
}

/// Opportunistic read access that never waits.
///
/// Only succeeds if no writer holds or awaits the lock. While held, a writer may ask it to let go,
/// so long work must poll [`Self::should_yield`] and drop the reader when it returns true.
pub struct WeakDocReader {
    guard: Option<ReadGuard>,
    weak: Arc<WeakLock>,
}
impl WeakDocReader {
    pub(super) fn new(doc: &Document) -> Self {
        let guard = if doc.weak.acquire() {
            let guard = doc.state.try_read_arc();
            if guard.is_none() {
                doc.weak.release();
            }
            guard
        } else {
            None
        };
        Self {
            guard,
            weak: doc.weak.clone(),
        }
    }
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.guard.is_some()
    }
    /// The document state, if the lock was taken.
    #[must_use]
    pub fn state(&self) -> Option<&DocState> {
        self.guard.as_deref()
    }
    /// A writer is waiting on this reader.
    #[must_use]
    pub fn should_yield(&self) -> bool {
        self.is_locked() && self.weak.should_yield()
    }
}
impl Drop for WeakDocReader {
    fn drop(&mut self) {
        if self.guard.take().is_some() {
            self.weak.release();
        }
    }
}
