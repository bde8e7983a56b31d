//! # Tx
//!
//! A scoped handle on the document's transaction. Opening a `Tx` on a document that already has a
//! transaction open joins it instead of starting a second one, so helpers can each wrap their edits in
//! their own `Tx` and still compose into a single undo entry. Only the `Tx` that opened the transaction
//! (the owner) can commit it, and dropping the owner without committing rolls everything back.

use std::time::Duration;

use crate::commands::{Cmd, CommandError};
use crate::document::{DocAccessError, DocWriter, Document};
use crate::range::DocRange;
use crate::sprite::Sprite;
use crate::transaction::Modification;

enum Writer<'w> {
    /// This `Tx` took the write lock itself, and releases it when dropped.
    Owned(DocWriter),
    /// The caller already holds the write lock.
    Borrowed(&'w mut DocWriter),
}
impl Writer<'_> {
    fn get(&self) -> &DocWriter {
        match self {
            Self::Owned(writer) => writer,
            Self::Borrowed(writer) => writer,
        }
    }
    fn get_mut(&mut self) -> &mut DocWriter {
        match self {
            Self::Owned(writer) => writer,
            Self::Borrowed(writer) => writer,
        }
    }
}

pub struct Tx<'w> {
    writer: Writer<'w>,
    owner: bool,
    committed: bool,
}
impl Tx<'static> {
    /// Lock the document for writing, then join or open its transaction.
    pub fn new(
        doc: &Document,
        label: &str,
        modification: Modification,
        timeout: Duration,
    ) -> Result<Self, DocAccessError> {
        let writer = doc.write(timeout)?;
        Self::start(Writer::Owned(writer), label, modification)
    }
}
impl<'w> Tx<'w> {
    /// Join or open a transaction under a write lock the caller already holds.
    pub fn with_writer(
        writer: &'w mut DocWriter,
        label: &str,
        modification: Modification,
    ) -> Result<Self, DocAccessError> {
        Self::start(Writer::Borrowed(writer), label, modification)
    }
    fn start(mut writer: Writer<'w>, label: &str, modification: Modification) -> Result<Self, DocAccessError> {
        let owner = writer.get_mut().begin_transaction(label, modification)?;
        Ok(Self {
            writer,
            owner,
            committed: false,
        })
    }
    /// Did this handle open the transaction?
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.owner
    }
    #[must_use]
    pub fn sprite(&self) -> &Sprite {
        self.writer.get().sprite()
    }
    /// The write access this transaction runs under, to open nested `Tx`s with.
    pub fn writer_mut(&mut self) -> &mut DocWriter {
        self.writer.get_mut()
    }
    /// Apply a command as part of the transaction.
    ///
    /// On failure the command is discarded, and the transaction is still open with everything before
    /// it applied.
    pub fn execute(&mut self, cmd: impl Cmd + 'static) -> Result<(), CommandError> {
        self.execute_boxed(Box::new(cmd))
    }
    pub fn execute_boxed(&mut self, cmd: Box<dyn Cmd>) -> Result<(), CommandError> {
        self.writer.get_mut().execute(cmd)
    }
    /// Selection to restore when the transaction is undone.
    pub fn set_old_doc_range(&mut self, range: DocRange) {
        self.writer.get_mut().set_old_doc_range(range);
    }
    /// Selection to restore after commit and redo.
    pub fn set_new_doc_range(&mut self, range: DocRange) {
        self.writer.get_mut().set_new_doc_range(range);
    }
    /// Undo everything done so far in the transaction, keeping it open.
    pub fn rollback_and_start_again(&mut self) {
        self.writer.get_mut().rollback_and_start_again();
    }
    /// Make the transaction permanent. Does nothing unless this handle is the owner, in which case the
    /// outermost scope decides.
    pub fn commit(mut self) {
        if self.owner {
            self.writer.get_mut().commit_transaction();
            self.committed = true;
        }
    }
}
impl Drop for Tx<'_> {
    fn drop(&mut self) {
        if self.owner && !self.committed {
            self.writer.get_mut().rollback_transaction();
        }
    }
}
