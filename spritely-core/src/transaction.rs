//! # Transactions
//!
//! The live undo log of one top-level user action. A transaction is stored in the document state
//! while open, at most one per document, and is driven through a [`crate::tx::Tx`].
//!
//! A transaction is open for as long as it exists. It ends by being consumed: [`Transaction::commit`]
//! hands its commands to the undo history, [`Transaction::rollback`] reverts them.

use crate::commands::{Cmd, CmdSequence, CommandError};
use crate::history::{HistoryEntry, UndoHistory};
use crate::range::DocRange;
use crate::sprite::Sprite;

/// Whether committing marks the document as changed since it was last saved.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, strum::AsRefStr)]
pub enum Modification {
    #[default]
    ModifyDocument,
    /// The change is tracked for undo but is not worth saving, e.g. a selection change.
    NoModification,
}

#[derive(Debug)]
pub struct Transaction {
    label: String,
    modification: Modification,
    cmds: CmdSequence,
    old_range: Option<DocRange>,
    new_range: Option<DocRange>,
}
impl Transaction {
    pub(crate) fn new(label: String, modification: Modification) -> Self {
        log::debug!("Transaction {label:?} started");
        Self {
            label,
            modification,
            cmds: CmdSequence::new(),
            old_range: None,
            new_range: None,
        }
    }
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
    #[must_use]
    pub fn modification(&self) -> Modification {
        self.modification
    }
    /// Number of commands applied so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cmds.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }
    #[must_use]
    pub fn new_doc_range(&self) -> Option<&DocRange> {
        self.new_range.as_ref()
    }
    /// Selection to restore once this transaction is undone.
    pub fn set_old_doc_range(&mut self, range: DocRange) {
        self.old_range = Some(range);
    }
    /// Selection to restore after commit and after every redo.
    pub fn set_new_doc_range(&mut self, range: DocRange) {
        self.new_range = Some(range);
    }
    /// Apply a command and keep it in the log.
    ///
    /// If it fails, the command is dropped and the error returned. The transaction stays open, and
    /// everything applied before it is still rolled back if the transaction is not committed.
    pub(crate) fn execute(&mut self, cmd: Box<dyn Cmd>, sprite: &mut Sprite) -> Result<(), CommandError> {
        self.cmds.execute_and_add(cmd, sprite).map_err(|err| {
            log::debug!("Command in {:?} failed: {err}", self.label);
            err
        })
    }
    /// Finalize, moving the log into the history. Empty transactions leave no trace.
    /// Returns whether anything was recorded.
    pub(crate) fn commit(self, history: &mut UndoHistory) -> bool {
        log::debug!("Transaction {:?} committed with {} commands", self.label, self.cmds.len());
        if self.cmds.is_empty() {
            return false;
        }
        history.push(HistoryEntry::new(
            self.label,
            self.modification,
            self.cmds,
            self.old_range,
            self.new_range,
        ));
        true
    }
    /// Revert everything applied, newest first. Never fails: an undo error is logged and the
    /// remaining commands are still reverted.
    pub(crate) fn rollback(mut self, sprite: &mut Sprite) {
        self.undo_all(sprite);
    }
    /// Revert everything applied and continue with an empty log under the same label.
    pub(crate) fn rollback_and_start_again(&mut self, sprite: &mut Sprite) {
        self.undo_all(sprite);
        self.new_range = None;
    }
    fn undo_all(&mut self, sprite: &mut Sprite) {
        let count = self.cmds.len();
        if let Err(err) = self.cmds.rollback(sprite) {
            log::warn!("Rollback of {:?} was incomplete: {err}", self.label);
        } else {
            log::debug!("Transaction {:?} rolled back {count} commands", self.label);
        }
    }
}
