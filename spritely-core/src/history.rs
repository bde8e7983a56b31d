//! # Undo history
//!
//! Committed transactions, stored as one entry each on an undo stack. Undoing moves the newest
//! entry to the redo stack, pushing a new entry forgets the redo stack.
//!
//! The history is bounded by entry count and by the approximate bytes held by the stored commands.
//! The oldest entries are evicted first, the newest entry is always kept.
//!
//! Every modifying entry is tagged with a fresh state number, and entries that don't modify the
//! document reuse the number of the entry below them. The document is unmodified whenever the
//! current state number equals the one recorded at the last save.

use std::collections::VecDeque;

use crate::commands::{Cmd, CmdSequence, CommandError};
use crate::range::DocRange;
use crate::sprite::Sprite;
use crate::transaction::Modification;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum number of undo entries. At least one entry is always kept.
    pub max_depth: usize,
    /// Maximum total bytes for all entries (0 = unlimited).
    pub max_bytes: usize,
}
impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: 1000,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug)]
pub struct HistoryEntry {
    label: String,
    modification: Modification,
    cmds: CmdSequence,
    old_range: Option<DocRange>,
    new_range: Option<DocRange>,
    state: u64,
    bytes: usize,
}
impl HistoryEntry {
    pub(crate) fn new(
        label: String,
        modification: Modification,
        cmds: CmdSequence,
        old_range: Option<DocRange>,
        new_range: Option<DocRange>,
    ) -> Self {
        let bytes = cmds.mem_size() + label.len();
        Self {
            label,
            modification,
            cmds,
            old_range,
            new_range,
            state: 0,
            bytes,
        }
    }
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// The outcome of a successful undo or redo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoStep {
    pub label: String,
    pub modification: Modification,
    /// Selection to restore, if the entry recorded one.
    pub range: Option<DocRange>,
}

#[derive(Debug)]
pub struct UndoHistory {
    config: HistoryConfig,
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    total_bytes: usize,
    /// State number below the oldest undo entry.
    base_state: u64,
    next_state: u64,
    saved_state: u64,
}
impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}
impl UndoHistory {
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            undo: VecDeque::new(),
            redo: Vec::new(),
            total_bytes: 0,
            base_state: 0,
            next_state: 1,
            saved_state: 0,
        }
    }
    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }
    /// Change limits, evicting immediately if the history no longer fits.
    pub fn set_config(&mut self, config: HistoryConfig) {
        self.config = config;
        self.enforce_limits();
    }
    fn current_state(&self) -> u64 {
        self.undo.back().map_or(self.base_state, |entry| entry.state)
    }
    pub(crate) fn push(&mut self, mut entry: HistoryEntry) {
        for dropped in self.redo.drain(..) {
            self.total_bytes = self.total_bytes.saturating_sub(dropped.bytes);
        }
        entry.state = match entry.modification {
            Modification::NoModification => self.current_state(),
            Modification::ModifyDocument => {
                let state = self.next_state;
                self.next_state += 1;
                state
            }
        };
        self.total_bytes += entry.bytes;
        self.undo.push_back(entry);
        self.enforce_limits();
    }
    fn enforce_limits(&mut self) {
        let over_depth = |this: &Self| this.undo.len() > this.config.max_depth.max(1);
        let over_bytes =
            |this: &Self| this.config.max_bytes > 0 && this.total_bytes > this.config.max_bytes;
        while self.undo.len() > 1 && (over_depth(self) || over_bytes(self)) {
            let Some(evicted) = self.undo.pop_front() else {
                break;
            };
            self.base_state = evicted.state;
            self.total_bytes = self.total_bytes.saturating_sub(evicted.bytes);
            log::debug!(
                "Evicted {:?} from undo history, {} retained",
                evicted.label,
                human_bytes::human_bytes(self.total_bytes as f64)
            );
        }
    }
    /// Revert the newest entry.
    ///
    /// `None` if there is nothing to undo. On error the entry stays on the undo stack.
    pub fn undo(&mut self, sprite: &mut Sprite) -> Option<Result<UndoStep, CommandError>> {
        let mut entry = self.undo.pop_back()?;
        log::debug!("Undo {:?}", entry.label);
        match entry.cmds.undo(sprite) {
            Ok(()) => {
                let step = UndoStep {
                    label: entry.label.clone(),
                    modification: entry.modification,
                    range: entry.old_range.clone(),
                };
                self.redo.push(entry);
                Some(Ok(step))
            }
            Err(err) => {
                log::error!("Undo of {:?} failed: {err}", entry.label);
                self.undo.push_back(entry);
                Some(Err(err))
            }
        }
    }
    /// Re-apply the most recently undone entry.
    ///
    /// `None` if there is nothing to redo. On error the entry stays on the redo stack.
    pub fn redo(&mut self, sprite: &mut Sprite) -> Option<Result<UndoStep, CommandError>> {
        let mut entry = self.redo.pop()?;
        log::debug!("Redo {:?}", entry.label);
        match entry.cmds.redo(sprite) {
            Ok(()) => {
                let step = UndoStep {
                    label: entry.label.clone(),
                    modification: entry.modification,
                    range: entry.new_range.clone(),
                };
                self.undo.push_back(entry);
                Some(Ok(step))
            }
            Err(err) => {
                log::error!("Redo of {:?} failed: {err}", entry.label);
                self.redo.push(entry);
                Some(Err(err))
            }
        }
    }
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
    #[must_use]
    pub fn undo_label(&self) -> Option<&str> {
        self.undo.back().map(HistoryEntry::label)
    }
    #[must_use]
    pub fn redo_label(&self) -> Option<&str> {
        self.redo.last().map(HistoryEntry::label)
    }
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }
    /// Approximate bytes held by all entries.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.total_bytes
    }
    /// Record the current state as the saved one.
    pub fn mark_saved(&mut self) {
        self.saved_state = self.current_state();
    }
    #[must_use]
    pub fn is_saved(&self) -> bool {
        self.saved_state == self.current_state()
    }
    /// Forget every entry. The current state is kept, so saved-ness is unaffected.
    pub fn clear(&mut self) {
        self.base_state = self.current_state();
        self.undo.clear();
        self.redo.clear();
        self.total_bytes = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::commands::SpriteCommand;

    fn duration_entry(label: &str, modification: Modification, from: u32, to: u32) -> HistoryEntry {
        let mut cmds = CmdSequence::new();
        cmds.add(Box::new(SpriteCommand::FrameDurationChanged { frame: 0, from, to }));
        HistoryEntry::new(label.to_owned(), modification, cmds, None, None)
    }
    /// Apply and record a duration change, the way a commit would.
    fn commit(history: &mut UndoHistory, sprite: &mut Sprite, label: &str, to: u32) {
        let from = sprite.frame_duration(0).unwrap();
        let mut entry = duration_entry(label, Modification::ModifyDocument, from, to);
        entry.cmds.execute(sprite).unwrap();
        history.push(entry);
    }

    #[test]
    fn undo_enables_redo() {
        let mut sprite = Sprite::new(1, 1);
        let mut history = UndoHistory::default();
        assert!(history.undo(&mut sprite).is_none());
        commit(&mut history, &mut sprite, "a", 5);
        commit(&mut history, &mut sprite, "b", 6);
        assert_eq!(history.undo_label(), Some("b"));

        let step = history.undo(&mut sprite).unwrap().unwrap();
        assert_eq!(step.label, "b");
        assert_eq!(sprite.frame_duration(0), Some(5));
        assert!(history.can_redo());
        assert_eq!(history.redo_label(), Some("b"));

        history.redo(&mut sprite).unwrap().unwrap();
        assert_eq!(sprite.frame_duration(0), Some(6));
        assert!(!history.can_redo());
    }
    #[test]
    fn push_clears_redo() {
        let mut sprite = Sprite::new(1, 1);
        let mut history = UndoHistory::default();
        commit(&mut history, &mut sprite, "a", 5);
        history.undo(&mut sprite).unwrap().unwrap();
        commit(&mut history, &mut sprite, "b", 7);
        assert!(!history.can_redo());
        assert_eq!(history.undo_depth(), 1);
    }
    #[test]
    fn max_depth_evicts_oldest() {
        let mut sprite = Sprite::new(1, 1);
        let mut history = UndoHistory::new(HistoryConfig {
            max_depth: 2,
            max_bytes: 0,
        });
        for (idx, label) in ["a", "b", "c"].into_iter().enumerate() {
            commit(&mut history, &mut sprite, label, idx as u32 + 1);
        }
        assert_eq!(history.undo_depth(), 2);
        history.undo(&mut sprite).unwrap().unwrap();
        history.undo(&mut sprite).unwrap().unwrap();
        assert!(history.undo(&mut sprite).is_none());
        // "a" is out of reach.
        assert_eq!(sprite.frame_duration(0), Some(1));
    }
    #[test]
    fn byte_limit_keeps_newest() {
        let mut sprite = Sprite::new(1, 1);
        let mut history = UndoHistory::new(HistoryConfig {
            max_depth: 100,
            max_bytes: 1,
        });
        commit(&mut history, &mut sprite, "a", 5);
        commit(&mut history, &mut sprite, "b", 6);
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.undo_label(), Some("b"));
        assert!(history.memory_usage() > 0);
    }
    #[test]
    fn saved_state_tracking() {
        let mut sprite = Sprite::new(1, 1);
        let mut history = UndoHistory::default();
        assert!(history.is_saved());
        commit(&mut history, &mut sprite, "a", 5);
        assert!(!history.is_saved());
        history.mark_saved();
        assert!(history.is_saved());

        history.undo(&mut sprite).unwrap().unwrap();
        assert!(!history.is_saved());
        history.redo(&mut sprite).unwrap().unwrap();
        assert!(history.is_saved());

        // Non-modifying entries don't move away from the saved state.
        let mut entry = duration_entry("select", Modification::NoModification, 5, 5);
        entry.cmds.execute(&mut sprite).unwrap();
        history.push(entry);
        assert!(history.is_saved());

        // Branching away from the saved state makes it unreachable.
        history.undo(&mut sprite).unwrap().unwrap();
        history.undo(&mut sprite).unwrap().unwrap();
        commit(&mut history, &mut sprite, "b", 9);
        history.undo(&mut sprite).unwrap().unwrap();
        assert!(!history.is_saved());
    }
    #[test]
    fn failed_undo_stays() {
        let mut sprite = Sprite::new(1, 1);
        let mut history = UndoHistory::default();
        commit(&mut history, &mut sprite, "a", 5);
        // Tamper with the sprite behind the history's back.
        sprite.set_frame_duration(0, 42);
        assert!(matches!(
            history.undo(&mut sprite),
            Some(Err(CommandError::MismatchedState))
        ));
        assert!(history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(sprite.frame_duration(0), Some(42));
    }
}
