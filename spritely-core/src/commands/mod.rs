//! # Commands
//!
//! Every change to a sprite owned by a document goes through a [`Cmd`]. A `Cmd` is executed exactly once
//! and may then be undone and redone any number of times, in strict alternation. Commands are grouped
//! into a [`CmdSequence`], which is what transactions and the undo history store.

pub use crate::sprite::commands::Command as SpriteCommand;

use crate::sprite::Sprite;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("command constructed for a state that does not match the current state")]
    MismatchedState,
    #[error("resource referenced by the command is not found")]
    UnknownResource,
    #[error("command makes no changes")]
    NoOp,
    #[error("frame or child index out of range")]
    OutOfRange,
}
pub trait CommandConsumer<C> {
    /// Apply a single command. If this generates an error,
    /// the state of `self` should *not* be observably changed.
    fn apply(&mut self, command: DoUndo<'_, C>) -> Result<(), CommandError>;
}

#[derive(PartialEq, Eq, Debug)]
pub enum DoUndo<'c, T> {
    Do(&'c T),
    Undo(&'c T),
}

/// One undoable change.
///
/// Implementors that fail must leave the sprite exactly as it was before the call.
pub trait Cmd: std::fmt::Debug + Send + Sync {
    /// Apply for the first time. Called once per instance.
    fn execute(&mut self, sprite: &mut Sprite) -> Result<(), CommandError>;
    fn undo(&mut self, sprite: &mut Sprite) -> Result<(), CommandError>;
    /// Re-apply after an undo. Most commands redo by executing again.
    fn redo(&mut self, sprite: &mut Sprite) -> Result<(), CommandError> {
        self.execute(sprite)
    }
    /// Approximate bytes retained while this command is held by an undo history.
    fn mem_size(&self) -> usize;
}

impl Cmd for SpriteCommand {
    fn execute(&mut self, sprite: &mut Sprite) -> Result<(), CommandError> {
        log::trace!("Do {}", self.as_ref());
        sprite.apply(DoUndo::Do(self))
    }
    fn undo(&mut self, sprite: &mut Sprite) -> Result<(), CommandError> {
        log::trace!("Undo {}", self.as_ref());
        sprite.apply(DoUndo::Undo(self))
    }
    fn mem_size(&self) -> usize {
        SpriteCommand::mem_size(self)
    }
}

/// An ordered group of commands, applied and reverted as one.
#[derive(Debug, Default)]
pub struct CmdSequence {
    cmds: smallvec::SmallVec<[Box<dyn Cmd>; 4]>,
}
impl CmdSequence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Append a command without applying it. It will be run by [`Cmd::execute`] on the sequence.
    pub fn add(&mut self, cmd: Box<dyn Cmd>) {
        self.cmds.push(cmd);
    }
    /// Execute a command and, if it succeeded, append it as already-applied.
    /// On failure, the command is dropped and the error returned. Commands before it stay applied.
    pub fn execute_and_add(
        &mut self,
        mut cmd: Box<dyn Cmd>,
        sprite: &mut Sprite,
    ) -> Result<(), CommandError> {
        cmd.execute(sprite)?;
        self.cmds.push(cmd);
        Ok(())
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.cmds.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }
    /// Undo every applied command, newest first, and forget them.
    ///
    /// Continues past failures so as much as possible is reverted. Returns the first error, if any.
    pub fn rollback(&mut self, sprite: &mut Sprite) -> Result<(), CommandError> {
        let mut first_err = None;
        while let Some(mut cmd) = self.cmds.pop() {
            if let Err(e) = cmd.undo(sprite) {
                log::error!("failed to undo {cmd:?}: {e}");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
    /// Run `step` over `cmds[range]` in order. On failure at some index, `unwind` is applied to the
    /// already-stepped commands in the opposite order.
    fn run_atomic(
        cmds: &mut [Box<dyn Cmd>],
        sprite: &mut Sprite,
        reversed: bool,
        step: fn(&mut dyn Cmd, &mut Sprite) -> Result<(), CommandError>,
        unwind: fn(&mut dyn Cmd, &mut Sprite) -> Result<(), CommandError>,
    ) -> Result<(), CommandError> {
        let order: either::Either<_, _> = if reversed {
            either::Either::Right((0..cmds.len()).rev())
        } else {
            either::Either::Left(0..cmds.len())
        };
        let mut done = Vec::with_capacity(cmds.len());
        for idx in order {
            if let Err(e) = step(cmds[idx].as_mut(), sprite) {
                for &undo_idx in done.iter().rev() {
                    let cmd: &mut Box<dyn Cmd> = &mut cmds[undo_idx];
                    if let Err(unwind_err) = unwind(cmd.as_mut(), sprite) {
                        log::error!("failed to unwind {cmd:?}: {unwind_err}");
                    }
                }
                return Err(e);
            }
            done.push(idx);
        }
        Ok(())
    }
}
impl Cmd for CmdSequence {
    fn execute(&mut self, sprite: &mut Sprite) -> Result<(), CommandError> {
        Self::run_atomic(&mut self.cmds, sprite, false, |c, s| c.execute(s), |c, s| c.undo(s))
    }
    fn undo(&mut self, sprite: &mut Sprite) -> Result<(), CommandError> {
        Self::run_atomic(&mut self.cmds, sprite, true, |c, s| c.undo(s), |c, s| c.redo(s))
    }
    fn redo(&mut self, sprite: &mut Sprite) -> Result<(), CommandError> {
        Self::run_atomic(&mut self.cmds, sprite, false, |c, s| c.redo(s), |c, s| c.undo(s))
    }
    fn mem_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.cmds.iter().map(|cmd| cmd.mem_size()).sum::<usize>()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::sprite::{Cel, Image, Layer};

    /// Succeeds or fails on demand, without touching the sprite.
    #[derive(Debug)]
    pub(crate) struct Failing;
    impl Cmd for Failing {
        fn execute(&mut self, _: &mut Sprite) -> Result<(), CommandError> {
            Err(CommandError::MismatchedState)
        }
        fn undo(&mut self, _: &mut Sprite) -> Result<(), CommandError> {
            Err(CommandError::MismatchedState)
        }
        fn mem_size(&self) -> usize {
            0
        }
    }

    fn sprite() -> (Sprite, crate::sprite::LayerID) {
        let mut sprite = Sprite::new(2, 2);
        sprite.set_total_frames(2);
        let layer = sprite.add_layer(None, Layer::image("l")).unwrap();
        (sprite, layer)
    }
    fn set_cel(layer: crate::sprite::LayerID, frame: i32) -> Box<dyn Cmd> {
        Box::new(SpriteCommand::CelReplaced {
            layer,
            frame,
            from: None,
            to: Some(Cel::new(Image::new(2, 2))),
        })
    }

    #[test]
    fn sequence_undo_redo_involution() {
        let (mut sprite, layer) = sprite();
        let initial = sprite.clone();
        let mut seq = CmdSequence::new();
        seq.add(set_cel(layer, 0));
        seq.add(Box::new(SpriteCommand::CelsSwapped { layer, a: 0, b: 1 }));
        seq.add(Box::new(SpriteCommand::FrameDurationChanged {
            frame: 1,
            from: 100,
            to: 5,
        }));
        seq.execute(&mut sprite).unwrap();
        let applied = sprite.clone();
        assert!(sprite.cel(layer, 1).is_some());
        assert!(sprite.cel(layer, 0).is_none());

        for _ in 0..3 {
            seq.undo(&mut sprite).unwrap();
            assert_eq!(sprite, initial);
            seq.redo(&mut sprite).unwrap();
            assert_eq!(sprite, applied);
        }
    }
    #[test]
    fn sequence_execute_is_atomic() {
        let (mut sprite, layer) = sprite();
        let initial = sprite.clone();
        let mut seq = CmdSequence::new();
        seq.add(set_cel(layer, 0));
        seq.add(set_cel(layer, 1));
        seq.add(Box::new(Failing));
        assert_eq!(seq.execute(&mut sprite), Err(CommandError::MismatchedState));
        assert_eq!(sprite, initial);
    }
    #[test]
    fn failed_add_is_dropped() {
        let (mut sprite, layer) = sprite();
        let mut seq = CmdSequence::new();
        seq.execute_and_add(set_cel(layer, 0), &mut sprite).unwrap();
        assert!(seq.execute_and_add(Box::new(Failing), &mut sprite).is_err());
        assert_eq!(seq.len(), 1);
        // The earlier command is still applied and can be rolled back.
        assert!(sprite.cel(layer, 0).is_some());
        seq.rollback(&mut sprite).unwrap();
        assert!(sprite.cel(layer, 0).is_none());
        assert!(seq.is_empty());
    }
    #[test]
    fn empty_sequence() {
        let (mut sprite, _) = sprite();
        let mut seq = CmdSequence::new();
        seq.execute(&mut sprite).unwrap();
        seq.undo(&mut sprite).unwrap();
        seq.redo(&mut sprite).unwrap();
        assert!(seq.mem_size() >= std::mem::size_of::<CmdSequence>());
    }
}
