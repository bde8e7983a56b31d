//! # Document API
//!
//! Higher level edits, each expressed as one or more [`SpriteCommand`]s pushed into an open [`Tx`].
//! Every operation here is individually undoable, and composes with whatever else the transaction
//! holds. Operations that would change nothing push nothing.

use crate::commands::{CommandError, SpriteCommand};
use crate::sprite::{Cel, Frame, Layer, LayerFlags, LayerID, LayerSubtree, Sprite, Tag, TagID};
use crate::tx::Tx;

/// How frame tags react to frames being inserted or removed near their bounds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, strum::AsRefStr)]
pub enum TagsHandling {
    /// Leave every tag as-is.
    DontAdjust,
    /// A frame inserted right after a tag's end extends the tag.
    #[default]
    Default,
    /// Frames dropped at a tag's edges land inside the tag.
    FitInside,
    /// Frames dropped at a tag's edges land outside the tag.
    FitOutside,
}

/// Which side of the target frame a frame is dropped on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, strum::AsRefStr)]
pub enum DropFramePlace {
    Before,
    After,
}

pub struct DocApi<'t, 'w> {
    tx: &'t mut Tx<'w>,
}
impl<'t, 'w> DocApi<'t, 'w> {
    pub fn new(tx: &'t mut Tx<'w>) -> Self {
        Self { tx }
    }
    #[must_use]
    pub fn sprite(&self) -> &Sprite {
        self.tx.sprite()
    }
    fn run(&mut self, command: SpriteCommand) -> Result<(), CommandError> {
        self.tx.execute(command)
    }

    pub fn set_sprite_size(&mut self, width: u32, height: u32) -> Result<(), CommandError> {
        let from = self.sprite().size();
        let to = (width, height);
        if from == to {
            return Ok(());
        }
        self.run(SpriteCommand::SpriteResized { from, to })
    }

    // ===== Frames =====

    /// Grow or shrink to exactly `frames` frames (at least one). Added frames are empty and copy the
    /// duration of the last frame, removed frames take their cels with them. Tags are untouched.
    pub fn set_total_frames(&mut self, frames: Frame) -> Result<(), CommandError> {
        let frames = frames.max(1);
        while self.sprite().total_frames() < frames {
            let frame = self.sprite().total_frames();
            let duration = self
                .sprite()
                .frame_duration(frame - 1)
                .unwrap_or(crate::sprite::DEFAULT_FRAME_DURATION);
            self.run(SpriteCommand::FrameInserted {
                frame,
                duration,
                cels: Vec::new(),
            })?;
        }
        while self.sprite().total_frames() > frames {
            let frame = self.sprite().last_frame();
            self.remove_frame_column(frame)?;
        }
        Ok(())
    }
    pub fn set_frame_duration(&mut self, frame: Frame, msecs: u32) -> Result<(), CommandError> {
        let from = self
            .sprite()
            .frame_duration(frame)
            .ok_or(CommandError::OutOfRange)?;
        if from == msecs {
            return Ok(());
        }
        self.run(SpriteCommand::FrameDurationChanged {
            frame,
            from,
            to: msecs,
        })
    }
    /// Insert an empty frame at `new_frame`, with the duration of the frame before it.
    pub fn add_empty_frame(&mut self, new_frame: Frame) -> Result<(), CommandError> {
        if new_frame < 0 || new_frame > self.sprite().total_frames() {
            return Err(CommandError::OutOfRange);
        }
        let duration = self
            .sprite()
            .frame_duration(new_frame - 1)
            .or_else(|| self.sprite().frame_duration(new_frame))
            .unwrap_or(crate::sprite::DEFAULT_FRAME_DURATION);
        self.run(SpriteCommand::FrameInserted {
            frame: new_frame,
            duration,
            cels: Vec::new(),
        })?;
        self.adjust_tags(new_frame, 1, DropFramePlace::Before, TagsHandling::Default)
    }
    /// Insert a copy of the frame before `new_frame` at `new_frame`.
    pub fn add_frame(&mut self, new_frame: Frame) -> Result<(), CommandError> {
        self.copy_frame(
            new_frame - 1,
            new_frame,
            DropFramePlace::Before,
            TagsHandling::Default,
        )
    }
    pub fn remove_frame(&mut self, frame: Frame) -> Result<(), CommandError> {
        self.remove_frame_column(frame)?;
        self.adjust_tags(frame, -1, DropFramePlace::Before, TagsHandling::Default)
    }
    fn remove_frame_column(&mut self, frame: Frame) -> Result<(), CommandError> {
        let duration = self
            .sprite()
            .frame_duration(frame)
            .ok_or(CommandError::OutOfRange)?;
        let cels = self.sprite().cels_at(frame);
        self.run(SpriteCommand::FrameRemoved {
            frame,
            duration,
            cels,
        })
    }
    /// Move `frame` next to `target`. Out of range frames are ignored.
    ///
    /// A move that leaves every frame in place still adjusts tags, unless told not to.
    pub fn move_frame(
        &mut self,
        frame: Frame,
        mut target: Frame,
        place: DropFramePlace,
        tags: TagsHandling,
    ) -> Result<(), CommandError> {
        let before = match place {
            DropFramePlace::Before => target,
            DropFramePlace::After => target + 1,
        };
        let last = self.sprite().last_frame();
        let adjust = !self.sprite().tags().is_empty() && tags != TagsHandling::DontAdjust;
        if !(0..=last).contains(&frame) || !(0..=last + 1).contains(&before) {
            return Ok(());
        }
        if frame == before && !adjust {
            return Ok(());
        }
        if adjust {
            self.adjust_tags(frame, -1, place, tags)?;
            if target >= frame {
                target -= 1;
            }
            self.adjust_tags(target, 1, place, tags)?;
        }
        // Moving to the future lands just before `before`, which shifts down as `frame` leaves.
        let to = if frame < before { before - 1 } else { before };
        if to != frame {
            self.run(SpriteCommand::FrameMoved { from: frame, to })?;
        }
        Ok(())
    }
    /// Insert a copy of `from_frame` (duration and every cel) next to `new_frame`.
    pub fn copy_frame(
        &mut self,
        from_frame: Frame,
        new_frame: Frame,
        place: DropFramePlace,
        tags: TagsHandling,
    ) -> Result<(), CommandError> {
        let duration = self
            .sprite()
            .frame_duration(from_frame)
            .ok_or(CommandError::OutOfRange)?;
        let at = match place {
            DropFramePlace::Before => new_frame,
            DropFramePlace::After => new_frame + 1,
        };
        if at < 0 || at > self.sprite().total_frames() {
            return Err(CommandError::OutOfRange);
        }
        let cels = self.sprite().cels_at(from_frame);
        self.run(SpriteCommand::FrameInserted {
            frame: at,
            duration,
            cels,
        })?;
        if tags != TagsHandling::DontAdjust {
            self.adjust_tags(new_frame, 1, place, tags)?;
        }
        Ok(())
    }
    /// Shift tag bounds for a frame inserted (`delta == 1`) or removed (`delta == -1`) at `frame`.
    /// Tags left with no frames are removed.
    pub fn adjust_tags(
        &mut self,
        frame: Frame,
        delta: Frame,
        place: DropFramePlace,
        handling: TagsHandling,
    ) -> Result<(), CommandError> {
        if handling == TagsHandling::DontAdjust {
            return Ok(());
        }
        let before = place == DropFramePlace::Before;
        let snapshot: Vec<(TagID, Frame, Frame)> = self
            .sprite()
            .tags()
            .iter()
            .map(|tag| (tag.id(), tag.from_frame(), tag.to_frame()))
            .collect();
        for (id, old_from, old_to) in snapshot {
            let (mut from, mut to) = (old_from, old_to);
            match delta {
                1 => match handling {
                    TagsHandling::Default => {
                        if frame <= from {
                            from += 1;
                        }
                        if frame <= to + 1 {
                            to += 1;
                        }
                    }
                    TagsHandling::FitInside => {
                        if frame < from {
                            from += 1;
                        }
                        if frame <= to {
                            to += 1;
                        }
                    }
                    TagsHandling::FitOutside => {
                        if frame < from || (frame == from && before) {
                            from += 1;
                        }
                        if frame < to || (frame == to && before) {
                            to += 1;
                        }
                    }
                    TagsHandling::DontAdjust => (),
                },
                -1 => {
                    if frame < from {
                        from -= 1;
                    }
                    if frame <= to {
                        to -= 1;
                    }
                }
                _ => return Err(CommandError::OutOfRange),
            }
            if (from, to) == (old_from, old_to) {
                continue;
            }
            log::trace!("Tag {id} [{old_from} {old_to}] -> [{from} {to}]");
            if from > to {
                self.remove_tag(id)?;
            } else {
                self.run(SpriteCommand::TagRangeChanged {
                    tag: id,
                    from: (old_from, old_to),
                    to: (from, to),
                })?;
            }
        }
        Ok(())
    }

    // ===== Cels =====

    fn replace_cel(&mut self, layer: LayerID, frame: Frame, to: Option<Cel>) -> Result<(), CommandError> {
        let from = self.sprite().cel(layer, frame).cloned();
        if from.is_none() && to.is_none() {
            return Ok(());
        }
        self.run(SpriteCommand::CelReplaced {
            layer,
            frame,
            from,
            to,
        })
    }
    fn grow_to_include(&mut self, frame: Frame) -> Result<(), CommandError> {
        if frame >= self.sprite().total_frames() {
            self.set_total_frames(frame + 1)?;
        }
        Ok(())
    }
    /// Move a cel, replacing whatever is at the destination and leaving the source empty.
    pub fn move_cel(
        &mut self,
        src_layer: LayerID,
        src_frame: Frame,
        dst_layer: LayerID,
        dst_frame: Frame,
    ) -> Result<(), CommandError> {
        if src_layer == dst_layer && src_frame == dst_frame {
            return Ok(());
        }
        self.grow_to_include(dst_frame)?;
        let cel = self.sprite().cel(src_layer, src_frame).cloned();
        self.replace_cel(dst_layer, dst_frame, cel)?;
        self.replace_cel(src_layer, src_frame, None)
    }
    /// Copy a cel, replacing whatever is at the destination. The image is shared, not duplicated.
    pub fn copy_cel(
        &mut self,
        src_layer: LayerID,
        src_frame: Frame,
        dst_layer: LayerID,
        dst_frame: Frame,
    ) -> Result<(), CommandError> {
        if src_layer == dst_layer && src_frame == dst_frame {
            return Ok(());
        }
        self.grow_to_include(dst_frame)?;
        let cel = self.sprite().cel(src_layer, src_frame).cloned();
        self.replace_cel(dst_layer, dst_frame, cel)
    }
    pub fn swap_cel(&mut self, layer: LayerID, a: Frame, b: Frame) -> Result<(), CommandError> {
        if a == b {
            return Ok(());
        }
        self.run(SpriteCommand::CelsSwapped { layer, a, b })
    }
    pub fn clear_cel(&mut self, layer: LayerID, frame: Frame) -> Result<(), CommandError> {
        if self.sprite().cel(layer, frame).is_none() {
            return Ok(());
        }
        self.replace_cel(layer, frame, None)
    }

    // ===== Layers =====

    /// Child index in `parent` directly above `after`, ignoring `skip`. `None` is the bottom,
    /// and a layer that isn't a child of `parent` means the top.
    fn index_after(&self, parent: Option<LayerID>, after: Option<LayerID>, skip: Option<LayerID>) -> usize {
        let siblings = self
            .sprite()
            .children_of(parent)
            .iter()
            .copied()
            .filter(|id| Some(*id) != skip);
        match after {
            None => 0,
            Some(after) => {
                let siblings: Vec<LayerID> = siblings.collect();
                siblings
                    .iter()
                    .position(|id| *id == after)
                    .map_or(siblings.len(), |idx| idx + 1)
            }
        }
    }
    /// Move `layer` into `parent`, right above `after`.
    pub fn restack_layer_after(
        &mut self,
        layer: LayerID,
        parent: Option<LayerID>,
        after: Option<LayerID>,
    ) -> Result<(), CommandError> {
        if Some(layer) == after {
            return Ok(());
        }
        let old_parent = self
            .sprite()
            .layer(layer)
            .ok_or(CommandError::UnknownResource)?
            .parent();
        let old_index = self
            .sprite()
            .index_in_parent(layer)
            .ok_or(CommandError::UnknownResource)?;
        let new_index = self.index_after(parent, after, Some(layer));
        if old_parent == parent && old_index == new_index {
            return Ok(());
        }
        self.run(SpriteCommand::LayerRestacked {
            target: layer,
            old_parent,
            old_index,
            new_parent: parent,
            new_index,
        })
    }
    /// Move `layer` into `parent`, right below `before`, or on top if `None`.
    pub fn restack_layer_before(
        &mut self,
        layer: LayerID,
        parent: Option<LayerID>,
        before: Option<LayerID>,
    ) -> Result<(), CommandError> {
        if Some(layer) == before {
            return Ok(());
        }
        let after = match before {
            Some(before) => self.sprite().previous_sibling(before),
            None => self.sprite().last_layer(parent),
        };
        self.restack_layer_after(layer, parent, after)
    }
    /// Deep copy `source` (and its children, if a group) into `parent`, above `after`.
    pub fn duplicate_layer_after(
        &mut self,
        source: LayerID,
        parent: Option<LayerID>,
        after: Option<LayerID>,
    ) -> Result<LayerID, CommandError> {
        let mut subtree = self
            .sprite()
            .duplicate_subtree(source)
            .ok_or(CommandError::UnknownResource)?;
        let root = subtree.root_mut().ok_or(CommandError::UnknownResource)?;
        root.name.push_str(" Copy");
        let id = root.id();
        let index = self.index_after(parent, after, None);
        self.run(SpriteCommand::LayerInserted {
            subtree,
            parent,
            index,
        })?;
        Ok(id)
    }
    /// Deep copy `source` into `parent`, below `before`, or on top if `None`.
    pub fn duplicate_layer_before(
        &mut self,
        source: LayerID,
        parent: Option<LayerID>,
        before: Option<LayerID>,
    ) -> Result<LayerID, CommandError> {
        let after = before.and_then(|before| self.sprite().previous_browsable(before));
        let id = self.duplicate_layer_after(source, parent, after)?;
        self.restack_layer_before(id, parent, before)?;
        Ok(id)
    }
    /// Insert a new, childless layer into `parent`, above `after`.
    pub fn add_layer(
        &mut self,
        layer: Layer,
        parent: Option<LayerID>,
        after: Option<LayerID>,
    ) -> Result<LayerID, CommandError> {
        let subtree = LayerSubtree::single(layer);
        let id = subtree.root_id().ok_or(CommandError::UnknownResource)?;
        let index = self.index_after(parent, after, None);
        self.run(SpriteCommand::LayerInserted {
            subtree,
            parent,
            index,
        })?;
        Ok(id)
    }
    /// Remove a layer along with all of its children and cels.
    pub fn remove_layer(&mut self, layer: LayerID) -> Result<(), CommandError> {
        let subtree = self
            .sprite()
            .subtree(layer)
            .ok_or(CommandError::UnknownResource)?;
        let parent = self
            .sprite()
            .layer(layer)
            .ok_or(CommandError::UnknownResource)?
            .parent();
        let index = self
            .sprite()
            .index_in_parent(layer)
            .ok_or(CommandError::UnknownResource)?;
        self.run(SpriteCommand::LayerRemoved {
            subtree,
            parent,
            index,
        })
    }
    pub fn set_layer_flags(&mut self, layer: LayerID, flags: LayerFlags) -> Result<(), CommandError> {
        let from = self
            .sprite()
            .layer(layer)
            .ok_or(CommandError::UnknownResource)?
            .flags;
        if from == flags {
            return Ok(());
        }
        self.run(SpriteCommand::LayerFlagsChanged {
            target: layer,
            from,
            to: flags,
        })
    }

    // ===== Tags =====

    pub fn add_tag(&mut self, tag: Tag) -> Result<TagID, CommandError> {
        let id = tag.id();
        let index = self.sprite().tags().len();
        self.run(SpriteCommand::TagInserted { tag, index })?;
        Ok(id)
    }
    pub fn set_tag_range(&mut self, tag: TagID, from: Frame, to: Frame) -> Result<(), CommandError> {
        let old = self
            .sprite()
            .tag(tag)
            .ok_or(CommandError::UnknownResource)?
            .range();
        let new = (from.min(to), from.max(to));
        if old == new {
            return Ok(());
        }
        self.run(SpriteCommand::TagRangeChanged {
            tag,
            from: old,
            to: new,
        })
    }
    pub fn remove_tag(&mut self, tag: TagID) -> Result<(), CommandError> {
        let index = self
            .sprite()
            .tags()
            .iter()
            .position(|t| t.id() == tag)
            .ok_or(CommandError::UnknownResource)?;
        let tag = self.sprite().tags()[index].clone();
        self.run(SpriteCommand::TagRemoved { tag, index })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document::{Document, DEFAULT_LOCK_TIMEOUT};
    use crate::sprite::{Image, Rgba};
    use crate::transaction::Modification;

    /// Frames with durations 1..=frames, image layers with a marker cel on every frame.
    fn doc(layers: usize, frames: Frame) -> (Document, Vec<LayerID>) {
        let mut sprite = Sprite::new(8, 8);
        sprite.set_total_frames(frames);
        let ids: Vec<LayerID> = (0..layers)
            .map(|idx| {
                sprite
                    .add_layer(None, Layer::image(format!("Layer {}", idx + 1)))
                    .unwrap()
            })
            .collect();
        for frame in 0..frames {
            sprite.set_frame_duration(frame, frame as u32 + 1);
            for (l, layer) in ids.iter().enumerate() {
                let mut image = Image::new(8, 8);
                image.put_pixel(frame as u32, l as u32, Rgba::WHITE);
                sprite.set_cel(*layer, frame, Cel::new(image)).unwrap();
            }
        }
        (Document::new("test", sprite), ids)
    }
    fn durations(sprite: &Sprite) -> Vec<u32> {
        (0..sprite.total_frames())
            .filter_map(|f| sprite.frame_duration(f))
            .collect()
    }
    fn edit<R>(doc: &Document, f: impl FnOnce(&mut DocApi) -> Result<R, CommandError>) -> R {
        let mut tx = Tx::new(doc, "test", Modification::ModifyDocument, DEFAULT_LOCK_TIMEOUT).unwrap();
        let result = f(&mut DocApi::new(&mut tx)).unwrap();
        tx.commit();
        result
    }

    #[test]
    fn move_frame_both_directions() {
        let (doc, _) = doc(1, 4);
        edit(&doc, |api| {
            api.move_frame(0, 2, DropFramePlace::After, TagsHandling::Default)
        });
        assert_eq!(durations(doc.read(DEFAULT_LOCK_TIMEOUT).unwrap().sprite()), [2, 3, 1, 4]);
        edit(&doc, |api| {
            api.move_frame(3, 0, DropFramePlace::Before, TagsHandling::Default)
        });
        assert_eq!(durations(doc.read(DEFAULT_LOCK_TIMEOUT).unwrap().sprite()), [4, 2, 3, 1]);
    }
    #[test]
    fn move_frame_onto_itself_is_silent() {
        let (doc, _) = doc(1, 4);
        edit(&doc, |api| {
            api.move_frame(1, 1, DropFramePlace::Before, TagsHandling::Default)?;
            api.move_frame(1, 0, DropFramePlace::After, TagsHandling::Default)?;
            // Out of range, ignored.
            api.move_frame(7, 0, DropFramePlace::After, TagsHandling::Default)
        });
        assert!(!doc.read(DEFAULT_LOCK_TIMEOUT).unwrap().can_undo());
    }
    #[test]
    fn copy_frame_copies_cels_and_duration() {
        let (doc, layers) = doc(2, 3);
        edit(&doc, |api| {
            api.copy_frame(2, 0, DropFramePlace::Before, TagsHandling::Default)
        });
        let reader = doc.read(DEFAULT_LOCK_TIMEOUT).unwrap();
        let sprite = reader.sprite();
        assert_eq!(durations(sprite), [3, 1, 2, 3]);
        for layer in layers {
            assert_eq!(sprite.cel(layer, 0), sprite.cel(layer, 3));
        }
    }
    #[test]
    fn add_and_remove_frames() {
        let (doc, layers) = doc(1, 2);
        edit(&doc, |api| {
            api.add_empty_frame(1)?;
            api.add_frame(3)
        });
        let mut writer = doc.write(DEFAULT_LOCK_TIMEOUT).unwrap();
        assert_eq!(durations(writer.sprite()), [1, 1, 2, 2]);
        assert!(writer.sprite().cel(layers[0], 1).is_none());
        assert_eq!(writer.sprite().cel(layers[0], 3), writer.sprite().cel(layers[0], 2));
        writer.undo().unwrap().unwrap();
        assert_eq!(durations(writer.sprite()), [1, 2]);
        drop(writer);

        edit(&doc, |api| api.remove_frame(0));
        let reader = doc.read(DEFAULT_LOCK_TIMEOUT).unwrap();
        assert_eq!(durations(reader.sprite()), [2]);
    }
    #[test]
    fn set_total_frames_round_trip() {
        let (doc, layers) = doc(1, 3);
        let before = doc.read(DEFAULT_LOCK_TIMEOUT).unwrap().sprite().clone();
        edit(&doc, |api| api.set_total_frames(1));
        {
            let reader = doc.read(DEFAULT_LOCK_TIMEOUT).unwrap();
            assert_eq!(reader.sprite().total_frames(), 1);
            assert!(reader.sprite().cel(layers[0], 2).is_none());
        }
        edit(&doc, |api| api.set_total_frames(5));
        assert_eq!(durations(doc.read(DEFAULT_LOCK_TIMEOUT).unwrap().sprite()), [1, 1, 1, 1, 1]);

        let mut writer = doc.write(DEFAULT_LOCK_TIMEOUT).unwrap();
        writer.undo().unwrap().unwrap();
        writer.undo().unwrap().unwrap();
        assert_eq!(*writer.sprite(), before);
    }
    #[test]
    fn cel_operations() {
        let (doc, layers) = doc(2, 2);
        let original = doc
            .read(DEFAULT_LOCK_TIMEOUT)
            .unwrap()
            .sprite()
            .cel(layers[0], 0)
            .cloned();
        edit(&doc, |api| api.move_cel(layers[0], 0, layers[1], 3));
        {
            let reader = doc.read(DEFAULT_LOCK_TIMEOUT).unwrap();
            let sprite = reader.sprite();
            // Grown to fit the destination.
            assert_eq!(sprite.total_frames(), 4);
            assert!(sprite.cel(layers[0], 0).is_none());
            assert_eq!(sprite.cel(layers[1], 3).cloned(), original);
        }
        edit(&doc, |api| {
            api.copy_cel(layers[1], 3, layers[0], 0)?;
            api.swap_cel(layers[1], 0, 3)?;
            api.clear_cel(layers[1], 1)?;
            // Nothing to clear.
            api.clear_cel(layers[1], 2)
        });
        let reader = doc.read(DEFAULT_LOCK_TIMEOUT).unwrap();
        let sprite = reader.sprite();
        assert_eq!(sprite.cel(layers[0], 0).cloned(), original);
        assert_eq!(sprite.cel(layers[1], 0).cloned(), original);
        assert!(sprite.cel(layers[1], 1).is_none());
        assert!(sprite.cel(layers[1], 3).is_some());
    }
    #[test]
    fn restack_layers() {
        let (doc, l) = doc(4, 1);
        edit(&doc, |api| api.restack_layer_after(l[0], None, Some(l[2])));
        assert_eq!(
            doc.read(DEFAULT_LOCK_TIMEOUT).unwrap().sprite().all_layers(),
            [l[1], l[2], l[0], l[3]]
        );
        edit(&doc, |api| {
            api.restack_layer_before(l[3], None, Some(l[1]))?;
            // On top.
            api.restack_layer_before(l[1], None, None)
        });
        assert_eq!(
            doc.read(DEFAULT_LOCK_TIMEOUT).unwrap().sprite().all_layers(),
            [l[3], l[2], l[0], l[1]]
        );
        edit(&doc, |api| api.restack_layer_after(l[1], None, None));
        assert_eq!(
            doc.read(DEFAULT_LOCK_TIMEOUT).unwrap().sprite().all_layers(),
            [l[1], l[3], l[2], l[0]]
        );
    }
    #[test]
    fn restack_into_group() {
        let mut sprite = Sprite::new(1, 1);
        let image = sprite.add_layer(None, Layer::image("image")).unwrap();
        let group = sprite.add_layer(None, Layer::group("group")).unwrap();
        let doc = Document::new("test", sprite);
        edit(&doc, |api| api.restack_layer_after(image, Some(group), None));
        let reader = doc.read(DEFAULT_LOCK_TIMEOUT).unwrap();
        assert_eq!(reader.sprite().children_of(None), [group]);
        assert_eq!(reader.sprite().children_of(Some(group)), [image]);
        assert_eq!(reader.sprite().layer(image).unwrap().parent(), Some(group));
    }
    #[test]
    fn duplicate_layers() {
        let (doc, l) = doc(3, 2);
        let (above, below) = edit(&doc, |api| {
            let above = api.duplicate_layer_after(l[0], None, Some(l[1]))?;
            let below = api.duplicate_layer_before(l[2], None, Some(l[0]))?;
            Ok((above, below))
        });
        let reader = doc.read(DEFAULT_LOCK_TIMEOUT).unwrap();
        let sprite = reader.sprite();
        assert_eq!(sprite.all_layers(), [below, l[0], l[1], above, l[2]]);
        assert_eq!(sprite.layer(above).unwrap().name(), "Layer 1 Copy");
        assert_eq!(sprite.layer(below).unwrap().name(), "Layer 3 Copy");
        assert_eq!(sprite.cel(above, 1), sprite.cel(l[0], 1));
    }
    #[test]
    fn add_remove_layer_and_flags() {
        let (doc, l) = doc(2, 2);
        let before = doc.read(DEFAULT_LOCK_TIMEOUT).unwrap().sprite().clone();
        let group = edit(&doc, |api| {
            let group = api.add_layer(Layer::group("group"), None, Some(l[0]))?;
            api.restack_layer_after(l[1], Some(group), None)?;
            api.set_layer_flags(l[0], LayerFlags::VISIBLE | LayerFlags::BACKGROUND)?;
            Ok(group)
        });
        {
            let reader = doc.read(DEFAULT_LOCK_TIMEOUT).unwrap();
            assert_eq!(reader.sprite().all_layers(), [l[0], l[1], group]);
            assert!(reader.sprite().layer(l[0]).unwrap().is_background());
        }
        edit(&doc, |api| api.remove_layer(group));
        {
            let reader = doc.read(DEFAULT_LOCK_TIMEOUT).unwrap();
            assert_eq!(reader.sprite().all_layers(), [l[0]]);
            assert!(reader.sprite().layer(l[1]).is_none());
        }
        let mut writer = doc.write(DEFAULT_LOCK_TIMEOUT).unwrap();
        writer.undo().unwrap().unwrap();
        writer.undo().unwrap().unwrap();
        assert_eq!(*writer.sprite(), before);
    }
    #[test]
    fn tags_follow_inserted_frames() {
        let (doc, _) = doc(1, 6);
        let (a, b) = edit(&doc, |api| {
            let a = api.add_tag(Tag::new("a", 0, 2))?;
            let b = api.add_tag(Tag::new("b", 3, 5))?;
            Ok((a, b))
        });
        // Right after `a`: extends it by default.
        edit(&doc, |api| api.add_empty_frame(3));
        {
            let reader = doc.read(DEFAULT_LOCK_TIMEOUT).unwrap();
            assert_eq!(reader.sprite().tag(a).map(Tag::range), Some((0, 3)));
            assert_eq!(reader.sprite().tag(b).map(Tag::range), Some((4, 6)));
        }
        edit(&doc, |api| {
            api.set_tag_range(a, 1, 1)?;
            api.remove_frame(1)
        });
        let reader = doc.read(DEFAULT_LOCK_TIMEOUT).unwrap();
        // Emptied, so removed.
        assert!(reader.sprite().tag(a).is_none());
        assert_eq!(reader.sprite().tag(b).map(Tag::range), Some((3, 5)));
    }
    #[test]
    fn tag_edits_undo() {
        let (doc, _) = doc(1, 4);
        let tag = edit(&doc, |api| api.add_tag(Tag::new("t", 1, 2)));
        edit(&doc, |api| {
            api.set_tag_range(tag, 3, 0)?;
            api.remove_tag(tag)
        });
        let mut writer = doc.write(DEFAULT_LOCK_TIMEOUT).unwrap();
        assert!(writer.sprite().tags().is_empty());
        writer.undo().unwrap().unwrap();
        assert_eq!(writer.sprite().tag(tag).map(Tag::range), Some((1, 2)));
    }
    #[test]
    fn sprite_size() {
        let (doc, _) = doc(1, 1);
        edit(&doc, |api| {
            api.set_sprite_size(8, 8)?;
            api.set_sprite_size(16, 4)
        });
        let mut writer = doc.write(DEFAULT_LOCK_TIMEOUT).unwrap();
        assert_eq!(writer.sprite().size(), (16, 4));
        assert!(writer.transaction().is_none());
        writer.undo().unwrap().unwrap();
        assert_eq!(writer.sprite().size(), (8, 8));
    }
}
