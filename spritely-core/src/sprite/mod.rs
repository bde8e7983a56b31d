//! # Sprite
//!
//! The document content: a canvas size, a list of frames (each with a duration), a tree of layers
//! holding one cel per frame, and named frame tags.
//!
//! Direct mutators on [`Sprite`] are *not* tracked by any undo history, they are meant for building
//! a sprite before it is handed to a document. Tracked changes are made by [`commands::Command`]s,
//! usually through [`crate::doc_api::DocApi`].

pub mod commands;
mod image;
mod layer;

use az::{CheckedAs, SaturatingAs};
pub use image::{Cel, Image, Rgba};
pub use layer::{Layer, LayerFlags, LayerID, LayerKind, LayerSubtree};

use crate::commands::{CommandConsumer, CommandError, DoUndo};

/// Frame index. Signed, as `-1` is used throughout for "no frame".
pub type Frame = i32;
pub type TagID = crate::id::UniqueID<Tag>;

/// Duration given to frames when nothing better is known.
pub const DEFAULT_FRAME_DURATION: u32 = 100;

/// A named, inclusive span of frames.
#[derive(Clone, PartialEq, Debug)]
pub struct Tag {
    id: TagID,
    pub name: String,
    from: Frame,
    to: Frame,
}
impl Tag {
    #[must_use]
    pub fn new(name: impl Into<String>, from: Frame, to: Frame) -> Self {
        Self {
            id: TagID::default(),
            name: name.into(),
            from: from.min(to),
            to: from.max(to),
        }
    }
    #[must_use]
    pub fn id(&self) -> TagID {
        self.id
    }
    #[must_use]
    pub fn from_frame(&self) -> Frame {
        self.from
    }
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        self.to
    }
    #[must_use]
    pub fn range(&self) -> (Frame, Frame) {
        (self.from, self.to)
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Sprite {
    size: (u32, u32),
    /// Milliseconds per frame. Never empty.
    durations: Vec<u32>,
    layers: hashbrown::HashMap<LayerID, Layer>,
    /// Top level layers, bottom to top.
    root: Vec<LayerID>,
    tags: Vec<Tag>,
}
impl Sprite {
    /// An empty sprite with a single frame and no layers.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            durations: vec![DEFAULT_FRAME_DURATION],
            layers: hashbrown::HashMap::new(),
            root: Vec::new(),
            tags: Vec::new(),
        }
    }
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }
    #[must_use]
    pub fn total_frames(&self) -> Frame {
        self.durations.len().saturating_as()
    }
    #[must_use]
    pub fn last_frame(&self) -> Frame {
        self.total_frames() - 1
    }
    /// Index into the frame list, if `frame` refers to an existing frame.
    fn frame_index(&self, frame: Frame) -> Option<usize> {
        frame
            .checked_as::<usize>()
            .filter(|idx| *idx < self.durations.len())
    }
    #[must_use]
    pub fn frame_duration(&self, frame: Frame) -> Option<u32> {
        self.frame_index(frame).map(|idx| self.durations[idx])
    }
    /// Sum of all frame durations, in milliseconds.
    #[must_use]
    pub fn total_duration(&self) -> u64 {
        self.durations.iter().copied().map(u64::from).sum()
    }
    #[must_use]
    pub fn layer(&self, id: LayerID) -> Option<&Layer> {
        self.layers.get(&id)
    }
    pub fn layer_mut(&mut self, id: LayerID) -> Option<&mut Layer> {
        self.layers.get_mut(&id)
    }
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
    #[must_use]
    pub fn cel(&self, layer: LayerID, frame: Frame) -> Option<&Cel> {
        self.layers.get(&layer)?.cel(frame)
    }
    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }
    #[must_use]
    pub fn tag(&self, id: TagID) -> Option<&Tag> {
        self.tags.iter().find(|tag| tag.id == id)
    }

    /// Untracked. Grow or shrink the frame list, dropping cels past the new end.
    /// New frames copy the duration of the last one.
    pub fn set_total_frames(&mut self, frames: Frame) {
        let frames = frames.max(1).saturating_as::<usize>();
        let last = self.durations.last().copied().unwrap_or(DEFAULT_FRAME_DURATION);
        self.durations.resize(frames, last);
        let end = self.total_frames();
        for layer in self.layers.values_mut() {
            if let Some(cels) = layer.cels_mut() {
                cels.split_off(&end);
            }
        }
    }
    /// Untracked. Ignored if the frame does not exist.
    pub fn set_frame_duration(&mut self, frame: Frame, msecs: u32) {
        if let Some(idx) = self.frame_index(frame) {
            self.durations[idx] = msecs;
        }
    }
    /// Untracked. Places a layer on top of `parent`'s children (the root if `None`).
    /// Returns `None` if the parent isn't a group of this sprite.
    pub fn add_layer(&mut self, parent: Option<LayerID>, mut layer: Layer) -> Option<LayerID> {
        let id = layer.id();
        let children = self.children_of_mut(parent)?;
        children.push(id);
        layer.parent = parent;
        self.layers.insert(id, layer);
        Some(id)
    }
    /// Untracked. Returns the previous cel, or the new cel back as an error if the layer
    /// is not an image layer of this sprite or the frame is out of range.
    pub fn set_cel(&mut self, layer: LayerID, frame: Frame, cel: Cel) -> Result<Option<Cel>, Cel> {
        if self.frame_index(frame).is_none() {
            return Err(cel);
        }
        match self.layers.get_mut(&layer).and_then(Layer::cels_mut) {
            Some(cels) => Ok(cels.insert(frame, cel)),
            None => Err(cel),
        }
    }
    /// Untracked.
    pub fn add_tag(&mut self, tag: Tag) -> TagID {
        let id = tag.id;
        self.tags.push(tag);
        id
    }

    /// Remove a whole frame column, shifting later frames down.
    fn take_frame(&mut self, idx: usize) -> (u32, Vec<(LayerID, Cel)>) {
        let duration = self.durations.remove(idx);
        let frame: Frame = idx.saturating_as();
        let mut taken = Vec::new();
        for layer in self.layers.values_mut() {
            let id = layer.id();
            let Some(cels) = layer.cels_mut() else {
                continue;
            };
            let upper = cels.split_off(&frame);
            for (f, cel) in upper {
                if f == frame {
                    taken.push((id, cel));
                } else {
                    cels.insert(f - 1, cel);
                }
            }
        }
        (duration, taken)
    }
    /// Insert a whole frame column, shifting later frames up.
    /// `cels` must only refer to image layers of this sprite, this is checked by callers.
    fn put_frame(&mut self, idx: usize, duration: u32, cels: &[(LayerID, Cel)]) {
        self.durations.insert(idx, duration);
        let frame: Frame = idx.saturating_as();
        for layer in self.layers.values_mut() {
            let Some(layer_cels) = layer.cels_mut() else {
                continue;
            };
            let upper = layer_cels.split_off(&frame);
            layer_cels.extend(upper.into_iter().map(|(f, cel)| (f + 1, cel)));
        }
        for (layer, cel) in cels {
            if let Some(layer_cels) = self.layers.get_mut(layer).and_then(Layer::cels_mut) {
                layer_cels.insert(frame, cel.clone());
            }
        }
    }
    /// Cels of every image layer at a frame, in no particular order.
    #[must_use]
    pub fn cels_at(&self, frame: Frame) -> Vec<(LayerID, Cel)> {
        self.layers
            .values()
            .filter_map(|layer| Some((layer.id(), layer.cel(frame)?.clone())))
            .collect()
    }
    fn all_image_layers(&self, cels: &[(LayerID, Cel)]) -> bool {
        cels.iter()
            .all(|(layer, _)| self.layers.get(layer).is_some_and(Layer::is_image))
    }
    fn cels_match(&self, frame: Frame, cels: &[(LayerID, Cel)]) -> bool {
        let present = self
            .layers
            .values()
            .filter(|layer| layer.cel(frame).is_some())
            .count();
        present == cels.len()
            && cels
                .iter()
                .all(|(layer, cel)| self.cel(*layer, frame) == Some(cel))
    }
}

impl CommandConsumer<commands::Command> for Sprite {
    #[allow(clippy::too_many_lines)]
    fn apply(&mut self, command: DoUndo<'_, commands::Command>) -> Result<(), CommandError> {
        use commands::Command;
        match command {
            DoUndo::Do(Command::FrameInserted {
                frame,
                duration,
                cels,
            })
            | DoUndo::Undo(Command::FrameRemoved {
                frame,
                duration,
                cels,
            }) => {
                let idx = (*frame)
                    .checked_as::<usize>()
                    .filter(|idx| *idx <= self.durations.len())
                    .ok_or(CommandError::OutOfRange)?;
                if !self.all_image_layers(cels) {
                    return Err(CommandError::UnknownResource);
                }
                self.put_frame(idx, *duration, cels);
                Ok(())
            }
            DoUndo::Do(Command::FrameRemoved {
                frame,
                duration,
                cels,
            })
            | DoUndo::Undo(Command::FrameInserted {
                frame,
                duration,
                cels,
            }) => {
                let idx = self.frame_index(*frame).ok_or(CommandError::OutOfRange)?;
                // A sprite always keeps at least one frame.
                if self.durations.len() <= 1 {
                    return Err(CommandError::MismatchedState);
                }
                if self.durations[idx] != *duration || !self.cels_match(*frame, cels) {
                    return Err(CommandError::MismatchedState);
                }
                self.take_frame(idx);
                Ok(())
            }
            DoUndo::Do(Command::FrameMoved { from, to })
            | DoUndo::Undo(Command::FrameMoved { from: to, to: from }) => {
                let from = self.frame_index(*from).ok_or(CommandError::OutOfRange)?;
                let to = self.frame_index(*to).ok_or(CommandError::OutOfRange)?;
                if from == to {
                    return Err(CommandError::NoOp);
                }
                let (duration, cels) = self.take_frame(from);
                self.put_frame(to, duration, &cels);
                Ok(())
            }
            DoUndo::Do(Command::FrameDurationChanged { frame, from, to })
            | DoUndo::Undo(Command::FrameDurationChanged {
                frame,
                from: to,
                to: from,
            }) => {
                let idx = self.frame_index(*frame).ok_or(CommandError::OutOfRange)?;
                if self.durations[idx] != *from {
                    return Err(CommandError::MismatchedState);
                }
                self.durations[idx] = *to;
                Ok(())
            }
            DoUndo::Do(Command::CelReplaced {
                layer,
                frame,
                from,
                to,
            })
            | DoUndo::Undo(Command::CelReplaced {
                layer,
                frame,
                from: to,
                to: from,
            }) => {
                if self.frame_index(*frame).is_none() {
                    return Err(CommandError::OutOfRange);
                }
                let cels = self
                    .layers
                    .get_mut(layer)
                    .ok_or(CommandError::UnknownResource)?
                    .cels_mut()
                    .ok_or(CommandError::MismatchedState)?;
                if cels.get(frame) != from.as_ref() {
                    return Err(CommandError::MismatchedState);
                }
                match to {
                    Some(cel) => cels.insert(*frame, cel.clone()),
                    None => cels.remove(frame),
                };
                Ok(())
            }
            // Swapping is its own inverse.
            DoUndo::Do(Command::CelsSwapped { layer, a, b })
            | DoUndo::Undo(Command::CelsSwapped { layer, a, b }) => {
                if self.frame_index(*a).is_none() || self.frame_index(*b).is_none() {
                    return Err(CommandError::OutOfRange);
                }
                let cels = self
                    .layers
                    .get_mut(layer)
                    .ok_or(CommandError::UnknownResource)?
                    .cels_mut()
                    .ok_or(CommandError::MismatchedState)?;
                let cel_a = cels.remove(a);
                let cel_b = cels.remove(b);
                if let Some(cel) = cel_a {
                    cels.insert(*b, cel);
                }
                if let Some(cel) = cel_b {
                    cels.insert(*a, cel);
                }
                Ok(())
            }
            DoUndo::Do(Command::LayerRestacked {
                target,
                old_parent,
                old_index,
                new_parent,
                new_index,
            })
            | DoUndo::Undo(Command::LayerRestacked {
                target,
                old_parent: new_parent,
                old_index: new_index,
                new_parent: old_parent,
                new_index: old_index,
            }) => {
                let layer = self.layers.get(target).ok_or(CommandError::UnknownResource)?;
                if layer.parent != *old_parent || self.index_in_parent(*target) != Some(*old_index) {
                    return Err(CommandError::MismatchedState);
                }
                if let Some(new_parent) = new_parent {
                    let parent = self
                        .layers
                        .get(new_parent)
                        .ok_or(CommandError::UnknownResource)?;
                    // Can't become a child of itself!
                    if !parent.is_group()
                        || *new_parent == *target
                        || self.is_descendant_of(*new_parent, *target)
                    {
                        return Err(CommandError::MismatchedState);
                    }
                }
                let siblings = self.children_of(*new_parent).len();
                let siblings_after = if new_parent == old_parent {
                    siblings - 1
                } else {
                    siblings
                };
                if *new_index > siblings_after {
                    return Err(CommandError::OutOfRange);
                }
                self.detach(*target);
                self.attach(*target, *new_parent, *new_index);
                Ok(())
            }
            DoUndo::Do(Command::LayerInserted {
                subtree,
                parent,
                index,
            })
            | DoUndo::Undo(Command::LayerRemoved {
                subtree,
                parent,
                index,
            }) => {
                let root = subtree.root_id().ok_or(CommandError::MismatchedState)?;
                if subtree
                    .layers
                    .iter()
                    .any(|layer| self.layers.contains_key(&layer.id()))
                {
                    return Err(CommandError::MismatchedState);
                }
                match parent {
                    Some(parent) if !self.layers.get(parent).is_some_and(Layer::is_group) => {
                        return Err(CommandError::UnknownResource)
                    }
                    _ => (),
                }
                if *index > self.children_of(*parent).len() {
                    return Err(CommandError::OutOfRange);
                }
                for layer in &subtree.layers {
                    self.layers.insert(layer.id(), layer.clone());
                }
                self.attach(root, *parent, *index);
                Ok(())
            }
            DoUndo::Do(Command::LayerRemoved {
                subtree,
                parent,
                index,
            })
            | DoUndo::Undo(Command::LayerInserted {
                subtree,
                parent,
                index,
            }) => {
                let root = subtree.root_id().ok_or(CommandError::MismatchedState)?;
                let current = self.subtree(root).ok_or(CommandError::UnknownResource)?;
                if current != *subtree
                    || self.layers.get(&root).map(Layer::parent) != Some(*parent)
                    || self.index_in_parent(root) != Some(*index)
                {
                    return Err(CommandError::MismatchedState);
                }
                self.detach(root);
                for layer in &subtree.layers {
                    self.layers.remove(&layer.id());
                }
                Ok(())
            }
            DoUndo::Do(Command::LayerFlagsChanged { target, from, to })
            | DoUndo::Undo(Command::LayerFlagsChanged {
                target,
                from: to,
                to: from,
            }) => {
                let layer = self
                    .layers
                    .get_mut(target)
                    .ok_or(CommandError::UnknownResource)?;
                if layer.flags != *from {
                    return Err(CommandError::MismatchedState);
                }
                layer.flags = *to;
                Ok(())
            }
            DoUndo::Do(Command::TagInserted { tag, index })
            | DoUndo::Undo(Command::TagRemoved { tag, index }) => {
                if *index > self.tags.len() || self.tag(tag.id).is_some() {
                    return Err(CommandError::MismatchedState);
                }
                self.tags.insert(*index, tag.clone());
                Ok(())
            }
            DoUndo::Do(Command::TagRemoved { tag, index })
            | DoUndo::Undo(Command::TagInserted { tag, index }) => {
                if self.tags.get(*index) != Some(tag) {
                    return Err(CommandError::MismatchedState);
                }
                self.tags.remove(*index);
                Ok(())
            }
            DoUndo::Do(Command::TagRangeChanged { tag, from, to })
            | DoUndo::Undo(Command::TagRangeChanged {
                tag,
                from: to,
                to: from,
            }) => {
                let tag = self
                    .tags
                    .iter_mut()
                    .find(|t| t.id == *tag)
                    .ok_or(CommandError::UnknownResource)?;
                if tag.range() != *from {
                    return Err(CommandError::MismatchedState);
                }
                (tag.from, tag.to) = *to;
                Ok(())
            }
            DoUndo::Do(Command::SpriteResized { from, to })
            | DoUndo::Undo(Command::SpriteResized { from: to, to: from }) => {
                if self.size != *from {
                    return Err(CommandError::MismatchedState);
                }
                self.size = *to;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn with_layers() -> (Sprite, LayerID, LayerID) {
        let mut sprite = Sprite::new(4, 4);
        sprite.set_total_frames(3);
        let a = sprite.add_layer(None, Layer::image("a")).unwrap();
        let b = sprite.add_layer(None, Layer::image("b")).unwrap();
        for frame in 0..3 {
            let mut image = Image::new(4, 4);
            image.put_pixel(frame as u32, 0, Rgba::WHITE);
            sprite.set_cel(a, frame, Cel::new(image)).unwrap();
        }
        (sprite, a, b)
    }

    #[test]
    fn frame_move_round_trip() {
        let (mut sprite, a, _) = with_layers();
        sprite.set_frame_duration(0, 10);
        let before = sprite.clone();
        let command = commands::Command::FrameMoved { from: 0, to: 2 };
        sprite.apply(DoUndo::Do(&command)).unwrap();
        assert_eq!(sprite.frame_duration(2), Some(10));
        assert_eq!(
            sprite.cel(a, 2).and_then(|cel| cel.image.pixel(0, 0)),
            Some(Rgba::WHITE)
        );
        sprite.apply(DoUndo::Undo(&command)).unwrap();
        assert_eq!(sprite, before);
    }
    #[test]
    fn mismatched_state_is_rejected() {
        let (mut sprite, a, _) = with_layers();
        let before = sprite.clone();
        // Claims the cel is empty, it isn't.
        let command = commands::Command::CelReplaced {
            layer: a,
            frame: 0,
            from: None,
            to: None,
        };
        assert!(matches!(
            sprite.apply(DoUndo::Do(&command)),
            Err(CommandError::MismatchedState)
        ));
        assert_eq!(sprite, before);
    }
    #[test]
    fn frame_remove_and_reinsert() {
        let (mut sprite, a, _) = with_layers();
        let before = sprite.clone();
        let command = commands::Command::FrameRemoved {
            frame: 1,
            duration: DEFAULT_FRAME_DURATION,
            cels: sprite.cels_at(1),
        };
        sprite.apply(DoUndo::Do(&command)).unwrap();
        assert_eq!(sprite.total_frames(), 2);
        assert_eq!(
            sprite.cel(a, 1).and_then(|cel| cel.image.pixel(2, 0)),
            Some(Rgba::WHITE)
        );
        sprite.apply(DoUndo::Undo(&command)).unwrap();
        assert_eq!(sprite, before);
    }
    #[test]
    fn restack_into_self_fails() {
        let mut sprite = Sprite::new(1, 1);
        let group = sprite.add_layer(None, Layer::group("g")).unwrap();
        let inner = sprite.add_layer(Some(group), Layer::group("inner")).unwrap();
        let command = commands::Command::LayerRestacked {
            target: group,
            old_parent: None,
            old_index: 0,
            new_parent: Some(inner),
            new_index: 0,
        };
        assert!(sprite.apply(DoUndo::Do(&command)).is_err());
        assert_eq!(sprite.children_of(None), &[group]);
    }
    #[test]
    fn browsable_order_skips_collapsed() {
        let mut sprite = Sprite::new(1, 1);
        let bottom = sprite.add_layer(None, Layer::image("bottom")).unwrap();
        let group = sprite.add_layer(None, Layer::group("group")).unwrap();
        let child = sprite.add_layer(Some(group), Layer::image("child")).unwrap();
        let top = sprite.add_layer(None, Layer::image("top")).unwrap();

        assert_eq!(sprite.all_layers(), vec![bottom, child, group, top]);
        assert_eq!(sprite.next_browsable(bottom), Some(child));
        assert_eq!(sprite.next_browsable(child), Some(group));
        assert_eq!(sprite.previous_browsable(group), Some(child));
        assert_eq!(sprite.previous_browsable(child), Some(bottom));
        assert_eq!(sprite.previous_browsable(bottom), None);
        assert_eq!(sprite.next_browsable(top), None);

        sprite.layer_mut(group).unwrap().flags |= LayerFlags::COLLAPSED;
        assert_eq!(sprite.all_browsable_layers(), vec![bottom, group, top]);
        assert_eq!(sprite.next_browsable(bottom), Some(group));
        assert_eq!(sprite.previous_browsable(group), Some(bottom));
    }
}
