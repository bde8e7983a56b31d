//! # Ranges
//!
//! A [`DocRange`] is a selection over the (layer, frame) grid of a sprite. It is either a set of cels
//! (the cross product of its layers and frames), whole frames, or whole layers. Ranges are the
//! arguments and results of [`crate::range_ops`].

mod selected_frames;
mod selected_layers;

pub use selected_frames::SelectedFrames;
pub use selected_layers::SelectedLayers;

use crate::sprite::{Frame, LayerID, Sprite};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, strum::AsRefStr)]
pub enum RangeType {
    #[default]
    None,
    Cels,
    Frames,
    Layers,
}
impl RangeType {
    fn flag(self) -> RangeFlags {
        match self {
            Self::None => RangeFlags::empty(),
            Self::Cels => RangeFlags::CELS,
            Self::Frames => RangeFlags::FRAMES,
            Self::Layers => RangeFlags::LAYERS,
        }
    }
}

bitflags::bitflags! {
    /// Every type the range has been, since it was last cleared.
    /// A frame range that was once a cel range still filters by layer.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct RangeFlags : u8 {
        const CELS   = 0b001;
        const FRAMES = 0b010;
        const LAYERS = 0b100;
    }
}

/// Where a range is dropped relative to the destination range.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, strum::AsRefStr)]
pub enum DocRangePlace {
    Before,
    After,
    /// Inside a destination group, above its current children. Only meaningful for layer ranges.
    FirstChild,
}

#[derive(Clone, Debug)]
pub struct DocRange {
    ty: RangeType,
    flags: RangeFlags,
    layers: SelectedLayers,
    frames: SelectedFrames,
    selecting_from_layer: Option<LayerID>,
    selecting_from_frame: Frame,
}
impl PartialEq for DocRange {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.layers == other.layers && self.frames == other.frames
    }
}
impl Eq for DocRange {}
impl Default for DocRange {
    fn default() -> Self {
        Self {
            ty: RangeType::None,
            flags: RangeFlags::empty(),
            layers: SelectedLayers::new(),
            frames: SelectedFrames::new(),
            selecting_from_layer: None,
            selecting_from_frame: -1,
        }
    }
}

impl DocRange {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// A cel range over a single cel.
    #[must_use]
    pub fn cel(layer: LayerID, frame: Frame) -> Self {
        let mut range = Self::new();
        range.start_range(Some(layer), frame, RangeType::Cels);
        range
    }
    #[must_use]
    pub fn ty(&self) -> RangeType {
        self.ty
    }
    #[must_use]
    pub fn flags(&self) -> RangeFlags {
        self.flags
    }
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.ty != RangeType::None
    }
    /// Number of selected layers.
    #[must_use]
    pub fn layers(&self) -> usize {
        self.layers.len()
    }
    /// Number of selected frames.
    #[must_use]
    pub fn frames(&self) -> usize {
        self.frames.size()
    }
    #[must_use]
    pub fn selected_layers(&self) -> &SelectedLayers {
        &self.layers
    }
    #[must_use]
    pub fn selected_frames(&self) -> &SelectedFrames {
        &self.frames
    }
    pub fn set_selected_layers(&mut self, layers: SelectedLayers) {
        self.layers = layers;
    }
    pub fn set_selected_frames(&mut self, frames: SelectedFrames) {
        self.frames = frames;
    }
    pub fn set_type(&mut self, ty: RangeType) {
        self.ty = ty;
        self.flags |= ty.flag();
    }
    #[must_use]
    pub fn first_frame(&self) -> Frame {
        self.frames.first_frame()
    }
    #[must_use]
    pub fn last_frame(&self) -> Frame {
        self.frames.last_frame()
    }

    pub fn clear_range(&mut self) {
        *self = Self::new();
    }
    /// Begin a drag-style selection at an anchor. Does not clear what is already selected.
    /// A `None` layer or negative frame leaves that dimension's anchor unset.
    pub fn start_range(&mut self, layer: Option<LayerID>, frame: Frame, ty: RangeType) {
        self.ty = ty;
        self.flags |= ty.flag();
        self.selecting_from_layer = layer;
        if let Some(layer) = layer {
            self.layers.insert(layer);
        }
        if frame >= 0 {
            self.selecting_from_frame = frame;
            self.frames.insert(frame);
        } else {
            self.selecting_from_frame = -1;
        }
    }
    /// Extend the selection from the anchors given to [`Self::start_range`] up to these targets,
    /// selecting everything in between.
    pub fn end_range(&mut self, sprite: &Sprite, layer: Option<LayerID>, frame: Frame) {
        if let (Some(from), Some(to)) = (self.selecting_from_layer, layer) {
            self.select_layer_range(sprite, from, to);
        }
        if self.selecting_from_frame >= 0 && frame >= 0 {
            self.frames.insert_range(self.selecting_from_frame, frame);
        }
    }
    /// Walk the browsable order from `from` to `to`, trying upwards first.
    fn select_layer_range(&mut self, sprite: &Sprite, from: LayerID, to: LayerID) {
        let reaches = |step: fn(&Sprite, LayerID) -> Option<LayerID>| {
            std::iter::successors(Some(from), |layer| step(sprite, *layer)).any(|layer| layer == to)
        };
        let step: Option<fn(&Sprite, LayerID) -> Option<LayerID>> = if from == to {
            None
        } else if reaches(Sprite::next_browsable) {
            Some(Sprite::next_browsable)
        } else if reaches(Sprite::previous_browsable) {
            Some(Sprite::previous_browsable)
        } else {
            None
        };
        let mut cursor = Some(from);
        while let Some(layer) = cursor {
            self.layers.insert(layer);
            if layer == to {
                break;
            }
            cursor = step.and_then(|step| step(sprite, layer));
        }
    }
    pub fn select_layer(&mut self, layer: LayerID) {
        if self.ty == RangeType::None {
            self.ty = RangeType::Layers;
        }
        self.flags |= RangeFlags::LAYERS;
        self.layers.insert(layer);
    }
    pub fn select_layers(&mut self, layers: impl IntoIterator<Item = LayerID>) {
        for layer in layers {
            self.select_layer(layer);
        }
    }
    pub fn erase_and_adjust_range(&mut self, layer: LayerID) {
        self.layers.erase(layer);
        if self.layers.is_empty() && self.ty == RangeType::Layers {
            self.clear_range();
        }
    }
    #[must_use]
    pub fn contains_layer(&self, layer: LayerID) -> bool {
        self.enabled() && self.layers.contains(layer)
    }
    #[must_use]
    pub fn contains_frame(&self, frame: Frame) -> bool {
        self.enabled() && self.frames.contains(frame)
    }
    /// Is the cel at `(layer, frame)` addressed by this range?
    ///
    /// A frame range addresses every layer unless it was refined by a cel or layer selection,
    /// and symmetrically for layer ranges.
    #[must_use]
    pub fn contains(&self, layer: LayerID, frame: Frame) -> bool {
        match self.ty {
            RangeType::None => false,
            RangeType::Cels => self.contains_layer(layer) && self.contains_frame(frame),
            RangeType::Frames => {
                self.contains_frame(frame)
                    && (!self.flags.intersects(RangeFlags::CELS | RangeFlags::LAYERS)
                        || self.contains_layer(layer))
            }
            RangeType::Layers => {
                self.contains_layer(layer)
                    && (!self.flags.intersects(RangeFlags::CELS | RangeFlags::FRAMES)
                        || self.contains_frame(frame))
            }
        }
    }
    /// Turn a frame or layer range into a cel range by filling the missing dimension with
    /// everything. Returns false for an empty range.
    pub fn convert_to_cels(&mut self, sprite: &Sprite) -> bool {
        match self.ty {
            RangeType::None => return false,
            RangeType::Cels => (),
            RangeType::Frames => {
                if !self.flags.intersects(RangeFlags::CELS | RangeFlags::LAYERS) {
                    for layer in sprite.all_browsable_layers() {
                        self.layers.insert(layer);
                    }
                }
                self.ty = RangeType::Cels;
            }
            RangeType::Layers => {
                if !self.flags.intersects(RangeFlags::CELS | RangeFlags::FRAMES) {
                    self.frames.insert_range(0, sprite.last_frame());
                }
                self.ty = RangeType::Cels;
            }
        }
        true
    }
    /// Shift the selection so it keeps pointing at the same content after layers or frames
    /// were inserted or removed elsewhere.
    pub fn displace(&mut self, sprite: &Sprite, layer_delta: i32, frame_delta: Frame) {
        self.layers.displace(sprite, layer_delta);
        self.frames.displace(frame_delta);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sprite::Layer;

    fn three_layers() -> (Sprite, [LayerID; 3]) {
        let mut sprite = Sprite::new(1, 1);
        sprite.set_total_frames(4);
        let a = sprite.add_layer(None, Layer::image("a")).unwrap();
        let b = sprite.add_layer(None, Layer::image("b")).unwrap();
        let c = sprite.add_layer(None, Layer::image("c")).unwrap();
        (sprite, [a, b, c])
    }

    #[test]
    fn end_range_walks_both_ways() {
        let (sprite, [a, b, c]) = three_layers();
        let mut up = DocRange::new();
        up.start_range(Some(a), 1, RangeType::Cels);
        up.end_range(&sprite, Some(c), 3);
        assert_eq!(up.selected_layers().to_all_layers_list(&sprite), vec![a, b, c]);
        assert_eq!(up.first_frame(), 1);
        assert_eq!(up.last_frame(), 3);

        let mut down = DocRange::new();
        down.start_range(Some(c), 3, RangeType::Cels);
        down.end_range(&sprite, Some(b), 1);
        assert_eq!(down.selected_layers().to_all_layers_list(&sprite), vec![b, c]);
        assert_eq!(down.frames(), 3);
    }
    #[test]
    fn containment_by_type() {
        let (sprite, [a, b, _]) = three_layers();
        let mut frames = DocRange::new();
        frames.start_range(None, 1, RangeType::Frames);
        frames.end_range(&sprite, None, 2);
        assert!(frames.contains(a, 1));
        assert!(frames.contains(b, 2));
        assert!(!frames.contains(a, 3));

        // A cel selection refined into a frame selection still filters layers.
        let mut refined = DocRange::cel(a, 1);
        refined.set_type(RangeType::Frames);
        assert!(refined.contains(a, 1));
        assert!(!refined.contains(b, 1));
    }
    #[test]
    fn convert_layers_to_cels() {
        let (sprite, [a, _, _]) = three_layers();
        let mut range = DocRange::new();
        range.select_layer(a);
        assert_eq!(range.ty(), RangeType::Layers);
        assert!(range.convert_to_cels(&sprite));
        assert_eq!(range.ty(), RangeType::Cels);
        assert_eq!(range.frames(), 4);
        assert!(range.contains(a, 3));
        assert!(!DocRange::new().convert_to_cels(&sprite));
    }
    #[test]
    fn equality_ignores_anchors() {
        let (sprite, [a, b, _]) = three_layers();
        let mut dragged = DocRange::new();
        dragged.start_range(Some(b), -1, RangeType::Layers);
        dragged.end_range(&sprite, Some(a), -1);
        let mut picked = DocRange::new();
        picked.select_layers([a, b]);
        assert_eq!(dragged, picked);
    }
}
