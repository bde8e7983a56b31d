//! # Layers
//!
//! Layers form a tree under the sprite root. Children lists are ordered bottom to top, so "previous" is
//! below and "next" is above. Groups may be collapsed, hiding their children from the browsable order,
//! which is the order the user sees (and selects ranges) in.

use std::collections::BTreeMap;

use super::{Cel, Frame, Sprite};

pub type LayerID = crate::id::UniqueID<Layer>;

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct LayerFlags : u8 {
        const VISIBLE    = 0b0000_0001;
        const EDITABLE   = 0b0000_0010;
        /// Opaque bottom-most layer. Can't be moved, nothing can be placed below it.
        const BACKGROUND = 0b0000_0100;
        /// Cels are linked by default on new frames.
        const CONTINUOUS = 0b0000_1000;
        /// Group children are hidden from the browsable order.
        const COLLAPSED  = 0b0001_0000;
    }
}
impl Default for LayerFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::EDITABLE
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum LayerKind {
    Image { cels: BTreeMap<Frame, Cel> },
    Group { children: Vec<LayerID> },
}

#[derive(Clone, PartialEq, Debug)]
pub struct Layer {
    id: LayerID,
    pub name: String,
    pub(super) parent: Option<LayerID>,
    pub flags: LayerFlags,
    pub(super) kind: LayerKind,
}
impl Layer {
    #[must_use]
    pub fn image(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            LayerKind::Image {
                cels: BTreeMap::new(),
            },
        )
    }
    #[must_use]
    pub fn group(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            LayerKind::Group {
                children: Vec::new(),
            },
        )
    }
    fn with_kind(name: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id: LayerID::default(),
            name: name.into(),
            parent: None,
            flags: LayerFlags::default(),
            kind,
        }
    }
    #[must_use]
    pub fn id(&self) -> LayerID {
        self.id
    }
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Parent group, or `None` if directly under the sprite root.
    #[must_use]
    pub fn parent(&self) -> Option<LayerID> {
        self.parent
    }
    #[must_use]
    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }
    #[must_use]
    pub fn is_image(&self) -> bool {
        matches!(self.kind, LayerKind::Image { .. })
    }
    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self.kind, LayerKind::Group { .. })
    }
    #[must_use]
    pub fn is_background(&self) -> bool {
        self.flags.contains(LayerFlags::BACKGROUND)
    }
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        !self.flags.contains(LayerFlags::COLLAPSED)
    }
    #[must_use]
    pub fn cel(&self, frame: Frame) -> Option<&Cel> {
        match &self.kind {
            LayerKind::Image { cels } => cels.get(&frame),
            LayerKind::Group { .. } => None,
        }
    }
    /// Iterate cels in frame order. Empty for groups.
    pub fn cels(&self) -> impl Iterator<Item = (Frame, &Cel)> + '_ {
        let cels = match &self.kind {
            LayerKind::Image { cels } => Some(cels.iter().map(|(frame, cel)| (*frame, cel))),
            LayerKind::Group { .. } => None,
        };
        cels.into_iter().flatten()
    }
    pub(super) fn cels_mut(&mut self) -> Option<&mut BTreeMap<Frame, Cel>> {
        match &mut self.kind {
            LayerKind::Image { cels } => Some(cels),
            LayerKind::Group { .. } => None,
        }
    }
    /// Children, bottom to top. Empty for image layers.
    #[must_use]
    pub fn children(&self) -> &[LayerID] {
        match &self.kind {
            LayerKind::Group { children } => children,
            LayerKind::Image { .. } => &[],
        }
    }
    /// A copy of this layer under a fresh ID, detached from any parent.
    /// Group children are *not* copied here, see [`Sprite::duplicate_subtree`].
    #[must_use]
    pub(super) fn fresh_copy(&self) -> Self {
        Self {
            id: LayerID::default(),
            name: self.name.clone(),
            parent: None,
            flags: self.flags,
            kind: match &self.kind {
                LayerKind::Image { cels } => LayerKind::Image { cels: cels.clone() },
                LayerKind::Group { .. } => LayerKind::Group {
                    children: Vec::new(),
                },
            },
        }
    }
    pub(super) fn mem_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.name.len()
            + self.cels().map(|(_, cel)| cel.mem_size()).sum::<usize>()
            + std::mem::size_of_val(self.children())
    }
}

/// A layer and all its descendants, parents before children, ready to be re-inserted as a unit.
#[derive(Clone, PartialEq, Debug)]
pub struct LayerSubtree {
    pub(super) layers: Vec<Layer>,
}
impl LayerSubtree {
    /// A subtree of one layer. Any children a group lists are dropped.
    #[must_use]
    pub fn single(mut layer: Layer) -> Self {
        if let LayerKind::Group { children } = &mut layer.kind {
            children.clear();
        }
        layer.parent = None;
        Self {
            layers: vec![layer],
        }
    }
    /// The top-most layer of the subtree.
    #[must_use]
    pub fn root(&self) -> Option<&Layer> {
        self.layers.first()
    }
    pub fn root_mut(&mut self) -> Option<&mut Layer> {
        self.layers.first_mut()
    }
    /// Parents before children.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }
    #[must_use]
    pub fn root_id(&self) -> Option<LayerID> {
        self.root().map(Layer::id)
    }
    #[must_use]
    pub fn mem_size(&self) -> usize {
        self.layers.iter().map(Layer::mem_size).sum()
    }
}

/// Tree navigation.
impl Sprite {
    /// Children of the given group, or of the root if `None`. Empty if not found or not a group.
    #[must_use]
    pub fn children_of(&self, parent: Option<LayerID>) -> &[LayerID] {
        match parent {
            None => &self.root,
            Some(parent) => self
                .layers
                .get(&parent)
                .map_or(&[] as &[LayerID], Layer::children),
        }
    }
    pub(super) fn children_of_mut(&mut self, parent: Option<LayerID>) -> Option<&mut Vec<LayerID>> {
        match parent {
            None => Some(&mut self.root),
            Some(parent) => match &mut self.layers.get_mut(&parent)?.kind {
                LayerKind::Group { children } => Some(children),
                LayerKind::Image { .. } => None,
            },
        }
    }
    /// Position of a layer within its parent's children.
    #[must_use]
    pub fn index_in_parent(&self, layer: LayerID) -> Option<usize> {
        let parent = self.layers.get(&layer)?.parent;
        self.children_of(parent).iter().position(|id| *id == layer)
    }
    /// The sibling directly below.
    #[must_use]
    pub fn previous_sibling(&self, layer: LayerID) -> Option<LayerID> {
        let parent = self.layers.get(&layer)?.parent;
        let idx = self.index_in_parent(layer)?;
        let prev = idx.checked_sub(1)?;
        self.children_of(parent).get(prev).copied()
    }
    /// The sibling directly above.
    #[must_use]
    pub fn next_sibling(&self, layer: LayerID) -> Option<LayerID> {
        let parent = self.layers.get(&layer)?.parent;
        let idx = self.index_in_parent(layer)?;
        self.children_of(parent).get(idx + 1).copied()
    }
    #[must_use]
    pub fn first_layer(&self, parent: Option<LayerID>) -> Option<LayerID> {
        self.children_of(parent).first().copied()
    }
    #[must_use]
    pub fn last_layer(&self, parent: Option<LayerID>) -> Option<LayerID> {
        self.children_of(parent).last().copied()
    }
    /// An expanded, non-empty group.
    #[must_use]
    pub fn is_browsable(&self, layer: LayerID) -> bool {
        self.layers
            .get(&layer)
            .is_some_and(|l| l.is_group() && l.is_expanded() && !l.children().is_empty())
    }
    fn first_browsable_child(&self, group: LayerID) -> Option<LayerID> {
        let mut layer = self.first_layer(Some(group))?;
        while self.is_browsable(layer) {
            layer = self.first_layer(Some(layer))?;
        }
        Some(layer)
    }
    /// The layer above in browsable order.
    #[must_use]
    pub fn next_browsable(&self, layer: LayerID) -> Option<LayerID> {
        if let Some(next) = self.next_sibling(layer) {
            if self.is_browsable(next) {
                return self.first_browsable_child(next);
            }
            return Some(next);
        }
        // Going up. The root is not a layer.
        self.layers.get(&layer)?.parent
    }
    /// The layer below in browsable order.
    #[must_use]
    pub fn previous_browsable(&self, layer: LayerID) -> Option<LayerID> {
        if self.is_browsable(layer) {
            return self.last_layer(Some(layer));
        }
        if let Some(prev) = self.previous_sibling(layer) {
            return Some(prev);
        }
        let mut parent = self.layers.get(&layer)?.parent;
        while let Some(group) = parent {
            if let Some(prev) = self.previous_sibling(group) {
                return Some(prev);
            }
            parent = self.layers.get(&group)?.parent;
        }
        None
    }
    fn collect_layers(&self, parent: Option<LayerID>, browsable_only: bool, into: &mut Vec<LayerID>) {
        for &child in self.children_of(parent) {
            let Some(layer) = self.layers.get(&child) else {
                continue;
            };
            if layer.is_group() && (!browsable_only || layer.is_expanded()) {
                self.collect_layers(Some(child), browsable_only, into);
            }
            into.push(child);
        }
    }
    /// Every layer, children before their group, bottom to top.
    #[must_use]
    pub fn all_layers(&self) -> Vec<LayerID> {
        let mut layers = Vec::with_capacity(self.layers.len());
        self.collect_layers(None, false, &mut layers);
        layers
    }
    /// Like [`Self::all_layers`], skipping the contents of collapsed groups.
    #[must_use]
    pub fn all_browsable_layers(&self) -> Vec<LayerID> {
        let mut layers = Vec::with_capacity(self.layers.len());
        self.collect_layers(None, true, &mut layers);
        layers
    }
    /// Is `layer` a (possibly indirect) child of `group`?
    #[must_use]
    pub fn is_descendant_of(&self, layer: LayerID, group: LayerID) -> bool {
        let mut parent = self.layers.get(&layer).and_then(|l| l.parent);
        while let Some(p) = parent {
            if p == group {
                return true;
            }
            parent = self.layers.get(&p).and_then(|l| l.parent);
        }
        false
    }
    /// A layer and its descendants, parents first.
    #[must_use]
    pub fn subtree(&self, layer: LayerID) -> Option<LayerSubtree> {
        let mut layers = vec![self.layers.get(&layer)?.clone()];
        let mut cursor = 0;
        while let Some(current) = layers.get(cursor) {
            let children: Vec<Layer> = current
                .children()
                .iter()
                .filter_map(|child| self.layers.get(child).cloned())
                .collect();
            layers.extend(children);
            cursor += 1;
        }
        Some(LayerSubtree { layers })
    }
    /// Deep copy of a layer and its descendants with fresh IDs. The copy's root has no parent yet.
    #[must_use]
    pub fn duplicate_subtree(&self, layer: LayerID) -> Option<LayerSubtree> {
        let source = self.subtree(layer)?;
        let mut remap = hashbrown::HashMap::with_capacity(source.layers.len());
        let mut layers: Vec<Layer> = source
            .layers
            .iter()
            .map(|old| {
                let copy = old.fresh_copy();
                remap.insert(old.id, copy.id);
                copy
            })
            .collect();
        for (copy, old) in layers.iter_mut().zip(&source.layers) {
            // Root of the copy stays detached.
            copy.parent = if old.id == layer {
                None
            } else {
                old.parent.and_then(|p| remap.get(&p).copied())
            };
            if let LayerKind::Group { children } = &mut copy.kind {
                children.extend(old.children().iter().filter_map(|c| remap.get(c).copied()));
            }
        }
        Some(LayerSubtree { layers })
    }
    /// Unlink a layer from its parent's children, returning where it was.
    pub(super) fn detach(&mut self, layer: LayerID) -> Option<(Option<LayerID>, usize)> {
        let parent = self.layers.get(&layer)?.parent;
        let idx = self.index_in_parent(layer)?;
        self.children_of_mut(parent)?.remove(idx);
        Some((parent, idx))
    }
    /// Link a (detached) layer into a parent at the given child index. Fails if the parent is not
    /// a group or the index is past the end.
    pub(super) fn attach(&mut self, layer: LayerID, parent: Option<LayerID>, idx: usize) -> bool {
        let Some(children) = self.children_of_mut(parent) else {
            return false;
        };
        if idx > children.len() {
            return false;
        }
        children.insert(idx, layer);
        if let Some(layer) = self.layers.get_mut(&layer) {
            layer.parent = parent;
        }
        true
    }
}
