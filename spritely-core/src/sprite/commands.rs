//! Primitive, reversible changes to a [`super::Sprite`].
//!
//! Each command carries both the old and new state, so applying it in reverse needs no extra
//! bookkeeping, and a mismatch between the recorded old state and the actual state is detected
//! rather than silently clobbered.

use super::{Cel, Frame, LayerFlags, LayerID, LayerSubtree, Tag, TagID};

#[derive(Clone, Debug, strum::AsRefStr)]
pub enum Command {
    /// A whole frame column was inserted at `frame`, shifting later frames up.
    FrameInserted {
        frame: Frame,
        duration: u32,
        cels: Vec<(LayerID, Cel)>,
    },
    /// A whole frame column was removed from `frame`, shifting later frames down.
    FrameRemoved {
        frame: Frame,
        duration: u32,
        cels: Vec<(LayerID, Cel)>,
    },
    /// The frame column at `from` was taken out and reinserted so it lands at index `to`.
    FrameMoved { from: Frame, to: Frame },
    FrameDurationChanged { frame: Frame, from: u32, to: u32 },
    /// `None` is an empty cel.
    CelReplaced {
        layer: LayerID,
        frame: Frame,
        from: Option<Cel>,
        to: Option<Cel>,
    },
    CelsSwapped { layer: LayerID, a: Frame, b: Frame },
    /// Indices are positions within the parent's children. `new_index` is counted with the target
    /// already removed from `old_parent`.
    LayerRestacked {
        target: LayerID,
        old_parent: Option<LayerID>,
        old_index: usize,
        new_parent: Option<LayerID>,
        new_index: usize,
    },
    LayerInserted {
        subtree: LayerSubtree,
        parent: Option<LayerID>,
        index: usize,
    },
    LayerRemoved {
        subtree: LayerSubtree,
        parent: Option<LayerID>,
        index: usize,
    },
    LayerFlagsChanged {
        target: LayerID,
        from: LayerFlags,
        to: LayerFlags,
    },
    TagInserted { tag: Tag, index: usize },
    TagRemoved { tag: Tag, index: usize },
    TagRangeChanged {
        tag: TagID,
        from: (Frame, Frame),
        to: (Frame, Frame),
    },
    SpriteResized { from: (u32, u32), to: (u32, u32) },
}
impl Command {
    /// Approximate memory retained by this command while it sits in the undo history.
    #[must_use]
    pub fn mem_size(&self) -> usize {
        let extra = match self {
            Self::FrameInserted { cels, .. } | Self::FrameRemoved { cels, .. } => {
                cels.iter().map(|(_, cel)| cel.mem_size()).sum()
            }
            Self::CelReplaced { from, to, .. } => {
                from.as_ref().map_or(0, Cel::mem_size) + to.as_ref().map_or(0, Cel::mem_size)
            }
            Self::LayerInserted { subtree, .. } | Self::LayerRemoved { subtree, .. } => {
                subtree.mem_size()
            }
            Self::TagInserted { tag, .. } | Self::TagRemoved { tag, .. } => tag.name.len(),
            Self::FrameMoved { .. }
            | Self::FrameDurationChanged { .. }
            | Self::CelsSwapped { .. }
            | Self::LayerRestacked { .. }
            | Self::LayerFlagsChanged { .. }
            | Self::TagRangeChanged { .. }
            | Self::SpriteResized { .. } => 0,
        };
        std::mem::size_of::<Self>() + extra
    }
}
