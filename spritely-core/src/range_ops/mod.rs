//! # Range operations
//!
//! Dragging a [`DocRange`] somewhere else in the timeline. Cels, whole frames and whole layers can
//! each be moved or copied, and frames can be reversed in place. Every operation validates its
//! arguments before touching the document, then runs as a single transaction built from
//! [`DocApi`] primitives, so one undo reverts all of it.
//!
//! Operations that would leave the document as it is return the source range and record nothing.


use az::SaturatingAs;

use crate::commands::CommandError;
use crate::doc_api::{DocApi, DropFramePlace, TagsHandling};
use crate::document::{DocAccessError, DocWriter};
use crate::range::{DocRange, DocRangePlace, RangeType, SelectedFrames};
use crate::sprite::{Frame, Layer, LayerID, Sprite};
use crate::transaction::Modification;
use crate::tx::Tx;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOpError {
    #[error("the background layer cannot be moved")]
    BackgroundLayerMove,
    #[error("you cannot move or copy something below the background layer")]
    BelowBackground,
    #[error("invalid drop place for this kind of range")]
    InvalidPlace,
    #[error("you need to specify a non-empty cels range")]
    EmptyCelRange,
    #[error(transparent)]
    Access(#[from] DocAccessError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Op {
    Move,
    Copy,
}
impl Op {
    fn label(self) -> &'static str {
        match self {
            Self::Move => "Move Range",
            Self::Copy => "Copy Range",
        }
    }
}

/// Move the contents of `from` next to `to`. Returns where the moved content ended up.
pub fn move_range(
    writer: &mut DocWriter,
    from: &DocRange,
    to: &DocRange,
    place: DocRangePlace,
    tags: TagsHandling,
) -> Result<DocRange, RangeOpError> {
    drop_range_op(writer, Op::Move, from, place, tags, to.clone())
}

/// Copy the contents of `from` next to `to`. Returns the range of the new copies.
pub fn copy_range(
    writer: &mut DocWriter,
    from: &DocRange,
    to: &DocRange,
    place: DocRangePlace,
    tags: TagsHandling,
) -> Result<DocRange, RangeOpError> {
    drop_range_op(writer, Op::Copy, from, place, tags, to.clone())
}

/// Reverse the order of the frames (or, for cel and layer ranges, just the cels) in a range.
pub fn reverse_frames(writer: &mut DocWriter, range: &DocRange) -> Result<(), RangeOpError> {
    let sprite = writer.sprite();
    let (begin, end, layers, move_frames) = match range.ty() {
        RangeType::None => return Ok(()),
        RangeType::Cels => (
            range.first_frame(),
            range.last_frame(),
            range.selected_layers().to_browsable_layer_list(sprite),
            false,
        ),
        RangeType::Frames => (range.first_frame(), range.last_frame(), Vec::new(), true),
        RangeType::Layers => (
            0,
            sprite.last_frame(),
            range.selected_layers().to_browsable_layer_list(sprite),
            false,
        ),
    };
    if begin < 0 || end < begin {
        return Ok(());
    }
    log::debug!("Reversing frames {begin}..={end} of {}", writer.id());

    let mut tx = Tx::with_writer(writer, "Reverse Frames", Modification::ModifyDocument)?;
    let mut api = DocApi::new(&mut tx);
    if move_frames {
        // Repeatedly sink the first frame to the end of the shrinking range.
        for rev in ((begin + 1)..=(end + 1)).rev() {
            api.move_frame(begin, rev, DropFramePlace::Before, TagsHandling::DontAdjust)?;
        }
    } else {
        for layer in layers {
            if !is_image(api.sprite(), layer) {
                continue;
            }
            let (mut frame, mut rev) = (begin, end);
            while frame < rev {
                api.swap_cel(layer, frame, rev)?;
                frame += 1;
                rev -= 1;
            }
        }
    }
    tx.set_new_doc_range(range.clone());
    tx.commit();
    Ok(())
}

/// Validated work for one drop, computed before the transaction is opened.
enum Plan {
    /// Nothing would change.
    NoOp,
    Cels {
        src_layers: Vec<LayerID>,
        dst_layers: Vec<LayerID>,
        src_frames: SelectedFrames,
        dst_frames: SelectedFrames,
    },
    Frames {
        dst_frame: Frame,
    },
    Layers {
        src_layers: Vec<LayerID>,
        dst_layers: Vec<LayerID>,
    },
    /// The sprite has no layers to act on.
    Nothing,
}

fn drop_range_op(
    writer: &mut DocWriter,
    op: Op,
    from: &DocRange,
    place: DocRangePlace,
    tags: TagsHandling,
    mut to: DocRange,
) -> Result<DocRange, RangeOpError> {
    let (plan, place, parent) = plan_drop(writer.sprite(), op, from, place, tags, &mut to)?;
    let place = match plan {
        Plan::NoOp => {
            log::trace!("{} of {:?} is a no-op", op.label(), from.ty());
            return Ok(from.clone());
        }
        _ => place,
    };
    let frame_place = match place {
        DocRangePlace::Before => DropFramePlace::Before,
        DocRangePlace::After => DropFramePlace::After,
        DocRangePlace::FirstChild => return Err(RangeOpError::InvalidPlace),
    };
    log::debug!(
        "{} {:?} {} in {}",
        op.label(),
        from.ty(),
        place.as_ref(),
        writer.id()
    );

    let mut tx = Tx::with_writer(writer, op.label(), Modification::ModifyDocument)?;
    let mut api = DocApi::new(&mut tx);
    let result = match plan {
        Plan::NoOp | Plan::Nothing => DocRange::new(),
        Plan::Cels {
            src_layers,
            dst_layers,
            src_frames,
            dst_frames,
        } => {
            move_or_copy_cels(&mut api, op, &src_layers, &dst_layers, &src_frames, &dst_frames)?;
            to
        }
        Plan::Frames { dst_frame } => {
            move_or_copy_frames(&mut api, op, from, dst_frame, frame_place, tags)?
        }
        Plan::Layers {
            src_layers,
            dst_layers,
        } => move_or_copy_layers(&mut api, op, from, &src_layers, &dst_layers, parent, place)?,
    };
    if result.ty() != RangeType::None {
        tx.set_new_doc_range(result.clone());
    }
    tx.commit();
    Ok(result)
}

/// Resolve the drop place and parent group, and decide what (if anything) needs doing.
fn plan_drop(
    sprite: &Sprite,
    op: Op,
    from: &DocRange,
    mut place: DocRangePlace,
    tags: TagsHandling,
    to: &mut DocRange,
) -> Result<(Plan, DocRangePlace, Option<LayerID>), RangeOpError> {
    let mut parent = None;
    if to.ty() == RangeType::Layers {
        let first = to
            .selected_layers()
            .to_all_layers_list(sprite)
            .first()
            .copied();
        if let Some(first) = first {
            // Dropping as the first child is dropping after the group's current top child.
            if place == DocRangePlace::FirstChild && sprite.layer(first).is_some_and(Layer::is_group) {
                place = DocRangePlace::After;
                parent = Some(first);
                let last = sprite.last_layer(Some(first));
                to.clear_range();
                to.start_range(last, -1, RangeType::Layers);
                to.end_range(sprite, last, -1);
            } else {
                parent = sprite.layer(first).and_then(Layer::parent);
            }
            // Can't put a group inside itself.
            if let Some(parent) = parent {
                if from
                    .selected_layers()
                    .iter()
                    .any(|layer| layer == parent || sprite.is_descendant_of(parent, layer))
                {
                    return Ok((Plan::NoOp, place, None));
                }
            }
        }
    }
    if place == DocRangePlace::FirstChild {
        return Err(RangeOpError::InvalidPlace);
    }

    let plan = match from.ty() {
        RangeType::None => Plan::NoOp,
        RangeType::Cels => plan_cels(sprite, from, to)?,
        RangeType::Frames => {
            if op == Op::Move && frames_stay(sprite, from, to, place, tags) {
                Plan::NoOp
            } else {
                Plan::Frames {
                    dst_frame: match place {
                        DocRangePlace::Before => to.first_frame(),
                        _ => to.last_frame(),
                    },
                }
            }
        }
        RangeType::Layers => plan_layers(sprite, op, from, to, place)?,
    };
    Ok((plan, place, parent))
}

fn plan_cels(sprite: &Sprite, from: &DocRange, to: &DocRange) -> Result<Plan, RangeOpError> {
    if from == to {
        return Ok(Plan::NoOp);
    }
    let all = sprite.all_browsable_layers();
    if all.is_empty() {
        return Ok(Plan::Nothing);
    }
    let mut src_layers = from.selected_layers().to_browsable_layer_list(sprite);
    let mut dst_layers = to.selected_layers().to_browsable_layer_list(sprite);
    let (Some(src_front), Some(dst_front)) = (src_layers.first(), dst_layers.first()) else {
        return Err(RangeOpError::EmptyCelRange);
    };
    let index = |layer: &LayerID| all.iter().position(|l| l == layer);
    // Moving upwards: start from the top so no source is overwritten before it's read.
    if index(src_front) < index(dst_front) {
        src_layers.reverse();
        dst_layers.reverse();
    }
    // Moving right: start from the last frame, for the same reason.
    let backwards = from.first_frame() < to.first_frame();
    let (src_frames, dst_frames) = (
        from.selected_frames().with_reversed(backwards),
        to.selected_frames().with_reversed(backwards),
    );
    Ok(Plan::Cels {
        src_layers,
        dst_layers,
        src_frames,
        dst_frames,
    })
}

/// A single run of frames dropped within or right next to itself.
fn frames_stay(
    sprite: &Sprite,
    from: &DocRange,
    to: &DocRange,
    place: DocRangePlace,
    tags: TagsHandling,
) -> bool {
    // Tags may still shift even when no frame does.
    if !sprite.tags().is_empty() && tags != TagsHandling::DontAdjust {
        return false;
    }
    from.selected_frames().ranges() == 1
        && ((to.first_frame() >= from.first_frame() && to.last_frame() <= from.last_frame())
            || (place == DocRangePlace::Before && to.first_frame() == from.last_frame() + 1)
            || (place == DocRangePlace::After && to.last_frame() == from.first_frame() - 1))
}

fn plan_layers(
    sprite: &Sprite,
    op: Op,
    from: &DocRange,
    to: &DocRange,
    place: DocRangePlace,
) -> Result<Plan, RangeOpError> {
    let src_sel = from.selected_layers();
    let dst_sel = to.selected_layers();
    let src_layers = src_sel.to_browsable_layer_list(sprite);
    let dst_layers = dst_sel.to_browsable_layer_list(sprite);
    if op == Op::Move {
        let (Some(src_front), Some(src_back)) = (src_layers.first(), src_layers.last()) else {
            return Ok(Plan::NoOp);
        };
        // Adjacent siblings dropped onto or right next to themselves.
        if !dst_sel.is_empty()
            && src_sel.has_same_parent(sprite)
            && dst_sel.has_same_parent(sprite)
            && src_sel.are_layers_adjacent(sprite)
            && dst_sel.are_layers_adjacent(sprite)
        {
            if src_layers.iter().any(|layer| dst_sel.contains(*layer)) {
                return Ok(Plan::NoOp);
            }
            let stays = match place {
                DocRangePlace::Before => dst_layers.first().copied() == sprite.next_sibling(*src_back),
                DocRangePlace::After => dst_layers.last().copied() == sprite.previous_sibling(*src_front),
                DocRangePlace::FirstChild => false,
            };
            if stays {
                return Ok(Plan::NoOp);
            }
        }
        if src_sel
            .iter()
            .any(|layer| sprite.layer(layer).is_some_and(Layer::is_background))
        {
            return Err(RangeOpError::BackgroundLayerMove);
        }
    }
    if place == DocRangePlace::Before
        && dst_sel
            .iter()
            .any(|layer| sprite.layer(layer).is_some_and(Layer::is_background))
    {
        return Err(RangeOpError::BelowBackground);
    }
    if sprite.all_browsable_layers().is_empty() {
        return Ok(Plan::Nothing);
    }
    Ok(Plan::Layers {
        src_layers,
        dst_layers,
    })
}

fn is_image(sprite: &Sprite, layer: LayerID) -> bool {
    sprite.layer(layer).is_some_and(Layer::is_image)
}

fn move_or_copy_cels(
    api: &mut DocApi,
    op: Op,
    src_layers: &[LayerID],
    dst_layers: &[LayerID],
    src_frames: &SelectedFrames,
    dst_frames: &SelectedFrames,
) -> Result<(), CommandError> {
    for (idx, &src_layer) in src_layers.iter().enumerate() {
        if !is_image(api.sprite(), src_layer) {
            continue;
        }
        let dst_layer = dst_layers
            .get(idx)
            .copied()
            .filter(|layer| is_image(api.sprite(), *layer));
        for (src_frame, dst_frame) in src_frames.iter().zip(dst_frames.iter()) {
            match (dst_layer, op) {
                (Some(dst_layer), Op::Move) => api.move_cel(src_layer, src_frame, dst_layer, dst_frame)?,
                (Some(dst_layer), Op::Copy) => api.copy_cel(src_layer, src_frame, dst_layer, dst_frame)?,
                // Cels dropped anywhere but an image layer are discarded.
                (None, Op::Move) => api.clear_cel(src_layer, src_frame)?,
                (None, Op::Copy) => (),
            }
        }
    }
    Ok(())
}

/// Move or copy every selected frame, in ascending order, next to `dst_frame`.
///
/// Each step shifts the frames after it, so the positions of the remaining source frames and of
/// the drop point are tracked as the walk goes.
fn move_or_copy_frames(
    api: &mut DocApi,
    op: Op,
    from: &DocRange,
    mut dst_frame: Frame,
    place: DropFramePlace,
    tags: TagsHandling,
) -> Result<DocRange, CommandError> {
    let src_frames = from.selected_frames();
    let mut src_delta: Frame = 0;
    // Copies inserted before the drop point that the source frames haven't been shifted by yet.
    let mut first_copied_block: Frame = 0;
    let mut dst_before = match place {
        DropFramePlace::Before => dst_frame,
        DropFramePlace::After => dst_frame + 1,
    };

    for src in src_frames.iter_ascending() {
        let mut from_frame = src + src_delta;
        match op {
            Op::Move => {
                if src >= dst_before {
                    src_delta = 0;
                    from_frame = src;
                }
                api.move_frame(from_frame, dst_frame, place, tags)?;
                if from_frame < dst_before - 1 {
                    src_delta -= 1;
                } else if from_frame > dst_before - 1 {
                    dst_before += 1;
                    dst_frame += 1;
                }
            }
            Op::Copy => {
                if from_frame >= dst_before - 1 && first_copied_block != 0 {
                    src_delta += first_copied_block;
                    from_frame += first_copied_block;
                    first_copied_block = 0;
                }
                api.copy_frame(from_frame, dst_frame, place, tags)?;
                if from_frame < dst_before - 1 {
                    first_copied_block += 1;
                } else {
                    src_delta += 1;
                }
                dst_before += 1;
                dst_frame += 1;
            }
        }
    }

    let count: Frame = src_frames.size().saturating_as();
    let mut result = DocRange::new();
    if !from.selected_layers().is_empty() {
        result.select_layers(from.selected_layers().iter());
    }
    result.start_range(None, dst_before - count, RangeType::Frames);
    result.end_range(api.sprite(), None, dst_before - 1);
    Ok(result)
}

fn move_or_copy_layers(
    api: &mut DocApi,
    op: Op,
    from: &DocRange,
    src_layers: &[LayerID],
    dst_layers: &[LayerID],
    parent: Option<LayerID>,
    place: DocRangePlace,
) -> Result<DocRange, CommandError> {
    match (op, place) {
        (Op::Move, DocRangePlace::Before) => {
            let before = dst_layers.first().copied();
            let mut after: Option<LayerID> = None;
            for &layer in src_layers {
                match after {
                    Some(after) => api.restack_layer_after(layer, parent, Some(after))?,
                    None => api.restack_layer_before(layer, parent, before)?,
                }
                after = Some(layer);
            }
            Ok(from.clone())
        }
        (Op::Move, _) => {
            let mut after = dst_layers.last().copied();
            for &layer in src_layers {
                api.restack_layer_after(layer, parent, after)?;
                after = Some(layer);
            }
            Ok(from.clone())
        }
        (Op::Copy, DocRangePlace::Before) => {
            let before = dst_layers.first().copied();
            let mut result = DocRange::new();
            for &layer in src_layers {
                let copy = api.duplicate_layer_before(layer, parent, before)?;
                result.start_range(Some(copy), -1, RangeType::Layers);
                result.end_range(api.sprite(), Some(copy), -1);
            }
            Ok(result)
        }
        (Op::Copy, _) => {
            // Each copy goes right above the destination, so go top-down to keep the order.
            let after = dst_layers.last().copied();
            let mut result = DocRange::new();
            for &layer in src_layers.iter().rev() {
                let copy = api.duplicate_layer_after(layer, parent, after)?;
                result.start_range(Some(copy), -1, RangeType::Layers);
                result.end_range(api.sprite(), Some(copy), -1);
            }
            Ok(result)
        }
    }
}
