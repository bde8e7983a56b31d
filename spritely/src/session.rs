//! A short scripted editing session, run headless at startup to exercise the engine end to end.

use std::sync::Arc;

use spritely_core::doc_api::TagsHandling;
use spritely_core::range::{DocRange, DocRangePlace, RangeType};
use spritely_core::range_ops;
use spritely_core::sprite::{Cel, Frame, Image, Layer, LayerID, Rgba, Sprite, Tag};
use spritely_core::{Context, DocWriter, Document};

use crate::config::Config;

const SIZE: u32 = 16;
const FRAMES: Frame = 4;

/// A small animation: a few image layers, each frame a different shade, with one tag.
fn demo_sprite() -> Sprite {
    let mut sprite = Sprite::new(SIZE, SIZE);
    sprite.set_total_frames(FRAMES);
    for frame in 0..FRAMES {
        sprite.set_frame_duration(frame, 80 + 20 * frame.unsigned_abs());
    }
    for (index, name) in ["background", "body", "outline"].into_iter().enumerate() {
        let Some(layer) = sprite.add_layer(None, Layer::image(name)) else {
            continue;
        };
        for frame in 0..FRAMES {
            let shade = u8::try_from(40 * (frame + 1)).unwrap_or(u8::MAX);
            let mut image = Image::filled(SIZE, SIZE, Rgba::new(shade, shade, shade, 255));
            // Mark each cel with its layer, so moves are visible in a dump.
            image.put_pixel(u32::try_from(index).unwrap_or_default(), 0, Rgba::WHITE);
            // The frame exists, so this only fails for non-image layers.
            let _ = sprite.set_cel(layer, frame, Cel::new(image));
        }
    }
    sprite.add_tag(Tag::new("walk", 0, FRAMES - 1));
    sprite
}

fn frames(writer: &DocWriter, from: Frame, to: Frame) -> DocRange {
    let mut range = DocRange::new();
    range.start_range(None, from, RangeType::Frames);
    range.end_range(writer.sprite(), None, to);
    range
}
fn layer_range(layer: LayerID) -> DocRange {
    let mut range = DocRange::new();
    range.start_range(Some(layer), -1, RangeType::Layers);
    range
}

fn describe(writer: &DocWriter) {
    let sprite = writer.sprite();
    let history = writer.history();
    log::info!(
        "{:?}: {} frames, {} layers, version {}, {} undo steps using {}",
        writer.name(),
        sprite.total_frames(),
        sprite.layer_count(),
        writer.version(),
        history.undo_depth(),
        human_bytes::human_bytes(history.memory_usage() as f64),
    );
}

/// Open a document, make a few edits, and step back through them.
pub fn run(context: &Context, config: &Config) -> anyhow::Result<Arc<Document>> {
    let doc = context.add_document(Document::with_history(
        "demo",
        demo_sprite(),
        config.history(),
    ));
    let mut writer = doc.write(config.lock_timeout())?;
    describe(&writer);

    let (from, to) = (frames(&writer, 0, 1), frames(&writer, 3, 3));
    let moved = range_ops::move_range(
        &mut writer,
        &from,
        &to,
        DocRangePlace::After,
        TagsHandling::Default,
    )?;
    log::info!(
        "Moved frames 0-1 to {}-{}",
        moved.first_frame(),
        moved.last_frame()
    );

    let layers = writer.sprite().all_layers();
    if let (Some(&bottom), Some(&top)) = (layers.first(), layers.last()) {
        range_ops::copy_range(
            &mut writer,
            &layer_range(bottom),
            &layer_range(top),
            DocRangePlace::After,
            TagsHandling::Default,
        )?;
    }

    let everything = frames(&writer, 0, writer.sprite().last_frame());
    range_ops::reverse_frames(&mut writer, &everything)?;
    describe(&writer);

    while writer.history().undo_depth() > 1 {
        let Some(step) = writer.undo().transpose()? else {
            break;
        };
        log::info!("Undid {:?}", step.label);
    }
    if let Some(step) = writer.redo().transpose()? {
        log::info!("Redid {:?}", step.label);
    }
    describe(&writer);
    Ok(doc)
}
