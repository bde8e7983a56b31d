//! # Backup
//!
//! Periodic snapshots of unsaved work. A backup pass never waits on a document: it reads through a
//! [`WeakDocReader`](crate::document::WeakDocReader), skips anything being written, and abandons a
//! copy as soon as a writer asks for the document. Whatever was skipped is picked up by the next pass.

use std::time::Duration;

use crate::context::Context;
use crate::document::{Document, DocumentID, WeakDocReader};
use crate::sprite::Sprite;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupError {
    #[error("the document is being written")]
    Busy,
    #[error("a writer asked for the document mid-backup")]
    Yielded,
}

/// A copy of a document's sprite at some version.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub document: DocumentID,
    pub name: String,
    pub version: u64,
    pub sprite: Sprite,
    /// Hash of the sprite's frames and pixels, to recognize unchanged content.
    pub checksum: blake3::Hash,
}
impl Snapshot {
    /// Copy the state behind a weak reader, giving up if a writer wants it back.
    fn take(document: DocumentID, reader: &WeakDocReader) -> Result<Self, BackupError> {
        let state = reader.state().ok_or(BackupError::Busy)?;
        let checksum = checksum(state.sprite(), || reader.should_yield())?;
        Ok(Self {
            document,
            name: state.name().to_owned(),
            version: state.version(),
            sprite: state.sprite().clone(),
            checksum,
        })
    }
    #[must_use]
    pub fn mem_size(&self) -> usize {
        self.sprite
            .all_layers()
            .into_iter()
            .filter_map(|layer| self.sprite.layer(layer))
            .flat_map(|layer| layer.cels().map(|(_, cel)| cel.mem_size()))
            .sum()
    }
}

/// Content hash of a sprite: frames, tags, the layer tree and every cel. `should_yield` is polled
/// between layers, aborting with [`BackupError::Yielded`] when it returns true.
fn checksum(sprite: &Sprite, should_yield: impl Fn() -> bool) -> Result<blake3::Hash, BackupError> {
    fn update_str(hasher: &mut blake3::Hasher, string: &str) {
        hasher.update(&string.len().to_le_bytes());
        hasher.update(string.as_bytes());
    }
    let mut hasher = blake3::Hasher::new();
    let (width, height) = sprite.size();
    hasher.update(&width.to_le_bytes());
    hasher.update(&height.to_le_bytes());
    hasher.update(&sprite.total_frames().to_le_bytes());
    for frame in 0..sprite.total_frames() {
        hasher.update(&sprite.frame_duration(frame).unwrap_or_default().to_le_bytes());
    }
    hasher.update(&sprite.tags().len().to_le_bytes());
    for tag in sprite.tags() {
        hasher.update(&tag.id().get().to_le_bytes());
        update_str(&mut hasher, &tag.name);
        hasher.update(&tag.from_frame().to_le_bytes());
        hasher.update(&tag.to_frame().to_le_bytes());
    }
    // Post-order, so the position of each layer in the tree is covered by the order plus its parent.
    for id in sprite.all_layers() {
        if should_yield() {
            return Err(BackupError::Yielded);
        }
        let Some(layer) = sprite.layer(id) else {
            continue;
        };
        hasher.update(&id.get().to_le_bytes());
        hasher.update(&layer.parent().map_or(0, |parent| parent.get()).to_le_bytes());
        hasher.update(&[u8::from(layer.is_group()), layer.flags.bits()]);
        update_str(&mut hasher, &layer.name);
        for (frame, cel) in layer.cels() {
            hasher.update(&frame.to_le_bytes());
            hasher.update(&cel.position.0.to_le_bytes());
            hasher.update(&cel.position.1.to_le_bytes());
            hasher.update(&[cel.opacity]);
            hasher.update(&cel.image.width().to_le_bytes());
            hasher.update(&cel.image.height().to_le_bytes());
            hasher.update(cel.image.as_bytes());
        }
        // Terminates the cel list, so cels can't shift between layers unnoticed.
        hasher.update(&[0xff]);
    }
    Ok(hasher.finalize())
}

/// The latest snapshot of each document.
#[derive(Default)]
pub struct BackupStore {
    snapshots: parking_lot::Mutex<hashbrown::HashMap<DocumentID, Snapshot>>,
}
impl BackupStore {
    /// Store a snapshot, replacing the previous one for its document.
    /// Returns false, storing nothing, if the sprite is identical to the previous snapshot's.
    fn store(&self, snapshot: Snapshot) -> bool {
        let mut snapshots = self.snapshots.lock();
        match snapshots.get_mut(&snapshot.document) {
            Some(old) if old.checksum == snapshot.checksum && old.sprite == snapshot.sprite => {
                old.version = snapshot.version;
                false
            }
            _ => {
                snapshots.insert(snapshot.document, snapshot);
                true
            }
        }
    }
    #[must_use]
    pub fn latest(&self, document: DocumentID) -> Option<Snapshot> {
        self.snapshots.lock().get(&document).cloned()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.lock().len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.lock().is_empty()
    }
    pub fn forget(&self, document: DocumentID) -> Option<Snapshot> {
        self.snapshots.lock().remove(&document)
    }
}

/// What happened to each document during a pass.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct BackupReport {
    /// New snapshots taken.
    pub saved: usize,
    /// Needed a backup, but the content matched the last snapshot.
    pub unchanged: usize,
    /// Nothing to back up.
    pub skipped: usize,
    /// Busy or interrupted. Tried again next pass.
    pub deferred: usize,
}

enum Outcome {
    Saved,
    Unchanged,
    Skipped,
}

/// Backups for one run of the application.
pub struct BackupSession {
    id: uuid::Uuid,
    store: BackupStore,
}
impl Default for BackupSession {
    fn default() -> Self {
        Self::new()
    }
}
impl BackupSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            store: BackupStore::default(),
        }
    }
    #[must_use]
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }
    #[must_use]
    pub fn store(&self) -> &BackupStore {
        &self.store
    }
    /// Snapshot every document in the context that has unsaved, un-backed-up changes.
    pub fn backup_documents(&self, context: &Context) -> BackupReport {
        let mut report = BackupReport::default();
        for doc in context.documents() {
            match self.backup_document(&doc) {
                Ok(Outcome::Saved) => report.saved += 1,
                Ok(Outcome::Unchanged) => report.unchanged += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    log::debug!("Backup of {} deferred: {err}", doc.id());
                    report.deferred += 1;
                }
            }
        }
        if report.saved + report.deferred > 0 {
            log::info!(
                "Backup session {}: {} saved, {} unchanged, {} deferred",
                self.id,
                report.saved,
                report.unchanged,
                report.deferred
            );
        }
        report
    }
    fn backup_document(&self, doc: &Document) -> Result<Outcome, BackupError> {
        let reader = doc.weak_read();
        let state = reader.state().ok_or(BackupError::Busy)?;
        if state.inhibit_backup() || !state.needs_backup() || state.is_fully_backed_up() {
            return Ok(Outcome::Skipped);
        }
        let snapshot = Snapshot::take(doc.id(), &reader)?;
        // Let writers in before doing anything else.
        drop(reader);

        let version = snapshot.version;
        let size = snapshot.mem_size();
        let outcome = if self.store.store(snapshot) {
            log::debug!(
                "Backed up {} at version {version}, {}",
                doc.id(),
                human_bytes::human_bytes(size as f64)
            );
            Outcome::Saved
        } else {
            Outcome::Unchanged
        };
        // Don't wait: if someone's writing, the flag would be cleared by their change anyway.
        if let Ok(mut writer) = doc.write(Duration::ZERO) {
            if writer.version() == version {
                writer.mark_as_backed_up();
            }
        }
        Ok(outcome)
    }
}
