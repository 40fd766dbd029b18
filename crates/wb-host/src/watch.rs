//! Host-side reconciliation of the document against workspace file events.
//!
//! Renames rewrite every reference to the old path (cards, block links,
//! stash entries, pinned files) in the stored document and tell the view
//! about each one. Changes and deletions are forwarded for the cards that
//! reference the file. Errors here are expected during external editing
//! and are only logged.

use crate::panel::WhiteboardHost;
use crate::workspace::{FileIo, HostUi, WatchEvent};
use std::path::Path;
use wb_core::paths;
use wb_core::protocol::HostEvent;

impl<F: FileIo, U: HostUi> WhiteboardHost<F, U> {
    /// Handle every watch event queued by the workspace. Returns how many
    /// were processed.
    pub fn pump_watch(&mut self) -> usize {
        let events = self.io.drain_events();
        let count = events.len();
        for event in events {
            self.handle_watch(event);
        }
        count
    }

    pub fn handle_watch(&mut self, event: WatchEvent) {
        log::debug!("watch event {event:?}");
        match event {
            WatchEvent::Changed(path) => self.on_file_changed(&path),
            WatchEvent::Deleted(path) => self.on_file_deleted(&path),
            WatchEvent::Renamed { from, to } => self.on_file_renamed(&from, &to),
        }
    }

    fn on_file_renamed(&mut self, from: &Path, to: &Path) {
        let is_md = |p: &Path| p.extension().is_some_and(|ext| ext == "md");
        if !is_md(from) && !is_md(to) {
            return;
        }
        let root = self.io.root().map(Path::to_path_buf);
        let root = root.as_deref();
        let mut doc = self.load_document();
        let mut events = Vec::new();

        for card in &mut doc.cards {
            if paths::refers_to(&card.file_path, from, root) {
                let new_path = paths::rewrite(&card.file_path, to, root);
                events.push(HostEvent::FileRenamed {
                    card_id: card.id,
                    old_path: std::mem::replace(&mut card.file_path, new_path.clone()),
                    new_path,
                });
            }
        }
        for block in &mut doc.blocks {
            let Some(linked) = block.linked_file.as_mut() else {
                continue;
            };
            if paths::refers_to(linked, from, root) {
                let new_path = paths::rewrite(linked, to, root);
                events.push(HostEvent::BlockFileRenamed {
                    block_id: block.id,
                    old_path: std::mem::replace(linked, new_path.clone()),
                    new_path,
                });
            }
        }
        for entry in &mut doc.stash_cards {
            if paths::refers_to(&entry.file_path, from, root) {
                let new_path = paths::rewrite(&entry.file_path, to, root);
                events.push(HostEvent::StashCardFileRenamed {
                    stash_card_id: entry.id,
                    old_path: std::mem::replace(&mut entry.file_path, new_path.clone()),
                    new_path,
                });
            }
        }
        for pinned in &mut doc.pinned_files {
            if paths::refers_to(pinned, from, root) {
                let new_path = paths::rewrite(pinned, to, root);
                events.push(HostEvent::PinnedFileRenamed {
                    old_path: std::mem::replace(pinned, new_path.clone()),
                    new_path,
                });
            }
        }

        if events.is_empty() {
            return;
        }
        log::info!(
            "{} -> {}: {} reference(s) updated",
            from.display(),
            to.display(),
            events.len()
        );
        self.save_document(&doc);
        for event in events {
            self.post(event);
        }
    }

    fn on_file_changed(&mut self, path: &Path) {
        let root = self.io.root().map(Path::to_path_buf);
        let doc = self.load_document();
        let matching: Vec<_> = doc
            .cards
            .iter()
            .filter(|card| paths::refers_to(&card.file_path, path, root.as_deref()))
            .collect();
        if matching.is_empty() {
            return;
        }
        let content = match self.io.read_text(path) {
            Ok(content) => content,
            Err(err) => {
                log::debug!("ignoring change to {}: {err}", path.display());
                return;
            }
        };
        for card in matching {
            self.post(HostEvent::FileChanged {
                card_id: card.id,
                file_path: card.file_path.clone(),
                content: content.clone(),
            });
        }
    }

    fn on_file_deleted(&mut self, path: &Path) {
        let root = self.io.root().map(Path::to_path_buf);
        let doc = self.load_document();
        for card in &doc.cards {
            if paths::refers_to(&card.file_path, path, root.as_deref()) {
                self.post(HostEvent::FileDeleted {
                    card_id: card.id,
                    file_path: card.file_path.clone(),
                });
            }
        }
    }
}
