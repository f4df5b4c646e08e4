//! Playlist keyed by module content hash
//!
//! The same module bytes appear at most once, whatever path they were
//! opened from. The current entry is tracked by item index; shuffle mode
//! walks a separate random play order without reordering the items.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use spindle_common::human_time::format_length;
use spindle_common::{EventBus, FormatTag, ModuleInfo, SpindleEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// One playlist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayListItem {
    pub path: PathBuf,
    /// Content hash; the playlist's identity key
    pub hash: String,
    pub title: String,
    /// Length in whole seconds (0 = unknown)
    pub length_seconds: u64,
    pub format: FormatTag,
}

impl PlayListItem {
    pub fn from_info(info: &ModuleInfo) -> Self {
        Self {
            path: info.path.clone(),
            hash: info.hash.clone(),
            title: info.name.clone(),
            length_seconds: info.duration_seconds(),
            format: info.simple_format,
        }
    }

    /// Update title, length and format from a fresh load
    pub fn refresh(&mut self, info: &ModuleInfo) {
        self.title = info.name.clone();
        self.length_seconds = info.duration_seconds();
        self.format = info.simple_format;
    }

    /// Length as `MM:SS`, empty when unknown
    pub fn time(&self) -> String {
        format_length(self.length_seconds)
    }

    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lowercase title without punctuation or spaces
    pub fn sort_key(&self) -> String {
        self.title
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect()
    }
}

/// Ordered, de-duplicating list of modules
pub struct PlayList {
    items: Vec<PlayListItem>,
    current: Option<usize>,
    shuffle: bool,
    /// Play order of item indices while shuffling
    order: Vec<usize>,
    events: Arc<EventBus>,
}

impl PlayList {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            items: Vec::new(),
            current: None,
            shuffle: false,
            order: Vec::new(),
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PlayListItem> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut PlayListItem> {
        self.items.get_mut(index)
    }

    pub fn items(&self) -> &[PlayListItem] {
        &self.items
    }

    /// Index of the current item
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&PlayListItem> {
        self.current.and_then(|index| self.items.get(index))
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle
    }

    pub fn contains_hash(&self, hash: &str) -> bool {
        self.position_of(hash).is_some()
    }

    pub fn position_of(&self, hash: &str) -> Option<usize> {
        self.items.iter().position(|item| item.hash == hash)
    }

    /// Append an item unless one with the same hash is present.
    ///
    /// Returns whether the item was inserted.
    pub fn add(&mut self, item: PlayListItem) -> bool {
        if self.contains_hash(&item.hash) {
            debug!("Skipping duplicate playlist entry {}", item.filename());
            return false;
        }

        self.items.push(item);
        if self.shuffle {
            let index = self.items.len() - 1;
            let slot = rand::random::<usize>() % (self.order.len() + 1);
            self.order.insert(slot, index);
        }
        self.publish();
        true
    }

    /// Make `index` the current item
    pub fn select(&mut self, index: usize) -> Option<&PlayListItem> {
        if index >= self.items.len() {
            return None;
        }
        self.current = Some(index);
        self.publish();
        self.items.get(index)
    }

    /// Advance in play order, wrapping to the first item
    pub fn next(&mut self) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }

        let step = match self.current.map(|index| self.play_position(index)) {
            Some(position) => (position + 1) % self.items.len(),
            None => 0,
        };
        self.current = Some(self.play_order_at(step));
        self.publish();
        self.current
    }

    /// Step back in play order, stopping at the first item
    pub fn previous(&mut self) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }

        let step = self
            .current
            .map(|index| self.play_position(index).saturating_sub(1))
            .unwrap_or(0);
        self.current = Some(self.play_order_at(step));
        self.publish();
        self.current
    }

    pub fn remove(&mut self, index: usize) -> Option<PlayListItem> {
        if index >= self.items.len() {
            return None;
        }

        let removed = self.items.remove(index);
        self.current = match self.current {
            Some(current) if current == index => None,
            Some(current) if current > index => Some(current - 1),
            other => other,
        };
        self.order.retain(|&i| i != index);
        for i in self.order.iter_mut() {
            if *i > index {
                *i -= 1;
            }
        }
        self.publish();
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.order.clear();
        self.current = None;
        self.publish();
    }

    /// Swap an item with the one above it; returns its new index
    pub fn move_up(&mut self, index: usize) -> Option<usize> {
        if index == 0 || index >= self.items.len() {
            return None;
        }
        self.swap(index, index - 1);
        Some(index - 1)
    }

    /// Swap an item with the one below it; returns its new index
    pub fn move_down(&mut self, index: usize) -> Option<usize> {
        if index + 1 >= self.items.len() {
            return None;
        }
        self.swap(index, index + 1);
        Some(index + 1)
    }

    /// Randomly reorder the items themselves
    pub fn shuffle_items(&mut self) {
        self.reorder(|items| items.shuffle(&mut rand::thread_rng()));
    }

    /// Sort items by `sort_key`
    pub fn sort_by_title(&mut self) {
        self.reorder(|items| items.sort_by_cached_key(PlayListItem::sort_key));
    }

    /// Replace the whole list, dropping duplicate hashes
    pub fn replace_items(&mut self, items: Vec<PlayListItem>) {
        self.items.clear();
        self.current = None;
        for item in items {
            if !self.contains_hash(&item.hash) {
                self.items.push(item);
            }
        }
        self.rebuild_order();
        self.publish();
    }

    /// Turn shuffle mode on (drawing a new play order) or off
    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
        self.rebuild_order();
        debug!("Playlist shuffle {}", if shuffle { "on" } else { "off" });
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.items.swap(a, b);
        self.current = match self.current {
            Some(current) if current == a => Some(b),
            Some(current) if current == b => Some(a),
            other => other,
        };
        for i in self.order.iter_mut() {
            if *i == a {
                *i = b;
            } else if *i == b {
                *i = a;
            }
        }
        self.publish();
    }

    /// Apply `f` to the items, keeping the current item current
    fn reorder<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Vec<PlayListItem>),
    {
        let current_hash = self.current().map(|item| item.hash.clone());
        f(&mut self.items);
        self.current = current_hash.and_then(|hash| self.position_of(&hash));
        self.rebuild_order();
        self.publish();
    }

    fn rebuild_order(&mut self) {
        self.order = (0..self.items.len()).collect();
        if self.shuffle {
            self.order.shuffle(&mut rand::thread_rng());
        }
    }

    /// Position of an item index in play order
    fn play_position(&self, index: usize) -> usize {
        if self.shuffle {
            self.order.iter().position(|&i| i == index).unwrap_or(0)
        } else {
            index
        }
    }

    /// Item index at a play-order position
    fn play_order_at(&self, position: usize) -> usize {
        if self.shuffle {
            self.order.get(position).copied().unwrap_or(position)
        } else {
            position
        }
    }

    fn publish(&self) {
        self.events
            .emit_lossy(SpindleEvent::playlist_changed(self.current, self.items.len()));
    }
}
