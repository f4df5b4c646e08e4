//! Application context
//!
//! Owns everything one running player needs: configuration, playlist,
//! player and event bus. Front ends construct one explicitly and drive it
//! from their command loop; there is no global instance.

use crate::audio::OutputDevice;
use crate::decoder::SynthFactory;
use crate::error::Result;
use crate::library;
use crate::playback::{Player, PlayerSettings};
use crate::playlist::{PlayList, PlayListItem};
use spindle_common::{EventBus, ModuleInfo, SpindleConfig, SpindleEvent};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub struct AppContext {
    pub config: SpindleConfig,
    pub playlist: PlayList,
    pub player: Player,
    events: Arc<EventBus>,
    /// Hash of the current song
    current_song: Option<String>,
}

impl AppContext {
    pub fn new(config: SpindleConfig, device: Box<dyn OutputDevice>, factory: SynthFactory) -> Self {
        let events = Arc::new(EventBus::new(config.event_capacity));
        let player = Player::new(device, factory, Arc::clone(&events), PlayerSettings::from(&config));
        let mut playlist = PlayList::new(Arc::clone(&events));
        playlist.set_shuffle(config.shuffle);

        Self {
            config,
            playlist,
            player,
            events,
            current_song: None,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpindleEvent> {
        self.events.subscribe()
    }

    /// Hash of the module currently loaded for playback
    pub fn current_song(&self) -> Option<&str> {
        self.current_song.as_deref()
    }

    /// Open a module file: load it, optionally copy it into the managed
    /// folder and add it to the playlist, and make it the current song.
    pub fn open_path(&mut self, path: &Path) -> Result<ModuleInfo> {
        let info = self.player.load(path)?;

        let mut item = PlayListItem::from_info(&info);
        if self.config.manage_modules {
            item.path = library::import_module(path, &self.config.music_folder())?;
        }

        if self.config.auto_add_modules {
            self.playlist.add(item);
            if let Some(index) = self.playlist.position_of(&info.hash) {
                self.playlist.select(index);
            }
        }

        self.set_current_song(&info);
        Ok(info)
    }

    /// Add a module to the playlist without playing it
    pub fn add_path(&mut self, path: &Path) -> Result<bool> {
        let info = self.player.probe(path)?;
        Ok(self.playlist.add(PlayListItem::from_info(&info)))
    }

    /// Load the playlist entry at `index` and start playing it
    pub fn play_index(&mut self, index: usize) -> Result<()> {
        let item = self
            .playlist
            .select(index)
            .cloned()
            .ok_or_else(|| spindle_common::Error::InvalidInput(format!("No playlist entry {}", index)))?;

        let info = self.player.load_item(&item)?;
        if let Some(entry) = self.playlist.get_mut(index) {
            entry.refresh(&info);
        }
        self.set_current_song(&info);
        self.player.play()
    }

    /// Advance to the next song, or replay the current one when repeating
    pub fn next_song(&mut self) -> Result<()> {
        if self.config.repeat && self.player.state().has_module() {
            debug!("Repeat on, replaying current song");
            self.player.stop();
            return self.player.play();
        }

        match self.playlist.next() {
            Some(index) => self.play_index(index),
            None => {
                info!("Playlist empty");
                Ok(())
            }
        }
    }

    pub fn previous_song(&mut self) -> Result<()> {
        match self.playlist.previous() {
            Some(index) => self.play_index(index),
            None => Ok(()),
        }
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.config.shuffle = shuffle;
        self.playlist.set_shuffle(shuffle);
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.config.repeat = repeat;
    }

    /// Route an event from the bus to the component that reacts to it.
    ///
    /// Must be called on the command thread.
    pub fn handle_event(&mut self, event: &SpindleEvent) -> Result<()> {
        match event {
            SpindleEvent::QueueFinished { .. } => self.player.on_queue_finished(),
            SpindleEvent::SongFinished { .. } => {
                if let Err(e) = self.next_song() {
                    warn!("Could not advance to next song: {}", e);
                    return Err(e);
                }
            }
            SpindleEvent::DeviceError { message, .. } => self.player.on_device_error(message),
            _ => {}
        }
        Ok(())
    }

    fn set_current_song(&mut self, info: &ModuleInfo) {
        if self.current_song.as_deref() == Some(info.hash.as_str()) {
            return;
        }
        self.current_song = Some(info.hash.clone());
        self.events
            .emit_lossy(SpindleEvent::song_changed(info.name.clone(), info.hash.clone()));
    }
}
