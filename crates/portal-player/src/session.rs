use rand::Rng;

use crate::error::PlayerError;
use crate::playlist::Track;

/// Session storage key names. They match what earlier versions of the site
/// wrote, so state survives a deploy in the middle of a visit.
pub mod keys {
    pub const SHUFFLED_PLAYLIST: &str = "shuffledPlaylist";
    pub const CURRENT_TRACK_INDEX: &str = "currentTrackIndex";
    pub const CURRENT_TIME: &str = "currentTime";
    pub const IS_PLAYING: &str = "isPlaying";
    pub const HAS_SEEN_ANIMATION: &str = "hasSeenAnimation";
}

/// String key/value storage that lives as long as the browsing session.
pub trait SessionStore {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), PlayerError>;
    fn remove_item(&mut self, key: &str);
}

impl<S: SessionStore + ?Sized> SessionStore for Box<S> {
    fn get_item(&self, key: &str) -> Option<String> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), PlayerError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) {
        (**self).remove_item(key);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackSnapshot {
    pub track_index: usize,
    pub position: f64,
    pub is_playing: bool,
}

/// In-place Fisher-Yates shuffle.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

pub struct SessionState<S> {
    store: S,
}

impl<S: SessionStore> SessionState<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The play order for this session. Shuffled and stored on first use,
    /// returned unchanged afterwards.
    pub fn shuffled_playlist<R: Rng + ?Sized>(&mut self, catalog: &[Track], rng: &mut R) -> Vec<Track> {
        if let Some(raw) = self.store.get_item(keys::SHUFFLED_PLAYLIST) {
            match serde_json::from_str::<Vec<Track>>(&raw) {
                Ok(stored) if !stored.is_empty() => return stored,
                Ok(_) => log::warn!("stored playlist is empty, reshuffling"),
                Err(e) => log::warn!("stored playlist is unreadable ({e}), reshuffling"),
            }
        }

        let mut order = catalog.to_vec();
        shuffle(&mut order, rng);
        match serde_json::to_string(&order) {
            Ok(json) => {
                if let Err(e) = self.store.set_item(keys::SHUFFLED_PLAYLIST, &json) {
                    log::warn!("{e}");
                }
            }
            Err(e) => log::warn!("could not serialize playlist: {e}"),
        }
        log::debug!("shuffled {} tracks for this session", order.len());
        order
    }

    /// Write the snapshot. The keys are separate writes, so when one fails
    /// the position and play flag are dropped: a reload then starts whichever
    /// track index is stored from the top, paused.
    pub fn save(&mut self, snapshot: PlaybackSnapshot) -> Result<(), PlayerError> {
        let written = self.write(snapshot);
        if written.is_err() {
            self.store.remove_item(keys::CURRENT_TIME);
            self.store.remove_item(keys::IS_PLAYING);
        }
        written
    }

    fn write(&mut self, snapshot: PlaybackSnapshot) -> Result<(), PlayerError> {
        let PlaybackSnapshot {
            track_index,
            position,
            is_playing,
        } = snapshot;
        self.store
            .set_item(keys::CURRENT_TRACK_INDEX, &track_index.to_string())?;
        self.store.set_item(keys::CURRENT_TIME, &position.to_string())?;
        self.store.set_item(keys::IS_PLAYING, &is_playing.to_string())
    }

    /// Saved playback state. Missing or unreadable fields fall back to
    /// track 0, position 0, not playing.
    pub fn load(&self) -> PlaybackSnapshot {
        let track_index = self
            .store
            .get_item(keys::CURRENT_TRACK_INDEX)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let position = self
            .store
            .get_item(keys::CURRENT_TIME)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|t| t.is_finite() && *t >= 0.0)
            .unwrap_or(0.0);
        let is_playing = self.store.get_item(keys::IS_PLAYING).as_deref() == Some("true");
        PlaybackSnapshot {
            track_index,
            position,
            is_playing,
        }
    }

    /// Like [`Self::load`], with the index forced inside a playlist of `len`.
    pub fn load_for(&self, len: usize) -> PlaybackSnapshot {
        let mut snapshot = self.load();
        if snapshot.track_index >= len {
            log::warn!(
                "saved track index {} is outside a playlist of {len}",
                snapshot.track_index
            );
            snapshot = PlaybackSnapshot::default();
        }
        snapshot
    }

    pub fn has_seen_animation(&self) -> bool {
        self.store.get_item(keys::HAS_SEEN_ANIMATION).is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::memory::MemoryStore;
    use crate::playlist::catalog;

    #[test]
    fn shuffled_playlist_is_stable_within_a_session() {
        let store = MemoryStore::default();
        let mut session = SessionState::new(store.clone());
        let mut rng = StdRng::seed_from_u64(7);
        let first = session.shuffled_playlist(&catalog(), &mut rng);
        let second = session.shuffled_playlist(&catalog(), &mut rng);
        assert_eq!(first, second);

        // a later page in the same session sees the same order
        let mut next_page = SessionState::new(store);
        assert_eq!(next_page.shuffled_playlist(&catalog(), &mut rng), first);
    }

    #[test]
    fn shuffled_playlist_is_a_permutation() {
        let mut session = SessionState::new(MemoryStore::default());
        let mut rng = StdRng::seed_from_u64(99);
        let mut order = session.shuffled_playlist(&catalog(), &mut rng);
        let mut expected = catalog();
        order.sort_by(|a, b| a.file.cmp(&b.file));
        expected.sort_by(|a, b| a.file.cmp(&b.file));
        assert_eq!(order, expected);
    }

    #[test]
    fn every_permutation_of_five_is_reachable_and_roughly_uniform() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut counts: HashMap<Vec<usize>, usize> = HashMap::new();
        let sessions = 24_000;
        for _ in 0..sessions {
            let mut order: Vec<usize> = (0..5).collect();
            shuffle(&mut order, &mut rng);
            *counts.entry(order).or_default() += 1;
        }
        assert_eq!(counts.len(), 120);
        // expected 200 per permutation
        for count in counts.values() {
            assert!((120..=280).contains(count), "count {count}");
        }
    }

    #[test]
    fn corrupt_playlist_is_replaced() {
        let mut store = MemoryStore::default();
        store.set_item(keys::SHUFFLED_PLAYLIST, "not json").unwrap();
        let mut session = SessionState::new(store.clone());
        let order = session.shuffled_playlist(&catalog(), &mut StdRng::seed_from_u64(1));
        assert_eq!(order.len(), 5);
        let stored: Vec<Track> =
            serde_json::from_str(&store.get_item(keys::SHUFFLED_PLAYLIST).unwrap()).unwrap();
        assert_eq!(stored, order);
    }

    #[test]
    fn save_writes_the_original_string_formats() {
        let store = MemoryStore::default();
        let mut session = SessionState::new(store.clone());
        session
            .save(PlaybackSnapshot {
                track_index: 3,
                position: 12.5,
                is_playing: true,
            })
            .unwrap();
        assert_eq!(store.get_item(keys::CURRENT_TRACK_INDEX).as_deref(), Some("3"));
        assert_eq!(store.get_item(keys::CURRENT_TIME).as_deref(), Some("12.5"));
        assert_eq!(store.get_item(keys::IS_PLAYING).as_deref(), Some("true"));
        assert_eq!(
            session.load(),
            PlaybackSnapshot {
                track_index: 3,
                position: 12.5,
                is_playing: true
            }
        );
    }

    /// Refuses writes to one key, like a full quota hit partway through.
    struct RefusingStore {
        inner: MemoryStore,
        refuse: &'static str,
    }

    impl SessionStore for RefusingStore {
        fn get_item(&self, key: &str) -> Option<String> {
            self.inner.get_item(key)
        }

        fn set_item(&mut self, key: &str, value: &str) -> Result<(), PlayerError> {
            if key == self.refuse {
                return Err(PlayerError::Storage {
                    key: key.to_string(),
                    reason: "quota exceeded".into(),
                });
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&mut self, key: &str) {
            self.inner.remove_item(key);
        }
    }

    #[test]
    fn failed_save_drops_position_and_play_flag() {
        let store = MemoryStore::default();
        let mut session = SessionState::new(store.clone());
        session
            .save(PlaybackSnapshot {
                track_index: 1,
                position: 40.0,
                is_playing: true,
            })
            .unwrap();

        let mut refusing = SessionState::new(RefusingStore {
            inner: store.clone(),
            refuse: keys::CURRENT_TIME,
        });
        let result = refusing.save(PlaybackSnapshot {
            track_index: 3,
            position: 5.0,
            is_playing: true,
        });
        assert!(matches!(result, Err(PlayerError::Storage { .. })));
        assert_eq!(
            session.load(),
            PlaybackSnapshot {
                track_index: 3,
                position: 0.0,
                is_playing: false
            }
        );
    }

    #[test]
    fn load_defaults_when_absent_or_corrupt() {
        let mut store = MemoryStore::default();
        let session = SessionState::new(store.clone());
        assert_eq!(session.load(), PlaybackSnapshot::default());

        store.set_item(keys::CURRENT_TRACK_INDEX, "three").unwrap();
        store.set_item(keys::CURRENT_TIME, "-4").unwrap();
        store.set_item(keys::IS_PLAYING, "yes").unwrap();
        assert_eq!(session.load(), PlaybackSnapshot::default());

        store.set_item(keys::CURRENT_TIME, "NaN").unwrap();
        assert_eq!(session.load().position, 0.0);
    }

    #[test]
    fn load_for_rejects_out_of_range_index() {
        let mut store = MemoryStore::default();
        store.set_item(keys::CURRENT_TRACK_INDEX, "9").unwrap();
        store.set_item(keys::CURRENT_TIME, "30").unwrap();
        let session = SessionState::new(store);
        assert_eq!(session.load_for(5), PlaybackSnapshot::default());
        assert_eq!(session.load_for(10).track_index, 9);
    }

    #[test]
    fn animation_flag_is_read_from_its_own_key() {
        let mut store = MemoryStore::default();
        let session = SessionState::new(store.clone());
        assert!(!session.has_seen_animation());
        store.set_item(keys::HAS_SEEN_ANIMATION, "true").unwrap();
        assert!(session.has_seen_animation());
    }
}
