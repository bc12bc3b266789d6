use crate::host::BioView;
use crate::playlist::bio_for;

/// Close button placed ahead of every bio.
pub const CLOSE_BUTTON: &str = r#"<button class="band-bio-close" aria-label="Close">×</button>"#;

pub fn bio_markup(bio: &str) -> String {
    format!("{CLOSE_BUTTON}{bio}")
}

/// Visibility flags for the current track. Both reset on track change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BioVisibility {
    pub shown: bool,
    pub manually_closed: bool,
}

pub struct BioPanel {
    view: Option<Box<dyn BioView>>,
    bio: Option<&'static str>,
    flags: BioVisibility,
    visible: bool,
}

impl BioPanel {
    pub fn new(view: Option<Box<dyn BioView>>) -> Self {
        Self {
            view,
            bio: None,
            flags: BioVisibility::default(),
            visible: false,
        }
    }

    pub fn flags(&self) -> BioVisibility {
        self.flags
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn has_bio(&self) -> bool {
        self.bio.is_some()
    }

    /// Swap in the bio for `artist`. `announce` shows it straight away.
    pub fn set_artist(&mut self, artist: &str, announce: bool) {
        self.bio = bio_for(artist);
        match self.bio {
            Some(bio) => {
                if let Some(view) = self.view.as_mut() {
                    view.set_content(Some(&bio_markup(bio)));
                }
                if announce {
                    self.update(true);
                }
            }
            None => {
                if let Some(view) = self.view.as_mut() {
                    view.set_content(None);
                }
                self.set_visible(false);
            }
        }
    }

    /// Show the panel if there is a bio, it was forced or already shown, and
    /// the listener has not dismissed it. Never hides.
    pub fn update(&mut self, force_show: bool) {
        if self.bio.is_some() && (force_show || self.flags.shown) && !self.flags.manually_closed {
            self.flags.shown = true;
            self.set_visible(true);
        }
    }

    /// Remember that the listener had the bio up before this page load.
    pub fn mark_shown(&mut self) {
        self.flags.shown = true;
    }

    pub fn reset(&mut self) {
        self.flags = BioVisibility::default();
        self.set_visible(false);
    }

    /// Explicit dismissal; sticks until the next track change.
    pub fn close(&mut self) {
        self.flags.shown = false;
        self.flags.manually_closed = true;
        self.set_visible(false);
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if let Some(view) = self.view.as_mut() {
            view.set_visible(visible);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBio;

    fn panel_for(artist: &str) -> (BioPanel, MemoryBio) {
        let view = MemoryBio::default();
        let mut panel = BioPanel::new(Some(Box::new(view.clone())));
        panel.set_artist(artist, false);
        (panel, view)
    }

    #[test]
    fn content_gets_a_close_button() {
        let (_, view) = panel_for("Stagefright");
        let content = view.content().unwrap();
        assert!(content.starts_with(CLOSE_BUTTON));
        assert!(content.contains("Wonder Valley"));
        assert!(!view.is_visible());
    }

    #[test]
    fn unforced_update_stays_hidden_until_shown_once() {
        let (mut panel, view) = panel_for("Stagefright");
        panel.update(false);
        assert!(!view.is_visible());
        panel.update(true);
        assert!(view.is_visible());
        assert!(panel.flags().shown);
    }

    #[test]
    fn closing_suppresses_until_reset() {
        let (mut panel, view) = panel_for("Stagefright");
        panel.update(true);
        panel.close();
        assert!(!view.is_visible());
        assert!(panel.flags().manually_closed);

        panel.update(false);
        assert!(!view.is_visible());
        panel.update(true);
        assert!(!view.is_visible());

        panel.reset();
        panel.set_artist("Thrown-Out Bones", false);
        panel.update(true);
        assert!(view.is_visible());
    }

    #[test]
    fn unknown_artist_empties_and_hides() {
        let (mut panel, view) = panel_for("Stagefright");
        panel.update(true);
        panel.set_artist("Nobody", true);
        assert_eq!(view.content(), None);
        assert!(!view.is_visible());
        panel.update(true);
        assert!(!panel.is_visible());
    }

    #[test]
    fn announce_shows_immediately() {
        let view = MemoryBio::default();
        let mut panel = BioPanel::new(Some(Box::new(view.clone())));
        panel.set_artist("Thrown-Out Bones", true);
        assert!(view.is_visible());
    }

    #[test]
    fn missing_view_is_harmless() {
        let mut panel = BioPanel::new(None);
        panel.set_artist("Stagefright", true);
        panel.close();
        panel.update(true);
        assert!(!panel.is_visible());
    }
}
