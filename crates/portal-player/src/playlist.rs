use serde::{Deserialize, Serialize};

// Track descriptor, also the element type of the session-stored playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub file: String,
    pub title: String,
    pub artist: String,
}

impl Track {
    pub fn new(file: &str, title: &str, artist: &str) -> Self {
        Self {
            file: file.to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
        }
    }
}

const CATALOG: [(&str, &str, &str); 5] = [
    ("songs/Stagefright - Code Man.mp3", "Code Man", "Stagefright"),
    ("songs/Stagefright - Down The Hill.mp3", "Down The Hill", "Stagefright"),
    ("songs/Stagefright - Pauline.mp3", "Pauline", "Stagefright"),
    (
        "songs/Thrown-Out Bones - Feel It In Your Bite.mp3",
        "Feel It In Your Bite",
        "Thrown-Out Bones",
    ),
    (
        "songs/Thrown-Out Bones - Hoodiladiloo.mp3",
        "Hoodiladiloo",
        "Thrown-Out Bones",
    ),
];

/// The fixed track list in its unshuffled order.
pub fn catalog() -> Vec<Track> {
    CATALOG
        .iter()
        .map(|(file, title, artist)| Track::new(file, title, artist))
        .collect()
}

/// Attribution text for an artist, already HTML-safe.
pub fn bio_for(artist: &str) -> Option<&'static str> {
    match artist {
        "Thrown-Out Bones" => Some(
            "Thrown-Out Bones kindly authorized the use of their music. \
             <a href=\"https://www.thrownoutbones.com/\" target=\"_blank\">Check them out.</a> \
             Based in the SF Bay Area.",
        ),
        "Stagefright" => Some(
            "Stagefright kindly authorized the use of their music. \
             <a href=\"https://stagefright.bandcamp.com/\" target=\"_blank\">Check them out.</a> \
             Based in Wonder Valley, CA.",
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_five_distinct_tracks() {
        let tracks = catalog();
        assert_eq!(tracks.len(), 5);
        for (i, a) in tracks.iter().enumerate() {
            for b in &tracks[i + 1..] {
                assert_ne!(a.file, b.file);
            }
        }
    }

    #[test]
    fn every_catalog_artist_has_a_bio() {
        for track in catalog() {
            assert!(bio_for(&track.artist).is_some(), "{}", track.artist);
        }
        assert!(bio_for("Unknown Band").is_none());
    }

    #[test]
    fn track_serializes_with_plain_field_names() {
        let json = serde_json::to_string(&Track::new("a.mp3", "A", "B")).unwrap();
        assert_eq!(json, r#"{"file":"a.mp3","title":"A","artist":"B"}"#);
    }
}
