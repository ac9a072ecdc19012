use std::fmt;

use serde::{Deserialize, Serialize};

/// Represent a catalog track
///
/// Instances are only built from a fully decoded catalog object,
/// so every field is populated by the time anyone sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub name: String,
    /// artist names in catalog order, the first one is the primary artist
    pub artists: Vec<String>,
    pub album_name: String,
    pub duration_ms: u32,
    pub popularity: u32,
    pub preview_url: Option<String>,
}

impl Track {
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(String::as_str)
    }

    /// duration as `m:ss`
    pub fn formatted_duration(&self) -> String {
        let seconds = self.duration_ms / 1000;
        format!("{}:{:02}", seconds / 60, seconds % 60)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} ({})",
            self.artists.join(", "),
            self.name,
            self.album_name
        )
    }
}

#[cfg(test)]
pub(crate) fn mock_track(id: &str, name: &str, artists: &[&str]) -> Track {
    Track {
        id: id.to_string(),
        name: name.to_string(),
        artists: artists.iter().map(|a| a.to_string()).collect(),
        album_name: format!("{name} (album)"),
        duration_ms: 215_000,
        popularity: 50,
        preview_url: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_serializes_wire_shape() -> anyhow::Result<()> {
        let track = Track {
            id: "4VqPOruhp5EdPBeR92t6lQ".to_string(),
            name: "Uprising".to_string(),
            artists: vec!["Muse".to_string()],
            album_name: "The Resistance".to_string(),
            duration_ms: 304_840,
            popularity: 77,
            preview_url: None,
        };

        let value = serde_json::to_value(&track)?;

        assert_eq!(
            value,
            serde_json::json!({
                "id": "4VqPOruhp5EdPBeR92t6lQ",
                "name": "Uprising",
                "artists": ["Muse"],
                "albumName": "The Resistance",
                "durationMs": 304840,
                "popularity": 77,
                "previewUrl": null,
            })
        );

        Ok(())
    }

    #[test]
    fn test_formatted_duration() {
        let mut track = mock_track("1", "Song", &["Band"]);

        track.duration_ms = 304_840;
        assert_eq!(track.formatted_duration(), "5:04");

        track.duration_ms = 59_999;
        assert_eq!(track.formatted_duration(), "0:59");
    }

    #[test]
    fn test_display_joins_artists_in_order() {
        let track = mock_track("1", "Under Pressure", &["Queen", "David Bowie"]);

        assert_eq!(
            track.to_string(),
            "Queen, David Bowie - Under Pressure (Under Pressure (album))"
        );
        assert_eq!(track.primary_artist(), Some("Queen"));
    }
}
