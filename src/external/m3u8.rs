//! M3U8 parser adapter (§6), over the `m3u8-rs` crate.
//!
//! Master playlists are explicitly unsupported (Non-goals: no ABR ladder
//! switching) and surface as [`ParsedPlaylist::Master`] so the playlist
//! worker can log-and-drop rather than attempting to pick a variant.

#[derive(Debug, Clone)]
pub struct ParsedSegment {
    pub uri: String,
    pub duration: f32,
}

#[derive(Debug, Clone)]
pub enum ParsedPlaylist {
    Master,
    Media {
        media_sequence: u64,
        segments: Vec<ParsedSegment>,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("failed to parse m3u8 playlist: {0}")]
pub struct PlaylistParseError(pub String);

pub trait PlaylistParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<ParsedPlaylist, PlaylistParseError>;
}

pub struct M3u8Parser;

impl PlaylistParser for M3u8Parser {
    fn parse(&self, text: &str) -> Result<ParsedPlaylist, PlaylistParseError> {
        match m3u8_rs::parse_playlist_res(text.as_bytes()) {
            Ok(m3u8_rs::Playlist::MasterPlaylist(_)) => Ok(ParsedPlaylist::Master),
            Ok(m3u8_rs::Playlist::MediaPlaylist(media)) => Ok(ParsedPlaylist::Media {
                media_sequence: media.media_sequence,
                segments: media
                    .segments
                    .iter()
                    .map(|s| ParsedSegment {
                        uri: s.uri.clone(),
                        duration: s.duration,
                    })
                    .collect(),
            }),
            Err(e) => Err(PlaylistParseError(format!("{e:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEDIA_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-TARGETDURATION:4\n\
#EXT-X-MEDIA-SEQUENCE:100\n\
#EXTINF:4.0,\n\
s0.ts\n\
#EXTINF:4.0,\n\
s1.ts\n\
#EXTINF:4.0,\n\
s2.ts\n";

    const MASTER_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-STREAM-INF:BANDWIDTH=1280000\n\
low/index.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=2560000\n\
high/index.m3u8\n";

    #[test]
    fn parses_media_playlist_segments_and_sequence() {
        let parsed = M3u8Parser.parse(MEDIA_PLAYLIST).unwrap();
        match parsed {
            ParsedPlaylist::Media { media_sequence, segments } => {
                assert_eq!(media_sequence, 100);
                assert_eq!(segments.len(), 3);
                assert_eq!(segments[0].uri, "s0.ts");
                assert_eq!(segments[0].duration, 4.0);
            }
            ParsedPlaylist::Master => panic!("expected media playlist"),
        }
    }

    #[test]
    fn rejects_master_playlist_as_master_variant() {
        let parsed = M3u8Parser.parse(MASTER_PLAYLIST).unwrap();
        assert!(matches!(parsed, ParsedPlaylist::Master));
    }

    #[test]
    fn malformed_text_is_an_error() {
        assert!(M3u8Parser.parse("not a playlist").is_err());
    }
}
