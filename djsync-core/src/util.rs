//! Path and string helpers shared by the library writers

use std::sync::OnceLock;

use regex::Regex;

/// Default maximum filename length in characters
pub const MAX_FILENAME_LEN: usize = 255;

/// Strip a drive or volume prefix from a path string.
///
/// Handles `C:` drive letters and `\\server\share` / `//server/share` UNC
/// roots, whatever the host platform. Paths without such a prefix (including
/// POSIX absolute paths) come back unchanged.
pub fn strip_drive_prefix(path: &str) -> &str {
    let bytes = path.as_bytes();

    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return &path[2..];
    }

    if let Some(rest) = path.strip_prefix("\\\\").or_else(|| path.strip_prefix("//")) {
        let is_sep = |c: char| c == '\\' || c == '/';
        // \\server\share is the drive, the remainder starts at the next separator
        let Some(server_end) = rest.find(is_sep) else {
            return path;
        };
        let share = &rest[server_end + 1..];
        if share.is_empty() || share.starts_with(is_sep) {
            return path;
        }
        return match share.find(is_sep) {
            Some(share_end) => &share[share_end..],
            None => "",
        };
    }

    path
}

/// Make a string safe to use as a filename.
///
/// Removes `/ \ : * ? " < > |` and control characters, optionally replaces
/// spaces with underscores, and truncates to `max_len` characters.
pub fn sanitize_filename(name: &str, max_len: usize, replace_spaces: bool) -> String {
    name.chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .filter(|c| !c.is_control())
        .map(|c| if replace_spaces && c == ' ' { '_' } else { c })
        .take(max_len)
        .collect()
}

/// Extract a Spotify playlist ID (22 alphanumeric characters) from a URL or bare ID
pub fn extract_spotify_playlist_id(url: &str) -> Option<&str> {
    static PLAYLIST_ID: OnceLock<Regex> = OnceLock::new();
    let re = PLAYLIST_ID.get_or_init(|| {
        Regex::new(r"[a-zA-Z0-9]{22}").expect("static playlist id pattern")
    });
    re.find(url).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_drive_letter() {
        assert_eq!(strip_drive_prefix("D:\\Music\\song.mp3"), "\\Music\\song.mp3");
        assert_eq!(strip_drive_prefix("c:/Music/song.mp3"), "/Music/song.mp3");
        assert_eq!(strip_drive_prefix("D:"), "");
    }

    #[test]
    fn test_strip_posix_unchanged() {
        assert_eq!(strip_drive_prefix("/home/music/song.mp3"), "/home/music/song.mp3");
        assert_eq!(strip_drive_prefix("Music/song.mp3"), "Music/song.mp3");
        assert_eq!(strip_drive_prefix(""), "");
    }

    #[test]
    fn test_strip_unc_share() {
        assert_eq!(
            strip_drive_prefix("\\\\nas\\music\\House\\a.mp3"),
            "\\House\\a.mp3"
        );
        assert_eq!(strip_drive_prefix("//nas/music"), "");
        // Not a complete UNC root
        assert_eq!(strip_drive_prefix("\\\\nas"), "\\\\nas");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("AC/DC: Back <In> Black?", 255, false), "ACDC Back In Black");
        assert_eq!(sanitize_filename("Daft Punk", 255, true), "Daft_Punk");
        assert_eq!(sanitize_filename("Beyoncé", 255, false), "Beyoncé");
        assert_eq!(sanitize_filename("abcdef", 3, false), "abc");
        assert_eq!(sanitize_filename("tab\there", 255, false), "tabhere");
    }

    #[test]
    fn test_playlist_id_from_url() {
        assert_eq!(
            extract_spotify_playlist_id("https://open.spotify.com/playlist/7suQlwliFponAvWaKjyBxC"),
            Some("7suQlwliFponAvWaKjyBxC")
        );
        assert_eq!(
            extract_spotify_playlist_id("https://open.spotify.com/playlist/1mjGp0ddtuC5DDx0lWtCNQ"),
            Some("1mjGp0ddtuC5DDx0lWtCNQ")
        );
    }

    #[test]
    fn test_playlist_id_bare_and_partial() {
        assert_eq!(
            extract_spotify_playlist_id("7suQlwliFponAvWaKjyBxC"),
            Some("7suQlwliFponAvWaKjyBxC")
        );
        // Any host works, only the ID shape matters
        assert_eq!(
            extract_spotify_playlist_id("https://notspotifyurl.com/playlist/7suQlwliFponAvWaKjyBxC"),
            Some("7suQlwliFponAvWaKjyBxC")
        );
        assert_eq!(
            extract_spotify_playlist_id("https://open.spotify.com/playlist/7suQlwliFponAvWaKjyBxC/otherpath"),
            Some("7suQlwliFponAvWaKjyBxC")
        );
    }

    #[test]
    fn test_playlist_id_missing() {
        assert_eq!(extract_spotify_playlist_id("https://open.spotify.com/playlist/"), None);
        assert_eq!(extract_spotify_playlist_id("random string"), None);
        assert_eq!(extract_spotify_playlist_id(""), None);
    }
}
