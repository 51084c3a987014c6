//! Episode-to-file matching
//!
//! Given a torrent's file listing and a target `(season, episode)`, pick
//! the file that holds that episode. The pattern ladder is ordered from
//! most to least specific; the first tier with any match wins, and ties
//! inside a tier go to the largest file. Deterministic for fixed inputs.

use regex::Regex;

/// Extensions accepted by the file-selection policy
pub const VIDEO_EXTENSIONS: &[&str] = &[
    ".mkv", ".mp4", ".avi", ".mov", ".wmv", ".flv", ".webm",
];

pub fn is_video_file(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// A file under consideration, as reported by a provider or torrent index
#[derive(Debug, Clone, PartialEq)]
pub struct FileCandidate {
    pub file_index: u32,
    pub file_name: String,
    pub size_bytes: u64,
}

impl FileCandidate {
    /// Providers report full paths; matching runs on the basename.
    fn basename(&self) -> &str {
        self.file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.file_name)
    }
}

/// Select the file holding `(season, episode)` out of `files`, or `None`.
pub fn select_episode_file(
    files: &[FileCandidate],
    season: u32,
    episode: u32,
) -> Option<&FileCandidate> {
    let videos: Vec<&FileCandidate> = files
        .iter()
        .filter(|f| is_video_file(f.basename()))
        .collect();
    if videos.is_empty() {
        return None;
    }

    let single_season = appears_single_season(&videos, season);

    let patterns = episode_patterns(season, episode, single_season);
    for pattern in patterns {
        let matching: Vec<&&FileCandidate> = videos
            .iter()
            .filter(|f| pattern.is_match(f.basename()))
            .collect();
        if let Some(best) = matching.iter().max_by_key(|f| f.size_bytes) {
            return Some(**best);
        }
    }

    // Season-pack fallback: a torrent with many video files is a pack;
    // prefer files tagged with the right season, else the largest video.
    if videos.len() >= 6 {
        let season_marker = format!("s{season:02}");
        let of_season: Vec<&&FileCandidate> = videos
            .iter()
            .filter(|f| f.basename().to_ascii_lowercase().contains(&season_marker))
            .collect();
        if let Some(best) = of_season.iter().max_by_key(|f| f.size_bytes) {
            return Some(**best);
        }
        return videos.into_iter().max_by_key(|f| f.size_bytes);
    }

    None
}

/// The torrent looks single-season when its filenames either never name a
/// season or only ever name the target one. Bare `E{nn}` matching is only
/// safe in that case.
fn appears_single_season(videos: &[&FileCandidate], season: u32) -> bool {
    let marker = Regex::new(r"(?i)S(\d{1,2})\s?E\d{1,3}").unwrap();
    let mut seen_other = false;
    for file in videos {
        for captures in marker.captures_iter(file.basename()) {
            if let Some(s) = captures.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) {
                if s != season {
                    seen_other = true;
                }
            }
        }
    }
    !seen_other
}

fn episode_patterns(season: u32, episode: u32, single_season: bool) -> Vec<Regex> {
    let mut sources = vec![
        format!(r"(?i)S{season:02}\s?E{episode:02}"),
        format!(r"(?i)S{season}\s?E{episode:02}"),
        format!(r"(?i)(^|\D){season:02}x{episode:02}(\D|$)"),
        format!(r"(?i)(^|\D){season}x{episode:02}(\D|$)"),
    ];
    if single_season {
        sources.push(format!(r"(?i)(^|[^A-Za-z0-9])E{episode:02}(\D|$)"));
    }
    sources.push(format!(r"(?i)Episode.?{episode:02}"));
    sources.push(format!(r"\.{episode:02}\."));
    sources.push(format!(r"_{episode:02}\."));
    if season < 10 {
        sources.push(format!(r"(^|\D){season}{episode:02}(\D|$)"));
    }
    sources
        .into_iter()
        .filter_map(|s| Regex::new(&s).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(index: u32, name: &str, size: u64) -> FileCandidate {
        FileCandidate {
            file_index: index,
            file_name: name.to_string(),
            size_bytes: size,
        }
    }

    #[test]
    fn test_standard_pattern() {
        let files = vec![
            file(0, "Show.S01E01.1080p.mkv", 1_000),
            file(1, "Show.S01E02.1080p.mkv", 2_000),
        ];
        let selected = select_episode_file(&files, 1, 2).unwrap();
        assert_eq!(selected.file_index, 1);
    }

    #[test]
    fn test_non_video_skipped() {
        let files = vec![
            file(0, "Show.S01E02.nfo", 9_000_000),
            file(1, "Show.S01E02.mkv", 2_000),
        ];
        assert_eq!(select_episode_file(&files, 1, 2).unwrap().file_index, 1);
    }

    #[test]
    fn test_largest_among_matches() {
        let files = vec![
            file(0, "Show.S01E02.720p.mkv", 1_000),
            file(1, "Show.S01E02.1080p.mkv", 3_000),
        ];
        assert_eq!(select_episode_file(&files, 1, 2).unwrap().file_index, 1);
    }

    #[test]
    fn test_x_format_and_bare_episode() {
        let files = vec![file(0, "show.1x05.mkv", 10), file(1, "show.1x06.mkv", 10)];
        assert_eq!(select_episode_file(&files, 1, 5).unwrap().file_index, 0);

        let bare = vec![file(0, "E05.mkv", 10), file(1, "E06.mkv", 10)];
        assert_eq!(select_episode_file(&bare, 1, 6).unwrap().file_index, 1);
    }

    #[test]
    fn test_bare_episode_blocked_for_multi_season_packs() {
        // E03 must not match inside S02E03 when S01E03 is requested
        let files = vec![
            file(0, "Show.S02E03.mkv", 10),
            file(1, "Show.S02E04.mkv", 10),
        ];
        assert!(select_episode_file(&files, 1, 3).is_none());
    }

    #[test]
    fn test_concatenated_form_only_below_season_ten() {
        let files = vec![file(0, "show.103.mkv", 10)];
        assert_eq!(select_episode_file(&files, 1, 3).unwrap().file_index, 0);

        let files = vec![file(0, "show.1103.mkv", 10)];
        assert!(select_episode_file(&files, 11, 3).is_none());
    }

    #[test]
    fn test_season_pack_fallback() {
        let files: Vec<FileCandidate> = (0..7)
            .map(|i| file(i, &format!("Show.s01.part{i}.mkv"), 100 + u64::from(i)))
            .collect();
        // No explicit episode marker matches; falls back to the largest
        // file tagged with the right season.
        let selected = select_episode_file(&files, 1, 99).unwrap();
        assert_eq!(selected.file_index, 6);
    }

    #[test]
    fn test_deterministic() {
        let files = vec![
            file(0, "Show.S03E07.mkv", 500),
            file(1, "Show.S03E07.REPACK.mkv", 500),
        ];
        let first = select_episode_file(&files, 3, 7).unwrap().file_index;
        for _ in 0..10 {
            assert_eq!(select_episode_file(&files, 3, 7).unwrap().file_index, first);
        }
    }

    #[test]
    fn test_paths_matched_on_basename() {
        let files = vec![file(0, "Season 1/Show S01E04 1080p.mkv", 10)];
        assert_eq!(select_episode_file(&files, 1, 4).unwrap().file_index, 0);
    }
}
