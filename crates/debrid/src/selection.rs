//! File-selection policy for stream-link resolution
//!
//! When a provider returns a file list, pick in order: the requested
//! file index when valid, the episode match for series, the largest
//! recognized video file, then the largest file overall.

use streamarr_core::models::PlaybackQuery;
use streamarr_core::parsing::{is_video_file, select_episode_file, FileCandidate};
use streamarr_core::{Result, StreamarrError};

pub fn choose_file(files: &[FileCandidate], query: &PlaybackQuery) -> Result<FileCandidate> {
    if files.is_empty() {
        return Err(StreamarrError::NoFileInTorrent);
    }

    if let Some(wanted) = query.file_index {
        if let Some(file) = files.iter().find(|f| f.file_index == wanted) {
            return Ok(file.clone());
        }
    }

    if let (Some(season), Some(episode)) = (query.season, query.episode) {
        if let Some(file) = select_episode_file(files, season, episode) {
            return Ok(file.clone());
        }
    }

    if let Some(video) = files
        .iter()
        .filter(|f| is_video_file(&f.file_name))
        .max_by_key(|f| f.size_bytes)
    {
        return Ok(video.clone());
    }

    files
        .iter()
        .max_by_key(|f| f.size_bytes)
        .cloned()
        .ok_or(StreamarrError::NoFileInTorrent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamarr_core::models::MediaKind;

    fn file(index: u32, name: &str, size: u64) -> FileCandidate {
        FileCandidate {
            file_index: index,
            file_name: name.to_string(),
            size_bytes: size,
        }
    }

    fn query(file_index: Option<u32>, season: Option<u32>, episode: Option<u32>) -> PlaybackQuery {
        PlaybackQuery {
            magnet: None,
            info_hash: None,
            media_kind: if season.is_some() {
                MediaKind::Series
            } else {
                MediaKind::Movie
            },
            season,
            episode,
            file_index,
            torrent_download: None,
            service: "RD".to_string(),
            privacy: None,
            cached: None,
            always_show: None,
        }
    }

    #[test]
    fn test_explicit_index_wins() {
        let files = vec![
            file(0, "sample.mkv", 100),
            file(1, "movie.mkv", 5_000),
        ];
        let chosen = choose_file(&files, &query(Some(0), None, None)).unwrap();
        assert_eq!(chosen.file_index, 0);
    }

    #[test]
    fn test_invalid_index_falls_through_to_episode() {
        let files = vec![
            file(0, "Show.S01E01.mkv", 100),
            file(1, "Show.S01E02.mkv", 100),
        ];
        let chosen = choose_file(&files, &query(Some(99), Some(1), Some(2))).unwrap();
        assert_eq!(chosen.file_index, 1);
    }

    #[test]
    fn test_largest_video_preferred_over_larger_junk() {
        let files = vec![
            file(0, "extras.iso", 9_000_000),
            file(1, "movie.mkv", 5_000),
        ];
        let chosen = choose_file(&files, &query(None, None, None)).unwrap();
        assert_eq!(chosen.file_index, 1);
    }

    #[test]
    fn test_largest_any_as_last_resort() {
        let files = vec![file(0, "a.iso", 10), file(1, "b.iso", 20)];
        let chosen = choose_file(&files, &query(None, None, None)).unwrap();
        assert_eq!(chosen.file_index, 1);
    }

    #[test]
    fn test_empty_list_is_no_file() {
        assert!(matches!(
            choose_file(&[], &query(None, None, None)),
            Err(StreamarrError::NoFileInTorrent)
        ));
    }
}
