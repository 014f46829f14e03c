//! Path admission and deduplication
//!
//! Decides which candidate paths are genuinely new against the current
//! catalog and materializes pending entries for them. Decide, don't
//! persist: the caller owns the atomic append.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use flow_store::VideoEntry;

/// Return new `pending` entries for every candidate not already in the
/// catalog (case-insensitive path comparison). Candidates whose size
/// cannot be read (vanished, permission denied) are dropped with a log
/// line and never become entries.
pub fn admit(paths: &[PathBuf], existing: &[VideoEntry]) -> Vec<VideoEntry> {
    // One pass over the catalog, not one per candidate.
    let mut seen: HashSet<String> = existing.iter().map(|e| e.path_key()).collect();

    let mut admitted = Vec::new();
    for path in paths {
        let key = path.to_string_lossy().to_lowercase();
        if seen.contains(&key) {
            continue;
        }

        let size = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                debug!("dropping candidate {:?}: {}", path, e);
                continue;
            }
        };

        seen.insert(key);
        admitted.push(VideoEntry::new(path, size));
    }

    admitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn touch(dir: &std::path::Path, name: &str, bytes: usize) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(&vec![0u8; bytes]).unwrap();
        path
    }

    #[test]
    fn admits_new_paths_with_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.mp4", 10);
        let b = touch(dir.path(), "b.mp4", 20);

        let admitted = admit(&[a.clone(), b], &[]);
        assert_eq!(admitted.len(), 2);
        assert_eq!(admitted[0].file_size, 10);
        assert_eq!(admitted[0].path, a.to_string_lossy());
    }

    #[test]
    fn second_call_admits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.mp4", 1);

        let first = admit(&[a.clone()], &[]);
        assert_eq!(first.len(), 1);
        let second = admit(&[a], &first);
        assert!(second.is_empty());
    }

    #[test]
    fn path_comparison_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "Movie.mp4", 1);
        let existing = admit(&[a.clone()], &[]);

        let mut shouty = existing[0].clone();
        shouty.path = shouty.path.to_uppercase();
        assert!(admit(&[a], &[shouty]).is_empty());
    }

    #[test]
    fn duplicates_within_one_batch_collapse() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.mp4", 1);
        let admitted = admit(&[a.clone(), a], &[]);
        assert_eq!(admitted.len(), 1);
    }

    #[test]
    fn vanished_file_is_silently_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let ghost = dir.path().join("gone.mp4");
        let real = touch(dir.path(), "here.mp4", 1);

        let admitted = admit(&[ghost, real], &[]);
        assert_eq!(admitted.len(), 1);
        assert!(admitted[0].path.ends_with("here.mp4"));
    }
}
