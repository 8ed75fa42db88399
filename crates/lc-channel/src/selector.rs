//! Source selection from the content library.
//!
//! The library is a directory tree: first-level subdirectories are candidate
//! groups, eligible only when their name ends with one of the configured tags,
//! and every file below an eligible group is a candidate source. Selection is
//! uniform at each level and repeats are allowed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::seq::SliceRandom;
use walkdir::WalkDir;

use lc_core::config::LibraryConfig;
use lc_core::{Error, Result, SourceFile};

/// Picks the next source file to broadcast.
#[derive(Debug, Clone)]
pub struct ContentSelector {
    root: PathBuf,
    allowed_tags: Vec<String>,
    retry_delay: Duration,
}

impl ContentSelector {
    pub fn new(root: impl Into<PathBuf>, allowed_tags: Vec<String>, retry_delay: Duration) -> Self {
        Self {
            root: root.into(),
            allowed_tags,
            retry_delay,
        }
    }

    pub fn from_config(config: &LibraryConfig) -> Self {
        Self::new(
            config.root.clone(),
            config.allowed_tags.clone(),
            config.retry_delay(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Select a source, retrying until the library yields one.
    ///
    /// Selection failures are logged and never surfaced. The directory walk
    /// runs on the blocking pool.
    pub async fn select_source(&self) -> SourceFile {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            let this = self.clone();
            let result = tokio::task::spawn_blocking(move || this.try_select())
                .await
                .unwrap_or_else(|e| Err(Error::Internal(format!("selection task failed: {e}"))));

            match result {
                Ok(source) => {
                    tracing::info!(source = %source.label(), attempt, "Selected source");
                    return source;
                }
                Err(e) => {
                    tracing::warn!(attempt, "Source selection failed: {e}");
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    /// Make a single selection attempt.
    pub fn try_select(&self) -> Result<SourceFile> {
        let mut rng = rand::thread_rng();

        let groups = self.eligible_groups()?;
        let group = groups.choose(&mut rng).ok_or_else(|| {
            Error::Selection(format!(
                "no directory under {} matches tags {:?}",
                self.root.display(),
                self.allowed_tags
            ))
        })?;

        let files = list_files(group);
        let file = files.choose(&mut rng).ok_or_else(|| {
            Error::Selection(format!("{} contains no files", group.display()))
        })?;

        Ok(SourceFile::new(file.clone()))
    }

    /// First-level directories whose name carries an allowed tag.
    pub fn eligible_groups(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            Error::Selection(format!("cannot list {}: {e}", self.root.display()))
        })?;

        let mut groups: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                std::fs::metadata(entry.path())
                    .map(|m| m.is_dir())
                    .unwrap_or(false)
            })
            .filter(|entry| self.is_allowed(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.path())
            .collect();
        groups.sort();
        Ok(groups)
    }

    fn is_allowed(&self, name: &str) -> bool {
        self.allowed_tags
            .iter()
            .any(|tag| !tag.is_empty() && name.ends_with(tag.as_str()))
    }
}

/// Every file below `dir`, following symlinks. Broken links are skipped.
fn list_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::create_library;

    fn selector(root: &Path) -> ContentSelector {
        ContentSelector::new(root, vec!["-live".into()], Duration::from_millis(10))
    }

    #[test]
    fn filters_groups_by_tag_suffix() {
        let dir = tempfile::tempdir().unwrap();
        create_library(
            dir.path(),
            &[("movies-live", "a.mp4"), ("drafts", "b.mp4"), ("live-old", "c.mp4")],
        );

        let groups = selector(dir.path()).eligible_groups().unwrap();
        assert_eq!(groups, vec![dir.path().join("movies-live")]);
    }

    #[test]
    fn selects_only_from_eligible_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = create_library(
            dir.path(),
            &[
                ("movies-live", "a.mp4"),
                ("movies-live", "nested/b.mp4"),
                ("shows-live", "c.webm"),
                ("drafts", "d.mp4"),
            ],
        );
        let eligible: Vec<PathBuf> = files
            .into_iter()
            .filter(|p| !p.starts_with(dir.path().join("drafts")))
            .collect();

        let selector = selector(dir.path());
        for _ in 0..50 {
            let source = selector.try_select().unwrap();
            assert!(eligible.contains(&source.path), "unexpected pick {:?}", source.path);
            assert!(source.duration.is_none());
        }
    }

    #[test]
    fn recursive_listing_includes_dot_files() {
        let dir = tempfile::tempdir().unwrap();
        create_library(
            dir.path(),
            &[("x-live", "deep/er/clip.mp4"), ("x-live", ".cache/tmp.mp4")],
        );

        let mut files = list_files(&dir.path().join("x-live"));
        files.sort();
        assert_eq!(
            files,
            vec![
                dir.path().join("x-live/.cache/tmp.mp4"),
                dir.path().join("x-live/deep/er/clip.mp4"),
            ]
        );
    }

    #[test]
    fn group_of_only_dot_files_is_selectable() {
        let dir = tempfile::tempdir().unwrap();
        let files = create_library(dir.path(), &[("x-live", ".clip.mp4")]);

        let source = selector(dir.path()).try_select().unwrap();
        assert_eq!(source.path, files[0]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_file_is_selectable() {
        let dir = tempfile::tempdir().unwrap();
        let real = create_library(dir.path(), &[("store", "real.mp4")]);
        std::fs::create_dir_all(dir.path().join("x-live")).unwrap();
        let link = dir.path().join("x-live/clip.mp4");
        std::os::unix::fs::symlink(&real[0], &link).unwrap();

        let source = selector(dir.path()).try_select().unwrap();
        assert_eq!(source.path, link);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_group_is_eligible() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        create_library(outside.path(), &[("media", "clip.mp4")]);
        std::os::unix::fs::symlink(outside.path().join("media"), dir.path().join("x-live"))
            .unwrap();

        let selector = selector(dir.path());
        assert_eq!(selector.eligible_groups().unwrap(), vec![dir.path().join("x-live")]);
        let source = selector.try_select().unwrap();
        assert_eq!(source.path, dir.path().join("x-live/clip.mp4"));
    }

    #[test]
    fn no_matching_group_is_selection_error() {
        let dir = tempfile::tempdir().unwrap();
        create_library(dir.path(), &[("drafts", "a.mp4")]);

        let err = selector(dir.path()).try_select().unwrap_err();
        assert!(matches!(err, Error::Selection(_)));
    }

    #[test]
    fn empty_group_is_selection_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("empty-live")).unwrap();

        let err = selector(dir.path()).try_select().unwrap_err();
        assert!(err.to_string().contains("contains no files"));
    }

    #[test]
    fn missing_root_is_selection_error() {
        let selector = selector(Path::new("/nonexistent/library/root"));
        assert!(matches!(selector.try_select(), Err(Error::Selection(_))));
    }

    #[test]
    fn empty_tag_never_matches() {
        let dir = tempfile::tempdir().unwrap();
        create_library(dir.path(), &[("anything", "a.mp4")]);

        let selector = ContentSelector::new(dir.path(), vec![String::new()], Duration::ZERO);
        assert!(selector.eligible_groups().unwrap().is_empty());
    }

    #[tokio::test]
    async fn select_source_retries_until_content_appears() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let selector = selector(&root);

        let task = tokio::spawn(async move { selector.select_source().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        let files = create_library(&root, &[("late-live", "clip.mp4")]);
        let source = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("selection did not finish")
            .unwrap();
        assert_eq!(source.path, files[0]);
    }
}
