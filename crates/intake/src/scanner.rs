//! Directory walking for dropped folders.
//!
//! Every file found below a dropped directory is returned with a relative
//! path that starts with the directory's own name, using `/` separators.

use std::path::Path;

use upqueue_queue::FileSource;

use crate::error::IntakeError;

/// Recursively collects the files below `root`.
///
/// Files whose name starts with `.` are skipped. Entries are visited in
/// name order so the resulting queue order is stable.
pub fn scan_dropped_directory(root: &Path) -> Result<Vec<FileSource>, IntakeError> {
    let prefix = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut files = Vec::new();
    walk_dir(root, &prefix, &mut files)?;
    Ok(files)
}

fn walk_dir(current: &Path, prefix: &str, files: &mut Vec<FileSource>) -> Result<(), IntakeError> {
    let mut entries = std::fs::read_dir(current)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let metadata = entry.metadata()?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let relative = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };

        if metadata.is_dir() {
            walk_dir(&path, &relative, files)?;
        } else if metadata.is_file() {
            if name.starts_with('.') {
                continue;
            }
            files.push(FileSource::new(&path, name, metadata.len()).with_relative_path(relative));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("photos");
        fs::create_dir_all(root.join("2024").join("june")).unwrap();

        fs::write(root.join("cover.jpg"), b"COVER").unwrap();
        fs::write(root.join(".DS_Store"), b"junk").unwrap();
        fs::write(root.join("2024").join("beach.png"), b"BEACH_PIXELS").unwrap();
        fs::write(root.join("2024").join("june").join("cake.jpg"), b"CAKE").unwrap();
        fs::write(root.join("2024").join("june").join(".hidden"), b"h").unwrap();

        dir
    }

    #[test]
    fn walk_prefixes_directory_name() {
        let dir = create_test_tree();
        let files = scan_dropped_directory(&dir.path().join("photos")).unwrap();

        let paths: Vec<&str> = files
            .iter()
            .map(|f| f.relative_path.as_deref().unwrap())
            .collect();
        assert_eq!(
            paths,
            vec!["photos/2024/beach.png", "photos/2024/june/cake.jpg", "photos/cover.jpg"]
        );
    }

    #[test]
    fn walk_skips_dotfiles() {
        let dir = create_test_tree();
        let files = scan_dropped_directory(&dir.path().join("photos")).unwrap();
        assert!(files.iter().all(|f| !f.name.starts_with('.')));
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn sizes_and_names_come_from_disk() {
        let dir = create_test_tree();
        let files = scan_dropped_directory(&dir.path().join("photos")).unwrap();
        let beach = files.iter().find(|f| f.name == "beach.png").unwrap();
        assert_eq!(beach.size, b"BEACH_PIXELS".len() as u64);
        assert!(beach.path.ends_with("2024/beach.png"));
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(scan_dropped_directory(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let result = scan_dropped_directory(Path::new("/nonexistent/path/that/does/not/exist"));
        assert!(matches!(result, Err(IntakeError::Io(_))));
    }
}
