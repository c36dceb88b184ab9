use std::path::{Path, PathBuf};

use codeseek_core::CodeseekError;
use ignore::overrides::OverrideBuilder;

/// Walk `root`, returning files whose extension is in `extensions`.
///
/// Extensions may be given with or without the leading dot (`".rs"` and
/// `"rs"` are equivalent). `.gitignore` rules and hidden files are respected,
/// and any path matching one of the `exclude` globs is skipped. Entries are
/// visited in file-name order within each directory so the result is
/// deterministic.
///
/// # Errors
///
/// Returns [`CodeseekError::Io`] if `root` is not a readable directory or any
/// entry below it cannot be read, or [`CodeseekError::Config`] if an exclude
/// pattern is not a valid glob.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use codeseek_index::walker::list_files;
///
/// let files = list_files(Path::new("."), &["rs".to_string()], &[]).unwrap();
/// for f in &files {
///     println!("{}", f.display());
/// }
/// ```
pub fn list_files(
    root: &Path,
    extensions: &[String],
    exclude: &[String],
) -> Result<Vec<PathBuf>, CodeseekError> {
    let metadata = std::fs::metadata(root)?;
    if !metadata.is_dir() {
        return Err(CodeseekError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a directory", root.display()),
        )));
    }

    let wanted: Vec<&str> = extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.'))
        .filter(|e| !e.is_empty())
        .collect();

    let mut overrides = OverrideBuilder::new(root);
    for pattern in exclude {
        overrides
            .add(&format!("!{pattern}"))
            .map_err(|e| CodeseekError::Config(format!("invalid exclude pattern '{pattern}': {e}")))?;
    }
    let overrides = overrides
        .build()
        .map_err(|e| CodeseekError::Config(format!("invalid exclude patterns: {e}")))?;

    let walker = ignore::WalkBuilder::new(root)
        .overrides(overrides)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| walk_error(root, e))?;

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if wanted.contains(&ext) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Convert a walk failure into an I/O error that keeps the offending path.
fn walk_error(root: &Path, err: ignore::Error) -> CodeseekError {
    let message = format!("failed to walk {}: {err}", root.display());
    let kind = err
        .into_io_error()
        .map_or(std::io::ErrorKind::Other, |e| e.kind());
    CodeseekError::Io(std::io::Error::new(kind, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_temp_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::write(root.join("src/main.go"), "package main").unwrap();
        fs::write(root.join("src/util.py"), "def util(): pass").unwrap();
        fs::write(root.join("src/nested/deep.go"), "package nested").unwrap();
        fs::write(root.join("README.md"), "# Hello").unwrap();
        fs::write(root.join("build.log"), "ok").unwrap();

        dir
    }

    fn relative(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn filters_by_extension_with_or_without_dot() {
        let dir = make_temp_repo();
        let root = dir.path();

        let dotted = list_files(root, &[".go".to_string()], &[]).unwrap();
        let bare = list_files(root, &["go".to_string()], &[]).unwrap();
        assert_eq!(dotted, bare);
        assert_eq!(relative(root, &dotted), vec!["src/main.go", "src/nested/deep.go"]);
    }

    #[test]
    fn multiple_extensions_in_sorted_order() {
        let dir = make_temp_repo();
        let root = dir.path();

        let files = list_files(root, &[".go".to_string(), ".py".to_string()], &[]).unwrap();
        assert_eq!(
            relative(root, &files),
            vec!["src/main.go", "src/nested/deep.go", "src/util.py"]
        );
    }

    #[test]
    fn exclude_globs_are_skipped() {
        let dir = make_temp_repo();
        let root = dir.path();

        let files = list_files(
            root,
            &[".go".to_string(), ".log".to_string()],
            &["nested".to_string(), "*.log".to_string()],
        )
        .unwrap();
        assert_eq!(relative(root, &files), vec!["src/main.go"]);
    }

    #[test]
    fn respects_gitignore() {
        let dir = make_temp_repo();
        let root = dir.path();

        // The ignore crate needs a .git dir to recognize .gitignore files
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("vendor")).unwrap();
        fs::write(root.join("vendor/lib.go"), "package vendor").unwrap();
        fs::write(root.join(".gitignore"), "vendor/\n").unwrap();

        let files = list_files(root, &[".go".to_string()], &[]).unwrap();
        assert!(relative(root, &files).iter().all(|p| !p.starts_with("vendor")));
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = list_files(&dir.path().join("nope"), &[".go".to_string()], &[]);
        assert!(matches!(result, Err(CodeseekError::Io(_))));
    }

    #[test]
    fn walk_errors_keep_kind_and_path() {
        let inner = ignore::Error::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        let err = ignore::Error::WithPath {
            path: PathBuf::from("repo/secret"),
            err: Box::new(inner),
        };

        match walk_error(Path::new("repo"), err) {
            CodeseekError::Io(io) => {
                assert_eq!(io.kind(), std::io::ErrorKind::PermissionDenied);
                assert!(io.to_string().contains("repo/secret"));
            }
            other => panic!("expected Io, got {other:?}"),
        }

        let looped = ignore::Error::Loop {
            ancestor: PathBuf::from("repo"),
            child: PathBuf::from("repo/link"),
        };
        assert!(matches!(walk_error(Path::new("repo"), looped), CodeseekError::Io(_)));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_fails_the_walk() {
        use std::os::unix::fs::PermissionsExt;

        let dir = make_temp_repo();
        let locked = dir.path().join("src/nested");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores permission bits; nothing to observe there.
        let readable = fs::read_dir(&locked).is_ok();
        let result = list_files(dir.path(), &[".go".to_string()], &[]);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if readable {
            return;
        }

        assert!(matches!(result, Err(CodeseekError::Io(_))));
    }

    #[test]
    fn invalid_exclude_glob_is_a_config_error() {
        let dir = make_temp_repo();
        let result = list_files(dir.path(), &[".go".to_string()], &["a[".to_string()]);
        assert!(matches!(result, Err(CodeseekError::Config(_))));
    }
}
