use crate::compiler::compiler_errors::CompilerError;
use crate::return_file_error;
use crate::settings::NYLA_FILE_EXTENSION;
use std::fs;
use std::path::{Path, PathBuf};

/// A discovered source file: where it lives on disk and the internal path
/// the import system addresses it by (directory-relative, extension
/// stripped, `/` separated on every host).
#[derive(Debug, Clone)]
pub struct FileLocation {
    pub system_path: PathBuf,
    pub internal_path: String,
}

/// Recursively collects every `.nyla` file under `directory`. Entries are
/// visited in name order so discovery is deterministic across platforms.
pub fn collect_source_files(
    directory: &Path,
    directory_rel_src: &str,
    out: &mut Vec<FileLocation>,
) -> Result<(), CompilerError> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            return_file_error!(
                FailedToReadSourceDirectory,
                directory,
                format!("Failed to read source directory: {e}")
            );
        }
    };

    let mut entries: Vec<_> = entries.filter_map(Result::ok).collect();
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if path.is_dir() {
            let nested = if directory_rel_src.is_empty() {
                name.to_string()
            } else {
                format!("{directory_rel_src}/{name}")
            };
            collect_source_files(&path, &nested, out)?;
            continue;
        }

        if let Some(stem) = name.strip_suffix(&format!(".{NYLA_FILE_EXTENSION}")) {
            let internal_path = if directory_rel_src.is_empty() {
                stem.to_string()
            } else {
                format!("{directory_rel_src}/{stem}")
            };
            out.push(FileLocation {
                system_path: path,
                internal_path,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn internal_paths_strip_extension_and_join_with_slashes() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("util")).unwrap();
        fs::write(dir.path().join("main.nyla"), "").unwrap();
        fs::write(dir.path().join("util/math.nyla"), "").unwrap();
        fs::write(dir.path().join("util/readme.txt"), "").unwrap();

        let mut found = Vec::new();
        collect_source_files(dir.path(), "", &mut found).unwrap();

        let mut paths: Vec<_> = found.iter().map(|f| f.internal_path.clone()).collect();
        paths.sort();
        assert_eq!(paths, vec!["main".to_string(), "util/math".to_string()]);
    }

    #[test]
    fn missing_directory_is_a_file_error() {
        let mut found = Vec::new();
        let result = collect_source_files(Path::new("/nonexistent-nyla-src"), "", &mut found);
        assert!(result.is_err());
    }
}
