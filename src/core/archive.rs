//! Diagnostic archive: zip every file of a run's output directory.

use super::error::{CsetError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive file name inside the output directory.
pub const ARCHIVE_FILE: &str = "diagnostic.zip";

/// Collect regular files below `base` as (relative name, path), sorted.
/// Skips symlinks.
pub fn collect_files(base: &Path) -> Result<Vec<(String, PathBuf)>> {
    fn walk(base: &Path, current: &Path, entries: &mut Vec<(String, PathBuf)>) -> Result<()> {
        let read_dir = std::fs::read_dir(current).map_err(|e| CsetError::io(current, e))?;
        let mut children = read_dir
            .collect::<std::io::Result<Vec<std::fs::DirEntry>>>()
            .map_err(|e| CsetError::io(current, e))?;
        children.sort_by_key(|e| e.file_name());

        for entry in children {
            let path = entry.path();
            let ft = entry.file_type().map_err(|e| CsetError::io(&path, e))?;
            if ft.is_symlink() {
                continue;
            }
            if ft.is_file() {
                entries.push((archive_name(base, &path), path));
            } else if ft.is_dir() {
                walk(base, &path, entries)?;
            }
        }
        Ok(())
    }

    let mut entries = Vec::new();
    walk(base, base, &mut entries)?;
    Ok(entries)
}

/// Forward-slash path of `path` relative to `base`.
fn archive_name(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Package every file in `output_directory` into `diagnostic.zip`.
///
/// Any previous archive is replaced and never included in the new one.
pub fn create_diagnostic_archive(output_directory: &Path) -> Result<PathBuf> {
    let archive_path = output_directory.join(ARCHIVE_FILE);
    let files: Vec<_> = collect_files(output_directory)?
        .into_iter()
        .filter(|(_, path)| path != &archive_path)
        .collect();

    let archive_err = |source| CsetError::Archive {
        path: archive_path.clone(),
        source,
    };

    let out = File::create(&archive_path).map_err(|e| CsetError::io(&archive_path, e))?;
    let mut zip = ZipWriter::new(out);
    for (name, path) in &files {
        let mut src = File::open(path).map_err(|e| CsetError::io(path, e))?;
        let len = src.metadata().map_err(|e| CsetError::io(path, e))?.len();
        zip.start_file(name.as_str(), entry_options(len))
            .map_err(archive_err)?;
        std::io::copy(&mut src, &mut zip).map_err(|e| CsetError::io(path, e))?;
    }
    zip.finish().map_err(archive_err)?;

    tracing::debug!(files = files.len(), archive = %archive_path.display(), "wrote diagnostic archive");
    Ok(archive_path)
}

/// Deflate options for an entry of `len` bytes; zip64 from 4 GiB up.
fn entry_options(len: u64) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(len >= u64::from(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn archive_names(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        names
    }

    #[test]
    fn test_collect_files_sorted_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("c.txt"), "c").unwrap();

        let names: Vec<String> = collect_files(dir.path())
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub/c.txt"]);
    }

    #[test]
    fn test_archive_contains_files_not_itself() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("meta.json"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("plots")).unwrap();
        std::fs::write(dir.path().join("plots").join("p.json"), "[1]").unwrap();

        let archive = create_diagnostic_archive(dir.path()).unwrap();
        assert_eq!(archive, dir.path().join(ARCHIVE_FILE));
        assert_eq!(archive_names(&archive), vec!["meta.json", "plots/p.json"]);
    }

    #[test]
    fn test_archive_preserves_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out.txt"), "hello diagnostics").unwrap();
        let archive = create_diagnostic_archive(dir.path()).unwrap();

        let mut zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
        let mut content = String::new();
        zip.by_name("out.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hello diagnostics");
    }

    #[test]
    fn test_archive_replaces_previous_archive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.txt"), "1").unwrap();
        create_diagnostic_archive(dir.path()).unwrap();
        std::fs::write(dir.path().join("two.txt"), "2").unwrap();
        let archive = create_diagnostic_archive(dir.path()).unwrap();
        assert_eq!(archive_names(&archive), vec!["one.txt", "two.txt"]);
    }

    #[test]
    fn test_archive_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let archive = create_diagnostic_archive(dir.path()).unwrap();
        assert!(archive_names(&archive).is_empty());
    }

    #[test]
    fn test_collect_files_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_files(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, CsetError::Io { .. }));
    }

    #[test]
    fn test_archive_file_over_four_gib() {
        let dir = tempfile::tempdir().unwrap();
        let len = 4_400_000_000u64;
        File::create(dir.path().join("big.nc"))
            .unwrap()
            .set_len(len)
            .unwrap();
        std::fs::write(dir.path().join("small.txt"), "s").unwrap();

        let archive = create_diagnostic_archive(dir.path()).unwrap();
        let mut zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
        assert_eq!(zip.by_name("big.nc").unwrap().size(), len);
        assert_eq!(zip.by_name("small.txt").unwrap().size(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_archive_skips_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real.txt"), "r").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))
            .unwrap();
        let archive = create_diagnostic_archive(dir.path()).unwrap();
        assert_eq!(archive_names(&archive), vec!["real.txt"]);
    }
}
