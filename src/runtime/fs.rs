//! File system operations (read, write, directory).

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self, contents))]
    pub(crate) fn write_impl(&self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::write(path, contents)
            .with_context(|| format!("Failed to write to file {}", path.display()))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_impl(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("Failed to read file {}", path.display()))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_to_string_impl(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read file {}", path.display()))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn rename_impl(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).context("Failed to rename file")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn copy_impl(&self, from: &Path, to: &Path) -> Result<u64> {
        fs::copy(from, to).context("Failed to copy file")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn create_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_file_impl(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove file {}", path.display()))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).context("Failed to remove directory and its contents")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn exists_impl(&self, path: &Path) -> bool {
        path.exists()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn is_dir_impl(&self, path: &Path) -> bool {
        path.is_dir()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_dir_impl(&self, path: &Path) -> Result<Vec<PathBuf>> {
        fs::read_dir(path)
            .with_context(|| format!("Failed to read directory {}", path.display()))?
            .map(|entry| Ok(entry?.path()))
            .collect()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn create_file_impl(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>> {
        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create file {}", path.display()))?;
        Ok(Box::new(file))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn is_writable_dir_impl(&self, path: &Path) -> bool {
        fs::metadata(path).is_ok_and(|m| m.is_dir() && !m.permissions().readonly())
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_real_runtime_file_ops() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.txt");

        runtime.write(&file_path, b"hello").unwrap();
        assert!(runtime.exists(&file_path));
        assert_eq!(runtime.read_to_string(&file_path).unwrap(), "hello");
        assert_eq!(runtime.read(&file_path).unwrap(), b"hello");

        let copy_path = dir.path().join("copy.txt");
        assert_eq!(runtime.copy(&file_path, &copy_path).unwrap(), 5);

        let moved = dir.path().join("moved.txt");
        runtime.rename(&copy_path, &moved).unwrap();
        assert!(!runtime.exists(&copy_path));
        assert!(runtime.exists(&moved));

        runtime.remove_file(&moved).unwrap();
        assert!(!runtime.exists(&moved));
    }

    #[test]
    fn test_real_runtime_dir_ops() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");

        runtime.create_dir_all(&nested).unwrap();
        assert!(runtime.is_dir(&nested));
        assert!(runtime.is_writable_dir(&nested));
        assert!(!runtime.is_writable_dir(&dir.path().join("missing")));

        runtime.write(&nested.join("f.txt"), b"x").unwrap();
        let entries = runtime.read_dir(&nested).unwrap();
        assert_eq!(entries, vec![nested.join("f.txt")]);

        runtime.remove_dir_all(&dir.path().join("a")).unwrap();
        assert!(!runtime.exists(&nested));
    }

    #[test]
    fn test_real_runtime_streams() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let path = dir.path().join("stream.bin");

        {
            let mut writer = runtime.create_file(&path).unwrap();
            writer.write_all(b"streamed").unwrap();
        }
        assert_eq!(runtime.read_to_string(&path).unwrap(), "streamed");
    }

    #[test]
    fn test_real_runtime_errors_name_the_path() {
        let runtime = RealRuntime;
        let err = runtime
            .read_to_string(std::path::Path::new("/nonexistent/fac/file"))
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/fac/file"));
    }
}
