//! Path utilities

use std::io;
use std::path::{Component, Path, PathBuf};

/// Normalize path separators to forward slashes (for display and manifests)
pub fn normalize_path<P: AsRef<Path>>(path: P) -> String {
    path.as_ref().to_string_lossy().replace('\\', "/")
}

/// Resolve `.` and `..` without touching the filesystem.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Absolute form of `path`: canonical if it exists, lexical otherwise.
pub fn absolute(path: &Path) -> io::Result<PathBuf> {
    match std::fs::canonicalize(path) {
        Ok(p) => Ok(p),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            std::path::absolute(path).map(|p| lexical_normalize(&p))
        }
        Err(e) => Err(e),
    }
}

/// Path that leads from directory `base` to `target`. Both must be absolute.
pub fn relative_path_from(base: &Path, target: &Path) -> PathBuf {
    let base: Vec<Component> = base.components().collect();
    let target: Vec<Component> = target.components().collect();
    let common = base
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base.len() {
        out.push("..");
    }
    for component in &target[common..] {
        out.push(component);
    }
    out
}

/// Where a symlink at `link` pointing at `dest` leads, lexically.
pub fn resolve_link_target(link: &Path, dest: &Path) -> PathBuf {
    if dest.is_absolute() {
        lexical_normalize(dest)
    } else {
        let parent = link.parent().unwrap_or(Path::new(""));
        lexical_normalize(&parent.join(dest))
    }
}

/// Create a symlink to a file. Fails with `AlreadyExists` if `link` exists.
#[cfg(unix)]
pub fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

/// Create a symlink to a file. Fails with `AlreadyExists` if `link` exists.
#[cfg(windows)]
pub fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(r"patches\2022\a.pak"), "patches/2022/a.pak");
    }

    #[test]
    fn test_lexical_normalize() {
        assert_eq!(
            lexical_normalize(Path::new("/a/b/../c/./d.pak")),
            PathBuf::from("/a/c/d.pak")
        );
    }

    #[test]
    fn test_relative_path_from() {
        assert_eq!(
            relative_path_from(
                Path::new("/data/canonical/steam"),
                Path::new("/data/patches/2022-03-24/pakchunk0-WindowsNoEditor.pak"),
            ),
            PathBuf::from("../../patches/2022-03-24/pakchunk0-WindowsNoEditor.pak")
        );
    }

    #[test]
    fn test_resolve_link_target() {
        assert_eq!(
            resolve_link_target(
                Path::new("/data/canonical/steam/x.pak"),
                Path::new("../../patches/b/x.pak"),
            ),
            PathBuf::from("/data/patches/b/x.pak")
        );
    }
}
