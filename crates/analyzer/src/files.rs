//! File helpers: content hashing and path-derived naming
//!
//! The store keys files by a "processed path" (the real path minus noise
//! components like a checkout root), and objects inherit a package
//! qualifier derived from the file's location merged with whatever package
//! name the structural parser found inside the file.

use oradep_core::ident::fold;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// SHA-256 of a file's raw contents, hex-encoded, read in 64 KiB chunks.
pub fn compute_file_hash(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hex::encode(hasher.finalize());
    trace!(path = %path.display(), hash = &digest[..10], "computed file hash");
    Ok(digest)
}

/// Canonical stored form of a path: every component whose name matches the
/// exclusion list (case-insensitively) is dropped. Falls back to the file
/// name when everything is excluded.
pub fn processed_path(path: &Path, exclude: &[String]) -> String {
    let excluded: Vec<String> = exclude.iter().map(|e| fold(e)).collect();
    let kept: PathBuf = path
        .components()
        .filter(|part| {
            let name = part.as_os_str().to_string_lossy();
            !excluded.contains(&fold(&name))
        })
        .collect();
    if kept.as_os_str().is_empty() {
        return path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    kept.to_string_lossy().into_owned()
}

/// Derive the package qualifier for a file's objects.
///
/// Path components are stripped of a configured extension, dropped when
/// they match the exclusion list, and split on `.`. The in-file package
/// name (if the structural parser found one) contributes its segments
/// first; path-derived segments follow, deduplicated case-insensitively.
/// The result is case-folded; empty means a standalone object.
pub fn derive_package_name(
    package_from_code: Option<&str>,
    path: &Path,
    extensions: &[String],
    exclude: &[String],
) -> String {
    let excluded: Vec<String> = exclude.iter().map(|e| fold(e)).collect();

    let mut path_segments: Vec<String> = Vec::new();
    for part in path.components() {
        let segment = part.as_os_str().to_string_lossy();
        let mut name = segment.as_ref();
        for ext in extensions {
            if let Some(stripped) = strip_extension(name, ext) {
                name = stripped;
                break;
            }
        }
        if excluded.contains(&fold(name)) {
            trace!(segment = %segment, "path segment excluded from package derivation");
            continue;
        }
        for sub in name.split('.') {
            let sub = sub.trim();
            if !sub.is_empty() {
                path_segments.push(fold(sub));
            }
        }
    }

    let mut parts: Vec<String> = Vec::new();
    if let Some(pkg) = package_from_code {
        for p in pkg.split('.') {
            let p = p.trim();
            if !p.is_empty() {
                parts.push(fold(p));
            }
        }
    }
    for segment in path_segments {
        if !parts.contains(&segment) {
            parts.push(segment);
        }
    }

    let package = parts.join(".");
    debug!(path = %path.display(), package = package.as_str(), "derived package name");
    package
}

fn strip_extension<'a>(name: &'a str, ext: &str) -> Option<&'a str> {
    let suffix = format!(".{ext}");
    let cut = name.len().checked_sub(suffix.len())?;
    if cut > 0 && name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(&suffix) {
        Some(&name[..cut])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_compute_file_hash() {
        let dir = tempfile::tempdir().unwrap();
        let fpath = dir.path().join("a.sql");
        std::fs::File::create(&fpath)
            .unwrap()
            .write_all(b"SELECT 1;")
            .unwrap();

        let first = compute_file_hash(&fpath).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(compute_file_hash(&fpath).unwrap(), first);

        std::fs::write(&fpath, b"SELECT 2;").unwrap();
        assert_ne!(compute_file_hash(&fpath).unwrap(), first);
    }

    #[test]
    fn test_hash_missing_file() {
        assert!(compute_file_hash(Path::new("/does/not/exist.sql")).is_err());
    }

    #[test]
    fn test_processed_path_drops_excluded_components() {
        let p = Path::new("checkout/src/HR/proc.sql");
        let out = processed_path(p, &["checkout".into(), "SRC".into()]);
        assert_eq!(out, format!("HR{}proc.sql", std::path::MAIN_SEPARATOR));
    }

    #[test]
    fn test_processed_path_all_excluded_falls_back_to_file_name() {
        let p = Path::new("src/proc.sql");
        let out = processed_path(p, &["src".into(), "proc.sql".into()]);
        assert_eq!(out, "proc.sql");
    }

    #[test]
    fn test_derive_package_from_path_only() {
        let p = Path::new("HR/Admin/helpers.sql");
        let pkg = derive_package_name(None, p, &["sql".into()], &[]);
        assert_eq!(pkg, "hr.admin.helpers");
    }

    #[test]
    fn test_derive_package_merges_in_file_name_first() {
        let p = Path::new("hr/pkg_util.sql");
        let pkg = derive_package_name(Some("PKG_UTIL"), p, &["sql".into()], &[]);
        assert_eq!(pkg, "pkg_util.hr");
    }

    #[test]
    fn test_derive_package_dedupes_case_insensitively() {
        let p = Path::new("HR/hr.sql");
        let pkg = derive_package_name(Some("hr"), p, &["sql".into()], &[]);
        assert_eq!(pkg, "hr");
    }

    #[test]
    fn test_derive_package_exclusion() {
        let p = Path::new("PACKAGE_BODIES/hr/billing.sql");
        let pkg = derive_package_name(
            None,
            p,
            &["sql".into()],
            &["package_bodies".into()],
        );
        assert_eq!(pkg, "hr.billing");
    }

    #[test]
    fn test_derive_package_splits_dotted_component() {
        let p = Path::new("schema.pkg/obj.sql");
        let pkg = derive_package_name(None, p, &["sql".into()], &[]);
        assert_eq!(pkg, "schema.pkg.obj");
    }

    #[test]
    fn test_derive_package_empty_result() {
        let p = Path::new("proc.sql");
        let pkg = derive_package_name(None, p, &["sql".into()], &["proc".into()]);
        assert_eq!(pkg, "");
    }
}
