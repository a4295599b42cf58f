//! Dependency manifest fingerprinting
//!
//! A fingerprint is a SHA256 digest over the declared dependency manifests of
//! a project, in declared order. Same manifest bytes = same fingerprint.

use crate::error::{SmartCacheError, SmartCacheResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Schema marker mixed into every digest. Bump when the framing changes.
pub const FINGERPRINT_SCHEMA: &str = "smartcache-fingerprint-v1";

/// Build tool presets with their canonical manifest order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestPreset {
    /// Gradle (build scripts, settings, version catalog, wrapper)
    Gradle,
    /// Maven (pom.xml)
    Maven,
    /// Cargo/Rust (Cargo.toml, Cargo.lock)
    Cargo,
    /// npm (package.json, package-lock.json)
    Npm,
    /// Go modules (go.mod, go.sum)
    Go,
    /// pip/Python (requirements.txt, Pipfile.lock)
    Pip,
}

impl ManifestPreset {
    /// Manifest paths relative to the project root, in fingerprint order
    pub fn manifests(&self) -> &'static [&'static str] {
        match self {
            Self::Gradle => &[
                "build.gradle",
                "build.gradle.kts",
                "settings.gradle",
                "settings.gradle.kts",
                "gradle.properties",
                "gradle/libs.versions.toml",
                "gradle/wrapper/gradle-wrapper.properties",
            ],
            Self::Maven => &["pom.xml", ".mvn/maven.config"],
            Self::Cargo => &["Cargo.toml", "Cargo.lock"],
            Self::Npm => &["package.json", "package-lock.json"],
            Self::Go => &["go.mod", "go.sum"],
            Self::Pip => &["requirements.txt", "Pipfile.lock"],
        }
    }
}

impl fmt::Display for ManifestPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gradle => "gradle",
            Self::Maven => "maven",
            Self::Cargo => "cargo",
            Self::Npm => "npm",
            Self::Go => "go",
            Self::Pip => "pip",
        };
        write!(f, "{}", name)
    }
}

/// Hex length of a SHA256 digest
const FINGERPRINT_HEX_LEN: usize = 64;

/// Characters shown by [`Fingerprint::short`]
const SHORT_LEN: usize = 12;

/// Lowercase hex SHA256 of a manifest set
///
/// Deserializing rejects anything that is not 64 lowercase hex characters,
/// so foreign metadata fails to parse instead of producing a bogus value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Fingerprint(String);

impl TryFrom<String> for Fingerprint {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let valid = value.len() == FINGERPRINT_HEX_LEN
            && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if valid {
            Ok(Self(value))
        } else {
            Err(format!(
                "fingerprint must be {} lowercase hex characters, got {:?}",
                FINGERPRINT_HEX_LEN, value
            ))
        }
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.0
    }
}

impl Fingerprint {
    /// Full 64-character hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for display
    pub fn short(&self) -> &str {
        self.0.get(..SHORT_LEN).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolve manifest paths against the project root, preserving order
pub fn resolve_manifests(project_dir: &Path, manifests: &[String]) -> Vec<PathBuf> {
    manifests.iter().map(|m| project_dir.join(m)).collect()
}

/// Read a manifest, treating a missing file as empty content
fn read_manifest(path: &Path) -> SmartCacheResult<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Manifest {} missing, hashing as empty", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(SmartCacheError::io(
            format!("reading manifest {}", path.display()),
            e,
        )),
    }
}

/// Compute the fingerprint of an ordered list of manifest files
///
/// Each file contributes its length and its bytes, in declared order, so
/// moving content between files or reordering the list changes the digest.
/// Paths themselves are not hashed: the same manifests checked out in two
/// different workspaces share a fingerprint. Unreadable files (other than
/// missing ones) surface as IO errors.
pub fn compute_fingerprint(file_paths: &[PathBuf]) -> SmartCacheResult<Fingerprint> {
    if file_paths.is_empty() {
        return Err(SmartCacheError::EmptyManifestList);
    }

    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_SCHEMA.as_bytes());

    for path in file_paths {
        let contents = read_manifest(path)?;
        hasher.update((contents.len() as u64).to_le_bytes());
        hasher.update(&contents);
    }

    let fingerprint = Fingerprint(hex::encode(hasher.finalize()));
    debug!(
        "Fingerprint over {} manifests: {}",
        file_paths.len(),
        fingerprint.short()
    );
    Ok(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifests(dir: &TempDir) -> Vec<PathBuf> {
        vec![dir.path().join("build.txt"), dir.path().join("lock.txt")]
    }

    #[test]
    fn preset_display() {
        assert_eq!(ManifestPreset::Gradle.to_string(), "gradle");
        assert_eq!(ManifestPreset::Cargo.to_string(), "cargo");
    }

    #[test]
    fn gradle_preset_starts_with_build_script() {
        assert_eq!(ManifestPreset::Gradle.manifests()[0], "build.gradle");
    }

    #[test]
    fn fingerprint_deterministic() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("build.txt"), "a").unwrap();
        fs::write(dir.path().join("lock.txt"), "b").unwrap();

        let fp1 = compute_fingerprint(&manifests(&dir)).unwrap();
        let fp2 = compute_fingerprint(&manifests(&dir)).unwrap();

        assert_eq!(fp1, fp2);
        assert_eq!(fp1.as_str().len(), 64);
        assert!(fp1.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(fp1.short().len(), 12);
    }

    #[test]
    fn lockfile_change_changes_fingerprint() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("build.txt"), "a").unwrap();
        fs::write(dir.path().join("lock.txt"), "b").unwrap();
        let d1 = compute_fingerprint(&manifests(&dir)).unwrap();

        fs::write(dir.path().join("lock.txt"), "c").unwrap();
        let d2 = compute_fingerprint(&manifests(&dir)).unwrap();

        assert_ne!(d1, d2);
    }

    #[test]
    fn every_single_byte_flip_changes_fingerprint() {
        let dir = TempDir::new().unwrap();
        let original = b"implementation 'com.google.guava:guava:33.0.0-jre'".to_vec();
        fs::write(dir.path().join("build.txt"), &original).unwrap();
        fs::write(dir.path().join("lock.txt"), "locked").unwrap();
        let base = compute_fingerprint(&manifests(&dir)).unwrap();

        let mut seen = std::collections::HashSet::new();
        seen.insert(base.clone());
        for i in 0..original.len() {
            let mut mutated = original.clone();
            mutated[i] ^= 0x01;
            fs::write(dir.path().join("build.txt"), &mutated).unwrap();
            let fp = compute_fingerprint(&manifests(&dir)).unwrap();
            assert!(seen.insert(fp), "collision after flipping byte {}", i);
        }
    }

    #[test]
    fn missing_file_hashes_as_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("build.txt"), "a").unwrap();
        let missing = compute_fingerprint(&manifests(&dir)).unwrap();

        fs::write(dir.path().join("lock.txt"), "").unwrap();
        let empty = compute_fingerprint(&manifests(&dir)).unwrap();

        assert_eq!(missing, empty);
    }

    #[test]
    fn moving_content_between_files_changes_fingerprint() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("build.txt"), "ab").unwrap();
        fs::write(dir.path().join("lock.txt"), "").unwrap();
        let fp1 = compute_fingerprint(&manifests(&dir)).unwrap();

        fs::write(dir.path().join("build.txt"), "a").unwrap();
        fs::write(dir.path().join("lock.txt"), "b").unwrap();
        let fp2 = compute_fingerprint(&manifests(&dir)).unwrap();

        assert_ne!(fp1, fp2);
    }

    #[test]
    fn order_is_part_of_the_fingerprint() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("build.txt"), "a").unwrap();
        fs::write(dir.path().join("lock.txt"), "b").unwrap();

        let forward = compute_fingerprint(&manifests(&dir)).unwrap();
        let mut reversed = manifests(&dir);
        reversed.reverse();
        let backward = compute_fingerprint(&reversed).unwrap();

        assert_ne!(forward, backward);
    }

    #[test]
    fn workspace_location_does_not_matter() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        for dir in [&a, &b] {
            fs::write(dir.path().join("build.txt"), "a").unwrap();
            fs::write(dir.path().join("lock.txt"), "b").unwrap();
        }

        assert_eq!(
            compute_fingerprint(&manifests(&a)).unwrap(),
            compute_fingerprint(&manifests(&b)).unwrap()
        );
    }

    #[test]
    fn empty_list_is_rejected() {
        let err = compute_fingerprint(&[]).unwrap_err();
        assert!(matches!(err, SmartCacheError::EmptyManifestList));
    }

    #[test]
    fn resolve_keeps_declared_order() {
        let root = Path::new("/project");
        let paths = resolve_manifests(root, &["b".to_string(), "a".to_string()]);
        assert_eq!(paths, vec![root.join("b"), root.join("a")]);
    }

    #[test]
    fn deserialize_rejects_foreign_values() {
        let upper = format!("\"{}\"", "AB".repeat(32));
        let non_ascii = "\"\u{00e9}\u{00e9}\u{00e9}\u{00e9}\u{00e9}\u{00e9}\u{00e9}\"".to_string();
        for bad in ["\"abc\"".to_string(), upper, non_ascii] {
            assert!(serde_json::from_str::<Fingerprint>(&bad).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn serde_keeps_plain_string_form() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("build.txt"), "a").unwrap();
        fs::write(dir.path().join("lock.txt"), "b").unwrap();
        let fp = compute_fingerprint(&manifests(&dir)).unwrap();

        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{}\"", fp.as_str()));
        assert_eq!(serde_json::from_str::<Fingerprint>(&json).unwrap(), fp);
        assert_eq!(fp.short().len(), 12);
    }
}
