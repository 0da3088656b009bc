//! JP-010: BLAKE3 hashing for deployment fingerprints and derived values.
//!
//! Fingerprints are `"blake3:{hex}"` over a sorted `(relative path, content
//! hash)` listing, so an in-memory render and the directory written from it
//! hash to the same value.

use std::io::Read;
use std::path::{Component, Path};

const STREAM_BUF_SIZE: usize = 65536;

/// Raw 32-byte digest.
pub fn digest(bytes: &[u8]) -> [u8; 32] {
    *blake3::hash(bytes).as_bytes()
}

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(bytes).to_hex())
}

/// Hash a file's contents, streaming. Returns `"blake3:{hex}"`.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; STREAM_BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}

/// Fingerprint a set of `(relative path, content hash)` pairs.
/// Order of the input does not matter.
pub fn fingerprint<I, P, H>(entries: I) -> String
where
    I: IntoIterator<Item = (P, H)>,
    P: AsRef<str>,
    H: AsRef<str>,
{
    let mut listing: Vec<(String, String)> = entries
        .into_iter()
        .map(|(p, h)| (p.as_ref().to_string(), h.as_ref().to_string()))
        .collect();
    listing.sort();

    let mut hasher = blake3::Hasher::new();
    for (rel, hash) in &listing {
        hasher.update(rel.as_bytes());
        hasher.update(b"\0");
        hasher.update(hash.as_bytes());
        hasher.update(b"\n");
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}

/// Fingerprint a directory tree. Symlinks are skipped; relative paths use `/`.
pub fn hash_directory(root: &Path) -> std::io::Result<String> {
    let mut entries: Vec<(String, String)> = Vec::new();
    walk(root, root, &mut entries)?;
    Ok(fingerprint(entries))
}

fn walk(base: &Path, current: &Path, entries: &mut Vec<(String, String)>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let ft = entry.file_type()?;
        if ft.is_symlink() {
            continue;
        }
        let path = entry.path();
        if ft.is_dir() {
            walk(base, &path, entries)?;
        } else if ft.is_file() {
            entries.push((relative_slash_path(base, &path), hash_file(&path)?));
        }
    }
    Ok(())
}

fn relative_slash_path(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
