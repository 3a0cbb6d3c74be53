use sha2::Digest;
use std::path::Path;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// First 10 hex digits of SHA-256 over the text; the de-duplication key
/// embedded in artefact filenames.
pub fn content_hash(text: &str) -> String {
    sha256_hex(text.as_bytes())[..10].to_string()
}

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}
