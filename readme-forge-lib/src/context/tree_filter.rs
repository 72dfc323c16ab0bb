//! Drops paths that carry no signal for README analysis.

use super::hosting::TreeEntry;

const LOG_TARGET: &str = "    filter";

/// Blobs larger than this are skipped by default.
pub const DEFAULT_MAX_BLOB_SIZE: u64 = 1024 * 1024;

const EXCLUDED_DIRECTORIES: &[&str] = &[
    ".git",
    ".github",
    ".idea",
    ".next",
    ".nuxt",
    ".venv",
    ".vscode",
    "__pycache__",
    "bower_components",
    "build",
    "coverage",
    "dist",
    "node_modules",
    "out",
    "target",
    "vendor",
    "venv",
];

const EXCLUDED_EXTENSIONS: &[&str] = &[
    // images
    "bmp", "gif", "ico", "jpeg", "jpg", "png", "svg", "tiff", "webp",
    // fonts
    "eot", "otf", "ttf", "woff", "woff2",
    // archives
    "7z", "bz2", "gz", "jar", "rar", "tar", "tgz", "xz", "zip",
    // compiled output
    "a", "bin", "class", "dll", "dylib", "exe", "o", "obj", "pyc", "so", "wasm",
    // media and documents
    "avi", "mov", "mp3", "mp4", "ogg", "pdf", "wav", "webm",
    // generated
    "map", "lock",
];

const EXCLUDED_FILE_NAMES: &[&str] = &[
    ".DS_Store",
    "Cargo.lock",
    "Gemfile.lock",
    "Pipfile.lock",
    "composer.lock",
    "go.sum",
    "package-lock.json",
    "pnpm-lock.yaml",
    "poetry.lock",
    "yarn.lock",
];

const MINIFIED_SUFFIXES: &[&str] = &[".min.js", ".min.css"];

#[derive(Debug, Clone, Copy)]
pub struct TreeFilter {
    max_blob_size: u64,
}

impl Default for TreeFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BLOB_SIZE)
    }
}

impl TreeFilter {
    #[must_use]
    pub const fn new(max_blob_size: u64) -> Self {
        Self { max_blob_size }
    }

    /// Whether a path is worth sending on to caching and the LLM.
    #[must_use]
    pub fn is_analyzable(&self, path: &str) -> bool {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some(file_name) = segments.pop() else {
            return false;
        };

        if segments.iter().any(|dir| EXCLUDED_DIRECTORIES.contains(dir)) {
            return false;
        }

        if EXCLUDED_FILE_NAMES.contains(&file_name) {
            return false;
        }

        let lower = file_name.to_ascii_lowercase();
        if MINIFIED_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix)) {
            return false;
        }

        match lower.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => !EXCLUDED_EXTENSIONS.contains(&extension),
            _ => true,
        }
    }

    /// Keep the analyzable blobs, returning their paths in listing order.
    #[must_use]
    pub fn apply(&self, entries: Vec<TreeEntry>) -> Vec<String> {
        let total = entries.len();
        let kept: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.is_blob())
            .filter(|entry| entry.size.is_none_or(|size| size <= self.max_blob_size))
            .filter(|entry| self.is_analyzable(&entry.path))
            .map(|entry| entry.path)
            .collect();

        log::debug!(target: LOG_TARGET, "Kept {} of {total} tree entries", kept.len());
        kept
    }
}
