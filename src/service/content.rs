//! On-disk layout of the content root and the mapping between stored web
//! paths (`/static/generated_images/<file>`) and filesystem paths.

use std::path::{Path, PathBuf};

/// URL prefix under which the content root is served.
pub const STATIC_URL_PREFIX: &str = "/static";
pub const ORIGINALS_DIR: &str = "generated_images";
pub const THUMBNAILS_DIR: &str = "thumbnails";
pub const THUMBNAIL_PREFIX: &str = "thumb_";

/// Derive the thumbnail web path of an original.
///
/// Only the file name of `original` matters: every shape
/// (`/static/generated_images/x.png`, `static/generated_images/x.png`, a bare
/// `x.png`, a path in another directory) maps to
/// `/static/thumbnails/thumb_x.png`.
pub fn thumbnail_path_for(original: &str) -> String {
    let file_name = original.rsplit('/').next().unwrap_or(original);
    format!("{STATIC_URL_PREFIX}/{THUMBNAILS_DIR}/{THUMBNAIL_PREFIX}{file_name}")
}

/// Web path of a freshly stored original.
pub fn original_web_path(file_name: &str) -> String {
    format!("{STATIC_URL_PREFIX}/{ORIGINALS_DIR}/{file_name}")
}

#[derive(Debug, Clone)]
pub struct ContentRoot {
    root: PathBuf,
}

impl ContentRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn originals_dir(&self) -> PathBuf {
        self.root.join(ORIGINALS_DIR)
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.root.join(THUMBNAILS_DIR)
    }

    /// Create the originals and thumbnails directories.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.originals_dir()).await?;
        tokio::fs::create_dir_all(self.thumbnails_dir()).await
    }

    /// Resolve a web path to a file under the content root.
    ///
    /// Accepts `/static/<generated_images|thumbnails>/<name>` and the same
    /// without the leading slash. `name` must be a single plain file name, so
    /// nothing outside the two content directories is ever addressed.
    pub fn resolve(&self, web_path: &str) -> Option<PathBuf> {
        self.resolve_in(web_path, &[ORIGINALS_DIR, THUMBNAILS_DIR])
    }

    /// Like [`ContentRoot::resolve`], restricted to the originals directory.
    pub fn resolve_original(&self, web_path: &str) -> Option<PathBuf> {
        self.resolve_in(web_path, &[ORIGINALS_DIR])
    }

    fn resolve_in(&self, web_path: &str, dirs: &[&str]) -> Option<PathBuf> {
        let rest = web_path
            .strip_prefix(STATIC_URL_PREFIX)
            .or_else(|| web_path.strip_prefix(&STATIC_URL_PREFIX[1..]))?;
        let rest = rest.strip_prefix('/')?;
        let (dir, name) = rest.split_once('/')?;
        if !dirs.contains(&dir) || !is_plain_file_name(name) {
            return None;
        }
        Some(self.root.join(dir).join(name))
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
