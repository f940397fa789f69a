//! Domain services: ingestion, thumbnails, gallery listings, history
//! export/import and admin authentication.

pub mod admin_auth;
pub mod content;
pub mod gallery;
pub mod history;
pub mod ingest;
pub mod thumbnail;

pub use admin_auth::{AdminAuthenticator, SharedSecret};
pub use content::ContentRoot;
pub use gallery::{Gallery, GalleryScope, PageRequest};
pub use history::HistoryService;
pub use ingest::Ingestor;
pub use thumbnail::ThumbnailCache;
