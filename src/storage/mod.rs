pub mod credentials;
pub mod drive;
pub mod local;
pub mod pdftotext;

use crate::error::CapabilityError;
use std::path::Path;

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Folder,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    pub mime_type: String,
    pub modified_time: Option<String>,
}

impl RemoteItem {
    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }

    pub fn is_pdf(&self) -> bool {
        self.kind == ItemKind::File
            && (self.mime_type == PDF_MIME || self.name.to_ascii_lowercase().ends_with(".pdf"))
    }
}

/// Read side of the document store.
pub trait RemoteStore {
    /// Metadata of one item; used to validate the root before a run.
    fn get(&self, id: &str) -> Result<RemoteItem, CapabilityError>;

    /// All non-trashed children of `parent_id`, across every page.
    ///
    /// `name_filter` narrows files only; folders are always returned so the
    /// walker can descend into them.
    fn list_children(
        &self,
        parent_id: &str,
        name_filter: Option<&str>,
    ) -> Result<Vec<RemoteItem>, CapabilityError>;

    fn download(&self, id: &str, dest: &Path) -> Result<(), CapabilityError>;
}

pub trait TextExtractor {
    fn extract_text(&self, path: &Path, max_pages: usize) -> Result<String, CapabilityError>;
}
