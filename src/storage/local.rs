use crate::error::{CapabilityError, ErrorKind};
use crate::scan::warn;
use crate::storage::{FOLDER_MIME, ItemKind, PDF_MIME, RemoteItem, RemoteStore};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::path::Path;

/// Directory tree on local disk presented through the same interface as the
/// remote store. Item ids are filesystem paths.
#[derive(Debug, Clone, Default)]
pub struct LocalStore;

fn mime_for(path: &Path, is_dir: bool) -> String {
    if is_dir {
        return FOLDER_MIME.to_string();
    }
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        PDF_MIME.to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

fn item_for(path: &Path) -> Result<RemoteItem, CapabilityError> {
    let meta = fs::metadata(path)?;
    let is_dir = meta.is_dir();
    let modified_time = meta
        .modified()
        .ok()
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Secs, true));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    Ok(RemoteItem {
        id: path.display().to_string(),
        name,
        kind: if is_dir { ItemKind::Folder } else { ItemKind::File },
        mime_type: mime_for(path, is_dir),
        modified_time,
    })
}

impl RemoteStore for LocalStore {
    fn get(&self, id: &str) -> Result<RemoteItem, CapabilityError> {
        let item = item_for(Path::new(id))?;
        if !item.is_folder() {
            return Err(CapabilityError::new(
                ErrorKind::NotFound,
                format!("{id} is not a directory"),
            ));
        }
        Ok(item)
    }

    fn list_children(
        &self,
        parent_id: &str,
        name_filter: Option<&str>,
    ) -> Result<Vec<RemoteItem>, CapabilityError> {
        let needle = name_filter.map(str::to_lowercase);
        let mut out = Vec::new();
        for entry in fs::read_dir(parent_id)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let err = CapabilityError::from(err);
                    warn::emit(
                        "ENTRY_SKIPPED",
                        "list",
                        parent_id,
                        "",
                        err.kind.as_str(),
                        &err.message,
                    );
                    continue;
                }
            };
            // Dangling symlinks and unreadable entries are skipped, not fatal.
            let item = match item_for(&entry.path()) {
                Ok(item) => item,
                Err(err) => {
                    let path = entry.path().display().to_string();
                    warn::emit(
                        "ENTRY_SKIPPED",
                        "list",
                        &path,
                        parent_id,
                        err.kind.as_str(),
                        &err.message,
                    );
                    continue;
                }
            };
            if let Some(needle) = needle.as_deref()
                && !item.is_folder()
                && !item.name.to_lowercase().contains(needle)
            {
                continue;
            }
            out.push(item);
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn download(&self, id: &str, dest: &Path) -> Result<(), CapabilityError> {
        fs::copy(id, dest)?;
        Ok(())
    }
}
