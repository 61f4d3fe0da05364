use crate::error::{CapabilityError, ErrorKind};
use crate::storage::{FOLDER_MIME, ItemKind, RemoteItem, RemoteStore};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3/files";
const PAGE_SIZE: &str = "1000";
const ITEM_FIELDS: &str = "id,name,mimeType,modifiedTime";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    modified_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListPage {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

impl From<DriveFile> for RemoteItem {
    fn from(file: DriveFile) -> Self {
        let kind = if file.mime_type == FOLDER_MIME {
            ItemKind::Folder
        } else {
            ItemKind::File
        };
        RemoteItem {
            id: file.id,
            name: file.name,
            kind,
            mime_type: file.mime_type,
            modified_time: file.modified_time,
        }
    }
}

/// Google Drive v3 backend, covering My Drive and shared drives.
pub struct DriveStore {
    client: Client,
    api_base: String,
    token: String,
}

impl DriveStore {
    pub fn new(api_base: &str, token: String, timeout_secs: u64) -> Result<Self, CapabilityError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn get_checked(&self, url: &str, query: &[(&str, &str)]) -> Result<Response, CapabilityError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()?;
        check_status(response)
    }
}

fn check_status(response: Response) -> Result<Response, CapabilityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let kind = match status.as_u16() {
        401 | 403 => ErrorKind::Auth,
        404 => ErrorKind::NotFound,
        _ => ErrorKind::Http,
    };
    let body = response.text().unwrap_or_default();
    Err(CapabilityError::new(
        kind,
        format!("drive api {status}: {}", body.trim()),
    ))
}

fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn children_query(parent_id: &str, name_filter: Option<&str>) -> String {
    let mut q = format!(
        "'{}' in parents and trashed=false",
        escape_query_literal(parent_id)
    );
    if let Some(filter) = name_filter {
        q.push_str(&format!(
            " and (mimeType = '{FOLDER_MIME}' or name contains '{}')",
            escape_query_literal(filter)
        ));
    }
    q
}

impl RemoteStore for DriveStore {
    fn get(&self, id: &str) -> Result<RemoteItem, CapabilityError> {
        let url = format!("{}/{}", self.api_base, id);
        let response = self.get_checked(
            &url,
            &[("fields", ITEM_FIELDS), ("supportsAllDrives", "true")],
        )?;
        let file: DriveFile = response.json()?;
        Ok(file.into())
    }

    fn list_children(
        &self,
        parent_id: &str,
        name_filter: Option<&str>,
    ) -> Result<Vec<RemoteItem>, CapabilityError> {
        let q = children_query(parent_id, name_filter);
        let fields = format!("nextPageToken, files({ITEM_FIELDS})");
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("q", q.as_str()),
                ("fields", fields.as_str()),
                ("pageSize", PAGE_SIZE),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let page: FileListPage = self.get_checked(&self.api_base, &query)?.json()?;
            out.extend(page.files.into_iter().map(RemoteItem::from));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(out)
    }

    fn download(&self, id: &str, dest: &Path) -> Result<(), CapabilityError> {
        let url = format!("{}/{}", self.api_base, id);
        let mut response = self.get_checked(
            &url,
            &[("alt", "media"), ("supportsAllDrives", "true")],
        )?;
        let mut file = fs::File::create(dest)?;
        response.copy_to(&mut file)?;
        Ok(())
    }
}
