use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{MediaStream, RemoteError, RemoteFile, RemoteFolder, RemoteStore};

pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

const IMAGE_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/bmp", "image/gif"];
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const PAGE_SIZE: &str = "1000";

/// Drive v3 REST client.
pub struct DriveStore {
    client: Client,
    base: String,
}

#[derive(Deserialize)]
struct FileList<T> {
    #[serde(default = "Vec::new")]
    files: Vec<T>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct NameOnly {
    name: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

fn image_query(folder_id: &str) -> String {
    let mimes = IMAGE_MIME_TYPES
        .iter()
        .map(|m| format!("mimeType='{m}'"))
        .collect::<Vec<_>>()
        .join(" or ");
    format!("'{}' in parents and ({mimes}) and trashed=false", folder_id.replace('\'', "\\'"))
}

fn folder_query() -> String {
    format!("mimeType='{FOLDER_MIME_TYPE}' and trashed=false")
}

/// Turn a non-success response into [`RemoteError::Http`].
fn check(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    Err(RemoteError::Http {
        status: status.as_u16(),
        message,
    })
}

impl DriveStore {
    pub fn new(timeout: Option<Duration>) -> Result<Self, RemoteError> {
        Self::with_base(DRIVE_API_BASE, timeout)
    }

    /// Point the client at another API root, e.g. a local stand-in.
    pub fn with_base(base: impl Into<String>, timeout: Option<Duration>) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, token: &str, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}/{path}", self.base))
            .bearer_auth(token)
    }

    fn send(request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request
            .send()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        check(response)
    }

    fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, RemoteError> {
        Self::send(request)?
            .json()
            .map_err(|e| RemoteError::Parse(e.to_string()))
    }

    /// Follow `nextPageToken` until the listing is exhausted.
    fn list_all<T: DeserializeOwned>(&self, token: &str, query: &str) -> Result<Vec<T>, RemoteError> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = vec![
                ("q", query.to_string()),
                ("fields", "nextPageToken, files(id, name)".to_string()),
                ("pageSize", PAGE_SIZE.to_string()),
                ("orderBy", "name".to_string()),
            ];
            if let Some(t) = page_token.take() {
                params.push(("pageToken", t));
            }
            let page: FileList<T> = Self::fetch_json(self.get(token, "files").query(&params))?;
            out.extend(page.files);
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }
        Ok(out)
    }
}

impl RemoteStore for DriveStore {
    fn folder_name(&self, token: &str, folder_id: &str) -> Result<String, RemoteError> {
        let meta: NameOnly = Self::fetch_json(
            self.get(token, &format!("files/{folder_id}"))
                .query(&[("fields", "name")]),
        )?;
        Ok(meta.name)
    }

    fn list_folders(&self, token: &str) -> Result<Vec<RemoteFolder>, RemoteError> {
        self.list_all(token, &folder_query())
    }

    fn list_images(&self, token: &str, folder_id: &str) -> Result<Vec<RemoteFile>, RemoteError> {
        self.list_all(token, &image_query(folder_id))
    }

    fn open_media(&self, token: &str, file_id: &str) -> Result<MediaStream, RemoteError> {
        let response = Self::send(
            self.get(token, &format!("files/{file_id}"))
                .query(&[("alt", "media")]),
        )?;
        let len = response.content_length();
        Ok(MediaStream {
            reader: Box::new(response),
            len,
        })
    }
}
