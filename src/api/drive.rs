// Drive calls: file listing, folder creation, media upload, metadata.

use super::transport::{ApiRequest, MultipartUpload, Transport};
use super::{opt_str, str_field, FeishuClient};
use crate::error::{FeishuError, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

const FILES: &str = "/open-apis/drive/v1/files";
const ROOT_FOLDER_META: &str = "/open-apis/drive/explorer/v2/root_folder/meta";
const UPLOAD_ALL: &str = "/open-apis/drive/v1/medias/upload_all";
const META_BATCH_QUERY: &str = "/open-apis/drive/v1/metas/batch_query";

/// Single-request uploads are capped at 20 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OrderBy {
    #[value(name = "CreatedTime")]
    CreatedTime,
    #[value(name = "EditedTime")]
    EditedTime,
    #[value(name = "ModifiedTime")]
    ModifiedTime,
    #[value(name = "Size")]
    Size,
}

impl OrderBy {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderBy::CreatedTime => "CreatedTime",
            OrderBy::EditedTime => "EditedTime",
            OrderBy::ModifiedTime => "ModifiedTime",
            OrderBy::Size => "Size",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Direction {
    #[value(name = "ASC")]
    Asc,
    #[value(name = "DESC")]
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Where an uploaded media file gets attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum ParentType {
    DocxImage,
    DocxFile,
    DocImage,
    DocFile,
    SheetImage,
    SheetFile,
    BitableImage,
    BitableFile,
}

impl ParentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParentType::DocxImage => "docx_image",
            ParentType::DocxFile => "docx_file",
            ParentType::DocImage => "doc_image",
            ParentType::DocFile => "doc_file",
            ParentType::SheetImage => "sheet_image",
            ParentType::SheetFile => "sheet_file",
            ParentType::BitableImage => "bitable_image",
            ParentType::BitableFile => "bitable_file",
        }
    }
}

/// Drive object types accepted by the meta and statistics endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "lower")]
pub enum DocType {
    Docx,
    Doc,
    Sheet,
    Bitable,
    Mindnote,
    File,
    Folder,
    Slides,
    Wiki,
}

impl DocType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocType::Docx => "docx",
            DocType::Doc => "doc",
            DocType::Sheet => "sheet",
            DocType::Bitable => "bitable",
            DocType::Mindnote => "mindnote",
            DocType::File => "file",
            DocType::Folder => "folder",
            DocType::Slides => "slides",
            DocType::Wiki => "wiki",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilesQuery {
    pub parent_token: Option<String>,
    pub order_by: OrderBy,
    pub direction: Direction,
    pub page_size: u32,
    pub page_token: Option<String>,
}

impl Default for ListFilesQuery {
    fn default() -> Self {
        ListFilesQuery {
            parent_token: None,
            order_by: OrderBy::EditedTime,
            direction: Direction::Desc,
            page_size: 50,
            page_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DriveFile {
    pub token: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub file_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub parent_token: String,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.file_type == "folder"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePage {
    pub files: Vec<DriveFile>,
    pub next_page_token: Option<String>,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub token: String,
    pub url: String,
}

/// A local file to upload as media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    pub path: PathBuf,
    pub parent_type: ParentType,
    /// Block id for docx uploads, spreadsheet token for sheets, app token
    /// for bitables.
    pub parent_node: String,
    pub file_name: Option<String>,
    /// Adler-32 checksum of the content, if the caller has one.
    pub checksum: Option<String>,
    pub extra: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileMeta {
    pub doc_token: String,
    #[serde(default)]
    pub doc_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub create_time: String,
    #[serde(default)]
    pub latest_modify_time: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FailedMeta {
    pub token: String,
    pub code: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetaReport {
    pub metas: Vec<FileMeta>,
    pub failed: Vec<FailedMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct FileStatistics {
    #[serde(default)]
    pub uv: i64,
    #[serde(default)]
    pub pv: i64,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub uv_today: i64,
    #[serde(default)]
    pub pv_today: i64,
    #[serde(default)]
    pub like_count_today: i64,
}

fn decode<T: for<'de> Deserialize<'de>>(value: &Value, what: &str) -> Result<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| FeishuError::Decode(format!("bad {}: {}", what, e)))
}

impl<T: Transport> FeishuClient<T> {
    pub fn list_files(&self, query: &ListFilesQuery) -> Result<FilePage> {
        let mut request = ApiRequest::get(FILES)
            .query("order_by", query.order_by.as_str())
            .query("direction", query.direction.as_str())
            .query("page_size", query.page_size.clamp(1, 200));
        if let Some(parent) = &query.parent_token {
            request = request.query("folder_token", parent);
        }
        if let Some(token) = &query.page_token {
            request = request.query("page_token", token);
        }
        let data = self.call(request)?;
        let files = match data.get("files") {
            Some(files) => decode(files, "file list")?,
            None => Vec::new(),
        };
        Ok(FilePage {
            files,
            next_page_token: opt_str(&data, "next_page_token").filter(|t| !t.is_empty()),
            has_more: data.get("has_more").and_then(Value::as_bool).unwrap_or(false),
        })
    }

    /// Token of the caller's root folder.
    pub fn root_folder_token(&self) -> Result<String> {
        let data = self.call(ApiRequest::get(ROOT_FOLDER_META))?;
        str_field(&data, "token")
    }

    /// Create a folder under `parent_token`, the configured default folder,
    /// or the root folder, in that order.
    pub fn create_folder(&self, name: &str, parent_token: Option<&str>) -> Result<Folder> {
        let parent = match parent_token.or(self.default_folder_token()) {
            Some(token) => token.to_string(),
            None => self.root_folder_token()?,
        };
        let request = ApiRequest::post(format!("{}/create_folder", FILES))
            .json(json!({ "name": name, "folder_token": parent }));
        let data = self.call(request)?;
        let folder = Folder {
            token: str_field(&data, "token")?,
            url: opt_str(&data, "url").unwrap_or_default(),
        };
        info!("created folder {} under {}", folder.token, parent);
        Ok(folder)
    }

    /// Upload a local file in a single request and return its file token.
    pub fn upload_media(&self, upload: &MediaUpload) -> Result<String> {
        let declared = fs::metadata(&upload.path)?.len();
        if declared > MAX_UPLOAD_BYTES {
            return Err(FeishuError::Invalid(format!(
                "{} is {} bytes, over the {} byte single-upload limit",
                upload.path.display(),
                declared,
                MAX_UPLOAD_BYTES
            )));
        }
        let bytes = fs::read(&upload.path)?;
        if bytes.len() as u64 != declared {
            warn!("file size changed while reading: {} -> {}", declared, bytes.len());
        }
        if bytes.len() as u64 > MAX_UPLOAD_BYTES {
            return Err(FeishuError::Invalid(format!(
                "{} grew past the single-upload limit",
                upload.path.display()
            )));
        }

        let file_name = match &upload.file_name {
            Some(name) => name.clone(),
            None => upload
                .path
                .file_name()
                .and_then(|s| s.to_str())
                .map(str::to_string)
                .ok_or_else(|| FeishuError::Invalid("upload path has no file name".into()))?,
        };

        let mut fields = vec![
            ("file_name".to_string(), file_name.clone()),
            ("parent_type".to_string(), upload.parent_type.as_str().to_string()),
            ("parent_node".to_string(), upload.parent_node.clone()),
            ("size".to_string(), bytes.len().to_string()),
        ];
        if let Some(checksum) = &upload.checksum {
            fields.push(("checksum".to_string(), checksum.clone()));
        }
        if let Some(extra) = &upload.extra {
            fields.push(("extra".to_string(), extra.clone()));
        }

        let request = ApiRequest::post(UPLOAD_ALL).multipart(MultipartUpload {
            fields,
            file_name,
            bytes,
        });
        let data = self.call(request)?;
        let token = str_field(&data, "file_token")?;
        info!("uploaded {} as {}", upload.path.display(), token);
        Ok(token)
    }

    pub fn batch_query_meta(&self, docs: &[(String, DocType)]) -> Result<MetaReport> {
        if docs.is_empty() {
            return Err(FeishuError::Invalid("no documents to query".into()));
        }
        let request_docs: Vec<Value> = docs
            .iter()
            .map(|(token, doc_type)| json!({ "doc_token": token, "doc_type": doc_type.as_str() }))
            .collect();
        let request = ApiRequest::post(META_BATCH_QUERY).json(json!({ "request_docs": request_docs }));
        let data = self.call(request)?;
        Ok(MetaReport {
            metas: match data.get("metas") {
                Some(v) => decode(v, "meta list")?,
                None => Vec::new(),
            },
            failed: match data.get("failed_list") {
                Some(v) => decode(v, "failed list")?,
                None => Vec::new(),
            },
        })
    }

    pub fn file_statistics(&self, token: &str, doc_type: DocType) -> Result<FileStatistics> {
        let request = ApiRequest::get(format!("{}/{}/statistics", FILES, token))
            .query("file_type", doc_type.as_str());
        let data = self.call(request)?;
        match data.get("statistics") {
            Some(stats) => decode(stats, "statistics"),
            None => Ok(FileStatistics::default()),
        }
    }
}
