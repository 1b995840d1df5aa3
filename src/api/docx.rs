// Document and block-tree calls (`/open-apis/docx/v1`).

use super::transport::{ApiRequest, Transport};
use super::{opt_str, str_field, FeishuClient};
use crate::block::{blocks_from_wire, Block, BlockContent, InsertIndex};
use crate::error::{FeishuError, Result};
use serde_json::{json, Value};
use tracing::{debug, info};

const DOCX: &str = "/open-apis/docx/v1/documents";

/// Page size used for child listings when none is given.
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Largest page the block list endpoints accept.
pub const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub document_id: String,
    pub revision_id: i64,
    pub title: String,
}

impl Document {
    fn from_wire(value: &Value) -> Result<Document> {
        Ok(Document {
            document_id: str_field(value, "document_id")?,
            revision_id: value.get("revision_id").and_then(Value::as_i64).unwrap_or(0),
            title: opt_str(value, "title").unwrap_or_default(),
        })
    }

    pub fn url(&self) -> String {
        format!("https://my.feishu.cn/docx/{}", self.document_id)
    }
}

/// One page of a block listing.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockPage {
    pub items: Vec<Block>,
    pub page_token: Option<String>,
    pub has_more: bool,
}

impl BlockPage {
    fn from_wire(data: &Value) -> Result<BlockPage> {
        Ok(BlockPage {
            items: blocks_from_wire(data.get("items"))?,
            page_token: opt_str(data, "page_token").filter(|t| !t.is_empty()),
            has_more: data.get("has_more").and_then(Value::as_bool).unwrap_or(false),
        })
    }

    fn next_token(&self) -> Option<&str> {
        if self.has_more {
            self.page_token.as_deref()
        } else {
            None
        }
    }
}

/// Result of deleting one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub block_id: String,
    pub deleted: bool,
    pub error: Option<String>,
}

/// The document's root block shares the document's id; appending under it
/// adds top-level content.
pub fn root_block_id(document_id: &str) -> &str {
    document_id
}

fn blocks_path(document_id: &str) -> String {
    format!("{}/{}/blocks", DOCX, document_id)
}

fn block_path(document_id: &str, block_id: &str) -> String {
    format!("{}/{}/blocks/{}", DOCX, document_id, block_id)
}

fn children_path(document_id: &str, block_id: &str) -> String {
    format!("{}/children", block_path(document_id, block_id))
}

impl<T: Transport> FeishuClient<T> {
    pub fn create_document(&self, title: &str, folder_token: Option<&str>) -> Result<Document> {
        let mut body = json!({ "title": title });
        if let Some(folder) = folder_token {
            body["folder_token"] = Value::String(folder.to_string());
        }
        let data = self.call(ApiRequest::post(DOCX).json(body))?;
        let document = Document::from_wire(&data["document"])?;
        info!("created document {}", document.document_id);
        Ok(document)
    }

    pub fn get_document(&self, document_id: &str) -> Result<Document> {
        let data = self.call(ApiRequest::get(format!("{}/{}", DOCX, document_id)))?;
        Document::from_wire(&data["document"])
    }

    /// Plain-text content of the whole document. `lang` picks how @mentions
    /// are rendered (0 default name, 1 English name).
    pub fn raw_content(&self, document_id: &str, lang: u8) -> Result<String> {
        let request =
            ApiRequest::get(format!("{}/{}/raw_content", DOCX, document_id)).query("lang", lang);
        let data = self.call(request)?;
        str_field(&data, "content")
    }

    /// First page of `block_id`'s children.
    pub fn list_children(&self, document_id: &str, block_id: &str, page_size: u32) -> Result<BlockPage> {
        self.children_page(document_id, block_id, page_size, None)
    }

    /// Every child of `block_id`, following page cursors to the end.
    pub fn list_all_children(&self, document_id: &str, block_id: &str, page_size: u32) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.children_page(document_id, block_id, page_size, cursor.as_deref())?;
            let more = advance_cursor(&mut cursor, &page)?;
            blocks.extend(page.items);
            if !more {
                return Ok(blocks);
            }
            debug!("following children cursor of {}", block_id);
        }
    }

    fn children_page(
        &self,
        document_id: &str,
        block_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<BlockPage> {
        let mut request = ApiRequest::get(children_path(document_id, block_id))
            .query("page_size", page_size.clamp(1, MAX_PAGE_SIZE));
        if let Some(token) = page_token {
            request = request.query("page_token", token);
        }
        BlockPage::from_wire(&self.call(request)?)
    }

    /// Every block of the document in tree order, root first.
    pub fn list_blocks(&self, document_id: &str, page_size: u32) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut request = ApiRequest::get(blocks_path(document_id))
                .query("page_size", page_size.clamp(1, MAX_PAGE_SIZE))
                .query("document_revision_id", -1);
            if let Some(token) = cursor.as_deref() {
                request = request.query("page_token", token);
            }
            let page = BlockPage::from_wire(&self.call(request)?)?;
            let more = advance_cursor(&mut cursor, &page)?;
            blocks.extend(page.items);
            if !more {
                return Ok(blocks);
            }
        }
    }

    pub fn get_block(&self, document_id: &str, block_id: &str) -> Result<Block> {
        let data = self.call(ApiRequest::get(block_path(document_id, block_id)))?;
        Block::from_wire(&data["block"])
    }

    /// Insert `children` under `parent_block_id` at `index`, keeping their
    /// order. Returns the created blocks with their server-assigned ids.
    pub fn create_children(
        &self,
        document_id: &str,
        parent_block_id: &str,
        index: InsertIndex,
        children: &[BlockContent],
    ) -> Result<Vec<Block>> {
        if children.is_empty() {
            return Err(FeishuError::Invalid("no blocks to create".into()));
        }
        let body = json!({
            "index": index.to_wire(),
            "children": children.iter().map(BlockContent::to_wire).collect::<Vec<_>>(),
        });
        let request = ApiRequest::post(children_path(document_id, parent_block_id)).json(body);
        let data = self.call(request)?;
        let created = blocks_from_wire(data.get("children"))?;
        info!("created {} block(s) under {}", created.len(), parent_block_id);
        Ok(created)
    }

    /// Replace a block's content. The block keeps its kind.
    pub fn update_block(&self, document_id: &str, block_id: &str, content: &BlockContent) -> Result<Block> {
        let request = ApiRequest::patch(block_path(document_id, block_id)).json(content.to_update_body());
        let data = self.call(request)?;
        Block::from_wire(&data["block"])
    }

    pub fn batch_update(&self, document_id: &str, updates: &[(String, BlockContent)]) -> Result<Vec<Block>> {
        if updates.is_empty() {
            return Err(FeishuError::Invalid("no block updates given".into()));
        }
        let requests: Vec<Value> = updates
            .iter()
            .map(|(block_id, content)| {
                let mut req = content.to_update_body();
                req["block_id"] = Value::String(block_id.clone());
                req
            })
            .collect();
        let request = ApiRequest::post(format!("{}/batch_update", blocks_path(document_id)))
            .json(json!({ "requests": requests }));
        let data = self.call(request)?;
        blocks_from_wire(data.get("blocks"))
    }

    /// Delete one block. An application error code is reported in the
    /// outcome; transport and token failures are returned as errors.
    pub fn delete_block(&self, document_id: &str, block_id: &str) -> Result<DeleteOutcome> {
        let result = self.call(ApiRequest::delete(block_path(document_id, block_id)));
        outcomes(&[block_id.to_string()], result).map(|mut v| v.remove(0))
    }

    /// Delete several blocks in one request. The server answers for the
    /// batch as a whole, so every id shares the envelope's outcome.
    pub fn batch_delete(&self, document_id: &str, block_ids: &[String]) -> Result<Vec<DeleteOutcome>> {
        if block_ids.is_empty() {
            return Err(FeishuError::Invalid("no block ids to delete".into()));
        }
        let request = ApiRequest::post(format!("{}/batch_delete", blocks_path(document_id)))
            .json(json!({ "block_ids": block_ids }));
        outcomes(block_ids, self.call(request))
    }
}

// Moves `cursor` to the page's next token; false once the listing is done.
// A server that hands back the cursor it was just given would loop forever.
fn advance_cursor(cursor: &mut Option<String>, page: &BlockPage) -> Result<bool> {
    match page.next_token() {
        None => Ok(false),
        Some(next) if cursor.as_deref() == Some(next) => {
            Err(FeishuError::Decode("page cursor did not advance".into()))
        }
        Some(next) => {
            *cursor = Some(next.to_string());
            Ok(true)
        }
    }
}

fn outcomes(block_ids: &[String], result: Result<Value>) -> Result<Vec<DeleteOutcome>> {
    let error = match result {
        Ok(_) => None,
        Err(FeishuError::Api { code, msg }) => Some(format!("{} - {}", code, msg)),
        Err(other) => return Err(other),
    };
    Ok(block_ids
        .iter()
        .map(|id| DeleteOutcome {
            block_id: id.clone(),
            deleted: error.is_none(),
            error: error.clone(),
        })
        .collect())
}
