// In-memory stand-in for the open platform, for tests.
//
// It keeps real block trees per document, so ordering, pagination, partial
// updates and deletes behave the way the remote service does, and it
// records every request so tests can assert on what went over the wire.

use super::auth::TOKEN_PATH;
use super::transport::{ApiRequest, ApiResponse, Method, RequestBody, Transport};
use super::FeishuClient;
use crate::block::BlockKind;
use crate::config::Credentials;
use crate::error::{FeishuError, Result};
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy)]
enum TokenFailure {
    Code(i64),
    Network,
}

#[derive(Debug, Clone)]
struct FakeBlock {
    parent_id: String,
    children: Vec<String>,
    block_type: i64,
    body_key: String,
    body: Value,
}

#[derive(Debug, Clone)]
struct FakeDoc {
    title: String,
    revision_id: i64,
    folder_token: String,
    blocks: HashMap<String, FakeBlock>,
}

#[derive(Debug, Clone)]
struct FakeFolder {
    token: String,
    name: String,
    parent: String,
}

#[derive(Default)]
struct State {
    docs: BTreeMap<String, FakeDoc>,
    folders: Vec<FakeFolder>,
    wiki: HashMap<String, (String, String)>,
    issued_tokens: Vec<String>,
    next_id: u64,
    token_failure: Option<TokenFailure>,
    requests: Vec<ApiRequest>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{:06}", prefix, self.next_id)
    }
}

type Reply = (u16, Value);

fn ok(data: Value) -> Reply {
    (200, json!({ "code": 0, "msg": "success", "data": data }))
}

fn fail(code: i64, msg: &str) -> Reply {
    (400, json!({ "code": code, "msg": msg }))
}

const INVALID_PARAM: i64 = 1770001;
const NOT_FOUND: i64 = 1770002;

/// In-memory fake of the Feishu endpoints this crate talks to.
#[derive(Default)]
pub struct FakeFeishu {
    state: RefCell<State>,
}

impl FakeFeishu {
    pub const APP_ID: &'static str = "cli_fake_app";
    pub const APP_SECRET: &'static str = "fake_secret";
    pub const ROOT_FOLDER: &'static str = "nodcnFakeRoot";

    pub fn new() -> Self {
        Self::default()
    }

    /// A client wired to a fresh fake with valid credentials.
    pub fn client() -> FeishuClient<FakeFeishu> {
        let creds = Credentials {
            app_id: Self::APP_ID.into(),
            app_secret: Self::APP_SECRET.into(),
        };
        FeishuClient::new(FakeFeishu::new(), creds, false)
    }

    /// Make the token endpoint answer with a nonzero code.
    pub fn fail_token_with_code(&self, code: i64) {
        self.state.borrow_mut().token_failure = Some(TokenFailure::Code(code));
    }

    /// Make the token endpoint fail as if the connection was refused.
    pub fn fail_token_with_network_error(&self) {
        self.state.borrow_mut().token_failure = Some(TokenFailure::Network);
    }

    /// Forget every issued token, as if they all expired server side.
    pub fn revoke_tokens(&self) {
        self.state.borrow_mut().issued_tokens.clear();
    }

    pub fn add_wiki_node(&self, node_token: &str, document_id: &str, title: &str) {
        self.state
            .borrow_mut()
            .wiki
            .insert(node_token.into(), (document_id.into(), title.into()));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.borrow().requests.clone()
    }

    pub fn count_requests(&self, path: &str) -> usize {
        self.state
            .borrow()
            .requests
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    pub fn last_request_to(&self, path: &str) -> Option<ApiRequest> {
        self.state
            .borrow()
            .requests
            .iter()
            .rev()
            .find(|r| r.path == path)
            .cloned()
    }

    fn issue_token(&self, state: &mut State, request: &ApiRequest) -> Result<Reply> {
        match state.token_failure {
            Some(TokenFailure::Network) => {
                return Err(FeishuError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )))
            }
            Some(TokenFailure::Code(code)) => return Ok(fail(code, "token unavailable")),
            None => {}
        }
        let body = request.json_body().cloned().unwrap_or(Value::Null);
        if body["app_id"] != Self::APP_ID || body["app_secret"] != Self::APP_SECRET {
            return Ok(fail(10014, "app secret invalid"));
        }
        let token = state.next_id("t-");
        state.issued_tokens.push(token.clone());
        Ok((
            200,
            json!({ "code": 0, "msg": "ok", "tenant_access_token": token, "expire": 7200 }),
        ))
    }

    fn route(&self, state: &mut State, request: &ApiRequest) -> Reply {
        let authorized = request
            .bearer
            .as_ref()
            .is_some_and(|t| state.issued_tokens.contains(t));
        if !authorized {
            return fail(99991663, "Invalid access token for authorization");
        }

        let path = request.path.trim_start_matches("/open-apis/");
        let segments: Vec<&str> = path.split('/').collect();
        let body = request.json_body().cloned().unwrap_or(Value::Null);

        match (request.method, segments.as_slice()) {
            (Method::Post, ["docx", "v1", "documents"]) => create_document(state, &body),
            (Method::Get, ["docx", "v1", "documents", doc]) => with_doc(state, doc, |d| {
                ok(json!({ "document": document_json(doc, d) }))
            }),
            (Method::Get, ["docx", "v1", "documents", doc, "raw_content"]) => {
                with_doc(state, doc, |d| ok(json!({ "content": raw_content(doc, d) })))
            }
            (Method::Get, ["docx", "v1", "documents", doc, "blocks"]) => with_doc(state, doc, |d| {
                let order = tree_order(doc, d);
                let items: Vec<Value> = order.iter().map(|id| render(id, &d.blocks[id])).collect();
                paginate(items, request)
            }),
            (Method::Post, ["docx", "v1", "documents", doc, "blocks", "batch_delete"]) => {
                with_doc_mut(state, doc, |d| batch_delete(d, &body))
            }
            (Method::Post, ["docx", "v1", "documents", doc, "blocks", "batch_update"]) => {
                with_doc_mut(state, doc, |d| batch_update(d, &body))
            }
            (Method::Get, ["docx", "v1", "documents", doc, "blocks", block]) => {
                with_doc(state, doc, |d| match d.blocks.get(*block) {
                    Some(b) => ok(json!({ "block": render(block, b) })),
                    None => fail(NOT_FOUND, "block not found"),
                })
            }
            (Method::Patch, ["docx", "v1", "documents", doc, "blocks", block]) => {
                with_doc_mut(state, doc, |d| match apply_update(d, block, &body) {
                    Ok(()) => {
                        d.revision_id += 1;
                        ok(json!({ "block": render(block, &d.blocks[*block]), "document_revision_id": d.revision_id }))
                    }
                    Err(reply) => reply,
                })
            }
            (Method::Delete, ["docx", "v1", "documents", doc, "blocks", block]) => {
                with_doc_mut(state, doc, |d| {
                    if *block == *doc || !d.blocks.contains_key(*block) {
                        return fail(NOT_FOUND, "block not found");
                    }
                    remove_subtree(d, block);
                    d.revision_id += 1;
                    (204, Value::Null)
                })
            }
            (Method::Get, ["docx", "v1", "documents", doc, "blocks", block, "children"]) => {
                with_doc(state, doc, |d| match d.blocks.get(*block) {
                    Some(parent) => {
                        let items = parent.children.iter().map(|id| render(id, &d.blocks[id])).collect();
                        paginate(items, request)
                    }
                    None => fail(NOT_FOUND, "block not found"),
                })
            }
            (Method::Post, ["docx", "v1", "documents", doc, "blocks", block, "children"]) => {
                let doc = doc.to_string();
                let block = block.to_string();
                create_children(state, &doc, &block, &body)
            }
            (Method::Get, ["drive", "v1", "files"]) => list_files(state, request),
            (Method::Get, ["drive", "explorer", "v2", "root_folder", "meta"]) => {
                ok(json!({ "token": Self::ROOT_FOLDER, "id": "7000", "user_id": "7001" }))
            }
            (Method::Post, ["drive", "v1", "files", "create_folder"]) => create_folder(state, &body),
            (Method::Post, ["drive", "v1", "medias", "upload_all"]) => upload(state, &request.body),
            (Method::Post, ["drive", "v1", "metas", "batch_query"]) => batch_query_meta(state, &body),
            (Method::Get, ["drive", "v1", "files", token, "statistics"]) => {
                if state.docs.contains_key(*token) {
                    ok(json!({
                        "file_token": token,
                        "file_type": request.query_value("file_type").unwrap_or_default(),
                        "statistics": { "uv": 0, "pv": 0, "like_count": 0 }
                    }))
                } else {
                    fail(1069302, "file not found")
                }
            }
            (Method::Get, ["wiki", "v2", "spaces", "get_node"]) => {
                let token = request.query_value("token").unwrap_or_default();
                match state.wiki.get(token) {
                    Some((doc, title)) => ok(json!({ "node": {
                        "node_token": token,
                        "obj_token": doc,
                        "obj_type": "docx",
                        "title": title,
                        "space_id": "7100"
                    }})),
                    None => fail(131005, "not found"),
                }
            }
            _ => (404, Value::String("404 page not found".into())),
        }
    }
}

impl Transport for FakeFeishu {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut state = self.state.borrow_mut();
        state.requests.push(request.clone());

        let (status, body) = if request.path == TOKEN_PATH {
            self.issue_token(&mut state, request)?
        } else {
            self.route(&mut state, request)
        };
        let body = match body {
            Value::Null => String::new(),
            Value::String(text) => text,
            other => other.to_string(),
        };
        Ok(ApiResponse { status, body })
    }
}

fn with_doc(state: &State, doc: &str, f: impl FnOnce(&FakeDoc) -> Reply) -> Reply {
    match state.docs.get(doc) {
        Some(d) => f(d),
        None => fail(NOT_FOUND, "document not found"),
    }
}

fn with_doc_mut(state: &mut State, doc: &str, f: impl FnOnce(&mut FakeDoc) -> Reply) -> Reply {
    match state.docs.get_mut(doc) {
        Some(d) => f(d),
        None => fail(NOT_FOUND, "document not found"),
    }
}

fn document_json(id: &str, doc: &FakeDoc) -> Value {
    json!({ "document_id": id, "revision_id": doc.revision_id, "title": doc.title })
}

fn render(id: &str, block: &FakeBlock) -> Value {
    let mut obj = Map::new();
    obj.insert("block_id".into(), Value::from(id));
    obj.insert("block_type".into(), Value::from(block.block_type));
    obj.insert("parent_id".into(), Value::from(block.parent_id.clone()));
    if !block.children.is_empty() {
        obj.insert("children".into(), json!(block.children));
    }
    obj.insert(block.body_key.clone(), block.body.clone());
    Value::Object(obj)
}

fn tree_order(root: &str, doc: &FakeDoc) -> Vec<String> {
    let mut order = Vec::new();
    let mut stack = vec![root.to_string()];
    while let Some(id) = stack.pop() {
        if let Some(block) = doc.blocks.get(&id) {
            stack.extend(block.children.iter().rev().cloned());
            order.push(id);
        }
    }
    order
}

fn raw_content(root: &str, doc: &FakeDoc) -> String {
    tree_order(root, doc)
        .iter()
        .skip(1)
        .map(|id| {
            let text: String = doc.blocks[id].body["elements"]
                .as_array()
                .map(|els| {
                    els.iter()
                        .filter_map(|e| e["text_run"]["content"].as_str())
                        .collect()
                })
                .unwrap_or_default();
            format!("{}\n", text)
        })
        .collect()
}

// page_token is the offset into the listing.
fn paginate(items: Vec<Value>, request: &ApiRequest) -> Reply {
    let size: usize = request
        .query_value("page_size")
        .and_then(|s| s.parse().ok())
        .unwrap_or(500);
    let start: usize = request
        .query_value("page_token")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let end = (start + size).min(items.len());
    let page: Vec<Value> = items.get(start..end).map(<[Value]>::to_vec).unwrap_or_default();
    let has_more = end < items.len();
    let mut data = json!({ "items": page, "has_more": has_more });
    if has_more {
        data["page_token"] = Value::String(end.to_string());
    }
    ok(data)
}

fn create_document(state: &mut State, body: &Value) -> Reply {
    let title = body["title"].as_str().unwrap_or_default().to_string();
    let id = state.next_id("doxcnFake");
    let root = FakeBlock {
        parent_id: String::new(),
        children: Vec::new(),
        block_type: 1,
        body_key: "page".into(),
        body: json!({ "elements": [{ "text_run": { "content": title } }] }),
    };
    let doc = FakeDoc {
        title,
        revision_id: 1,
        folder_token: body["folder_token"]
            .as_str()
            .unwrap_or(FakeFeishu::ROOT_FOLDER)
            .to_string(),
        blocks: HashMap::from([(id.clone(), root)]),
    };
    let reply = ok(json!({ "document": document_json(&id, &doc) }));
    state.docs.insert(id, doc);
    reply
}

/// Validates a create-shape block object and returns (block_type, key, body).
fn parse_new_block(child: &Value) -> std::result::Result<(i64, String, Value), Reply> {
    let block_type = child["block_type"]
        .as_i64()
        .ok_or_else(|| fail(INVALID_PARAM, "block_type is required"))?;
    let kind = BlockKind::from_block_type(block_type)
        .ok_or_else(|| fail(INVALID_PARAM, "unsupported block_type"))?;
    let body = child
        .get(kind.body_key())
        .cloned()
        .ok_or_else(|| fail(INVALID_PARAM, "block body does not match block_type"))?;
    Ok((block_type, kind.body_key().to_string(), body))
}

fn create_children(state: &mut State, doc_id: &str, parent: &str, body: &Value) -> Reply {
    let children = match body["children"].as_array() {
        Some(children) if !children.is_empty() => children.clone(),
        _ => return fail(INVALID_PARAM, "children is required"),
    };
    let mut parsed = Vec::new();
    for child in &children {
        match parse_new_block(child) {
            Ok(p) => parsed.push(p),
            Err(reply) => return reply,
        }
    }
    let ids: Vec<String> = parsed.iter().map(|_| state.next_id("doxcnBlk")).collect();

    let Some(doc) = state.docs.get_mut(doc_id) else {
        return fail(NOT_FOUND, "document not found");
    };
    let Some(siblings) = doc.blocks.get(parent).map(|p| p.children.len()) else {
        return fail(NOT_FOUND, "parent block not found");
    };
    let index = body["index"].as_i64().unwrap_or(-1);
    let at = if index < 0 {
        siblings
    } else if index as usize <= siblings {
        index as usize
    } else {
        return fail(INVALID_PARAM, "index out of range");
    };

    for (id, (block_type, body_key, block_body)) in ids.iter().zip(parsed) {
        doc.blocks.insert(
            id.clone(),
            FakeBlock {
                parent_id: parent.to_string(),
                children: Vec::new(),
                block_type,
                body_key,
                body: block_body,
            },
        );
    }
    if let Some(p) = doc.blocks.get_mut(parent) {
        for (offset, id) in ids.iter().enumerate() {
            p.children.insert(at + offset, id.clone());
        }
    }
    doc.revision_id += 1;

    let created: Vec<Value> = ids.iter().map(|id| render(id, &doc.blocks[id])).collect();
    ok(json!({ "children": created, "document_revision_id": doc.revision_id }))
}

fn apply_update(doc: &mut FakeDoc, block_id: &str, body: &Value) -> std::result::Result<(), Reply> {
    let obj = body
        .as_object()
        .ok_or_else(|| fail(INVALID_PARAM, "body must be an object"))?;
    if obj.contains_key("block_type") {
        return Err(fail(INVALID_PARAM, "block_type can not be updated"));
    }
    let block = doc
        .blocks
        .get_mut(block_id)
        .ok_or_else(|| fail(NOT_FOUND, "block not found"))?;
    let new_body = obj
        .get(&block.body_key)
        .ok_or_else(|| fail(INVALID_PARAM, "update does not match block type"))?;
    block.body = new_body.clone();
    Ok(())
}

fn batch_update(doc: &mut FakeDoc, body: &Value) -> Reply {
    let Some(requests) = body["requests"].as_array() else {
        return fail(INVALID_PARAM, "requests is required");
    };
    let mut updated = Vec::new();
    for req in requests {
        let Some(block_id) = req["block_id"].as_str() else {
            return fail(INVALID_PARAM, "block_id is required");
        };
        let mut content = req.clone();
        if let Some(obj) = content.as_object_mut() {
            obj.remove("block_id");
        }
        if let Err(reply) = apply_update(doc, block_id, &content) {
            return reply;
        }
        updated.push(block_id.to_string());
    }
    doc.revision_id += 1;
    let blocks: Vec<Value> = updated.iter().map(|id| render(id, &doc.blocks[id])).collect();
    ok(json!({ "blocks": blocks, "document_revision_id": doc.revision_id }))
}

fn remove_subtree(doc: &mut FakeDoc, block_id: &str) {
    let Some(block) = doc.blocks.remove(block_id) else {
        return;
    };
    if let Some(parent) = doc.blocks.get_mut(&block.parent_id) {
        parent.children.retain(|c| c != block_id);
    }
    for child in block.children {
        remove_subtree(doc, &child);
    }
}

// All or nothing: one unknown id fails the whole batch.
fn batch_delete(doc: &mut FakeDoc, body: &Value) -> Reply {
    let Some(ids) = body["block_ids"].as_array() else {
        return fail(INVALID_PARAM, "block_ids is required");
    };
    let ids: Vec<String> = ids.iter().filter_map(Value::as_str).map(str::to_string).collect();
    let missing = ids.iter().any(|id| {
        doc.blocks
            .get(id)
            .map_or(true, |b| b.parent_id.is_empty())
    });
    if ids.is_empty() || missing {
        return fail(NOT_FOUND, "block not found");
    }
    for id in &ids {
        remove_subtree(doc, id);
    }
    doc.revision_id += 1;
    ok(json!({ "document_revision_id": doc.revision_id }))
}

fn list_files(state: &State, request: &ApiRequest) -> Reply {
    let folder = request
        .query_value("folder_token")
        .unwrap_or(FakeFeishu::ROOT_FOLDER);
    let mut files: Vec<Value> = state
        .folders
        .iter()
        .filter(|f| f.parent == folder)
        .map(|f| {
            json!({
                "token": f.token,
                "name": f.name,
                "type": "folder",
                "parent_token": f.parent,
                "url": format!("https://my.feishu.cn/drive/folder/{}", f.token)
            })
        })
        .collect();
    files.extend(state.docs.iter().filter(|(_, d)| d.folder_token == folder).map(|(id, d)| {
        json!({
            "token": id,
            "name": d.title,
            "type": "docx",
            "parent_token": d.folder_token,
            "url": format!("https://my.feishu.cn/docx/{}", id)
        })
    }));
    ok(json!({ "files": files, "has_more": false }))
}

fn create_folder(state: &mut State, body: &Value) -> Reply {
    let (Some(name), Some(parent)) = (body["name"].as_str(), body["folder_token"].as_str()) else {
        return fail(1061002, "params error");
    };
    let token = state.next_id("fldcnFake");
    state.folders.push(FakeFolder {
        token: token.clone(),
        name: name.to_string(),
        parent: parent.to_string(),
    });
    ok(json!({ "token": token, "url": format!("https://my.feishu.cn/drive/folder/{}", token) }))
}

fn upload(state: &mut State, body: &RequestBody) -> Reply {
    let RequestBody::Multipart(upload) = body else {
        return fail(1061002, "multipart body required");
    };
    let field = |k: &str| upload.fields.iter().find(|(n, _)| n == k).map(|(_, v)| v.as_str());
    let size_matches = field("size")
        .and_then(|s| s.parse::<usize>().ok())
        .is_some_and(|s| s == upload.bytes.len());
    if field("parent_type").is_none() || field("parent_node").is_none() || !size_matches {
        return fail(1061002, "params error");
    }
    let token = state.next_id("boxcnFake");
    ok(json!({ "file_token": token }))
}

fn batch_query_meta(state: &State, body: &Value) -> Reply {
    let docs = body["request_docs"].as_array().cloned().unwrap_or_default();
    let mut metas = Vec::new();
    let mut failed = Vec::new();
    for doc in docs {
        let token = doc["doc_token"].as_str().unwrap_or_default();
        match state.docs.get(token) {
            Some(d) => metas.push(json!({
                "doc_token": token,
                "doc_type": doc["doc_type"],
                "title": d.title,
                "owner_id": "ou_fake",
                "create_time": "1700000000",
                "latest_modify_time": "1700000000",
                "url": format!("https://my.feishu.cn/docx/{}", token)
            })),
            None => failed.push(json!({ "token": token, "code": 970005 })),
        }
    }
    ok(json!({ "metas": metas, "failed_list": failed }))
}
