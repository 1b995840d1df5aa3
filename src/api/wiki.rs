// Wiki node lookup: maps the token in a wiki link to the real document
// behind it.

use super::transport::{ApiRequest, Transport};
use super::{opt_str, str_field, FeishuClient};
use crate::error::Result;
use serde_json::Value;

const GET_NODE: &str = "/open-apis/wiki/v2/spaces/get_node";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiNode {
    pub node_token: String,
    /// Id of the underlying object; for docx nodes this is the document id.
    pub obj_token: String,
    pub obj_type: String,
    pub title: String,
    pub space_id: String,
}

impl WikiNode {
    fn from_wire(node: &Value) -> Result<WikiNode> {
        Ok(WikiNode {
            node_token: str_field(node, "node_token")?,
            obj_token: str_field(node, "obj_token")?,
            obj_type: opt_str(node, "obj_type").unwrap_or_default(),
            title: opt_str(node, "title").unwrap_or_default(),
            space_id: opt_str(node, "space_id").unwrap_or_default(),
        })
    }
}

/// Accepts either a bare node token or a full `.../wiki/<token>` link.
pub fn node_token_from_link(input: &str) -> &str {
    let input = input.trim();
    let tail = match input.rfind("/wiki/") {
        Some(pos) => &input[pos + "/wiki/".len()..],
        None => input,
    };
    let end = tail.find(['?', '#', '/']).unwrap_or(tail.len());
    &tail[..end]
}

impl<T: Transport> FeishuClient<T> {
    pub fn get_wiki_node(&self, token_or_link: &str) -> Result<WikiNode> {
        let token = node_token_from_link(token_or_link);
        let data = self.call(ApiRequest::get(GET_NODE).query("token", token))?;
        WikiNode::from_wire(&data["node"])
    }
}
