// Block codec: translates between the typed block model used by this crate
// and the open platform's block JSON, where every block kind carries its
// body under a different optional key (`text`, `heading2`, `orderedList`...)
// next to a numeric `block_type`.

use crate::error::{FeishuError, Result};
use serde_json::{json, Map, Value};

/// The block kinds this crate can create, update and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Text,
    Heading1,
    Heading2,
    Heading3,
    Bullet,
    Ordered,
    Code,
    Quote,
    Todo,
}

impl BlockKind {
    pub const ALL: [BlockKind; 9] = [
        BlockKind::Text,
        BlockKind::Heading1,
        BlockKind::Heading2,
        BlockKind::Heading3,
        BlockKind::Bullet,
        BlockKind::Ordered,
        BlockKind::Code,
        BlockKind::Quote,
        BlockKind::Todo,
    ];

    /// Numeric `block_type` tag on the wire.
    pub fn block_type(self) -> i64 {
        match self {
            BlockKind::Text => 2,
            BlockKind::Heading1 => 3,
            BlockKind::Heading2 => 4,
            BlockKind::Heading3 => 5,
            BlockKind::Ordered => 7,
            BlockKind::Bullet => 8,
            BlockKind::Code => 10,
            BlockKind::Quote => 12,
            BlockKind::Todo => 13,
        }
    }

    /// Key under which the block body is stored.
    pub fn body_key(self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Heading1 => "heading1",
            BlockKind::Heading2 => "heading2",
            BlockKind::Heading3 => "heading3",
            BlockKind::Bullet => "bullet",
            BlockKind::Ordered => "orderedList",
            BlockKind::Code => "code",
            BlockKind::Quote => "quote",
            BlockKind::Todo => "todo",
        }
    }

    pub fn from_block_type(block_type: i64) -> Option<BlockKind> {
        BlockKind::ALL
            .into_iter()
            .find(|kind| kind.block_type() == block_type)
    }

    /// Heading kind for a level between 1 and 3.
    pub fn heading(level: u8) -> Result<BlockKind> {
        match level {
            1 => Ok(BlockKind::Heading1),
            2 => Ok(BlockKind::Heading2),
            3 => Ok(BlockKind::Heading3),
            other => Err(FeishuError::Invalid(format!(
                "heading level must be 1, 2 or 3 (got {})",
                other
            ))),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Heading1 => "heading1",
            BlockKind::Heading2 => "heading2",
            BlockKind::Heading3 => "heading3",
            BlockKind::Bullet => "bullet",
            BlockKind::Ordered => "ordered",
            BlockKind::Code => "code",
            BlockKind::Quote => "quote",
            BlockKind::Todo => "todo",
        }
    }
}

/// Human name for any `block_type`, including the ones we do not decode.
pub fn block_type_name(block_type: i64) -> String {
    match block_type {
        1 => "page".into(),
        6 => "image".into(),
        other => match BlockKind::from_block_type(other) {
            Some(kind) => kind.label().into(),
            None => format!("type{}", other),
        },
    }
}

/// A leaf run of plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub content: String,
}

impl TextRun {
    pub fn new(content: impl Into<String>) -> Self {
        TextRun {
            content: content.into(),
        }
    }
}

/// Content of a block, one variant per supported kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockContent {
    Text(Vec<TextRun>),
    Heading1(Vec<TextRun>),
    Heading2(Vec<TextRun>),
    Heading3(Vec<TextRun>),
    Bullet(Vec<TextRun>),
    Ordered(Vec<TextRun>),
    Code { runs: Vec<TextRun>, language: String },
    Quote(Vec<TextRun>),
    Todo { runs: Vec<TextRun>, checked: bool },
}

impl BlockContent {
    /// Builds single-run content of the given kind. `language` is only used
    /// by code blocks and `checked` only by todos.
    pub fn single(kind: BlockKind, content: &str, language: &str, checked: bool) -> Self {
        let runs = vec![TextRun::new(content)];
        match kind {
            BlockKind::Text => BlockContent::Text(runs),
            BlockKind::Heading1 => BlockContent::Heading1(runs),
            BlockKind::Heading2 => BlockContent::Heading2(runs),
            BlockKind::Heading3 => BlockContent::Heading3(runs),
            BlockKind::Bullet => BlockContent::Bullet(runs),
            BlockKind::Ordered => BlockContent::Ordered(runs),
            BlockKind::Code => BlockContent::Code {
                runs,
                language: language.to_string(),
            },
            BlockKind::Quote => BlockContent::Quote(runs),
            BlockKind::Todo => BlockContent::Todo { runs, checked },
        }
    }

    pub fn text(content: &str) -> Self {
        BlockContent::Text(vec![TextRun::new(content)])
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            BlockContent::Text(_) => BlockKind::Text,
            BlockContent::Heading1(_) => BlockKind::Heading1,
            BlockContent::Heading2(_) => BlockKind::Heading2,
            BlockContent::Heading3(_) => BlockKind::Heading3,
            BlockContent::Bullet(_) => BlockKind::Bullet,
            BlockContent::Ordered(_) => BlockKind::Ordered,
            BlockContent::Code { .. } => BlockKind::Code,
            BlockContent::Quote(_) => BlockKind::Quote,
            BlockContent::Todo { .. } => BlockKind::Todo,
        }
    }

    pub fn runs(&self) -> &[TextRun] {
        match self {
            BlockContent::Text(runs)
            | BlockContent::Heading1(runs)
            | BlockContent::Heading2(runs)
            | BlockContent::Heading3(runs)
            | BlockContent::Bullet(runs)
            | BlockContent::Ordered(runs)
            | BlockContent::Quote(runs) => runs,
            BlockContent::Code { runs, .. } | BlockContent::Todo { runs, .. } => runs,
        }
    }

    /// Concatenated plain text of all runs.
    pub fn plain_text(&self) -> String {
        self.runs().iter().map(|r| r.content.as_str()).collect()
    }

    fn body(&self) -> Value {
        let elements: Vec<Value> = self
            .runs()
            .iter()
            .map(|run| json!({ "text_run": { "content": run.content } }))
            .collect();
        let mut body = Map::new();
        body.insert("elements".into(), Value::Array(elements));
        match self {
            BlockContent::Code { language, .. } => {
                body.insert("language".into(), Value::String(language.clone()));
            }
            BlockContent::Todo { checked, .. } => {
                body.insert("checked".into(), Value::Bool(*checked));
            }
            _ => {}
        }
        Value::Object(body)
    }

    /// Wire object used when creating a block.
    pub fn to_wire(&self) -> Value {
        let kind = self.kind();
        let mut obj = Map::new();
        obj.insert("block_type".into(), Value::from(kind.block_type()));
        obj.insert(kind.body_key().into(), self.body());
        Value::Object(obj)
    }

    /// Partial-update body. The block type can't change after creation, so
    /// `block_type` is never part of it.
    pub fn to_update_body(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(self.kind().body_key().into(), self.body());
        Value::Object(obj)
    }

    /// Decodes content by looking for the first known body key.
    pub fn from_wire(value: &Value) -> Option<BlockContent> {
        let obj = value.as_object()?;
        let (kind, body) = BlockKind::ALL
            .into_iter()
            .find_map(|kind| obj.get(kind.body_key()).map(|body| (kind, body)))?;

        let runs = decode_runs(body);
        let content = match kind {
            BlockKind::Text => BlockContent::Text(runs),
            BlockKind::Heading1 => BlockContent::Heading1(runs),
            BlockKind::Heading2 => BlockContent::Heading2(runs),
            BlockKind::Heading3 => BlockContent::Heading3(runs),
            BlockKind::Bullet => BlockContent::Bullet(runs),
            BlockKind::Ordered => BlockContent::Ordered(runs),
            BlockKind::Code => BlockContent::Code {
                runs,
                language: body
                    .get("language")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            BlockKind::Quote => BlockContent::Quote(runs),
            BlockKind::Todo => BlockContent::Todo {
                runs,
                checked: body
                    .get("checked")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            },
        };
        Some(content)
    }
}

// Only `text_run` elements carry content we model; mentions and the like
// are dropped.
fn decode_runs(body: &Value) -> Vec<TextRun> {
    body.get("elements")
        .and_then(Value::as_array)
        .map(|elements| {
            elements
                .iter()
                .filter_map(|el| el.get("text_run")?.get("content")?.as_str())
                .map(TextRun::new)
                .collect()
        })
        .unwrap_or_default()
}

/// A block as returned by the remote tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub block_id: String,
    pub parent_id: Option<String>,
    pub children: Vec<String>,
    pub block_type: i64,
    /// `None` for kinds outside the supported table (page, image, table...).
    pub content: Option<BlockContent>,
}

impl Block {
    pub fn from_wire(value: &Value) -> Result<Block> {
        let block_id = value
            .get("block_id")
            .and_then(Value::as_str)
            .ok_or_else(|| FeishuError::Decode("block without block_id".into()))?
            .to_string();
        let parent_id = value
            .get("parent_id")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        let children = value
            .get("children")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let content = BlockContent::from_wire(value);
        let block_type = value
            .get("block_type")
            .and_then(Value::as_i64)
            .or_else(|| content.as_ref().map(|c| c.kind().block_type()))
            .unwrap_or(0);

        Ok(Block {
            block_id,
            parent_id,
            children,
            block_type,
            content,
        })
    }

    pub fn kind(&self) -> Option<BlockKind> {
        self.content.as_ref().map(BlockContent::kind)
    }

    pub fn type_name(&self) -> String {
        block_type_name(self.block_type)
    }
}

/// Decodes a JSON array of blocks, e.g. `data.items` or `data.children`.
pub fn blocks_from_wire(items: Option<&Value>) -> Result<Vec<Block>> {
    match items.and_then(Value::as_array) {
        Some(items) => items.iter().map(Block::from_wire).collect(),
        None => Ok(Vec::new()),
    }
}

/// Where new children go under their parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertIndex {
    Append,
    At(usize),
}

impl InsertIndex {
    pub fn to_wire(self) -> i64 {
        match self {
            InsertIndex::Append => -1,
            InsertIndex::At(n) => n as i64,
        }
    }

    /// `-1` appends. Any other negative index is rejected.
    pub fn from_wire(index: i64) -> Result<InsertIndex> {
        match index {
            -1 => Ok(InsertIndex::Append),
            n if n >= 0 => Ok(InsertIndex::At(n as usize)),
            other => Err(FeishuError::Invalid(format!(
                "index must be -1 (append) or a position from 0 (got {})",
                other
            ))),
        }
    }
}
