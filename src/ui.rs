// UI layer: one handler per subcommand. Handlers talk to `FeishuClient`
// and print either a short human summary or, with `--json`, the result as
// JSON on stdout. Prompts and spinners draw on the terminal, not stdout.

use crate::api::docx::{root_block_id, DeleteOutcome, Document, MAX_PAGE_SIZE};
use crate::api::drive::{DriveFile, ListFilesQuery, MediaUpload};
use crate::api::transport::Transport;
use crate::api::FeishuClient;
use crate::block::{Block, BlockContent, InsertIndex};
use crate::cli::{BlockCommand, Commands, ConfigCommand, ContentArgs, DocCommand, DriveCommand, WikiCommand};
use crate::config::Config;
use crate::error::{FeishuError, Result};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

/// How results get printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn emit(&self, value: &Value, human: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human();
        }
        Ok(())
    }
}

/// Short name of the operation, used in the failure message.
pub fn operation(command: &Commands) -> &'static str {
    match command {
        Commands::Config(ConfigCommand::Set { .. }) => "Set config",
        Commands::Config(ConfigCommand::Get { .. }) => "Read config",
        Commands::Config(ConfigCommand::List) => "List config",
        Commands::Doc(DocCommand::Create { .. }) => "Create document",
        Commands::Doc(DocCommand::Get { .. }) => "Get document",
        Commands::Doc(DocCommand::Raw { .. }) => "Get raw content",
        Commands::Block(BlockCommand::List { .. }) => "List blocks",
        Commands::Block(BlockCommand::Get { .. }) => "Get block",
        Commands::Block(BlockCommand::Create { .. }) => "Create block",
        Commands::Block(BlockCommand::Update { .. }) => "Update block",
        Commands::Block(BlockCommand::Delete { .. }) => "Delete block",
        Commands::Drive(DriveCommand::List { .. }) => "List files",
        Commands::Drive(DriveCommand::CreateFolder { .. }) => "Create folder",
        Commands::Drive(DriveCommand::Upload { .. }) => "Upload file",
        Commands::Drive(DriveCommand::Meta { .. }) => "Query metadata",
        Commands::Drive(DriveCommand::Stats { .. }) => "Query statistics",
        Commands::Wiki(WikiCommand::Node { .. }) => "Get wiki node",
    }
}

/// Runs one command. Config commands work on the file directly; everything
/// else needs credentials and goes through a real HTTP client.
pub fn run(command: &Commands, config_path: &Path, out: Output) -> Result<()> {
    if let Commands::Config(cmd) = command {
        return handle_config(cmd, config_path, out);
    }
    let config = Config::load(config_path)?;
    let client = FeishuClient::from_config(&config)?;
    dispatch(&client, command, out)
}

pub fn dispatch<T: Transport>(client: &FeishuClient<T>, command: &Commands, out: Output) -> Result<()> {
    match command {
        Commands::Config(_) => Err(FeishuError::Invalid("config commands take no client".into())),
        Commands::Doc(cmd) => handle_doc(client, cmd, out),
        Commands::Block(cmd) => handle_block(client, cmd, out),
        Commands::Drive(cmd) => handle_drive(client, cmd, out),
        Commands::Wiki(cmd) => handle_wiki(client, cmd, out),
    }
}

fn handle_config(cmd: &ConfigCommand, path: &Path, out: Output) -> Result<()> {
    let mut config = Config::load(path)?;
    match cmd {
        ConfigCommand::Set { key, value } => {
            config.set(key, value)?;
            config.save(path)?;
            out.emit(&json!({ "key": key, "saved": true }), || {
                println!("✅ Saved {} to {}", key, path.display())
            })
        }
        ConfigCommand::Get { key } => {
            let value = config.get(key)?;
            out.emit(&json!({ "key": key, "value": value }), || {
                println!("{}", value.as_deref().unwrap_or("N/A"))
            })
        }
        ConfigCommand::List => {
            let entries = config.list_masked()?;
            let map: serde_json::Map<String, Value> = entries
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
                .collect();
            out.emit(&Value::Object(map), || {
                for (key, value) in &entries {
                    println!("{:<22} {}", key, value);
                }
            })
        }
    }
}

fn document_json(doc: &Document) -> Value {
    json!({
        "document_id": doc.document_id,
        "revision_id": doc.revision_id,
        "title": doc.title,
        "url": doc.url(),
    })
}

fn handle_doc<T: Transport>(client: &FeishuClient<T>, cmd: &DocCommand, out: Output) -> Result<()> {
    match cmd {
        DocCommand::Create { title, folder_token } => {
            let doc = client.create_document(title, folder_token.as_deref())?;
            out.emit(&document_json(&doc), || {
                println!("✅ Document created");
                println!("   id:    {}", doc.document_id);
                println!("   title: {}", doc.title);
                println!("   url:   {}", doc.url());
            })
        }
        DocCommand::Get { document_id } => {
            let doc = client.get_document(document_id)?;
            out.emit(&document_json(&doc), || {
                println!("📄 {}", doc.title);
                println!("   id:       {}", doc.document_id);
                println!("   revision: {}", doc.revision_id);
                println!("   url:      {}", doc.url());
            })
        }
        DocCommand::Raw { document_id, lang } => {
            let text = client.raw_content(document_id, *lang)?;
            out.emit(&json!({ "content": text }), || println!("{}", text))
        }
    }
}

fn block_json(block: &Block) -> Value {
    json!({
        "block_id": block.block_id,
        "parent_id": block.parent_id,
        "block_type": block.block_type,
        "type_name": block.type_name(),
        "text": block.content.as_ref().map(BlockContent::plain_text),
        "children": block.children,
    })
}

fn print_block(block: &Block) {
    match &block.content {
        Some(content) => println!("  [{}] {}: {}", block.type_name(), block.block_id, content.plain_text()),
        None => println!("  [{}] {}", block.type_name(), block.block_id),
    }
}

fn content_from_args(args: &ContentArgs) -> Result<BlockContent> {
    let kind = args.kind.resolve(args.level)?;
    Ok(BlockContent::single(kind, &args.content, &args.language, args.checked))
}

fn handle_block<T: Transport>(client: &FeishuClient<T>, cmd: &BlockCommand, out: Output) -> Result<()> {
    match cmd {
        BlockCommand::List { document_id, block_id, page_size, all } => {
            let parent = block_id.as_deref().unwrap_or(root_block_id(document_id));
            let page_size = (*page_size).clamp(1, MAX_PAGE_SIZE);
            let blocks = if *all {
                client.list_all_children(document_id, parent, page_size)?
            } else {
                client.list_children(document_id, parent, page_size)?.items
            };
            let value = Value::Array(blocks.iter().map(block_json).collect());
            out.emit(&value, || {
                println!("{} block(s) under {}", blocks.len(), parent);
                blocks.iter().for_each(print_block);
            })
        }
        BlockCommand::Get { document_id, block_id } => {
            let block = client.get_block(document_id, block_id)?;
            out.emit(&block_json(&block), || print_block(&block))
        }
        BlockCommand::Create { document_id, block_id, content, index } => {
            let parent = block_id.as_deref().unwrap_or(root_block_id(document_id));
            let index = InsertIndex::from_wire(*index)?;
            let content = content_from_args(content)?;
            let created = client.create_children(
                document_id,
                parent,
                index,
                std::slice::from_ref(&content),
            )?;
            let value = Value::Array(created.iter().map(block_json).collect());
            out.emit(&value, || {
                println!("✅ Created {} block(s)", created.len());
                created.iter().for_each(print_block);
            })
        }
        BlockCommand::Update { document_id, block_id, content } => {
            let content = content_from_args(content)?;
            let block = client.update_block(document_id, block_id, &content)?;
            out.emit(&block_json(&block), || {
                println!("✅ Updated block {}", block_id);
                print_block(&block);
            })
        }
        BlockCommand::Delete { document_id, block_ids, yes } => {
            if !*yes && !confirm_delete(block_ids)? {
                println!("Cancelled");
                return Ok(());
            }
            let outcomes = match block_ids.as_slice() {
                [single] => vec![client.delete_block(document_id, single)?],
                many => client.batch_delete(document_id, many)?,
            };
            report_deletions(&outcomes, out)
        }
    }
}

fn confirm_delete(block_ids: &[String]) -> Result<bool> {
    let prompt = if block_ids.len() == 1 {
        format!("Delete block {}?", block_ids[0])
    } else {
        format!("Delete {} blocks?", block_ids.len())
    };
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

fn report_deletions(outcomes: &[DeleteOutcome], out: Output) -> Result<()> {
    let value = Value::Array(
        outcomes
            .iter()
            .map(|o| json!({ "block_id": o.block_id, "deleted": o.deleted, "error": o.error }))
            .collect(),
    );
    out.emit(&value, || {
        for outcome in outcomes {
            match &outcome.error {
                None => println!("✅ Deleted {}", outcome.block_id),
                Some(reason) => println!("⚠️  {} not deleted: {}", outcome.block_id, reason),
            }
        }
    })?;
    let failed = outcomes.iter().filter(|o| !o.deleted).count();
    if failed > 0 {
        return Err(FeishuError::Invalid(format!(
            "{} of {} block(s) not deleted",
            failed,
            outcomes.len()
        )));
    }
    Ok(())
}

fn file_json(file: &DriveFile) -> Value {
    json!({
        "token": file.token,
        "name": file.name,
        "type": file.file_type,
        "url": file.url,
        "parent_token": file.parent_token,
    })
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn handle_drive<T: Transport>(client: &FeishuClient<T>, cmd: &DriveCommand, out: Output) -> Result<()> {
    match cmd {
        DriveCommand::List { parent_token, order_by, direction, limit } => {
            let query = ListFilesQuery {
                parent_token: parent_token.clone(),
                order_by: *order_by,
                direction: *direction,
                page_size: *limit,
                page_token: None,
            };
            let page = client.list_files(&query)?;
            let value = json!({
                "files": page.files.iter().map(file_json).collect::<Vec<_>>(),
                "has_more": page.has_more,
                "next_page_token": page.next_page_token,
            });
            out.emit(&value, || {
                if page.files.is_empty() {
                    println!("(empty folder)");
                }
                for file in &page.files {
                    let icon = if file.is_folder() { "📁" } else { "📄" };
                    println!("{} {}  [{}]  {}", icon, file.name, file.file_type, file.token);
                }
                if let Some(next) = &page.next_page_token {
                    println!("... more entries, next page token: {}", next);
                }
            })
        }
        DriveCommand::CreateFolder { name, parent_token } => {
            let folder = client.create_folder(name, parent_token.as_deref())?;
            out.emit(&json!({ "token": folder.token, "url": folder.url }), || {
                println!("✅ Folder created");
                println!("   token: {}", folder.token);
                println!("   url:   {}", folder.url);
            })
        }
        DriveCommand::Upload { path, parent_type, parent_node, file_name, checksum, extra } => {
            let upload = MediaUpload {
                path: path.clone(),
                parent_type: *parent_type,
                parent_node: parent_node.clone(),
                file_name: file_name.clone(),
                checksum: checksum.clone(),
                extra: extra.clone(),
            };
            let progress = spinner("Uploading...");
            let result = client.upload_media(&upload);
            progress.finish_and_clear();
            let file_token = result?;
            out.emit(&json!({ "file_token": file_token }), || {
                println!("✅ Uploaded {}", path.display());
                println!("   file token: {}", file_token);
            })
        }
        DriveCommand::Meta { token, doc_type } => {
            let report = client.batch_query_meta(&[(token.clone(), *doc_type)])?;
            if let (None, Some(failed)) = (report.metas.first(), report.failed.first()) {
                return Err(FeishuError::Api {
                    code: failed.code,
                    msg: format!("no metadata for {}", failed.token),
                });
            }
            let metas: Vec<Value> = report
                .metas
                .iter()
                .map(|m| {
                    json!({
                        "doc_token": m.doc_token,
                        "doc_type": m.doc_type,
                        "title": m.title,
                        "owner_id": m.owner_id,
                        "create_time": m.create_time,
                        "latest_modify_time": m.latest_modify_time,
                        "url": m.url,
                    })
                })
                .collect();
            out.emit(&Value::Array(metas), || {
                for meta in &report.metas {
                    println!("📄 {} [{}]", meta.title, meta.doc_type);
                    println!("   token:    {}", meta.doc_token);
                    println!("   owner:    {}", meta.owner_id);
                    println!("   created:  {}", meta.create_time);
                    println!("   modified: {}", meta.latest_modify_time);
                    println!("   url:      {}", meta.url);
                }
            })
        }
        DriveCommand::Stats { token, doc_type } => {
            let stats = client.file_statistics(token, *doc_type)?;
            let value = json!({
                "uv": stats.uv,
                "pv": stats.pv,
                "like_count": stats.like_count,
                "uv_today": stats.uv_today,
                "pv_today": stats.pv_today,
                "like_count_today": stats.like_count_today,
            });
            out.emit(&value, || {
                println!("visitors: {} ({} today)", stats.uv, stats.uv_today);
                println!("views:    {} ({} today)", stats.pv, stats.pv_today);
                println!("likes:    {} ({} today)", stats.like_count, stats.like_count_today);
            })
        }
    }
}

fn handle_wiki<T: Transport>(client: &FeishuClient<T>, cmd: &WikiCommand, out: Output) -> Result<()> {
    match cmd {
        WikiCommand::Node { token } => {
            let node = client.get_wiki_node(token)?;
            let value = json!({
                "node_token": node.node_token,
                "obj_token": node.obj_token,
                "obj_type": node.obj_type,
                "title": node.title,
                "space_id": node.space_id,
            });
            out.emit(&value, || {
                println!("📚 {}", node.title);
                println!("   node:     {}", node.node_token);
                println!("   document: {} ({})", node.obj_token, node.obj_type);
                println!("   space:    {}", node.space_id);
            })
        }
    }
}
