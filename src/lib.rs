// Library root
// -----------
// The `feishu` binary (`main.rs`) is a thin shell over these modules, so
// everything it does can also be driven from code.
//
// Module responsibilities:
// - `api`: HTTP calls against the open platform: token, documents and
//   blocks, drive, wiki. Generic over a `Transport` so tests run offline.
// - `block`: the typed block content model and its JSON encoding.
// - `config`: settings file plus `FEISHU_*` environment overrides.
// - `cli` / `ui`: argument parsing and the per-command handlers.
pub mod api;
pub mod block;
pub mod cli;
pub mod config;
pub mod error;
pub mod ui;

pub use api::FeishuClient;
pub use error::{FeishuError, Result};
