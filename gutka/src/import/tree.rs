//! Legacy format A: a property list holding a nested tree of arrays.
//!
//! ```text
//! folder: [name, [child, child, ...]]
//! leaf:   [text, shabadId]
//!         [text, shabadId, lineText, lineId]
//! ```
//!
//! The top level is a single folder node or an array of nodes. Ids may be integers
//! or numeric strings. Leaf ids are translated through the bookmark lookup tables.
//! Both XML and binary property lists are accepted, and so is the same tree
//! written as JSON.

use std::io::Cursor;

use chrono::Utc;
use gurbani::source::ShabadSource;
use snafu::prelude::*;
use tracing::debug;

use crate::{
    Result,
    error::{BackupError, PropertyListSnafu},
    import::{ImportContext, LineHint, PendingItem, SkipReason},
    library::FolderId,
    lookup::LookupTables,
};

/// Loosely typed tree node, independent of the file encoding
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Integer(i64),
    List(Vec<Node>),
    Other(&'static str),
}

impl From<plist::Value> for Node {
    fn from(value: plist::Value) -> Self {
        match value {
            plist::Value::String(text) => Self::Text(text),
            plist::Value::Integer(number) => number
                .as_signed()
                .map_or(Self::Other("integer"), Self::Integer),
            plist::Value::Array(values) => Self::List(values.into_iter().map(Self::from).collect()),
            plist::Value::Dictionary(_) => Self::Other("dictionary"),
            _ => Self::Other("scalar"),
        }
    }
}

impl From<serde_json::Value> for Node {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => Self::Text(text),
            serde_json::Value::Number(number) => {
                number.as_i64().map_or(Self::Other("number"), Self::Integer)
            }
            serde_json::Value::Array(values) => {
                Self::List(values.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(_) => Self::Other("object"),
            _ => Self::Other("scalar"),
        }
    }
}

impl Node {
    /// `[name, [children]]`
    fn as_folder(&self) -> Option<(&str, &[Self])> {
        match self {
            Self::List(parts) => match parts.as_slice() {
                [Self::Text(name), Self::List(children)] => Some((name, children)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Integer or numeric string id
    fn as_id(&self) -> Option<String> {
        match self {
            Self::Integer(number) => Some(number.to_string()),
            Self::Text(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Leaf {
    text: String,
    shabad_id: String,
    line: Option<(String, String)>,
}

fn parse_leaf(node: &Node) -> Result<Leaf, String> {
    let Node::List(parts) = node else {
        return Err("expected an array".to_string());
    };
    match parts.as_slice() {
        [Node::Text(text), id] => Ok(Leaf {
            text: text.clone(),
            shabad_id: id.as_id().ok_or("invalid shabad id")?,
            line: None,
        }),
        [Node::Text(text), id, Node::Text(line_text), line_id] => Ok(Leaf {
            text: text.clone(),
            shabad_id: id.as_id().ok_or("invalid shabad id")?,
            line: Some((line_text.clone(), line_id.as_id().ok_or("invalid line id")?)),
        }),
        other => Err(format!("unrecognized node with {} elements", other.len())),
    }
}

fn decode(bytes: &[u8]) -> Result<Node> {
    if bytes.iter().find(|byte| !byte.is_ascii_whitespace()) == Some(&b'[') {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|source| BackupError::Decode {
                what: "bookmarks".to_string(),
                path: String::new(),
                source,
            })?;
        return Ok(value.into());
    }
    let value = plist::Value::from_reader(Cursor::new(bytes)).context(PropertyListSnafu)?;
    Ok(value.into())
}

/// Top-level nodes of the tree
fn top_level(root: Node) -> Result<Vec<Node>> {
    if root.as_folder().is_some() {
        return Ok(vec![root]);
    }
    match root {
        Node::List(nodes) if nodes.iter().all(|node| matches!(node, Node::List(_))) => Ok(nodes),
        _ => Err(BackupError::UnsupportedFormat {
            message: "bookmarks file must hold a folder node or an array of nodes".to_string(),
        }),
    }
}

/// Imports a format A file under a new import root. Returns the root id.
pub async fn import<S: ShabadSource>(
    bytes: &[u8],
    tables: &LookupTables,
    ctx: &mut ImportContext<'_, S>,
) -> Result<FolderId> {
    let nodes = top_level(decode(bytes)?)?;
    let root = ctx.create_import_root(Utc::now())?;
    import_children(&nodes, root, String::new(), tables, ctx).await?;
    Ok(root)
}

async fn import_children<S: ShabadSource>(
    nodes: &[Node],
    root: FolderId,
    root_path: String,
    tables: &LookupTables,
    ctx: &mut ImportContext<'_, S>,
) -> Result<()> {
    let mut pending: Vec<(FolderId, &[Node], String)> = vec![(root, nodes, root_path)];
    while let Some((folder, children, path)) = pending.pop() {
        let mut subfolders = Vec::new();
        let leaf_count = children.iter().filter(|node| node.as_folder().is_none()).count();
        let mut leaf_position = 0;
        for (position, node) in children.iter().enumerate() {
            let location = format!("{path}/{position}");
            if let Some((name, grandchildren)) = node.as_folder() {
                subfolders.push((name, grandchildren, format!("{path}/{name}")));
                continue;
            }
            ctx.check_cancel()?;
            let leaf = match parse_leaf(node) {
                Ok(leaf) => leaf,
                Err(detail) => {
                    ctx.skip(location, SkipReason::MalformedNode { detail });
                    continue;
                }
            };
            // first leaf in the file is shown on top
            let sort_index = i64::try_from(leaf_count - leaf_position).unwrap_or(i64::MAX);
            leaf_position += 1;
            let Some(shabad_id) = tables.bookmark_shabad(&leaf.shabad_id) else {
                ctx.skip(location, SkipReason::UnknownId { id: leaf.shabad_id });
                continue;
            };
            let line = match leaf.line {
                Some((line_text, line_id)) => LineHint::VerseOrText {
                    verse_id: tables.bookmark_line(&line_id).map(str::to_string),
                    text: line_text,
                },
                None => LineHint::Text(leaf.text),
            };
            ctx.import_item(
                folder,
                PendingItem {
                    location,
                    shabad_id,
                    line,
                    sort_index,
                    added_at: None,
                },
            )
            .await?;
        }
        // folders are created in file order, then visited depth first
        let mut created = Vec::with_capacity(subfolders.len());
        for (index, (name, grandchildren, sub_path)) in subfolders.into_iter().enumerate() {
            let sort_index = i64::try_from(index).unwrap_or(i64::MAX);
            let id = ctx.create_folder(folder, name, false, sort_index)?;
            debug!(%id, name, "created imported folder");
            created.push((id, grandchildren, sub_path));
        }
        pending.extend(created.into_iter().rev());
    }
    Ok(())
}
