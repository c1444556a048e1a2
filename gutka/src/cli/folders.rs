//! `gutka folders ...`
//!
//! Folders are named by path from the root (`Kirtan/Asa`) or by id.

use anyhow::{Context, Result, anyhow};
use clap::{Args, Subcommand};
use gurbani::source::ShabadSource;
use gutka::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use super::{AppContext, emit_json};

#[derive(Args, Debug)]
pub struct FoldersArgs {
    #[command(subcommand)]
    pub command: FoldersCommands,
}

#[derive(Subcommand, Debug)]
pub enum FoldersCommands {
    /// Print the folder tree
    Tree {
        /// Also list saved items
        #[arg(long)]
        items: bool,
    },

    /// Create a folder
    Create {
        name: String,
        /// Parent folder (path or id). Default: top level
        #[arg(long, value_name = "FOLDER")]
        parent: Option<String>,
    },

    /// Rename a folder
    Rename { folder: String, name: String },

    /// Move a folder under another folder
    Move {
        folder: String,
        /// Destination folder (path or id). Default: top level
        #[arg(long, value_name = "FOLDER")]
        to: Option<String>,
    },

    /// Copy a folder with everything in it
    Copy {
        folder: String,
        /// Destination folder (path or id). Default: top level
        #[arg(long, value_name = "FOLDER")]
        to: Option<String>,
    },

    /// Delete a folder with everything in it
    Delete { folder: String },

    /// Save a shabad into a folder
    Add {
        folder: String,
        shabad_id: u32,
        /// Selected line (0-based). Default: first line
        #[arg(long)]
        line: Option<usize>,
    },

    /// Remove a saved item
    Remove { folder: String, item: Uuid },
}

/// Resolves a folder path (`a/b/c`) or id
pub fn resolve_folder(library: &Library, target: &str) -> Result<FolderId> {
    if let Ok(id) = Uuid::parse_str(target) {
        library.folder(id)?;
        return Ok(id);
    }
    let mut current = None;
    for name in target.split('/').filter(|part| !part.is_empty()) {
        current = Some(
            library
                .find_folder(current, name)
                .ok_or_else(|| anyhow!("folder not found: {target}"))?,
        );
    }
    current.ok_or_else(|| anyhow!("empty folder path"))
}

fn resolve_parent(library: &Library, target: Option<&str>) -> Result<Option<FolderId>> {
    target.map(|target| resolve_folder(library, target)).transpose()
}

pub async fn handle(ctx: &AppContext, args: FoldersArgs) -> Result<()> {
    let (store, mut library) = ctx.load_library()?;
    match args.command {
        FoldersCommands::Tree { items } => {
            if ctx.json {
                return emit_json(&tree_nodes(&library, None));
            }
            print_tree(&library, None, 0, items);
            return Ok(());
        }
        FoldersCommands::Create { name, parent } => {
            let parent = resolve_parent(&library, parent.as_deref())?;
            let id = library.create_folder(parent, &name)?;
            println!("{id}");
        }
        FoldersCommands::Rename { folder, name } => {
            let id = resolve_folder(&library, &folder)?;
            library.rename_folder(id, &name)?;
        }
        FoldersCommands::Move { folder, to } => {
            let id = resolve_folder(&library, &folder)?;
            let to = resolve_parent(&library, to.as_deref())?;
            library.move_folder(id, to)?;
        }
        FoldersCommands::Copy { folder, to } => {
            let id = resolve_folder(&library, &folder)?;
            let to = resolve_parent(&library, to.as_deref())?;
            let copy = library.copy_folder(id, to)?;
            println!("{copy}");
        }
        FoldersCommands::Delete { folder } => {
            let id = resolve_folder(&library, &folder)?;
            let removed = library.delete_folder(id)?;
            println!("deleted {removed} folders");
        }
        FoldersCommands::Add {
            folder,
            shabad_id,
            line,
        } => {
            let id = resolve_folder(&library, &folder)?;
            let client = ctx.client()?;
            let shabad = client
                .fetch_shabad(shabad_id)
                .await
                .with_context(|| format!("fetching shabad {shabad_id}"))?;
            let item = library.add_item(id, shabad, line)?;
            println!("{item}");
        }
        FoldersCommands::Remove { folder, item } => {
            let id = resolve_folder(&library, &folder)?;
            library.remove_item(id, item)?;
        }
    }
    store.save(&library)?;
    Ok(())
}

fn print_tree(library: &Library, parent: Option<FolderId>, depth: usize, show_items: bool) {
    let folders = match parent {
        None => library.root_folders(),
        Some(parent) => library.subfolders(parent).unwrap_or_default(),
    };
    let indent = "  ".repeat(depth);
    for folder in folders {
        let marker = if folder.is_system_folder { " *" } else { "" };
        println!(
            "{indent}{}{marker} ({} items)  {}",
            folder.name,
            folder.raw_items().len(),
            folder.id
        );
        if show_items {
            for item in folder.items_sorted() {
                let text = item.display_line().map_or("", |line| line.gurmukhi.as_str());
                println!("{indent}  - [{}] {text}  {}", item.shabad.id(), item.id);
            }
        }
        print_tree(library, Some(folder.id), depth + 1, show_items);
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TreeNode {
    id: FolderId,
    name: String,
    is_system_folder: bool,
    items: Vec<TreeItem>,
    subfolders: Vec<TreeNode>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TreeItem {
    id: ItemId,
    shabad_id: u32,
    selected_line: Option<usize>,
    text: String,
}

fn tree_nodes(library: &Library, parent: Option<FolderId>) -> Vec<TreeNode> {
    let folders = match parent {
        None => library.root_folders(),
        Some(parent) => library.subfolders(parent).unwrap_or_default(),
    };
    folders
        .into_iter()
        .map(|folder| TreeNode {
            id: folder.id,
            name: folder.name.clone(),
            is_system_folder: folder.is_system_folder,
            items: folder
                .items_sorted()
                .into_iter()
                .map(|item| TreeItem {
                    id: item.id,
                    shabad_id: item.shabad.id(),
                    selected_line: item.selected_line(),
                    text: item
                        .display_line()
                        .map(|line| line.gurmukhi.clone())
                        .unwrap_or_default(),
                })
                .collect(),
            subfolders: tree_nodes(library, Some(folder.id)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_paths_and_ids() {
        let mut library = Library::new();
        let kirtan = library.create_folder(None, "Kirtan").unwrap();
        let asa = library.create_folder(Some(kirtan), "Asa").unwrap();
        assert_eq!(resolve_folder(&library, "Kirtan/Asa").unwrap(), asa);
        assert_eq!(resolve_folder(&library, "/Kirtan/").unwrap(), kirtan);
        assert_eq!(resolve_folder(&library, &asa.to_string()).unwrap(), asa);
        assert!(resolve_folder(&library, "Kirtan/Sorath").is_err());
        assert!(resolve_folder(&library, "").is_err());
        assert!(resolve_folder(&library, &Uuid::new_v4().to_string()).is_err());
    }

    #[test]
    fn tree_nodes_follow_display_order() {
        let mut library = Library::new();
        let kirtan = library.create_folder(None, "Kirtan").unwrap();
        library.create_folder(Some(kirtan), "Asa").unwrap();
        let nodes = tree_nodes(&library, None);
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].is_system_folder);
        assert_eq!(nodes[1].subfolders[0].name, "Asa");
    }
}
