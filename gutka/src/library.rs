//! # Bookmark library
//!
//! Folders form a strict tree stored in an arena: every [`Folder`] is indexed by its
//! [`FolderId`] and refers to its parent and children by id. Recursive delete and
//! copy are explicit walks over child-id lists.
//!
//! Display order:
//! - sibling folders: sort index ascending
//! - saved items in a folder: sort index descending (newest on top)
//!
//! Ties keep insertion order.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use chrono::{DateTime, Utc};
use gurbani::shabad::{Line, Shabad};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tracing::debug;
use uuid::Uuid;

use crate::{
    Result,
    config::{FAVORITES_FOLDER, MAX_HISTORY},
    error::{
        BackupError, EncodeSnafu, FolderCycleSnafu, FolderNotFoundSnafu,
        InvalidLineIndexSnafu, IoSnafu, ItemNotFoundSnafu, SystemFolderSnafu,
    },
};

pub type FolderId = Uuid;
pub type ItemId = Uuid;

/// A bookmarked shabad with a remembered line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedItem {
    pub id: ItemId,
    /// Full content snapshot taken when the item was saved
    pub shabad: Shabad,
    /// `None` means "default to the first line"
    selected_line: Option<usize>,
    pub sort_index: i64,
    pub added_at: DateTime<Utc>,
}

impl SavedItem {
    /// Creates a saved item with a new id. `selected_line` must address a line of `shabad`.
    pub fn new(
        shabad: Shabad,
        selected_line: Option<usize>,
        sort_index: i64,
        added_at: DateTime<Utc>,
    ) -> Result<Self> {
        check_line_index(&shabad, selected_line)?;
        Ok(Self {
            id: Uuid::new_v4(),
            shabad,
            selected_line,
            sort_index,
            added_at,
        })
    }

    pub fn selected_line(&self) -> Option<usize> {
        self.selected_line
    }

    /// Index of the line shown for this item: the selected line, or 0 by default
    pub fn display_index(&self) -> usize {
        self.selected_line.unwrap_or(0)
    }

    /// The line shown for this item
    pub fn display_line(&self) -> Option<&Line> {
        self.shabad.line(self.display_index())
    }

    pub fn set_selected_line(&mut self, selected_line: Option<usize>) -> Result<()> {
        check_line_index(&self.shabad, selected_line)?;
        self.selected_line = selected_line;
        Ok(())
    }

    /// Copy with a fresh id
    fn duplicate(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            ..self.clone()
        }
    }
}

pub(crate) fn check_line_index(shabad: &Shabad, index: Option<usize>) -> Result<()> {
    match index {
        Some(index) if index >= shabad.lines.len() => InvalidLineIndexSnafu {
            shabad_id: shabad.id(),
            index,
            len: shabad.lines.len(),
        }
        .fail(),
        _ => Ok(()),
    }
}

/// A node of the folder tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    /// System folders (Favorites) cannot be deleted
    pub is_system_folder: bool,
    pub sort_index: i64,
    pub parent: Option<FolderId>,
    children: Vec<FolderId>,
    items: Vec<SavedItem>,
    pub created_at: DateTime<Utc>,
}

impl Folder {
    fn new(name: &str, parent: Option<FolderId>, is_system_folder: bool, sort_index: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            is_system_folder,
            sort_index,
            parent,
            children: Vec::new(),
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Child folder ids, in insertion order
    pub fn child_ids(&self) -> &[FolderId] {
        &self.children
    }

    /// Saved items, in insertion order
    pub fn raw_items(&self) -> &[SavedItem] {
        &self.items
    }

    /// Saved items in display order (sort index descending)
    pub fn items_sorted(&self) -> Vec<&SavedItem> {
        let mut items: Vec<&SavedItem> = self.items.iter().collect();
        items.sort_by(|a, b| b.sort_index.cmp(&a.sort_index));
        items
    }

    fn next_item_sort_index(&self) -> i64 {
        self.items
            .iter()
            .map(|item| item.sort_index)
            .max()
            .map_or(0, |max| max + 1)
    }
}

/// Detached copy of a subtree
struct FolderSnapshot {
    name: String,
    is_system_folder: bool,
    sort_index: i64,
    items: Vec<SavedItem>,
    children: Vec<FolderSnapshot>,
}

/// A recently viewed shabad
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub shabad: Shabad,
    pub selected_line: Option<usize>,
    pub viewed_at: DateTime<Utc>,
}

/// The folder arena, root list, and history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    folders: HashMap<FolderId, Folder>,
    roots: Vec<FolderId>,
    #[serde(default)]
    history: VecDeque<HistoryItem>,
}

impl Library {
    /// Creates a library containing the system Favorites folder
    pub fn new() -> Self {
        let mut library = Self::default();
        library.insert_folder(None, FAVORITES_FOLDER, true, 0);
        library
    }

    pub fn folder(&self, id: FolderId) -> Result<&Folder> {
        self.folders.get(&id).context(FolderNotFoundSnafu { id })
    }

    fn folder_mut(&mut self, id: FolderId) -> Result<&mut Folder> {
        self.folders.get_mut(&id).context(FolderNotFoundSnafu { id })
    }

    /// Number of folders in the library
    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    /// Number of saved items in all folders
    pub fn item_count(&self) -> usize {
        self.folders.values().map(|folder| folder.items.len()).sum()
    }

    /// Root folders in display order (sort index ascending)
    pub fn root_folders(&self) -> Vec<&Folder> {
        self.sorted_folders(&self.roots)
    }

    /// Child folders in display order (sort index ascending)
    pub fn subfolders(&self, id: FolderId) -> Result<Vec<&Folder>> {
        let folder = self.folder(id)?;
        Ok(self.sorted_folders(&folder.children))
    }

    /// Saved items of a folder in display order (sort index descending)
    pub fn items(&self, id: FolderId) -> Result<Vec<&SavedItem>> {
        Ok(self.folder(id)?.items_sorted())
    }

    fn sorted_folders(&self, ids: &[FolderId]) -> Vec<&Folder> {
        let mut folders: Vec<&Folder> = ids.iter().filter_map(|id| self.folders.get(id)).collect();
        folders.sort_by_key(|folder| folder.sort_index);
        folders
    }

    fn sibling_ids(&self, parent: Option<FolderId>) -> Result<&[FolderId]> {
        match parent {
            None => Ok(&self.roots),
            Some(parent) => Ok(&self.folder(parent)?.children),
        }
    }

    fn next_folder_sort_index(&self, parent: Option<FolderId>) -> Result<i64> {
        Ok(self
            .sibling_ids(parent)?
            .iter()
            .filter_map(|id| self.folders.get(id))
            .map(|folder| folder.sort_index)
            .max()
            .map_or(0, |max| max + 1))
    }

    /// The first root system folder
    pub fn favorites(&self) -> Option<FolderId> {
        self.root_folders()
            .into_iter()
            .find(|folder| folder.is_system_folder)
            .map(|folder| folder.id)
    }

    /// Finds a direct child (or root, for `parent = None`) by name
    pub fn find_folder(&self, parent: Option<FolderId>, name: &str) -> Option<FolderId> {
        self.sibling_ids(parent)
            .ok()?
            .iter()
            .copied()
            .find(|id| self.folders.get(id).is_some_and(|folder| folder.name == name))
    }

    /// Creates a user folder after its last sibling
    pub fn create_folder(&mut self, parent: Option<FolderId>, name: &str) -> Result<FolderId> {
        let sort_index = self.next_folder_sort_index(parent)?;
        self.create_folder_with(parent, name, false, sort_index)
    }

    /// Creates a folder with an explicit system flag and sort index
    pub fn create_folder_with(
        &mut self,
        parent: Option<FolderId>,
        name: &str,
        is_system_folder: bool,
        sort_index: i64,
    ) -> Result<FolderId> {
        if let Some(parent) = parent {
            self.folder(parent)?;
        }
        Ok(self.insert_folder(parent, name, is_system_folder, sort_index))
    }

    // parent must exist
    fn insert_folder(
        &mut self,
        parent: Option<FolderId>,
        name: &str,
        is_system_folder: bool,
        sort_index: i64,
    ) -> FolderId {
        let folder = Folder::new(name, parent, is_system_folder, sort_index);
        let id = folder.id;
        self.folders.insert(id, folder);
        match parent.and_then(|parent| self.folders.get_mut(&parent)) {
            Some(parent) => parent.children.push(id),
            None => self.roots.push(id),
        }
        debug!(%id, name, "created folder");
        id
    }

    pub fn rename_folder(&mut self, id: FolderId, name: &str) -> Result<()> {
        self.folder_mut(id)?.name = name.to_string();
        Ok(())
    }

    pub fn set_folder_sort_index(&mut self, id: FolderId, sort_index: i64) -> Result<()> {
        self.folder_mut(id)?.sort_index = sort_index;
        Ok(())
    }

    /// Assigns sort indexes 0, 1, 2, ... to `ordered`, which must all be children of `parent`.
    pub fn reorder_folders(
        &mut self,
        parent: Option<FolderId>,
        ordered: &[FolderId],
    ) -> Result<()> {
        let siblings: HashSet<FolderId> = self.sibling_ids(parent)?.iter().copied().collect();
        if let Some(stranger) = ordered.iter().find(|id| !siblings.contains(id)) {
            return FolderNotFoundSnafu { id: *stranger }.fail();
        }
        for (index, id) in ordered.iter().enumerate() {
            self.folder_mut(*id)?.sort_index = i64::try_from(index).unwrap_or(i64::MAX);
        }
        Ok(())
    }

    /// True if `id` is `ancestor` or lies in its subtree
    pub fn is_in_subtree(&self, id: FolderId, ancestor: FolderId) -> bool {
        let mut current = Some(id);
        let mut steps = 0;
        while let Some(folder_id) = current {
            if folder_id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.folders.len() {
                // corrupt parent chain
                return false;
            }
            current = self.folders.get(&folder_id).and_then(|folder| folder.parent);
        }
        false
    }

    /// Ancestor chain of a folder, nearest first, ending at a root
    pub fn ancestors(&self, id: FolderId) -> Result<Vec<FolderId>> {
        let mut chain = Vec::new();
        let mut current = self.folder(id)?.parent;
        while let Some(parent) = current {
            if chain.len() > self.folders.len() {
                return FolderCycleSnafu { id }.fail();
            }
            chain.push(parent);
            current = self.folder(parent)?.parent;
        }
        Ok(chain)
    }

    /// Moves a folder (and its subtree) under `new_parent`, after the last sibling.
    pub fn move_folder(&mut self, id: FolderId, new_parent: Option<FolderId>) -> Result<()> {
        let old_parent = self.folder(id)?.parent;
        if let Some(new_parent) = new_parent {
            self.folder(new_parent)?;
            ensure!(!self.is_in_subtree(new_parent, id), FolderCycleSnafu { id });
        }
        if old_parent == new_parent {
            return Ok(());
        }
        let sort_index = self.next_folder_sort_index(new_parent)?;
        self.detach(id, old_parent);
        match new_parent {
            Some(parent) => self.folder_mut(parent)?.children.push(id),
            None => self.roots.push(id),
        }
        let folder = self.folder_mut(id)?;
        folder.parent = new_parent;
        folder.sort_index = sort_index;
        Ok(())
    }

    fn detach(&mut self, id: FolderId, parent: Option<FolderId>) {
        match parent.and_then(|parent| self.folders.get_mut(&parent)) {
            Some(parent) => parent.children.retain(|child| *child != id),
            None => self.roots.retain(|root| *root != id),
        }
    }

    /// Deletes a folder and its entire subtree. System folders are rejected.
    /// Returns the number of folders removed.
    pub fn delete_folder(&mut self, id: FolderId) -> Result<usize> {
        let folder = self.folder(id)?;
        ensure!(
            !folder.is_system_folder,
            SystemFolderSnafu {
                name: folder.name.clone()
            }
        );
        let parent = folder.parent;
        self.detach(id, parent);
        let mut removed = 0;
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(folder) = self.folders.remove(&next) {
                pending.extend(folder.children);
                removed += 1;
            }
        }
        debug!(%id, removed, "deleted folder");
        Ok(removed)
    }

    /// Deep-copies a folder (subfolders and items, all with new ids) under `dest_parent`.
    /// The copy is placed after its new siblings and is never a system folder.
    /// Copying a folder into its own subtree copies the subtree as it was before the call.
    pub fn copy_folder(&mut self, id: FolderId, dest_parent: Option<FolderId>) -> Result<FolderId> {
        if let Some(dest) = dest_parent {
            self.folder(dest)?;
        }
        let mut snapshot = self.snapshot(id)?;
        snapshot.is_system_folder = false;
        snapshot.sort_index = self.next_folder_sort_index(dest_parent)?;
        Ok(self.insert_snapshot(dest_parent, snapshot))
    }

    fn snapshot(&self, id: FolderId) -> Result<FolderSnapshot> {
        let folder = self.folder(id)?;
        Ok(FolderSnapshot {
            name: folder.name.clone(),
            is_system_folder: folder.is_system_folder,
            sort_index: folder.sort_index,
            items: folder.items.iter().map(SavedItem::duplicate).collect(),
            children: folder
                .children
                .iter()
                .map(|child| self.snapshot(*child))
                .collect::<Result<Vec<_>>>()?,
        })
    }

    fn insert_snapshot(&mut self, parent: Option<FolderId>, snapshot: FolderSnapshot) -> FolderId {
        let id = self.insert_folder(
            parent,
            &snapshot.name,
            snapshot.is_system_folder,
            snapshot.sort_index,
        );
        if let Some(folder) = self.folders.get_mut(&id) {
            folder.items = snapshot.items;
        }
        for child in snapshot.children {
            self.insert_snapshot(Some(id), child);
        }
        id
    }

    /// Saves a shabad into a folder, on top of the existing items.
    pub fn add_item(
        &mut self,
        folder_id: FolderId,
        shabad: Shabad,
        selected_line: Option<usize>,
    ) -> Result<ItemId> {
        let sort_index = self.folder(folder_id)?.next_item_sort_index();
        let item = SavedItem::new(shabad, selected_line, sort_index, Utc::now())?;
        self.insert_item(folder_id, item)
    }

    /// Inserts a prepared item (keeps its sort index and timestamp)
    pub fn insert_item(&mut self, folder_id: FolderId, item: SavedItem) -> Result<ItemId> {
        let id = item.id;
        self.folder_mut(folder_id)?.items.push(item);
        Ok(id)
    }

    pub fn remove_item(&mut self, folder_id: FolderId, item_id: ItemId) -> Result<SavedItem> {
        let folder = self.folder_mut(folder_id)?;
        let position = folder
            .items
            .iter()
            .position(|item| item.id == item_id)
            .context(ItemNotFoundSnafu { id: item_id })?;
        Ok(folder.items.remove(position))
    }

    /// Moves an item to the top of another folder
    pub fn move_item(&mut self, item_id: ItemId, to: FolderId) -> Result<()> {
        let sort_index = self.folder(to)?.next_item_sort_index();
        let (from, _) = self
            .find_item(item_id)
            .context(ItemNotFoundSnafu { id: item_id })?;
        let mut item = self.remove_item(from, item_id)?;
        item.sort_index = sort_index;
        self.insert_item(to, item)?;
        Ok(())
    }

    pub fn set_selected_line(
        &mut self,
        item_id: ItemId,
        selected_line: Option<usize>,
    ) -> Result<()> {
        let item = self
            .folders
            .values_mut()
            .flat_map(|folder| folder.items.iter_mut())
            .find(|item| item.id == item_id)
            .context(ItemNotFoundSnafu { id: item_id })?;
        item.set_selected_line(selected_line)
    }

    /// Finds an item and the folder holding it
    pub fn find_item(&self, item_id: ItemId) -> Option<(FolderId, &SavedItem)> {
        self.folders.values().find_map(|folder| {
            folder
                .items
                .iter()
                .find(|item| item.id == item_id)
                .map(|item| (folder.id, item))
        })
    }

    /// Records a viewed shabad at the front of history, replacing an older entry
    /// for the same shabad. History is capped at `MAX_HISTORY` entries.
    pub fn record_history(&mut self, shabad: Shabad, selected_line: Option<usize>) -> Result<()> {
        check_line_index(&shabad, selected_line)?;
        let shabad_id = shabad.id();
        self.history.retain(|entry| entry.shabad.id() != shabad_id);
        self.history.push_front(HistoryItem {
            shabad,
            selected_line,
            viewed_at: Utc::now(),
        });
        self.history.truncate(MAX_HISTORY);
        Ok(())
    }

    /// History, most recent first
    pub fn history(&self) -> impl Iterator<Item = &HistoryItem> {
        self.history.iter()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Checks arena consistency: every parent/child link resolves, each folder is
    /// reachable from exactly one root, and there are no cycles.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut pending: Vec<(FolderId, Option<FolderId>)> =
            self.roots.iter().map(|id| (*id, None)).collect();
        while let Some((id, expected_parent)) = pending.pop() {
            ensure!(seen.insert(id), FolderCycleSnafu { id });
            let folder = self.folder(id)?;
            ensure!(folder.parent == expected_parent, FolderCycleSnafu { id });
            pending.extend(folder.children.iter().map(|child| (*child, Some(id))));
        }
        if let Some(orphan) = self.folders.keys().find(|id| !seen.contains(id)) {
            return FolderCycleSnafu { id: *orphan }.fail();
        }
        Ok(())
    }
}

/// Where the library is persisted.
///
/// Writes replace the file atomically (write to a temp file in the same directory,
/// then rename). An in-memory store keeps nothing but still counts saves.
#[derive(Debug, Default)]
pub struct LibraryStore {
    path: Option<PathBuf>,
    saves: AtomicUsize,
}

impl LibraryStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of successful saves through this store
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Loads the library, or creates a new one if the file does not exist yet
    pub fn load(&self) -> Result<Library> {
        let Some(path) = &self.path else {
            return Ok(Library::new());
        };
        if !path.exists() {
            return Ok(Library::new());
        }
        let bytes = fs::read(path).context(IoSnafu { path })?;
        let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
        let library: Library = serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
            BackupError::Decode {
                what: "library".to_string(),
                path: err.path().to_string(),
                source: err.into_inner(),
            }
        })?;
        library.validate()?;
        Ok(library)
    }

    pub fn save(&self, library: &Library) -> Result<()> {
        if let Some(path) = &self.path {
            let bytes = serde_json::to_vec(library).context(EncodeSnafu { what: "library" })?;
            write_atomic(path, &bytes)?;
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Writes `bytes` to `path` through a temp file in the same directory
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).context(IoSnafu { path: dir })?;
    let mut temp = tempfile::NamedTempFile::new_in(dir).context(IoSnafu { path: dir })?;
    temp.write_all(bytes).context(IoSnafu { path })?;
    temp.as_file().sync_all().context(IoSnafu { path })?;
    temp.persist(path)
        .map_err(|err| err.error)
        .context(IoSnafu { path })?;
    Ok(())
}
