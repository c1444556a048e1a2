//! Live folder tree ⇄ [`BackupDocument`].
//!
//! Export walks the library in display order. Restore grafts the document under a
//! new `Import <created-at>` root with fresh ids, re-fetching every shabad by id,
//! so restoring the same document twice yields two independent copies.

use chrono::{DateTime, Utc};
use gurbani::source::ShabadSource;
use tracing::info;

use crate::{
    Result,
    document::{BackupDocument, BackupFolder, BackupShabadRef, selected_line_value},
    import::{ImportContext, LineHint, PendingItem},
    library::{Folder, FolderId, Library, check_line_index},
    settings::Settings,
};

/// Builds a backup document from the library.
///
/// Folders are listed by sort index ascending and items by sort index descending.
/// An item whose stored selection is out of range fails with `InvalidLineIndex`.
pub fn export_document(
    library: &Library,
    settings: &Settings,
    app_version: &str,
    created_at: DateTime<Utc>,
) -> Result<BackupDocument> {
    let root_folders = library
        .root_folders()
        .into_iter()
        .map(|folder| export_folder(library, folder))
        .collect::<Result<Vec<_>>>()?;
    Ok(BackupDocument {
        created_at,
        app_version: app_version.to_string(),
        settings: settings.clone(),
        root_folders,
    })
}

fn export_folder(library: &Library, folder: &Folder) -> Result<BackupFolder> {
    let shabads = folder
        .items_sorted()
        .into_iter()
        .map(|item| {
            check_line_index(&item.shabad, item.selected_line())?;
            Ok(BackupShabadRef {
                id: item.id,
                shabad_id: item.shabad.id(),
                title: item
                    .display_line()
                    .map(|line| line.gurmukhi.clone())
                    .unwrap_or_default(),
                index_of_selected_line: selected_line_value(item.selected_line()),
                sort_index: item.sort_index,
                added_at: item.added_at,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let subfolders = library
        .subfolders(folder.id)?
        .into_iter()
        .map(|child| export_folder(library, child))
        .collect::<Result<Vec<_>>>()?;
    Ok(BackupFolder {
        id: folder.id,
        name: folder.name.clone(),
        is_system_folder: folder.is_system_folder,
        sort_index: folder.sort_index,
        shabads,
        subfolders,
    })
}

/// Restores a document under a new import root. Returns the root id.
pub async fn restore_document<S: ShabadSource>(
    doc: &BackupDocument,
    ctx: &mut ImportContext<'_, S>,
) -> Result<FolderId> {
    let root = ctx.create_import_root(doc.created_at)?;
    restore_folders(doc, root, ctx).await?;
    ctx.restore_settings(&doc.settings)?;
    Ok(root)
}

/// Recreates the document's folders and items under `root`, depth first.
/// Each folder and each item is persisted before the next one starts.
pub async fn restore_folders<S: ShabadSource>(
    doc: &BackupDocument,
    root: FolderId,
    ctx: &mut ImportContext<'_, S>,
) -> Result<()> {
    let mut pending: Vec<(FolderId, &BackupFolder, String)> = doc
        .root_folders
        .iter()
        .rev()
        .map(|folder| (root, folder, folder.name.clone()))
        .collect();
    while let Some((parent, folder, path)) = pending.pop() {
        let id = ctx.create_folder(
            parent,
            &folder.name,
            folder.is_system_folder,
            folder.sort_index,
        )?;
        for (position, shabad) in folder.shabads.iter().enumerate() {
            ctx.import_item(
                id,
                PendingItem {
                    location: format!("{path}/{position}"),
                    shabad_id: shabad.shabad_id,
                    line: LineHint::Index {
                        index: shabad.index_of_selected_line,
                        title: shabad.title.clone(),
                    },
                    sort_index: shabad.sort_index,
                    added_at: Some(shabad.added_at),
                },
            )
            .await?;
        }
        pending.extend(
            folder
                .subfolders
                .iter()
                .rev()
                .map(|child| (id, child, format!("{path}/{}", child.name))),
        );
    }
    info!(
        folders = ctx.report().folders,
        imported = ctx.report().imported,
        skipped = ctx.report().skipped.len(),
        "restored backup"
    );
    Ok(())
}
