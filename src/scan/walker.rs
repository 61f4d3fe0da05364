use crate::error::ScanError;
use crate::storage::{RemoteItem, RemoteStore};

#[derive(Debug, Clone)]
pub struct ScanCandidate {
    pub item: RemoteItem,
    pub path_hint: String,
    pub year_label: String,
}

#[derive(Debug, Clone, Default)]
pub struct Walk {
    pub candidates: Vec<ScanCandidate>,
    /// The cap stopped the walk while listable folders or unvisited PDFs
    /// remained.
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct WalkLimits<'a> {
    pub max_depth: usize,
    pub max_items: usize,
    pub name_filter: Option<&'a str>,
}

/// Depth-first enumeration of the PDFs below `root_id`.
///
/// The work stack is LIFO, so the children of a folder are visited in
/// reverse listing order; the output keeps that order. Folders deeper than
/// `max_depth` are never listed. Once `max_items` candidates have been
/// emitted the walk stops without listing anything else.
pub fn walk(
    store: &dyn RemoteStore,
    root_id: &str,
    year_label: &str,
    limits: &WalkLimits<'_>,
) -> Result<Walk, ScanError> {
    let mut out = Vec::new();
    if limits.max_items == 0 {
        return Ok(Walk {
            candidates: out,
            truncated: true,
        });
    }

    let mut stack = vec![(root_id.to_string(), year_label.to_string(), 0usize)];
    while let Some((folder_id, prefix, depth)) = stack.pop() {
        if depth > limits.max_depth {
            continue;
        }

        let children = store
            .list_children(&folder_id, limits.name_filter)
            .map_err(|source| ScanError::ListingFailed {
                folder: prefix.clone(),
                source,
            })?;

        let mut children = children.into_iter();
        while let Some(child) = children.next() {
            let path_hint = format!("{prefix}/{}", child.name);
            if child.is_folder() {
                stack.push((child.id, path_hint, depth + 1));
            } else if child.is_pdf() {
                out.push(ScanCandidate {
                    item: child,
                    path_hint,
                    year_label: year_label.to_string(),
                });
                if out.len() >= limits.max_items {
                    let listable = |d: usize| d <= limits.max_depth;
                    let truncated = stack.iter().any(|(_, _, d)| listable(*d))
                        || children.any(|c| c.is_pdf() || (c.is_folder() && listable(depth + 1)));
                    return Ok(Walk {
                        candidates: out,
                        truncated,
                    });
                }
            }
        }
    }

    Ok(Walk {
        candidates: out,
        truncated: false,
    })
}
