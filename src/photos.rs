//! Caption-keyed merging of photo sets across edits of a record.

use std::collections::HashMap;

use crate::models::Photo;

/// Merge a newly submitted photo set into the stored one.
///
/// Captions are compared trimmed. A new photo whose caption already exists
/// replaces that entry in place; novel captions are appended in submission
/// order. Empty captions never match anything, so those entries are all
/// kept where they fall. New entries without image data are ignored.
pub fn merge_photos(existing: &[Photo], new: &[Photo]) -> Vec<Photo> {
    let mut merged: Vec<Photo> = Vec::with_capacity(existing.len() + new.len());
    let mut slots: HashMap<String, usize> = HashMap::new();

    let submitted = new.iter().filter(|p| p.has_image());
    for photo in existing.iter().chain(submitted) {
        let caption = photo.caption.trim().to_string();
        let entry = Photo {
            caption: caption.clone(),
            ..photo.clone()
        };

        if caption.is_empty() {
            merged.push(entry);
            continue;
        }

        match slots.get(&caption) {
            Some(&idx) => merged[idx] = entry,
            None => {
                slots.insert(caption, merged.len());
                merged.push(entry);
            }
        }
    }

    merged
}

/// A newly supplied diagram replaces the stored one, otherwise it is kept
pub fn merge_diagram(existing: Option<Photo>, new: Option<Photo>) -> Option<Photo> {
    match new.filter(|d| d.has_image()) {
        Some(mut diagram) => {
            diagram.caption = diagram.caption.trim().to_string();
            Some(diagram)
        }
        None => existing,
    }
}
