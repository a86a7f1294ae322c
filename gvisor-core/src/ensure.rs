//! Keyed upserts over ordered lists
//!
//! Both the files of an `OperatingSystemConfig` and the containerd plugin configuration
//! are lists where one entry per key is expected. [`ensure`] inserts a candidate into such a
//! list or updates the entry carrying the same key, leaving every other entry where it was.

/// An entry that can be identified within a list by a key
pub trait Keyed {
    /// The key type, compared structurally
    type Key: PartialEq + ?Sized;

    /// The key of this entry
    fn key(&self) -> &Self::Key;

    /// Take over the payload of `candidate`, which carries the same key as `self`.
    ///
    /// Replaces the whole entry unless an implementation only owns part of it.
    fn update_from(&mut self, candidate: Self)
    where
        Self: Sized,
    {
        *self = candidate;
    }
}

/// Ensure `candidate` is the only entry with its key in `existing`
///
/// The first entry sharing the candidate's key is updated in place via [`Keyed::update_from`],
/// any later entries with that key are dropped. All other entries are kept in their relative order.
/// When no entry matches, the candidate is appended.
///
/// ```
/// use gvisor_core::{ensure, extensions::File};
///
/// let files = ensure(vec![], File::new("/etc/a"));
/// let files = ensure(files, File::new("/etc/a"));
/// assert_eq!(files.len(), 1);
/// ```
pub fn ensure<T: Keyed>(existing: Vec<T>, candidate: T) -> Vec<T> {
    let mut slot = None;
    let mut updated = Vec::with_capacity(existing.len() + 1);
    for entry in existing {
        if entry.key() == candidate.key() {
            if slot.is_some() {
                continue;
            }
            slot = Some(updated.len());
        }
        updated.push(entry);
    }

    match slot {
        Some(i) => updated[i].update_from(candidate),
        None => updated.push(candidate),
    }
    updated
}
