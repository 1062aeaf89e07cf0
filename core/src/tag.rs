//! Exclusivity tags and tag combinations.
//!
//! Every effect carries a *combo*: an interned, order-independent set of tag
//! names. While an effect is active its tags are reserved, and any combo that
//! shares a reserved tag is blocked from rolling. The registry only answers
//! questions about tags; toggling the weighted trees is left to the engine.

use hashbrown::HashMap;
use lasso::{Key, Rodeo, Spur};
use serde::{Deserialize, Serialize};

/// Interned tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagId(Spur);

impl TagId {
    fn index(self) -> usize {
        self.0.into_usize()
    }
}

/// Interned set of tags. `ComboId::NONE` is the empty set and is always allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComboId(u32);

impl ComboId {
    pub const NONE: ComboId = ComboId(0);

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Default)]
pub struct TagRegistry {
    names: Rodeo,
    combos: HashMap<Vec<TagId>, ComboId>,
    /// Combo `n` expands to `expanded[n - 1]` (sorted, deduplicated)
    expanded: Vec<Vec<TagId>>,
    /// Tag index -> combos containing that tag
    related: Vec<Vec<ComboId>>,
    /// Tag index -> number of active effects holding the tag
    reservations: Vec<u32>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Interning ---

    pub fn intern_tag(&mut self, name: &str) -> TagId {
        let tag = TagId(self.names.get_or_intern(name));
        if tag.index() == self.related.len() {
            self.related.push(Vec::new());
            self.reservations.push(0);
        }
        tag
    }

    pub fn find_tag(&self, name: &str) -> Option<TagId> {
        self.names.get(name).map(TagId)
    }

    pub fn tag_name(&self, tag: TagId) -> &str {
        self.names.resolve(&tag.0)
    }

    /// Intern a set of tags. Order and duplicates do not matter; an empty set
    /// yields `ComboId::NONE`.
    pub fn intern_combo(&mut self, tags: impl IntoIterator<Item = TagId>) -> ComboId {
        let mut key: Vec<TagId> = tags.into_iter().collect();
        key.sort_unstable();
        key.dedup();

        if key.is_empty() {
            return ComboId::NONE;
        }
        if let Some(&combo) = self.combos.get(&key) {
            return combo;
        }

        let combo = ComboId(self.expanded.len() as u32 + 1);
        for tag in &key {
            self.related[tag.index()].push(combo);
        }
        self.expanded.push(key.clone());
        self.combos.insert(key, combo);
        combo
    }

    pub fn intern_combo_names<S: AsRef<str>>(&mut self, names: &[S]) -> ComboId {
        let tags: Vec<TagId> = names.iter().map(|n| self.intern_tag(n.as_ref())).collect();
        self.intern_combo(tags)
    }

    /// Tags of `combo`; empty for `ComboId::NONE` and unknown ids.
    pub fn expand(&self, combo: ComboId) -> &[TagId] {
        if combo.is_none() {
            return &[];
        }
        self.expanded
            .get(combo.0 as usize - 1)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of non-empty combos interned so far.
    pub fn combo_count(&self) -> usize {
        self.expanded.len()
    }

    pub fn tag_count(&self) -> usize {
        self.related.len()
    }

    // --- Reservations ---

    pub fn is_reserved(&self, tag: TagId) -> bool {
        self.reservations.get(tag.index()).is_some_and(|&n| n > 0)
    }

    /// True iff no tag of `combo` is reserved.
    pub fn is_allowed(&self, combo: ComboId) -> bool {
        self.expand(combo).iter().all(|&tag| !self.is_reserved(tag))
    }

    /// Reserve every tag of `combo`. Returns every combo sharing one of those
    /// tags, which the caller must stop sampling.
    pub fn reserve(&mut self, combo: ComboId) -> Vec<ComboId> {
        let tags = self.expand(combo).to_vec();
        for tag in &tags {
            self.reservations[tag.index()] += 1;
        }
        self.related_to(&tags)
    }

    /// Undo one `reserve` of `combo`. Returns the combos sharing its tags that
    /// are allowed again, which the caller may resume sampling.
    pub fn release(&mut self, combo: ComboId) -> Vec<ComboId> {
        let tags = self.expand(combo).to_vec();
        for tag in &tags {
            let count = &mut self.reservations[tag.index()];
            *count = count.saturating_sub(1);
        }
        let mut affected = self.related_to(&tags);
        affected.retain(|&c| self.is_allowed(c));
        affected
    }

    fn related_to(&self, tags: &[TagId]) -> Vec<ComboId> {
        let mut affected: Vec<ComboId> = tags
            .iter()
            .flat_map(|tag| self.related[tag.index()].iter().copied())
            .collect();
        affected.sort_unstable();
        affected.dedup();
        affected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_combo_is_none_and_always_allowed() {
        let mut tags = TagRegistry::new();
        let empty: [&str; 0] = [];
        assert_eq!(tags.intern_combo_names(&empty), ComboId::NONE);
        assert!(tags.is_allowed(ComboId::NONE));
        assert!(tags.reserve(ComboId::NONE).is_empty());
        assert!(tags.release(ComboId::NONE).is_empty());
    }

    #[test]
    fn combos_are_order_independent() {
        let mut tags = TagRegistry::new();
        let a = tags.intern_combo_names(&["camera", "gravity"]);
        let b = tags.intern_combo_names(&["gravity", "camera", "gravity"]);
        let c = tags.intern_combo_names(&["gravity"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(tags.combo_count(), 2);
        assert_eq!(tags.tag_count(), 2);
        let names: Vec<&str> = tags.expand(a).iter().map(|&t| tags.tag_name(t)).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"camera") && names.contains(&"gravity"));
    }

    #[test]
    fn reserve_blocks_every_combo_sharing_a_tag() {
        let mut tags = TagRegistry::new();
        let gravity = tags.intern_combo_names(&["gravity"]);
        let both = tags.intern_combo_names(&["gravity", "camera"]);
        let camera = tags.intern_combo_names(&["camera"]);
        let audio = tags.intern_combo_names(&["audio"]);

        let affected = tags.reserve(gravity);
        assert_eq!(affected, vec![gravity, both]);
        assert!(!tags.is_allowed(gravity));
        assert!(!tags.is_allowed(both));
        assert!(tags.is_allowed(camera));
        assert!(tags.is_allowed(audio));

        let released = tags.release(gravity);
        assert_eq!(released, vec![gravity, both]);
        assert!(tags.is_allowed(both));
    }

    #[test]
    fn release_only_returns_combos_that_are_free_again() {
        let mut tags = TagRegistry::new();
        let gravity = tags.intern_combo_names(&["gravity"]);
        let camera = tags.intern_combo_names(&["camera"]);
        let both = tags.intern_combo_names(&["gravity", "camera"]);

        tags.reserve(gravity);
        tags.reserve(camera);
        let released = tags.release(gravity);
        assert_eq!(released, vec![gravity]);
        assert!(!tags.is_allowed(both));
    }

    #[test]
    fn overlapping_reservations_are_counted() {
        let mut tags = TagRegistry::new();
        let gravity = tags.intern_combo_names(&["gravity"]);
        tags.reserve(gravity);
        tags.reserve(gravity);
        assert!(tags.release(gravity).is_empty());
        assert!(!tags.is_allowed(gravity));
        assert_eq!(tags.release(gravity), vec![gravity]);
        assert!(tags.is_allowed(gravity));
    }

    #[test]
    fn find_tag_does_not_intern() {
        let mut tags = TagRegistry::new();
        assert!(tags.find_tag("gravity").is_none());
        let id = tags.intern_tag("gravity");
        assert_eq!(tags.find_tag("gravity"), Some(id));
        assert!(!tags.is_reserved(id));
    }
}
