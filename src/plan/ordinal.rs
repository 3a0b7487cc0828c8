// src/plan/ordinal.rs

//! Ordinal groups: one per user-requested entry batch.

/// The n-th batch of entry tasks requested in one invocation.
///
/// The `has_*` flags track the composition of the group as members are
/// recorded. They can flip while later batches are still being added, so
/// nothing consults them until the plan is finalized.
#[derive(Debug, Clone)]
pub struct OrdinalGroup {
    ordinal: usize,
    has_outputs: bool,
    has_destroyables: bool,
}

impl OrdinalGroup {
    fn new(ordinal: usize) -> Self {
        Self {
            ordinal,
            has_outputs: false,
            has_destroyables: false,
        }
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub(crate) fn record_producer_member(&mut self) {
        self.has_outputs = true;
    }

    pub(crate) fn record_destroyer_member(&mut self) {
        self.has_destroyables = true;
    }

    pub fn has_outputs(&self) -> bool {
        self.has_outputs
    }

    pub fn has_destroyables(&self) -> bool {
        self.has_destroyables
    }

    /// This batch destroys but does not produce.
    pub fn has_destroyables_only(&self) -> bool {
        self.has_destroyables && !self.has_outputs
    }

    /// This batch produces but does not destroy.
    pub fn has_outputs_only(&self) -> bool {
        self.has_outputs && !self.has_destroyables
    }
}

/// Cache of ordinal groups, keyed by ordinal number.
///
/// Ordinals are requested in non-decreasing order as batches are added to
/// the plan; this is caller discipline, not enforced here.
#[derive(Debug, Default)]
pub struct OrdinalGroupFactory {
    groups: Vec<OrdinalGroup>,
}

impl OrdinalGroupFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached group for `ordinal`, created if absent.
    pub fn group(&mut self, ordinal: usize) -> &mut OrdinalGroup {
        while self.groups.len() <= ordinal {
            self.groups.push(OrdinalGroup::new(self.groups.len()));
        }
        &mut self.groups[ordinal]
    }

    /// All groups in ordinal order, for diagnostics.
    pub fn all_groups(&self) -> impl Iterator<Item = &OrdinalGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Clear all groups; used when the plan is rebuilt.
    pub fn reset(&mut self) {
        self.groups.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_is_cached_and_created_lazily() {
        let mut factory = OrdinalGroupFactory::new();
        assert_eq!(factory.group(2).ordinal(), 2);
        assert_eq!(factory.len(), 3);

        factory.group(1).record_producer_member();
        assert!(factory.group(1).has_outputs_only());
    }

    #[test]
    fn flags_flip_as_members_are_recorded() {
        let mut factory = OrdinalGroupFactory::new();

        factory.group(0).record_destroyer_member();
        assert!(factory.group(0).has_destroyables_only());

        // A producer discovered later flips the "destroyables only" view.
        factory.group(0).record_producer_member();
        assert!(!factory.group(0).has_destroyables_only());
        assert!(!factory.group(0).has_outputs_only());
    }

    #[test]
    fn reset_clears_all_groups() {
        let mut factory = OrdinalGroupFactory::new();
        factory.group(3);
        factory.reset();
        assert!(factory.is_empty());
    }
}
