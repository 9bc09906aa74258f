//! Active allocation registry.

use std::collections::BTreeMap;

use crate::callsite::CallSite;

/// Live payload addresses and the call site that allocated each one.
///
/// Ordered by address so leak reports come out ascending.
#[derive(Debug, Default)]
pub struct Registry {
    live: BTreeMap<usize, CallSite>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly returned payload.
    ///
    /// # Panics
    ///
    /// If `payload` is already live. That means the raw allocator handed out
    /// memory that is still in use, and nothing it tracks can be trusted.
    pub fn insert(&mut self, payload: usize, site: CallSite) {
        let previous = self.live.insert(payload, site);
        assert!(
            previous.is_none(),
            "payload 0x{payload:x} handed out twice by the raw allocator"
        );
    }

    /// Forget a payload, returning its call site if it was live.
    pub fn remove(&mut self, payload: usize) -> Option<CallSite> {
        self.live.remove(&payload)
    }

    #[must_use]
    pub fn contains(&self, payload: usize) -> bool {
        self.live.contains_key(&payload)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Live entries in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &CallSite)> + '_ {
        self.live.iter().map(|(&addr, site)| (addr, site))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove() {
        let mut registry = Registry::new();
        registry.insert(0x2000, CallSite::new("a.c", 1));
        assert!(registry.contains(0x2000));

        assert_eq!(registry.remove(0x2000), Some(CallSite::new("a.c", 1)));
        assert!(registry.is_empty());
        assert_eq!(registry.remove(0x2000), None);
    }

    #[test]
    fn iterates_in_address_order() {
        let mut registry = Registry::new();
        registry.insert(0x3000, CallSite::new("c.c", 3));
        registry.insert(0x1000, CallSite::new("a.c", 1));
        registry.insert(0x2000, CallSite::new("b.c", 2));

        let addrs: Vec<usize> = registry.iter().map(|(addr, _)| addr).collect();
        assert_eq!(addrs, [0x1000, 0x2000, 0x3000]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    #[should_panic(expected = "handed out twice")]
    fn duplicate_payload_panics() {
        let mut registry = Registry::new();
        registry.insert(0x1000, CallSite::new("a.c", 1));
        registry.insert(0x1000, CallSite::new("a.c", 2));
    }
}
