//! Binding slot bookkeeping for one target.
//!
//! Slots are grouped into independent ranges keyed by [`SlotKey`]: one range
//! per descriptor set under the descriptor-set model, one per register class
//! and space under the register-class model.

use std::fmt;

use rustc_hash::FxHashMap;
use shadelink_core::{ParameterCategory, RegisterClass};
use shadelink_registry::BindingModel;

/// Identifies one independent range of binding slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    /// Register class, `None` under the descriptor-set model.
    pub class: Option<RegisterClass>,
    pub space: u32,
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class {
            Some(class) => write!(f, "{}/space{}", class.letter(), self.space),
            None => write!(f, "set{}", self.space),
        }
    }
}

/// A claimed range of slots. `start + count` always fits in a `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Claim {
    start: u32,
    count: u32,
    owner: usize,
}

impl Claim {
    fn end(&self) -> u32 {
        self.start + self.count
    }

    /// Whether this claim shares a slot with `start..end`.
    fn overlaps(&self, start: u32, end: u32) -> bool {
        start < self.end() && self.start < end
    }
}

/// An explicit claim overlapped an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    /// Owner of the range that was already claimed.
    pub owner: usize,
    /// First slot both ranges cover.
    pub index: u32,
}

/// Why an explicit claim was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimError {
    Collision(Collision),
    /// The range runs past the last representable slot.
    OutOfRange,
}

/// Hands out binding slots, explicit claims first, then first-fit.
#[derive(Debug, Clone)]
pub struct BindingAllocator {
    model: BindingModel,
    claims: FxHashMap<SlotKey, Vec<Claim>>,
}

impl BindingAllocator {
    pub fn new(model: BindingModel) -> Self {
        Self {
            model,
            claims: FxHashMap::default(),
        }
    }

    pub fn model(&self) -> BindingModel {
        self.model
    }

    /// The slot range a parameter of `category` in `space` draws from.
    pub fn key(&self, category: ParameterCategory, space: u32) -> SlotKey {
        let class = match self.model {
            BindingModel::DescriptorSets => None,
            BindingModel::RegisterClasses => category.register_class(),
        };
        SlotKey { class, space }
    }

    /// Claim `count` slots starting at `start` for `owner`.
    pub fn claim(
        &mut self,
        key: SlotKey,
        start: u32,
        count: u32,
        owner: usize,
    ) -> Result<(), ClaimError> {
        let end = start.checked_add(count).ok_or(ClaimError::OutOfRange)?;
        let claims = self.claims.entry(key).or_default();
        if let Some(existing) = claims.iter().find(|c| c.overlaps(start, end)) {
            return Err(ClaimError::Collision(Collision {
                owner: existing.owner,
                index: start.max(existing.start),
            }));
        }
        let at = claims.partition_point(|c| c.start < start);
        claims.insert(at, Claim { start, count, owner });
        Ok(())
    }

    /// Claim the lowest free run of `count` slots and return its start.
    ///
    /// Returns `None` when no such run is left in `key`.
    pub fn allocate(&mut self, key: SlotKey, count: u32, owner: usize) -> Option<u32> {
        let claims = self.claims.entry(key).or_default();
        let mut start = 0u32;
        let mut at = 0;
        for (i, claim) in claims.iter().enumerate() {
            if start.checked_add(count)? <= claim.start {
                break;
            }
            start = start.max(claim.end());
            at = i + 1;
        }
        start.checked_add(count)?;
        claims.insert(at, Claim { start, count, owner });
        Some(start)
    }

    /// Owner of `slot` in `key`, if claimed.
    pub fn owner_of(&self, key: SlotKey, slot: u32) -> Option<usize> {
        let end = slot.checked_add(1)?;
        self.claims
            .get(&key)?
            .iter()
            .find(|c| c.overlaps(slot, end))
            .map(|c| c.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_model_shares_one_range_per_set() {
        let allocator = BindingAllocator::new(BindingModel::DescriptorSets);
        assert_eq!(
            allocator.key(ParameterCategory::ShaderResource, 1),
            allocator.key(ParameterCategory::Sampler, 1)
        );
        assert_ne!(
            allocator.key(ParameterCategory::ShaderResource, 0),
            allocator.key(ParameterCategory::ShaderResource, 1)
        );
    }

    #[test]
    fn register_model_separates_classes() {
        let allocator = BindingAllocator::new(BindingModel::RegisterClasses);
        let t = allocator.key(ParameterCategory::ShaderResource, 0);
        let s = allocator.key(ParameterCategory::Sampler, 0);
        assert_ne!(t, s);
        assert_eq!(t.to_string(), "t/space0");
    }

    #[test]
    fn automatic_allocation_skips_explicit_claims() {
        let mut allocator = BindingAllocator::new(BindingModel::DescriptorSets);
        let key = allocator.key(ParameterCategory::ShaderResource, 0);
        allocator.claim(key, 0, 1, 0).unwrap();
        allocator.claim(key, 3, 1, 1).unwrap();

        assert_eq!(allocator.allocate(key, 1, 2), Some(1));
        assert_eq!(allocator.allocate(key, 2, 3), Some(4));
        assert_eq!(allocator.allocate(key, 1, 4), Some(2));
        assert_eq!(allocator.owner_of(key, 5), Some(3));
    }

    #[test]
    fn overlapping_claims_collide() {
        let mut allocator = BindingAllocator::new(BindingModel::DescriptorSets);
        let key = allocator.key(ParameterCategory::ShaderResource, 0);
        allocator.claim(key, 2, 4, 7).unwrap();
        assert_eq!(
            allocator.claim(key, 5, 1, 8),
            Err(ClaimError::Collision(Collision { owner: 7, index: 5 }))
        );
        assert_eq!(
            allocator.claim(key, 0, 3, 9),
            Err(ClaimError::Collision(Collision { owner: 7, index: 2 }))
        );
        assert!(allocator.claim(key, 6, 1, 10).is_ok());
    }

    #[test]
    fn allocation_never_runs_past_the_last_slot() {
        let mut allocator = BindingAllocator::new(BindingModel::DescriptorSets);
        let key = allocator.key(ParameterCategory::ShaderResource, 0);
        assert_eq!(allocator.allocate(key, u32::MAX, 0), Some(0));
        assert_eq!(allocator.allocate(key, 1, 1), None);
        assert_eq!(allocator.allocate(key, 1, 2), None);
        assert_eq!(allocator.owner_of(key, u32::MAX - 1), Some(0));
        assert_eq!(allocator.owner_of(key, u32::MAX), None);
    }

    #[test]
    fn allocation_uses_the_gap_below_a_high_claim() {
        let mut allocator = BindingAllocator::new(BindingModel::RegisterClasses);
        let key = allocator.key(ParameterCategory::Sampler, 0);
        allocator.claim(key, u32::MAX - 1, 1, 0).unwrap();
        assert_eq!(allocator.allocate(key, 2, 1), Some(0));
        assert_eq!(
            allocator.claim(key, u32::MAX - 1, 2, 2),
            Err(ClaimError::OutOfRange)
        );
    }
}
