//! Slot assignment
//!
//!     Matches a candidate pool against the slots of a selector list in one greedy pass:
//!     candidates are taken in pool order, and each goes to the first still empty slot whose
//!     selector accepts it. A candidate fills at most one slot.
//!
//!     This is first fit, not a maximum matching. With slots `[a*=x] [a=x]` and the pool
//!     `{a: x}, {a: xy}`, the first candidate takes slot 0 and `xy` fits nowhere, although giving
//!     `xy` slot 0 and `x` slot 1 would fill both. Earlier slots win; callers rely on that order.
//!
//!     Nothing is kept between passes. Calling [assign] again on the same inputs gives the same
//!     answer.

use crate::query::attributes::AttributeSource;
use crate::query::parsing::Selector;

/// Outcome of one assignment pass: for each slot, the candidate it received, if any
#[derive(Debug)]
pub struct Assignment<'p, A> {
    pool: &'p [A],
    slots: Vec<Option<usize>>,
}

impl<'p, A> Assignment<'p, A> {
    /// Candidate assigned to `slot`
    pub fn get(&self, slot: usize) -> Option<&'p A> {
        let pool = self.pool;
        self.slots
            .get(slot)
            .copied()
            .flatten()
            .map(|index| &pool[index])
    }

    /// Pool index of the candidate assigned to each slot
    pub fn indices(&self) -> &[Option<usize>] {
        &self.slots
    }

    pub fn slots(&self) -> Vec<Option<&'p A>> {
        (0..self.slots.len()).map(|slot| self.get(slot)).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Every slot received a candidate
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// No slot received a candidate
    pub fn is_vacant(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Number of slots still empty
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }
}

impl<A> Clone for Assignment<'_, A> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool,
            slots: self.slots.clone(),
        }
    }
}

/// Fill the slots of `selectors` from `pool`, first fit, in pool order
pub fn assign<'p, A: AttributeSource>(selectors: &[Selector], pool: &'p [A]) -> Assignment<'p, A> {
    let mut slots: Vec<Option<usize>> = vec![None; selectors.len()];
    for (index, candidate) in pool.iter().enumerate() {
        let open = slots
            .iter()
            .zip(selectors)
            .position(|(slot, selector)| slot.is_none() && selector.matches(candidate));
        if let Some(slot) = open {
            slots[slot] = Some(index);
        }
    }
    Assignment { pool, slots }
}
