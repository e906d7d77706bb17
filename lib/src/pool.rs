//! Fixed-capacity slot storage with a free-list.
//!
//! Slots are addressed by [`SlotIndex`], an index paired with the
//! generation of the slot when it was handed out. Removing an item bumps
//! the slot's generation, so an old index to a reused slot never
//! resolves to the new occupant.
//!
//! Iteration follows the order in which items were inserted. Removal
//! only blanks the entry in that order list; [`Pool::compact`] squeezes
//! the blanks out afterwards, keeping the relative order of the rest.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotIndex {
    pub index: u32,
    pub generation: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    order: Vec<Option<u32>>,
    len: usize,
}

impl<T> Pool<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                generation: 0,
                value: None,
            })
            .collect();
        Self {
            slots,
            // Popped from the back, so slot 0 is handed out first.
            free: (0..capacity as u32).rev().collect(),
            order: Vec::with_capacity(capacity),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Take a slot off the free-list. Hands the value back when full.
    pub fn insert(&mut self, value: T) -> Result<SlotIndex, T> {
        let Some(index) = self.free.pop() else {
            return Err(value);
        };
        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        self.order.push(Some(index));
        self.len += 1;
        Ok(SlotIndex {
            index,
            generation: slot.generation,
        })
    }

    pub fn remove(&mut self, idx: SlotIndex) -> Option<T> {
        let slot = self.slots.get_mut(idx.index as usize)?;
        if slot.generation != idx.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(idx.index);
        self.len -= 1;
        if let Some(entry) = self.order.iter_mut().find(|e| **e == Some(idx.index)) {
            *entry = None;
        }
        Some(value)
    }

    pub fn contains(&self, idx: SlotIndex) -> bool {
        self.get(idx).is_some()
    }

    pub fn get(&self, idx: SlotIndex) -> Option<&T> {
        let slot = self.slots.get(idx.index as usize)?;
        if slot.generation != idx.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, idx: SlotIndex) -> Option<&mut T> {
        let slot = self.slots.get_mut(idx.index as usize)?;
        if slot.generation != idx.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Whether a removal has left a blank in the iteration order.
    pub fn needs_compaction(&self) -> bool {
        self.order.len() != self.len
    }

    pub fn compact(&mut self) {
        self.order.retain(Option::is_some);
    }

    pub fn indices(&self) -> Vec<SlotIndex> {
        self.order
            .iter()
            .flatten()
            .map(|&index| SlotIndex {
                index,
                generation: self.slots[index as usize].generation,
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, &T)> {
        self.order.iter().flatten().filter_map(|&index| {
            let slot = &self.slots[index as usize];
            slot.value.as_ref().map(|v| {
                (
                    SlotIndex {
                        index,
                        generation: slot.generation,
                    },
                    v,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotIndex, &mut T)> {
        let mut slots: Vec<Option<&mut Slot<T>>> = self.slots.iter_mut().map(Some).collect();
        let mut out = Vec::with_capacity(self.len);
        for &index in self.order.iter().flatten() {
            let Some(slot) = slots[index as usize].take() else {
                continue;
            };
            let generation = slot.generation;
            if let Some(v) = slot.value.as_mut() {
                out.push((SlotIndex { index, generation }, v));
            }
        }
        out.into_iter()
    }
}
