//! Fixed-capacity slot arena.
//!
//! Each slot owns at most one native handle.  A [`SlotId`] is the slot
//! index plus the generation the slot had when the handle was stored; the
//! generation is bumped on removal, so an id kept across a delete resolves
//! to `NotFound` instead of reaching whatever handle reused the slot.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocketState {
    #[default]
    Unused,
    Used,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: u8,
    generation: u16,
}

impl SlotId {
    pub const fn index(self) -> usize {
        self.index as usize
    }

    pub const fn generation(self) -> u16 {
        self.generation
    }
}

/// One descriptor: handle plus lifecycle state.
#[derive(Debug)]
pub struct Slot<T> {
    handle: Option<T>,
    state: SocketState,
    generation: u16,
}

impl<T> Slot<T> {
    const fn vacant() -> Self {
        Self { handle: None, state: SocketState::Unused, generation: 0 }
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    pub fn set_state(&mut self, state: SocketState) {
        self.state = state;
    }

    pub fn is_used(&self) -> bool {
        self.state == SocketState::Used
    }

    /// Handle of an occupied slot.  Occupied slots always hold one.
    pub fn handle_mut(&mut self) -> Option<&mut T> {
        self.handle.as_mut()
    }
}

/// `N`-slot arena; `label` names the resource in errors.
pub struct Slots<T, const N: usize> {
    slots: [Slot<T>; N],
    label: &'static str,
}

impl<T, const N: usize> Slots<T, N> {
    pub fn new(label: &'static str) -> Self {
        Self { slots: core::array::from_fn(|_| Slot::vacant()), label }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.handle.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|s| s.handle.is_some())
    }

    /// Fail early with `ResourceExhausted` before any native call is made.
    pub fn ensure_vacancy(&self) -> Result<()> {
        if self.is_full() {
            Err(Error::ResourceExhausted(self.label))
        } else {
            Ok(())
        }
    }

    /// Store `handle` in the first vacant slot.
    pub fn insert(&mut self, handle: T, state: SocketState) -> Result<SlotId> {
        let index = self
            .slots
            .iter()
            .position(|s| s.handle.is_none())
            .ok_or(Error::ResourceExhausted(self.label))?;
        let slot = &mut self.slots[index];
        slot.handle = Some(handle);
        slot.state = state;
        Ok(SlotId { index: index as u8, generation: slot.generation })
    }

    pub fn get_mut(&mut self, id: SlotId) -> Result<&mut Slot<T>> {
        let label = self.label;
        let slot = self
            .slots
            .get_mut(id.index())
            .ok_or(Error::InvalidArgument(label))?;
        if slot.handle.is_none() || slot.generation != id.generation {
            return Err(Error::NotFound(label));
        }
        Ok(slot)
    }

    /// Take the handle out and free the slot.
    pub fn remove(&mut self, id: SlotId) -> Result<T> {
        let label = self.label;
        let slot = self.get_mut(id)?;
        let handle = slot.handle.take().ok_or(Error::NotFound(label))?;
        slot.state = SocketState::Unused;
        slot.generation = slot.generation.wrapping_add(1);
        Ok(handle)
    }

    /// Resolve a bare index (as held by scripts) to the live id.
    pub fn id_at(&self, index: i64) -> Result<SlotId> {
        let slot_index = usize::try_from(index)
            .ok()
            .filter(|i| *i < N)
            .ok_or(Error::InvalidArgument(self.label))?;
        let slot = &self.slots[slot_index];
        if slot.handle.is_none() {
            return Err(Error::NotFound(self.label));
        }
        Ok(SlotId { index: slot_index as u8, generation: slot.generation })
    }

    pub fn ids(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.slots.iter().enumerate().filter(|(_, s)| s.handle.is_some()).map(|(i, s)| SlotId {
            index: i as u8,
            generation: s.generation,
        })
    }
}
