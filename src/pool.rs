//! Particle slot storage: a system-owned arena plus per-emitter
//! free-lists of retired slots.

use crate::particle::Particle;

/// Owns every particle slot in the system. Live and pooled particles
/// both occupy slots; the free list tracks slots with no particle at
/// all. Indices are stable for the lifetime of the occupying particle.
#[derive(Debug, Default)]
pub(crate) struct ParticleArena {
    slots: Vec<Option<Particle>>,
    free: Vec<usize>,
}

impl ParticleArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a particle, reusing a freed slot when one exists
    pub fn insert(&mut self, particle: Particle) -> usize {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(particle);
                index
            }
            None => {
                self.slots.push(Some(particle));
                self.slots.len() - 1
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&Particle> {
        self.slots.get(index).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Particle> {
        self.slots.get_mut(index).and_then(|slot| slot.as_mut())
    }

    /// Drop the particle and return the slot to the free list
    pub fn release(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.take().is_some() {
                self.free.push(index);
            }
        }
    }

    /// Number of slots currently holding a particle (live or pooled)
    #[cfg(test)]
    pub fn occupied(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

/// Per-emitter cache of retired particle slots, most recently retired
/// first. The owning system enforces the global pooled budget; this type
/// only enforces the per-emitter limit.
#[derive(Debug)]
pub(crate) struct ParticlePool {
    indices: Vec<usize>,
    limit: usize,
}

impl ParticlePool {
    pub fn new(limit: usize) -> Self {
        ParticlePool {
            indices: Vec::new(),
            limit,
        }
    }

    /// True when the per-emitter limit leaves room for another slot
    pub fn has_room(&self) -> bool {
        self.indices.len() < self.limit
    }

    /// Accept a retired slot. Callers check [`ParticlePool::has_room`]
    /// and the global budget first.
    pub fn push(&mut self, index: usize) {
        self.indices.push(index);
    }

    /// Most recently retired slot, if any
    pub fn pop(&mut self) -> Option<usize> {
        self.indices.pop()
    }

    /// Empty the pool, yielding the slots it held
    pub fn drain(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.indices)
    }
}
