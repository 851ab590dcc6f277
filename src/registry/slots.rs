//! Generation-counted slot map
//!
//! Keys carry the slot index and the generation the slot had when the value
//! was inserted. Removing a value bumps the slot's generation, so a key kept
//! past removal never matches whatever is stored in that slot later.

use std::fmt;

/// A typed key into a [`SlotMap`].
pub trait SlotKey: Copy + Eq + fmt::Debug {
    fn from_parts(index: u32, generation: u32) -> Self;
    fn index(self) -> u32;
    fn generation(self) -> u32;
}

macro_rules! slot_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl SlotKey for $name {
            fn from_parts(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            fn index(self) -> u32 {
                self.index
            }

            fn generation(self) -> u32 {
                self.generation
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}v{}", self.index, self.generation)
            }
        }
    };
}

slot_key!(
    /// Identifies one channel within a context.
    ChannelId
);
slot_key!(
    /// Identifies one registered observer within a context.
    ObserverId
);

#[derive(Debug)]
struct Slot<V> {
    generation: u32,
    value: Option<V>,
}

#[derive(Debug)]
pub struct SlotMap<K: SlotKey, V> {
    slots: Vec<Slot<V>>,
    free: Vec<u32>,
    len: usize,
    _key: std::marker::PhantomData<K>,
}

impl<K: SlotKey, V> Default for SlotMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: SlotKey, V> SlotMap<K, V> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _key: std::marker::PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, value: V) -> K {
        self.insert_with_key(|_| value)
    }

    /// Insert a value that needs to know its own key.
    pub fn insert_with_key(&mut self, make: impl FnOnce(K) -> V) -> K {
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                let key = K::from_parts(index, slot.generation);
                slot.value = Some(make(key));
                key
            }
            None => {
                let index = self.slots.len() as u32;
                let key = K::from_parts(index, 0);
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(make(key)),
                });
                key
            }
        }
    }

    fn slot(&self, key: K) -> Option<&Slot<V>> {
        self.slots
            .get(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())
    }

    pub fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: K) -> Option<&V> {
        self.slot(key).and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.slots
            .get_mut(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn remove(&mut self, key: K) -> Option<V> {
        let slot = self
            .slots
            .get_mut(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index());
        self.len -= 1;
        Some(value)
    }

    /// Snapshot of the live keys, in slot order.
    pub fn keys(&self) -> Vec<K> {
        self.iter().map(|(key, _)| key).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (K::from_parts(index as u32, slot.generation), value))
        })
    }
}
