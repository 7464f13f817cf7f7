use std::{
    fmt::Debug,
    marker::PhantomData,
    ops::{Index, IndexMut},
};

use cranelift_entity::EntityRef;

/// Owner of every value allocated for one grammar or one parse.
///
/// Values are addressed by typed keys relative to the arena, so a key can never outlive the
/// storage it points into: dropping the arena releases everything at once and the keys that
/// remain are plain numbers that no other arena will accept as its own type.
///
/// The backing storage is created lazily, an empty arena does not allocate.
pub struct Arena<K, T> {
    items: Vec<T>,
    spooky: PhantomData<K>,
}

impl<K, T> Default for Arena<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> Arena<K, T> {
    pub const fn new() -> Self {
        Arena {
            items: Vec::new(),
            spooky: PhantomData,
        }
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    pub fn clear(&mut self) {
        self.items.clear();
    }
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
    /// Converts every value while keeping the keys valid.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Arena<K, U> {
        Arena {
            items: self.items.into_iter().map(f).collect(),
            spooky: PhantomData,
        }
    }
}

impl<K: EntityRef, T> Arena<K, T> {
    pub fn alloc(&mut self, value: T) -> K {
        let key = K::new(self.items.len());
        self.items.push(value);
        key
    }
    pub fn next_key(&self) -> K {
        K::new(self.items.len())
    }
    pub fn contains(&self, key: K) -> bool {
        key.index() < self.items.len()
    }
    pub fn get(&self, key: K) -> Option<&T> {
        self.items.get(key.index())
    }
    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.items.get_mut(key.index())
    }
    pub fn last_key(&self) -> Option<K> {
        self.items.len().checked_sub(1).map(K::new)
    }
    /// Removes the most recently allocated value.
    pub fn pop(&mut self) -> Option<(K, T)> {
        let value = self.items.pop()?;
        Some((K::new(self.items.len()), value))
    }
    pub fn iter_kv(
        &self,
    ) -> impl Iterator<Item = (K, &T)> + Clone + ExactSizeIterator + DoubleEndedIterator {
        self.items.iter().enumerate().map(|(i, t)| (K::new(i), t))
    }
    pub fn keys(
        &self,
    ) -> impl Iterator<Item = K> + Clone + ExactSizeIterator + DoubleEndedIterator {
        (0..self.items.len()).map(K::new)
    }
}

impl<K: EntityRef, T> Index<K> for Arena<K, T> {
    type Output = T;
    fn index(&self, index: K) -> &Self::Output {
        &self.items[index.index()]
    }
}

impl<K: EntityRef, T> IndexMut<K> for Arena<K, T> {
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        &mut self.items[index.index()]
    }
}

impl<K, T: Debug> Debug for Arena<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<K, T: Clone> Clone for Arena<K, T> {
    fn clone(&self) -> Self {
        Arena {
            items: self.items.clone(),
            spooky: PhantomData,
        }
    }
}
