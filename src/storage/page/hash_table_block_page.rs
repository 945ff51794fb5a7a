use std::mem;

use serde::{Deserialize, Serialize};

use crate::common::hash::HashKeyType;
use crate::common::{StorageResult, ValueType};
use crate::storage::page::page::PAGE_SIZE;

#[derive(Serialize, Deserialize, Clone, Default)]
#[serde(bound = "")]
struct MappingType<K: HashKeyType, V: ValueType> {
    key: K,
    value: V,
}

/// One bucket worth of slots: an `occupied` bitmap (slot was ever written),
/// a `readable` bitmap (slot currently holds a live pair) and the slot
/// array itself. A removed slot keeps `occupied` set so probe chains stay
/// intact.
pub struct HashTableBlockPage<K: HashKeyType, V: ValueType> {
    occupied: Vec<u8>,
    readable: Vec<u8>,
    array: Vec<MappingType<K, V>>,
}

impl<K: HashKeyType, V: ValueType> HashTableBlockPage<K, V> {
    pub fn new() -> HashTableBlockPage<K, V> {
        let size = HashTableBlockPage::<K, V>::get_slot_size();
        HashTableBlockPage {
            occupied: vec![0; (size - 1) / 8 + 1],
            readable: vec![0; (size - 1) / 8 + 1],
            array: vec![MappingType::default(); size],
        }
    }

    /// Slots per block: each slot costs its serialized width plus two bitmap
    /// bits, so `4 * PAGE_SIZE / (4 * slot_width + 1)` of them fill a page.
    pub fn get_slot_size() -> usize {
        4 * PAGE_SIZE / (4 * mem::size_of::<MappingType<K, V>>() + 1)
    }

    pub fn occupied(&self, slot_idx: usize) -> bool {
        (self.occupied[slot_idx / 8] >> (slot_idx % 8)) & 0x1 == 0x1
    }

    pub fn readable(&self, slot_idx: usize) -> bool {
        (self.readable[slot_idx / 8] >> (slot_idx % 8)) & 0x1 == 0x1
    }

    pub fn key_at(&self, slot_idx: usize) -> K {
        self.array[slot_idx].key.clone()
    }

    pub fn value_at(&self, slot_idx: usize) -> V {
        self.array[slot_idx].value.clone()
    }

    /// Stores `(key, value)` at `slot_idx` iff the slot was never occupied.
    pub fn insert(&mut self, slot_idx: usize, key: K, value: V) -> bool {
        if self.occupied(slot_idx) {
            return false;
        }

        self.occupied[slot_idx / 8] |= 0x1 << (slot_idx % 8);
        self.readable[slot_idx / 8] |= 0x1 << (slot_idx % 8);
        self.array[slot_idx] = MappingType { key, value };
        true
    }

    /// Tombstones the slot: clears `readable`, leaves `occupied` set.
    pub fn remove(&mut self, slot_idx: usize) {
        self.readable[slot_idx / 8] &= !(0x1 << (slot_idx % 8));
    }

    /// Renders the full page image: both bitmaps, then the slots at a fixed
    /// stride of the in-memory slot width.
    pub fn serialize(&self) -> StorageResult<Vec<u8>> {
        let mut data = vec![0u8; PAGE_SIZE];
        let bitmap_len = self.occupied.len();
        data[..bitmap_len].copy_from_slice(&self.occupied);
        data[bitmap_len..2 * bitmap_len].copy_from_slice(&self.readable);

        let stride = mem::size_of::<MappingType<K, V>>();
        let base = 2 * bitmap_len;
        for (i, slot) in self.array.iter().enumerate() {
            let raw = bincode::serialize(slot)?;
            let start = base + i * stride;
            data[start..start + raw.len()].copy_from_slice(&raw);
        }

        Ok(data)
    }

    pub fn deserialize(data: &[u8]) -> StorageResult<HashTableBlockPage<K, V>> {
        let size = HashTableBlockPage::<K, V>::get_slot_size();
        let bitmap_len = (size - 1) / 8 + 1;
        let occupied = data[..bitmap_len].to_vec();
        let readable = data[bitmap_len..2 * bitmap_len].to_vec();

        let stride = mem::size_of::<MappingType<K, V>>();
        let base = 2 * bitmap_len;
        let mut array = Vec::with_capacity(size);
        for i in 0..size {
            let start = base + i * stride;
            array.push(bincode::deserialize(&data[start..start + stride])?);
        }

        Ok(HashTableBlockPage {
            occupied,
            readable,
            array,
        })
    }
}

impl<K: HashKeyType, V: ValueType> Default for HashTableBlockPage<K, V> {
    fn default() -> HashTableBlockPage<K, V> {
        HashTableBlockPage::new()
    }
}
