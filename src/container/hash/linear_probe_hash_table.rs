use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::buffer::buffer_pool_manager::{BufferPoolManager, PageRef};
use crate::common::hash::{hash, HashKeyType};
use crate::common::{StorageError, StorageResult, ValueType};
use crate::container::hash::hash_table::HashTable;
use crate::container::hash::FindSlotResult;
use crate::storage::page::hash_table_block_page::HashTableBlockPage;
use crate::storage::page::hash_table_header_page::HashTableHeaderPage;
use crate::storage::page::page::PageId;

/// Linear-probing hash index persisted through the buffer pool: one header
/// page enumerating block pages, probing circular over the whole slot space.
///
/// The table latch doubles as the owner of the current header page id:
/// lookups, inserts and removes probe under the read side, resize swaps the
/// header under the write side.
pub struct LinearProbeHashTable<K: HashKeyType, V: ValueType> {
    header_pid: RwLock<PageId>,
    buffer_pool_manager: Arc<BufferPoolManager>,
    _marker: PhantomData<(K, V)>,
}

impl<K: HashKeyType, V: ValueType> LinearProbeHashTable<K, V> {
    /// Builds an empty table spanning `num_buckets` block pages.
    pub fn new(
        buffer_pool_manager: Arc<BufferPoolManager>,
        num_buckets: usize,
    ) -> StorageResult<LinearProbeHashTable<K, V>> {
        let header_pid = Self::build_table(&buffer_pool_manager, num_buckets)?;

        Ok(LinearProbeHashTable {
            header_pid: RwLock::new(header_pid),
            buffer_pool_manager,
            _marker: PhantomData,
        })
    }

    /// Logical capacity in slots, not occupancy.
    pub fn get_size(&self) -> StorageResult<usize> {
        let header_pid = self.header_pid.read().unwrap();
        let header = self.read_header(*header_pid)?;
        Ok(header.num_blocks() * HashTableBlockPage::<K, V>::get_slot_size())
    }

    /// Rebuilds the table over fresh block pages with at least
    /// `2 * initial_size` slots, re-inserting every live pair and
    /// deallocating the old pages. Exclusive: all other operations wait.
    pub fn resize(&self, initial_size: usize) -> StorageResult<()> {
        let mut header_pid = self.header_pid.write().unwrap();
        let old_pid = *header_pid;
        let old_header = self.read_header(old_pid)?;

        let block_size = HashTableBlockPage::<K, V>::get_slot_size();
        let new_bucket_count = (2 * initial_size + block_size - 1) / block_size;
        debug!(
            old_capacity = old_header.num_blocks() * block_size,
            new_capacity = new_bucket_count * block_size,
            "resizing hash table"
        );

        let new_pid = Self::build_table(&self.buffer_pool_manager, new_bucket_count)?;
        *header_pid = new_pid;

        for block_idx in 0..old_header.num_blocks() {
            let block_pid = old_header.get_block_page_id(block_idx);
            let block = self.read_block(block_pid)?;
            for offset in 0..block_size {
                if block.readable(offset) {
                    self.internal_insert(new_pid, &block.key_at(offset), &block.value_at(offset))?;
                }
            }
            self.buffer_pool_manager.delete_page(block_pid)?;
        }
        self.buffer_pool_manager.delete_page(old_pid)?;
        Ok(())
    }

    // Allocates and persists a header page plus its zeroed block pages,
    // returning the header page id.
    fn build_table(
        buffer_pool_manager: &Arc<BufferPoolManager>,
        num_buckets: usize,
    ) -> StorageResult<PageId> {
        let header_page = Self::new_pool_page(buffer_pool_manager)?;
        let header_pid = header_page.read().unwrap().get_id();

        let mut header = HashTableHeaderPage::new(header_pid, num_buckets);
        while header.num_blocks() < header.get_size() {
            let block_page = Self::new_pool_page(buffer_pool_manager)?;
            let block_pid = block_page.read().unwrap().get_id();
            header.add_block_page_id(block_pid)?;
            // unpin dirty: the disk manager may have recycled this id, and
            // the zeroed image must win over whatever the slot last held
            buffer_pool_manager.unpin_page(block_pid, true);
        }

        {
            let mut guard = header_page.write().unwrap();
            guard.get_data_mut().copy_from_slice(&header.serialize()?);
        }
        buffer_pool_manager.unpin_page(header_pid, true);
        Ok(header_pid)
    }

    // Probes for a free slot starting at the key's hash position. Reports
    // `Duplicated` when the identical pair is met on the way and `NotFound`
    // after a full revolution (the caller resizes and retries).
    fn internal_insert(
        &self,
        header_pid: PageId,
        key: &K,
        value: &V,
    ) -> StorageResult<FindSlotResult<()>> {
        let header = self.read_header(header_pid)?;
        let block_size = HashTableBlockPage::<K, V>::get_slot_size();
        let capacity = header.num_blocks() * block_size;
        let start = hash(key) as usize % capacity;

        let mut slot = start;
        loop {
            let block_idx = slot / block_size;
            let block_pid = header.get_block_page_id(block_idx);
            let page = self.fetch(block_pid)?;
            let mut guard = page.write().unwrap();
            let mut block = HashTableBlockPage::<K, V>::deserialize(guard.get_data())?;

            loop {
                let offset = slot % block_size;
                if block.insert(offset, key.clone(), value.clone()) {
                    guard.get_data_mut().copy_from_slice(&block.serialize()?);
                    drop(guard);
                    self.buffer_pool_manager.unpin_page(block_pid, true);
                    return Ok(FindSlotResult::Found(()));
                }
                if block.key_at(offset) == *key && block.value_at(offset) == *value {
                    drop(guard);
                    self.buffer_pool_manager.unpin_page(block_pid, false);
                    return Ok(FindSlotResult::Duplicated);
                }

                slot = (slot + 1) % capacity;
                if slot == start {
                    drop(guard);
                    self.buffer_pool_manager.unpin_page(block_pid, false);
                    return Ok(FindSlotResult::NotFound);
                }
                if slot / block_size != block_idx {
                    drop(guard);
                    self.buffer_pool_manager.unpin_page(block_pid, false);
                    break;
                }
            }
        }
    }

    fn read_header(&self, header_pid: PageId) -> StorageResult<HashTableHeaderPage> {
        let page = self.fetch(header_pid)?;
        let header = {
            let guard = page.read().unwrap();
            HashTableHeaderPage::deserialize(guard.get_data())
        };
        self.buffer_pool_manager.unpin_page(header_pid, false);
        Ok(header?)
    }

    fn read_block(&self, block_pid: PageId) -> StorageResult<HashTableBlockPage<K, V>> {
        let page = self.fetch(block_pid)?;
        let block = {
            let guard = page.read().unwrap();
            HashTableBlockPage::deserialize(guard.get_data())
        };
        self.buffer_pool_manager.unpin_page(block_pid, false);
        Ok(block?)
    }

    fn fetch(&self, page_id: PageId) -> StorageResult<PageRef> {
        self.buffer_pool_manager
            .fetch_page(page_id)?
            .ok_or(StorageError::BufferPoolFull)
    }

    fn new_pool_page(buffer_pool_manager: &Arc<BufferPoolManager>) -> StorageResult<PageRef> {
        buffer_pool_manager
            .new_page()?
            .ok_or(StorageError::BufferPoolFull)
    }
}

impl<K: HashKeyType, V: ValueType> HashTable<K, V> for LinearProbeHashTable<K, V> {
    fn insert(&self, key: &K, value: &V) -> StorageResult<bool> {
        loop {
            let outcome = {
                let header_pid = self.header_pid.read().unwrap();
                self.internal_insert(*header_pid, key, value)?
            };

            match outcome {
                FindSlotResult::Found(()) => return Ok(true),
                FindSlotResult::Duplicated => return Ok(false),
                FindSlotResult::NotFound => self.resize(self.get_size()?)?,
            }
        }
    }

    fn remove(&self, key: &K, value: &V) -> StorageResult<bool> {
        let header_pid = self.header_pid.read().unwrap();
        let header = self.read_header(*header_pid)?;
        let block_size = HashTableBlockPage::<K, V>::get_slot_size();
        let capacity = header.num_blocks() * block_size;
        let start = hash(key) as usize % capacity;

        let mut slot = start;
        loop {
            let block_idx = slot / block_size;
            let block_pid = header.get_block_page_id(block_idx);
            let page = self.fetch(block_pid)?;
            let mut guard = page.write().unwrap();
            let mut block = HashTableBlockPage::<K, V>::deserialize(guard.get_data())?;

            loop {
                let offset = slot % block_size;
                if !block.occupied(offset) {
                    drop(guard);
                    self.buffer_pool_manager.unpin_page(block_pid, false);
                    return Ok(false);
                }
                if block.key_at(offset) == *key && block.value_at(offset) == *value {
                    if !block.readable(offset) {
                        // already a tombstone
                        drop(guard);
                        self.buffer_pool_manager.unpin_page(block_pid, false);
                        return Ok(false);
                    }
                    block.remove(offset);
                    guard.get_data_mut().copy_from_slice(&block.serialize()?);
                    drop(guard);
                    self.buffer_pool_manager.unpin_page(block_pid, true);
                    return Ok(true);
                }

                slot = (slot + 1) % capacity;
                if slot == start {
                    drop(guard);
                    self.buffer_pool_manager.unpin_page(block_pid, false);
                    return Ok(false);
                }
                if slot / block_size != block_idx {
                    drop(guard);
                    self.buffer_pool_manager.unpin_page(block_pid, false);
                    break;
                }
            }
        }
    }

    fn get_value(&self, key: &K) -> StorageResult<Vec<V>> {
        let header_pid = self.header_pid.read().unwrap();
        let header = self.read_header(*header_pid)?;
        let block_size = HashTableBlockPage::<K, V>::get_slot_size();
        let capacity = header.num_blocks() * block_size;
        let start = hash(key) as usize % capacity;

        let mut result = vec![];
        let mut slot = start;
        let mut block_idx = slot / block_size;
        let mut block = self.read_block(header.get_block_page_id(block_idx))?;
        loop {
            let offset = slot % block_size;
            if !block.occupied(offset) {
                break;
            }
            if block.readable(offset) && block.key_at(offset) == *key {
                result.push(block.value_at(offset));
            }

            slot = (slot + 1) % capacity;
            if slot == start {
                break;
            }
            if slot / block_size != block_idx {
                block_idx = slot / block_size;
                block = self.read_block(header.get_block_page_id(block_idx))?;
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{KeyType, Rid};
    use serde::{Deserialize, Serialize};
    use std::hash::{Hash, Hasher};

    // every ClashKey hashes to the same slot, so probe chains are forced
    #[derive(Serialize, Deserialize, Clone, Default, PartialEq, Debug)]
    struct ClashKey(u32);

    impl Hash for ClashKey {
        fn hash<H: Hasher>(&self, state: &mut H) {
            state.write_u8(0);
        }
    }
    impl KeyType for ClashKey {}
    impl HashKeyType for ClashKey {}

    fn new_table<K: HashKeyType, V: ValueType>(
        pool_size: usize,
        num_buckets: usize,
    ) -> LinearProbeHashTable<K, V> {
        let bpm = Arc::new(BufferPoolManager::new_default(pool_size));
        LinearProbeHashTable::new(bpm, num_buckets).unwrap()
    }

    #[test]
    fn should_report_logical_capacity() {
        let table: LinearProbeHashTable<u64, u64> = new_table(10, 2);

        let block_size = HashTableBlockPage::<u64, u64>::get_slot_size();
        assert_eq!(table.get_size().unwrap(), 2 * block_size);
    }

    #[test]
    fn should_return_empty_for_absent_key() {
        let table: LinearProbeHashTable<u64, u64> = new_table(10, 1);

        assert!(table.get_value(&42).unwrap().is_empty());
    }

    #[test]
    fn should_insert_then_get_back() {
        let table: LinearProbeHashTable<u64, u64> = new_table(10, 1);

        assert!(table.insert(&1, &100).unwrap());
        assert!(table.insert(&2, &200).unwrap());

        assert_eq!(table.get_value(&1).unwrap(), vec![100]);
        assert_eq!(table.get_value(&2).unwrap(), vec![200]);
    }

    #[test]
    fn should_suppress_duplicate_pair_but_allow_second_value() {
        let table: LinearProbeHashTable<u64, u64> = new_table(10, 1);

        assert!(table.insert(&5, &7).unwrap());
        assert!(!table.insert(&5, &7).unwrap());
        assert!(table.insert(&5, &8).unwrap());

        let mut values = table.get_value(&5).unwrap();
        values.sort_unstable();
        assert_eq!(values, vec![7, 8]);
    }

    #[test]
    fn should_remove_exact_pair_only() {
        let table: LinearProbeHashTable<u64, u64> = new_table(10, 1);

        table.insert(&5, &7).unwrap();

        assert!(!table.remove(&5, &9).unwrap());
        assert!(!table.remove(&6, &7).unwrap());
        assert!(table.remove(&5, &7).unwrap());
        assert!(table.get_value(&5).unwrap().is_empty());

        // second remove hits the tombstone
        assert!(!table.remove(&5, &7).unwrap());
    }

    #[test]
    fn should_keep_probe_chain_across_tombstone() {
        // given two colliding keys, the second displaced past the first
        let table: LinearProbeHashTable<ClashKey, u64> = new_table(10, 1);
        table.insert(&ClashKey(1), &10).unwrap();
        table.insert(&ClashKey(2), &20).unwrap();

        // when the first is tombstoned
        assert!(table.remove(&ClashKey(1), &10).unwrap());

        // then the second is still reachable through the tombstone
        assert_eq!(table.get_value(&ClashKey(2)).unwrap(), vec![20]);
        assert!(table.get_value(&ClashKey(1)).unwrap().is_empty());
    }

    #[test]
    fn should_resize_to_double_capacity_when_full() {
        // given a one-block table filled to the brim with one key's values
        let table: LinearProbeHashTable<ClashKey, u32> = new_table(10, 1);
        let capacity = table.get_size().unwrap();
        for v in 0..capacity as u32 {
            assert!(table.insert(&ClashKey(5), &v).unwrap());
        }

        // when one more pair arrives
        assert!(table.insert(&ClashKey(5), &(capacity as u32)).unwrap());

        // then the table doubled and kept everything
        assert_eq!(table.get_size().unwrap(), 2 * capacity);
        let values = table.get_value(&ClashKey(5)).unwrap();
        assert_eq!(values.len(), capacity + 1);
    }

    #[test]
    fn should_store_record_ids_as_values() {
        let table: LinearProbeHashTable<u64, Rid> = new_table(10, 1);
        let rid = Rid {
            page_id: 3,
            slot_num: 9,
        };

        assert!(table.insert(&77, &rid).unwrap());
        assert_eq!(table.get_value(&77).unwrap(), vec![rid]);
    }

    #[test]
    fn should_wrap_probe_around_capacity() {
        let table: LinearProbeHashTable<ClashKey, u32> = new_table(10, 1);
        let capacity = table.get_size().unwrap();

        // fill everything after (and including) the clash slot, forcing the
        // last insert to wrap to the slots before it
        for v in 0..capacity as u32 {
            table.insert(&ClashKey(9), &v).unwrap();
        }

        let values = table.get_value(&ClashKey(9)).unwrap();
        assert_eq!(values.len(), capacity);
    }
}
