use std::sync::Arc;
use std::thread;

use burrowdb::buffer::buffer_pool_manager::BufferPoolManager;
use burrowdb::container::hash::hash_table::HashTable;
use burrowdb::container::hash::linear_probe_hash_table::LinearProbeHashTable;

const THREADS: u64 = 4;
const KEYS_PER_THREAD: u64 = 100;

fn new_table(pool_size: usize, num_buckets: usize) -> Arc<LinearProbeHashTable<u64, u64>> {
    let bpm = Arc::new(BufferPoolManager::new_default(pool_size));
    Arc::new(LinearProbeHashTable::new(bpm, num_buckets).unwrap())
}

#[test]
fn test_concurrent_disjoint_inserts() {
    let table = new_table(32, 4);

    let mut handles = vec![];
    for t in 0..THREADS {
        let table = table.clone();
        handles.push(thread::spawn(move || {
            for k in t * KEYS_PER_THREAD..(t + 1) * KEYS_PER_THREAD {
                assert!(table.insert(&k, &(k * 2)).unwrap());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for k in 0..THREADS * KEYS_PER_THREAD {
        assert_eq!(table.get_value(&k).unwrap(), vec![k * 2]);
    }
}

#[test]
fn test_concurrent_inserts_through_resize() {
    // a single bucket, so the combined load forces at least one resize while
    // other writers keep arriving
    let table = new_table(32, 1);

    let mut handles = vec![];
    for t in 0..THREADS {
        let table = table.clone();
        handles.push(thread::spawn(move || {
            for k in t * KEYS_PER_THREAD..(t + 1) * KEYS_PER_THREAD {
                assert!(table.insert(&k, &(k + 1000)).unwrap());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let initial_capacity = 252; // one block of (u64, u64) slots
    assert!(table.get_size().unwrap() >= 2 * initial_capacity);
    for k in 0..THREADS * KEYS_PER_THREAD {
        assert_eq!(table.get_value(&k).unwrap(), vec![k + 1000]);
    }
}

#[test]
fn test_concurrent_readers_and_writers() {
    let table = new_table(32, 4);

    // readers only ever observe a key's own value, never a foreign one
    let mut handles = vec![];
    for t in 0..THREADS {
        let table = table.clone();
        handles.push(thread::spawn(move || {
            for k in t * KEYS_PER_THREAD..(t + 1) * KEYS_PER_THREAD {
                table.insert(&k, &(k * 10)).unwrap();
            }
        }));
    }
    for t in 0..2u64 {
        let table = table.clone();
        handles.push(thread::spawn(move || {
            for k in (t * 37)..(t * 37 + THREADS * KEYS_PER_THREAD) {
                let key = k % (THREADS * KEYS_PER_THREAD);
                for value in table.get_value(&key).unwrap() {
                    assert_eq!(value, key * 10);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for k in 0..THREADS * KEYS_PER_THREAD {
        assert_eq!(table.get_value(&k).unwrap(), vec![k * 10]);
    }
}
