use std::hash::{Hash, Hasher};

use fasthash::XXHasher;

use crate::common::KeyType;

/// Keys that can be placed in a hash index.
pub trait HashKeyType: KeyType + Hash {}

impl HashKeyType for i32 {}
impl HashKeyType for i64 {}
impl HashKeyType for u32 {}
impl HashKeyType for u64 {}

pub fn hash<K: HashKeyType>(key: &K) -> u64 {
    let mut hasher: XXHasher = Default::default();
    key.hash(&mut hasher);
    hasher.finish()
}
