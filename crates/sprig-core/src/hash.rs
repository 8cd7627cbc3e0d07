use core::hash::Hash;
use std::hash::Hasher;

#[cfg(feature = "std-hash")]
pub mod default {
    pub use std::collections::hash_map::DefaultHasher;

    #[inline]
    pub fn new() -> DefaultHasher {
        DefaultHasher::new()
    }
}

#[cfg(not(feature = "std-hash"))]
pub mod default {
    pub use ahash::AHasher as DefaultHasher;

    #[inline]
    pub fn new() -> DefaultHasher {
        DefaultHasher::default()
    }
}

/// Hashes an author-supplied key into the slot key stored by the instance tree.
#[inline]
pub fn hash_key<T: Hash + ?Sized>(key: &T) -> crate::Key {
    let mut hasher = default::new();
    key.hash(&mut hasher);
    hasher.finish()
}
