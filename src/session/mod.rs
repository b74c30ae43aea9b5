mod store;

pub use store::{
    FileStorage, MemoryStorage, Session, StorageBackend, StorageKey, TokenStore, is_absent,
};
