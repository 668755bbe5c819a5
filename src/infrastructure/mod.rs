pub mod encryption;
pub mod hex_codec;
pub mod key_store;
pub mod logging;
pub mod secure_store;

pub use key_store::SecureKeyStore;
pub use secure_store::{EncryptedFileSecureStore, InMemorySecureStore, SecureStore, StoreOp};
