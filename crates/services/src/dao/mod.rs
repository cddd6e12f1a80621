pub mod base;
pub mod memory;
pub mod message;

pub use base::BaseDao;
pub use memory::MemoryMessageStore;
pub use message::{MessageDao, MessageStore};
