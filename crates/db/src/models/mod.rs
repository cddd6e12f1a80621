pub mod message;

pub use message::{AuthorSnapshot, Message, Reaction, UserRole};
