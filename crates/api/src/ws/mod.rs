pub mod dispatcher;
pub mod handler;
pub mod protocol;
pub mod storage;
