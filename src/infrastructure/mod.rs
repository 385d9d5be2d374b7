//! 基础设施层
//!
//! 持有存储介质，只暴露"按键读写字符串"的能力

pub mod storage;

pub use storage::{FileStorage, MemoryStorage, Storage};
