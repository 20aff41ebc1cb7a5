//! # MediNodus存储模块
//!
//! 负责上传图片的落盘存储。

pub mod storage;

pub use storage::*;
