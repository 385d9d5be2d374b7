//! 键值存储 - 基础设施层
//!
//! 一个扁平的字符串键空间，值也是字符串。
//! 只负责读写，不认识 CachedDocument，也不做 JSON 编解码。

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::{AppError, AppResult, StorageError};

/// 存储后端
///
/// 职责：
/// - 持有唯一的存储介质（内存表或磁盘目录）
/// - 对同一介质的访问由后端自己串行化
/// - 不关心键的含义
pub trait Storage: Send + Sync {
    /// 读取键，不存在时返回 `None`
    fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// 写入键（覆盖）
    fn set(&self, key: &str, value: &str) -> AppResult<()>;

    /// 删除键，键不存在不算错误
    fn remove(&self, key: &str) -> AppResult<()>;

    /// 列出全部键
    fn keys(&self) -> AppResult<Vec<String>>;
}

/// 内存存储，用于测试和一次性会话
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // 写入过程中不会 panic，中毒的锁里的数据仍然完整
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        self.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> AppResult<Vec<String>> {
        Ok(self.lock().keys().cloned().collect())
    }
}

/// 磁盘存储：每个键一个文件
///
/// 文件名是编码后的键；写入先落临时文件再 rename，
/// 读到一半的文件永远不会被看到。
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// 打开（必要时创建）存储目录
    pub fn open(root: impl AsRef<Path>) -> AppResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| StorageError::DirectoryUnavailable {
            path: root.display().to_string(),
            source,
        })?;
        debug!("打开缓存目录: {}", root.display());
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(encode_key(key))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::storage_read_failed(key, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let target = self.path_for(key);
        let tmp = self.root.join(format!(".{}.tmp", encode_key(key)));
        fs::write(&tmp, value).map_err(|e| AppError::storage_write_failed(key, e))?;
        fs::rename(&tmp, &target).map_err(|e| AppError::storage_write_failed(key, e))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::storage_remove_failed(key, e)),
        }
    }

    fn keys(&self) -> AppResult<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|source| StorageError::DirectoryUnavailable {
            path: self.root.display().to_string(),
            source,
        })?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            // 临时文件以 '.' 开头，真实键里的 '.' 都被编码了
            if name.starts_with('.') {
                continue;
            }
            if let Some(key) = decode_key(name) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

/// 把任意键编码成安全的文件名：`[A-Za-z0-9_-]` 原样保留，其余字节写成 `%XX`
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
