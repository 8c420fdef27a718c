// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::path::{Component, Path, PathBuf};

/// 对请求路径做纯词法的规范化。
///
/// `.` 被丢弃，`..` 弹出上一级；一旦需要越过根目录，或者路径本身是绝对路径，返回 `None`。
/// 不访问文件系统，也不做百分号解码。
pub fn normalize_path(path: &str) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(segment) => normalized.push(segment),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(normalized)
}

pub fn format_file_size(size: u64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < units.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.1} {}", size, units[unit_index])
}
