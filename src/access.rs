// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 访问控制模块
//!
//! 决定一个请求路径能否被提供，以及提供多少字节：
//! - [`DocumentRoot`] 把相对路径映射到文档根目录下，并拒绝任何会解析到根目录之外的路径。
//! - [`check_access`] 对**已经打开**的文件句柄执行 stat，
//!   因此打开之后文件被删除不会改变本次请求的结果。

use std::{
    io,
    os::unix::fs::{MetadataExt, PermissionsExt},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use tokio::fs::{self, File};

use crate::{exception::AccessError, param::S_IROTH, util::normalize_path};

/// 以文档根目录为起点的文件系统访问入口。启动时构造一次，之后只读。
#[derive(Debug, Clone)]
pub struct DocumentRoot {
    root: PathBuf,
}

impl DocumentRoot {
    /// 规范化根目录路径；根目录不存在或不是目录时返回错误
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = std::fs::canonicalize(root.as_ref())?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("文档根目录不是目录：{}", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// 词法地把请求路径拼接到根目录下，不访问文件系统
    pub fn resolve(&self, path: &str) -> Result<PathBuf, AccessError> {
        match normalize_path(path) {
            Some(relative) => Ok(self.root.join(relative)),
            None => Err(AccessError::Forbidden),
        }
    }

    /// 打开请求的文件。
    ///
    /// 打开前先确认真实路径（跟随符号链接之后）仍位于根目录之内；
    /// 路径不存在或无法打开时返回 `NotFound`。
    pub async fn open(&self, path: &str, id: u128) -> Result<File, AccessError> {
        let full_path = match self.resolve(path) {
            Ok(p) => p,
            Err(e) => {
                warn!("[ID{}]路径{}越出了文档根目录", id, path);
                return Err(e);
            }
        };
        debug!("[ID{}]映射物理路径：{}", id, full_path.display());

        let real_path = match fs::canonicalize(&full_path).await {
            Ok(p) => p,
            Err(e) => {
                debug!("[ID{}]无法解析{}：{}", id, full_path.display(), e);
                return Err(AccessError::NotFound);
            }
        };
        if !real_path.starts_with(&self.root) {
            warn!(
                "[ID{}]{}经符号链接指向文档根目录之外：{}",
                id,
                path,
                real_path.display()
            );
            return Err(AccessError::Forbidden);
        }

        let file = match File::open(&real_path).await {
            Ok(file) => file,
            Err(e) => {
                debug!("[ID{}]无法打开{}：{}", id, real_path.display(), e);
                return Err(AccessError::NotFound);
            }
        };

        // 检查与打开之间路径中的某一级可能被替换成符号链接
        if !self.contains_opened(&file, &real_path).await {
            warn!("[ID{}]{}打开后不再位于文档根目录之内", id, path);
            return Err(AccessError::Forbidden);
        }
        Ok(file)
    }

    /// 确认已打开的句柄确实位于根目录之内。
    ///
    /// Linux 上读取 `/proc/self/fd` 得到句柄的真实路径；
    /// 其他情况下比较句柄与 `real_path` 的设备号和 inode。
    async fn contains_opened(&self, file: &File, real_path: &Path) -> bool {
        #[cfg(target_os = "linux")]
        {
            use std::os::unix::io::AsRawFd;

            let fd_link = format!("/proc/self/fd/{}", file.as_raw_fd());
            if let Ok(opened) = fs::read_link(&fd_link).await {
                return opened.starts_with(&self.root);
            }
        }

        match (file.metadata().await, fs::metadata(real_path).await) {
            (Ok(opened), Ok(expected)) => {
                opened.dev() == expected.dev() && opened.ino() == expected.ino()
            }
            _ => false,
        }
    }
}

/// 检查已打开的文件能否被提供，返回 stat 时刻的字节数。
///
/// 只有“其他用户可读”的普通文件可以被提供，与属主、属组的权限位无关。
pub async fn check_access(file: &File, id: u128) -> Result<u64, AccessError> {
    let metadata = match file.metadata().await {
        Ok(m) => m,
        Err(e) => {
            warn!("[ID{}]对已打开的文件执行stat失败：{}", id, e);
            return Err(AccessError::StatFailure);
        }
    };

    if !metadata.is_file() {
        debug!("[ID{}]请求的路径不是普通文件", id);
        return Err(AccessError::Forbidden);
    }

    let mode = metadata.permissions().mode();
    if !is_world_readable(mode) {
        debug!("[ID{}]文件权限{:o}不允许其他用户读取", id, mode & 0o777);
        return Err(AccessError::Forbidden);
    }

    Ok(metadata.len())
}

pub fn is_world_readable(mode: u32) -> bool {
    mode & S_IROTH != 0
}
