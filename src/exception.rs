// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 定义一次请求处理过程中可能出现的两类失败：
//! - [`ParseError`]：请求行无法被识别，对应 `400 Bad Request`。
//! - [`AccessError`]：请求的文件无法被提供，对应 `404` 或 `403`。
//!
//! 所有错误都只影响当前连接，不会传播到监听进程或其他会话。

use std::{error::Error, fmt};

use crate::param::StatusCode;

/// 请求解析失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// 请求行不符合 `GET /<path> HTTP/1.<0|1>`，或路径越出了文档根目录。
    Malformed,
}

/// 文件访问失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// 路径无法被打开。
    NotFound,
    /// 文件不是“其他用户可读”的普通文件，或解析后位于文档根目录之外。
    Forbidden,
    /// 对已打开的文件句柄执行 stat 失败。按 Forbidden 处理（失败即关闭）。
    StatFailure,
}

impl ParseError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BadRequest
    }
}

impl AccessError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AccessError::NotFound => StatusCode::NotFound,
            AccessError::Forbidden | AccessError::StatFailure => StatusCode::Forbidden,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Malformed => write!(f, "Malformed request line (400)"),
        }
    }
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::NotFound => write!(f, "File not found (404)"),
            AccessError::Forbidden => write!(f, "File is not world-readable (403)"),
            AccessError::StatFailure => write!(f, "Couldn't stat the opened file (403)"),
        }
    }
}

impl Error for ParseError {}

impl Error for AccessError {}
