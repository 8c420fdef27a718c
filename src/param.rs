// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块定义了服务器遵循的 HTTP 协议子集相关的常量和强类型枚举：
//! - 协议版本（仅 HTTP/1.0 与 HTTP/1.1）。
//! - 状态码及其固定的原因短语（Reason Phrase）。
//! - 服务器能够声明的 MIME 类型。

use std::fmt;

/// 请求根路径 `/` 时默认返回的文件（相对于文档根目录）
pub const INDEX_FILE: &str = "index.html";

/// 响应报文使用的行结束符。
///
/// 响应头的每一行都以单个 `\n` 结束；请求端的 `\r\n` 与 `\n` 都可以被解析。
pub const LINE_END: &str = "\n";

/// 文件权限位中的“其他用户可读”位（等价于 C 中的 `S_IROTH`）
pub const S_IROTH: u32 = 0o004;

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    /// HTTP/1.0，每个请求结束后关闭连接
    V1_0,
    /// HTTP/1.1，响应完成后保持连接等待下一个请求
    V1_1,
}

impl HttpVersion {
    /// 由 `HTTP/1.<digit>` 中的次版本号构造
    pub fn from_minor(minor: u8) -> Option<Self> {
        match minor {
            0 => Some(HttpVersion::V1_0),
            1 => Some(HttpVersion::V1_1),
            _ => None,
        }
    }

    pub fn minor(&self) -> u8 {
        match *self {
            HttpVersion::V1_0 => 0,
            HttpVersion::V1_1 => 1,
        }
    }

    /// 该版本在响应之后是否保持连接
    pub fn keeps_alive(&self) -> bool {
        *self == HttpVersion::V1_1
    }
}

impl fmt::Display for HttpVersion {
    /// 将枚举格式化为 HTTP 报文中的版本字符串
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1.{}", self.minor())
    }
}

/// 服务器可能返回的状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    BadRequest,
    Forbidden,
    NotFound,
}

impl StatusCode {
    pub fn as_u16(&self) -> u16 {
        match *self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
        }
    }

    /// 状态码对应的固定原因短语，参考 RFC 9110
    pub fn reason_phrase(&self) -> &'static str {
        match *self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

/// 响应头 `Content-Type` 可以取的值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    TextPlain,
    TextHtml,
    ImageJpeg,
    ImageGif,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match *self {
            ContentType::TextPlain => "text/plain",
            ContentType::TextHtml => "text/html",
            ContentType::ImageJpeg => "image/jpeg",
            ContentType::ImageGif => "image/gif",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
