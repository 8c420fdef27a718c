// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::param::ContentType;

/// 文件后缀到 MIME 类型的映射表，按后缀区分大小写。
const CONTENT_TYPES: [(&str, ContentType); 5] = [
    (".html", ContentType::TextHtml),
    (".txt", ContentType::TextPlain),
    (".jpg", ContentType::ImageJpeg),
    (".jpeg", ContentType::ImageJpeg),
    (".gif", ContentType::ImageGif),
];

/// 根据请求路径的后缀确定 `Content-Type`。
///
/// 这是一个全函数：没有后缀或后缀无法识别时返回 `text/plain`。
pub fn resolve(path: &str) -> ContentType {
    CONTENT_TYPES
        .iter()
        .find(|(suffix, _)| path.ends_with(suffix))
        .map(|(_, content_type)| *content_type)
        .unwrap_or(ContentType::TextPlain)
}
