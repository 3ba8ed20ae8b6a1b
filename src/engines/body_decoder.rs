// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use std::fmt;
use std::io::Read;
use thiserror::Error;

/// 解码错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// base64 解码失败
    #[error("Invalid base64 body: {0}")]
    Base64(String),
    /// 所有编解码器都失败
    #[error("No codec could decode {len} bytes")]
    Undecodable { len: usize },
}

/// 响应体编解码器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Zlib,
    Identity,
    RawDeflate,
    Brotli,
}

/// 单个响应体解压后的最大字节数，超出视为解码失败
pub const MAX_DECODED_BYTES: usize = 64 * 1024 * 1024;

/// 传输编码响应体的尝试顺序
///
/// `Identity` 排在 `RawDeflate` 之前：原始 deflate 对任意字节都可能"成功"
/// 解出垃圾数据，而压缩数据几乎不可能是合法的 UTF-8。
pub const CODEC_ORDER: [Codec; 5] = [
    Codec::Gzip,
    Codec::Zlib,
    Codec::Identity,
    Codec::RawDeflate,
    Codec::Brotli,
];

impl Codec {
    /// 尝试解码，结果必须是合法的 UTF-8 文本
    pub fn decode(&self, raw: &[u8]) -> Option<String> {
        self.decode_within(raw, MAX_DECODED_BYTES)
    }

    /// 尝试解码，解压结果超过 `limit` 字节时放弃
    pub fn decode_within(&self, raw: &[u8], limit: usize) -> Option<String> {
        let bytes = match self {
            Codec::Identity => return std::str::from_utf8(raw).ok().map(str::to_owned),
            Codec::Gzip => read_all(GzDecoder::new(raw), limit)?,
            Codec::Zlib => read_all(ZlibDecoder::new(raw), limit)?,
            Codec::RawDeflate => read_all(DeflateDecoder::new(raw), limit)?,
            Codec::Brotli => read_all(brotli::Decompressor::new(raw, 4096), limit)?,
        };
        String::from_utf8(bytes).ok()
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Codec::Gzip => write!(f, "gzip"),
            Codec::Zlib => write!(f, "zlib"),
            Codec::Identity => write!(f, "identity"),
            Codec::RawDeflate => write!(f, "raw-deflate"),
            Codec::Brotli => write!(f, "brotli"),
        }
    }
}

fn read_all<R: Read>(reader: R, limit: usize) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    reader
        .take(u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1))
        .read_to_end(&mut out)
        .ok()?;
    if out.is_empty() || out.len() > limit {
        return None;
    }
    Some(out)
}

/// 解码响应体
///
/// 未经传输编码的响应体直接按 UTF-8 读取；传输编码的响应体依次尝试
/// [`CODEC_ORDER`]，接受第一个成功的结果。
///
/// # 返回值
///
/// * `Ok((String, Codec))` - 解码后的文本与命中的编解码器
/// * `Err(DecodeError)` - 所有编解码器都失败
pub fn decode_body(raw: &[u8], is_compressed: bool) -> Result<(String, Codec), DecodeError> {
    if !is_compressed {
        return Ok((String::from_utf8_lossy(raw).into_owned(), Codec::Identity));
    }

    CODEC_ORDER
        .iter()
        .find_map(|codec| codec.decode(raw).map(|text| (text, *codec)))
        .ok_or(DecodeError::Undecodable { len: raw.len() })
}

/// 把 DevTools 返回的 base64 文本还原为字节
pub fn decode_base64(body: &str) -> Result<Vec<u8>, DecodeError> {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    BASE64
        .decode(body.trim())
        .map_err(|e| DecodeError::Base64(e.to_string()))
}
