//! 密钥存储编码
//!
//! 安全存储只接受字节，这里把十六进制文本规范化为定长字节并可无损还原：
//!
//! | 输入形状                     | 存储形式                       |
//! |------------------------------|--------------------------------|
//! | `0x` + 64 位小写 hex         | 32 字节原始值                  |
//! | 128 位小写 hex（无前缀）     | `UNPREFIXED_64_MARKER` + 64 字节 |
//! | 其他文本                     | 原样 UTF-8（32 字节文本加转义）|
//!
//! 两个标记字节都不可能出现在合法 UTF-8 文本的首字节，因此三种形状互不冲突。

/// 无前缀 64 字节值的标记
pub const UNPREFIXED_64_MARKER: u8 = 0x80;
/// 恰好 32 字节的原样文本的转义标记，避免与 32 字节原始值混淆
pub const RAW_TEXT_32_MARKER: u8 = 0x81;

const PREFIX: &str = "0x";

/// 编码为存储字节
pub fn encode(secret: &str) -> Vec<u8> {
    if let Some(body) = secret.strip_prefix(PREFIX) {
        if body.len() == 64 && is_lower_hex(body) {
            if let Ok(bytes) = hex::decode(body) {
                return bytes;
            }
        }
    }

    if secret.len() == 128 && is_lower_hex(secret) {
        if let Ok(bytes) = hex::decode(secret) {
            let mut out = Vec::with_capacity(65);
            out.push(UNPREFIXED_64_MARKER);
            out.extend_from_slice(&bytes);
            return out;
        }
    }

    if secret.len() == 32 {
        let mut out = Vec::with_capacity(33);
        out.push(RAW_TEXT_32_MARKER);
        out.extend_from_slice(secret.as_bytes());
        return out;
    }

    secret.as_bytes().to_vec()
}

/// 从存储字节还原原文
///
/// 损坏的数据按原样文本返回而不报错，避免永久锁死钱包
pub fn decode(stored: &[u8]) -> String {
    match stored.len() {
        32 => format!("{}{}", PREFIX, hex::encode(stored)),
        65 if stored[0] == UNPREFIXED_64_MARKER => hex::encode(&stored[1..]),
        33 if stored[0] == RAW_TEXT_32_MARKER => match std::str::from_utf8(&stored[1..]) {
            Ok(text) => text.to_string(),
            Err(_) => lossy(stored),
        },
        _ => lossy(stored),
    }
}

fn lossy(stored: &[u8]) -> String {
    match std::str::from_utf8(stored) {
        Ok(text) => text.to_string(),
        Err(_) => {
            tracing::warn!(len = stored.len(), "stored secret is not valid text, returning lossy value");
            String::from_utf8_lossy(stored).into_owned()
        }
    }
}

// 大写 hex 会在还原时变成小写，不视为可压缩形状
fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const PREFIXED: &str = "0x1ab42cc412b618bdea3a599e3c9bae199ebf030895b039e9db1e30dafb12b727";

    fn unprefixed_128() -> String {
        "0123456789abcdef".repeat(8)
    }

    #[test]
    fn test_prefixed_scalar_is_32_raw_bytes() {
        let encoded = encode(PREFIXED);
        assert_eq!(encoded.len(), 32);
        assert_eq!(decode(&encoded), PREFIXED);
    }

    #[test]
    fn test_unprefixed_128_uses_marker() {
        let input = unprefixed_128();
        let encoded = encode(&input);
        assert_eq!(encoded.len(), 65);
        assert_eq!(encoded[0], UNPREFIXED_64_MARKER);
        assert_eq!(decode(&encoded), input);
    }

    #[test]
    fn test_other_shapes_pass_through() {
        let wif = "KyZpNDKnfs94vbrwhJneDi77V6jF64PWPF8x5cdJb8ifgg2DUc9d";
        assert_eq!(encode(wif), wif.as_bytes());
        assert_eq!(decode(&encode(wif)), wif);

        // 大写 hex 不压缩，保持原样
        let upper = PREFIXED.to_uppercase().replacen("0X", "0x", 1);
        assert_eq!(decode(&encode(&upper)), upper);

        // 无前缀 64 位 hex 不属于任何压缩形状
        let bare = &PREFIXED[2..];
        assert_eq!(encode(bare), bare.as_bytes());
        assert_eq!(decode(&encode(bare)), bare);
    }

    #[test]
    fn test_32_byte_text_does_not_collide_with_scalar() {
        let text = "abcdefghijklmnopqrstuvwxyz012345";
        assert_eq!(text.len(), 32);
        let encoded = encode(text);
        assert_eq!(encoded.len(), 33);
        assert_eq!(decode(&encoded), text);
    }

    #[test]
    fn test_encoding_is_injective_over_samples() {
        let samples = vec![
            PREFIXED.to_string(),
            PREFIXED[2..].to_string(),
            unprefixed_128(),
            format!("0x{}", unprefixed_128()),
            "abcdefghijklmnopqrstuvwxyz012345".to_string(),
            "short".to_string(),
            String::new(),
        ];

        let encoded: HashSet<Vec<u8>> = samples.iter().map(|s| encode(s)).collect();
        assert_eq!(encoded.len(), samples.len());
        for sample in &samples {
            assert_eq!(&decode(&encode(sample)), sample);
        }
    }

    #[test]
    fn test_malformed_data_decodes_lossy() {
        let garbage = vec![0xff, 0xfe, 0x41];
        let decoded = decode(&garbage);
        assert!(decoded.ends_with('A'));

        // 长度 65 但没有标记
        let mut no_marker = vec![0x41u8; 65];
        no_marker[0] = b'B';
        assert_eq!(decode(&no_marker).len(), 65);
    }
}
