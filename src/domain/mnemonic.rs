//! 熵与助记词
//!
//! 128 位熵 → 12 词 BIP39 助记词。熵只在内存中短暂存在，持久化的是助记词。

use std::fmt;

use bip39::{Language, Mnemonic};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{WalletError, WalletResult};

/// 熵长度（字节）：128 bits = 12 words
pub const ENTROPY_LEN: usize = 16;

/// 固定长度的随机熵
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Entropy([u8; ENTROPY_LEN]);

impl Entropy {
    pub fn new(bytes: [u8; ENTROPY_LEN]) -> Self {
        Self(bytes)
    }

    /// 从操作系统随机源生成
    pub fn random() -> Self {
        let mut bytes = [0u8; ENTROPY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// 长度不匹配视为调用方错误
    pub fn from_slice(bytes: &[u8]) -> WalletResult<Self> {
        let array: [u8; ENTROPY_LEN] =
            bytes
                .try_into()
                .map_err(|_| WalletError::InvalidEntropyLength {
                    expected: ENTROPY_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(array))
    }

    pub fn from_hex(text: &str) -> WalletResult<Self> {
        let bytes = Zeroizing::new(
            hex::decode(text)
                .map_err(|e| WalletError::Validation(format!("Entropy is not hex: {}", e)))?,
        );
        Self::from_slice(&bytes)
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// 熵 → 助记词（确定性）
    pub fn to_mnemonic(&self) -> Mnemonic {
        // 16 字节熵对 BIP39 总是合法
        match Mnemonic::from_entropy_in(Language::English, &self.0) {
            Ok(mnemonic) => mnemonic,
            Err(e) => unreachable!("128-bit entropy rejected by bip39: {}", e),
        }
    }
}

impl fmt::Debug for Entropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Entropy(<redacted>)")
    }
}

/// 熵来源，便于测试注入固定值
pub trait EntropySource: Send + Sync {
    fn next_entropy(&self) -> Entropy;
}

/// 系统随机熵
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropySource;

impl EntropySource for OsEntropySource {
    fn next_entropy(&self) -> Entropy {
        Entropy::random()
    }
}

/// 固定熵（测试与可复现场景）
#[derive(Debug, Clone)]
pub struct FixedEntropySource(pub Entropy);

impl EntropySource for FixedEntropySource {
    fn next_entropy(&self) -> Entropy {
        self.0.clone()
    }
}

/// 解析并校验助记词（词表 + 校验和）
///
/// 导入时必须在任何链派生之前调用
pub fn parse_mnemonic(phrase: &str) -> WalletResult<Mnemonic> {
    let normalized = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return Err(WalletError::InvalidMnemonic("empty phrase".to_string()));
    }
    let mnemonic = Mnemonic::parse_in(Language::English, &normalized)?;
    let words = mnemonic.word_count();
    if words != 12 && words != 24 {
        return Err(WalletError::InvalidMnemonic(format!(
            "expected 12 or 24 words, got {}",
            words
        )));
    }
    Ok(mnemonic)
}

/// BIP39 种子（空口令）
pub fn mnemonic_to_seed(mnemonic: &Mnemonic) -> Zeroizing<[u8; 64]> {
    Zeroizing::new(mnemonic.to_seed_normalized(""))
}
