//! AES-256-GCM 加密/解密模块
//! 用于设备安全存储文件的落盘加密

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{WalletError, WalletResult};

const NONCE_LEN: usize = 12;

/// 加密密钥（使用Zeroize保护）
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; 32],
}

impl EncryptionKey {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.key
    }

    /// 解析密钥文本
    ///
    /// - 64 位 hex：直接解码
    /// - 32 字节：按原始字节使用
    /// - 至少 16 字符：SHA-256 派生
    pub fn from_text(key_str: &str) -> WalletResult<Self> {
        if key_str.is_empty() {
            return Err(WalletError::Config("encryption key is empty".to_string()));
        }

        let mut key = [0u8; 32];
        if key_str.len() == 64 {
            let mut decoded = hex::decode(key_str)
                .map_err(|e| WalletError::Config(format!("Invalid hex key: {}", e)))?;
            key.copy_from_slice(&decoded);
            decoded.zeroize();
        } else if key_str.len() == 32 {
            key.copy_from_slice(key_str.as_bytes());
        } else if key_str.len() >= 16 {
            key.copy_from_slice(&Sha256::digest(key_str.as_bytes()));
        } else {
            return Err(WalletError::Config(
                "encryption key too short (min 16)".to_string(),
            ));
        }
        Ok(Self { key })
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

/// 加密数据，返回 nonce (12字节) + ciphertext
pub fn encrypt_data(data: &[u8], key: &EncryptionKey) -> WalletResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| WalletError::storage(format!("Invalid key: {}", e)))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, data)
        .map_err(|e| WalletError::storage(format!("Encryption failed: {}", e)))?;

    let mut result = nonce.to_vec();
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// 解密 nonce + ciphertext
pub fn decrypt_data(encrypted: &[u8], key: &EncryptionKey) -> WalletResult<Vec<u8>> {
    if encrypted.len() < NONCE_LEN {
        return Err(WalletError::storage("Encrypted data too short"));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| WalletError::storage(format!("Invalid key: {}", e)))?;

    let nonce = Nonce::from_slice(&encrypted[..NONCE_LEN]);
    cipher
        .decrypt(nonce, &encrypted[NONCE_LEN..])
        .map_err(|e| WalletError::storage(format!("Decryption failed: {}", e)))
}
