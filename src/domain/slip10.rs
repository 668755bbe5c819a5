//! SLIP-0010 Ed25519 分层派生
//!
//! Ed25519 只支持硬化派生，BIP32 库无法直接复用：
//! master: I = HMAC-SHA512(Key = "ed25519 seed", Data = seed)
//! child:  I = HMAC-SHA512(Key = chain_code, Data = 0x00 || key || ser32(index | 2^31))

use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::{Zeroize, Zeroizing};

use crate::domain::chain_config::ChainKind;
use crate::error::{WalletError, WalletResult};

type HmacSha512 = Hmac<Sha512>;

const MASTER_SECRET: &[u8] = b"ed25519 seed";
const HARDENED_OFFSET: u32 = 0x8000_0000;

/// 派生 32 字节 ed25519 私钥种子
pub fn derive_ed25519(seed: &[u8], path: &str) -> WalletResult<Zeroizing<[u8; 32]>> {
    let indices = parse_hardened_path(path)?;

    let (mut key, mut chain_code) = hmac_split(MASTER_SECRET, &[seed])?;

    for index in indices {
        let hardened = (index | HARDENED_OFFSET).to_be_bytes();
        let data: [&[u8]; 3] = [&[0x00], &key[..], &hardened];
        let (child_key, child_chain) = hmac_split(&chain_code[..], &data)?;
        key = child_key;
        chain_code = child_chain;
    }

    Ok(key)
}

/// 执行一次 HMAC-SHA512，并切分为 (IL, IR)
fn hmac_split(
    mac_key: &[u8],
    parts: &[&[u8]],
) -> WalletResult<(Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>)> {
    let mut mac = HmacSha512::new_from_slice(mac_key)
        .map_err(|e| WalletError::derivation(ChainKind::Solana, format!("HMAC init failed: {}", e)))?;
    for part in parts {
        mac.update(part);
    }

    let mut buf = [0u8; 64];
    buf.copy_from_slice(&mac.finalize().into_bytes());

    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&buf[..32]);
    right.copy_from_slice(&buf[32..]);
    buf.zeroize();

    Ok((left, right))
}

/// "m/44'/501'/0'/0'" → [44, 501, 0, 0]，每一级必须带 '
fn parse_hardened_path(path: &str) -> WalletResult<Vec<u32>> {
    let invalid = |reason: &str| {
        WalletError::derivation(
            ChainKind::Solana,
            format!("Invalid SLIP-0010 path {:?}: {}", path, reason),
        )
    };

    let mut segments = path.trim().split('/');
    if segments.next() != Some("m") {
        return Err(invalid("must start with m"));
    }

    segments
        .map(|segment| {
            let digits = segment
                .strip_suffix('\'')
                .or_else(|| segment.strip_suffix('h'))
                .ok_or_else(|| invalid("ed25519 supports hardened levels only"))?;
            let index: u32 = digits.parse().map_err(|_| invalid("index is not a number"))?;
            if index >= HARDENED_OFFSET {
                return Err(invalid("index out of range"));
            }
            Ok(index)
        })
        .collect()
}
