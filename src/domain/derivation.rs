//! 钱包派生策略
//!
//! 为四条链提供统一的派生接口：熵或助记词 → 地址 / 公钥 / 私钥

use std::fmt;
use std::str::FromStr;

use bip39::Mnemonic;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::domain::chain_config::{ChainKind, NetworkEnv};
use crate::domain::mnemonic::{mnemonic_to_seed, Entropy};
use crate::domain::slip10;
use crate::error::{WalletError, WalletResult};

/// 单链派生结果
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ChainKeyMaterial {
    #[zeroize(skip)]
    pub chain: ChainKind,
    /// 地址
    pub address: String,
    /// 公钥 (hex 编码)
    pub public_key: String,
    /// 私钥或链特定的序列化（仅用于加密存储）
    ///
    /// - EVM: `0x` + 64 hex
    /// - Bitcoin: WIF
    /// - Solana: 128 hex（secret || public）
    pub private_key: String,
    /// 派生路径
    pub derivation_path: String,
}

impl fmt::Debug for ChainKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainKeyMaterial")
            .field("chain", &self.chain)
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("derivation_path", &self.derivation_path)
            .finish()
    }
}

/// 链派生器 trait
///
/// 两个入口必须一致：熵 → 助记词 → 派生 == 直接从该助记词派生
pub trait ChainDeriver: Send + Sync {
    fn chain(&self) -> ChainKind;

    /// 从助记词派生
    fn derive_from_mnemonic(&self, mnemonic: &Mnemonic) -> WalletResult<ChainKeyMaterial>;

    /// 从熵派生
    fn derive_from_entropy(&self, entropy: &Entropy) -> WalletResult<ChainKeyMaterial> {
        self.derive_from_mnemonic(&entropy.to_mnemonic())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EVM 策略 (Ethereum, BNB)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// EVM 派生器，同一方案服务两个独立标记的网络
pub struct EvmDeriver {
    chain: ChainKind,
}

impl EvmDeriver {
    pub fn ethereum() -> Self {
        Self {
            chain: ChainKind::Ethereum,
        }
    }

    /// 同一曲线、同一路径的第二个网络
    pub fn bnb() -> Self {
        Self {
            chain: ChainKind::Bnb,
        }
    }
}

impl ChainDeriver for EvmDeriver {
    fn chain(&self) -> ChainKind {
        self.chain
    }

    fn derive_from_mnemonic(&self, mnemonic: &Mnemonic) -> WalletResult<ChainKeyMaterial> {
        use coins_bip32::path::DerivationPath;
        use coins_bip32::prelude::*;
        use k256::ecdsa::SigningKey;
        use sha3::{Digest, Keccak256};

        let fail = |msg: String| WalletError::derivation(self.chain, msg);

        let seed = mnemonic_to_seed(mnemonic);
        let path = self.chain.derivation_path(NetworkEnv::Mainnet);

        let derivation_path = path
            .parse::<DerivationPath>()
            .map_err(|e| fail(format!("Invalid derivation path: {}", e)))?;

        let master_key = XPriv::root_from_seed(&seed[..], None)
            .map_err(|e| fail(format!("Failed to derive master key: {}", e)))?;
        let derived_key = master_key
            .derive_path(&derivation_path)
            .map_err(|e| fail(format!("Failed to derive key: {}", e)))?;

        // XPriv 实现 AsRef<SigningKey>
        let signing_key: &SigningKey = derived_key.as_ref();
        let private_key_bytes = signing_key.to_bytes();

        let public_key_point = signing_key.verifying_key().to_encoded_point(false);
        // 去掉 0x04 前缀
        let public_key_slice = &public_key_point.as_bytes()[1..];

        let hash = Keccak256::digest(public_key_slice);
        let address = to_checksum_address(&hash[12..]);

        Ok(ChainKeyMaterial {
            chain: self.chain,
            address,
            public_key: hex::encode(public_key_slice),
            private_key: format!("0x{}", hex::encode(private_key_bytes)),
            derivation_path: path.to_string(),
        })
    }
}

/// EIP-55 混合大小写校验地址
fn to_checksum_address(address_bytes: &[u8]) -> String {
    use sha3::{Digest, Keccak256};

    let lower = hex::encode(address_bytes);
    let hash = hex::encode(Keccak256::digest(lower.as_bytes()));

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (c, h) in lower.chars().zip(hash.chars()) {
        if c.is_ascii_alphabetic() && h.to_digit(16).unwrap_or(0) >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bitcoin 策略 (BIP84 native segwit)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct BitcoinDeriver {
    network: NetworkEnv,
}

impl BitcoinDeriver {
    pub fn new(network: NetworkEnv) -> Self {
        Self { network }
    }
}

impl ChainDeriver for BitcoinDeriver {
    fn chain(&self) -> ChainKind {
        ChainKind::Bitcoin
    }

    fn derive_from_mnemonic(&self, mnemonic: &Mnemonic) -> WalletResult<ChainKeyMaterial> {
        use bitcoin::bip32::{DerivationPath, Xpriv};
        use bitcoin::secp256k1::Secp256k1;
        use bitcoin::Address;

        let fail = |msg: String| WalletError::derivation(ChainKind::Bitcoin, msg);

        let seed = mnemonic_to_seed(mnemonic);
        let network = self.network.bitcoin_network();
        let path = ChainKind::Bitcoin.derivation_path(self.network);

        let secp = Secp256k1::new();
        let derivation_path = DerivationPath::from_str(path)
            .map_err(|e| fail(format!("Invalid derivation path: {}", e)))?;
        let master_key = Xpriv::new_master(network, &seed[..])
            .map_err(|e| fail(format!("Failed to derive master key: {}", e)))?;
        let derived_key = master_key
            .derive_priv(&secp, &derivation_path)
            .map_err(|e| fail(format!("Failed to derive key: {}", e)))?;

        // 网络参数同时决定 WIF 版本字节
        let private_key = derived_key.to_priv();
        let public_key = private_key.public_key(&secp);

        // P2WPKH 地址（bc1q... / tb1q...）
        let address = Address::p2wpkh(&public_key, network)
            .map_err(|e| fail(format!("Failed to create P2WPKH address: {}", e)))?
            .to_string();

        Ok(ChainKeyMaterial {
            chain: ChainKind::Bitcoin,
            address,
            public_key: public_key.to_string(),
            private_key: private_key.to_wif(),
            derivation_path: path.to_string(),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Solana 策略 (SLIP-0010 ed25519)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SolanaDeriver;

impl ChainDeriver for SolanaDeriver {
    fn chain(&self) -> ChainKind {
        ChainKind::Solana
    }

    fn derive_from_mnemonic(&self, mnemonic: &Mnemonic) -> WalletResult<ChainKeyMaterial> {
        use ed25519_dalek::SigningKey;

        let seed = mnemonic_to_seed(mnemonic);
        let path = ChainKind::Solana.derivation_path(NetworkEnv::Mainnet);

        let secret = slip10::derive_ed25519(&seed[..], path)?;
        let signing_key = SigningKey::from_bytes(&secret);
        let public_key_bytes = signing_key.verifying_key().to_bytes();

        // Solana 地址就是公钥的 Base58 编码
        let address = bs58::encode(public_key_bytes).into_string();

        // 64 字节 keypair: secret || public
        let keypair = signing_key.to_keypair_bytes();

        Ok(ChainKeyMaterial {
            chain: ChainKind::Solana,
            address,
            public_key: hex::encode(public_key_bytes),
            private_key: hex::encode(keypair),
            derivation_path: path.to_string(),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 派生器集合
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 四个派生器，按固定顺序 Ethereum → Solana → Bitcoin → BNB
pub struct DeriverSet {
    network: NetworkEnv,
    derivers: Vec<Box<dyn ChainDeriver>>,
}

impl DeriverSet {
    pub fn new(network: NetworkEnv) -> Self {
        let derivers: Vec<Box<dyn ChainDeriver>> = vec![
            Box::new(EvmDeriver::ethereum()),
            Box::new(SolanaDeriver),
            Box::new(BitcoinDeriver::new(network)),
            Box::new(EvmDeriver::bnb()),
        ];
        Self { network, derivers }
    }

    pub fn network(&self) -> NetworkEnv {
        self.network
    }

    pub fn len(&self) -> usize {
        self.derivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.derivers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ChainDeriver> {
        self.derivers.iter().map(|d| d.as_ref())
    }

    /// 派生并对地址格式做自检
    pub fn derive_checked(
        &self,
        deriver: &dyn ChainDeriver,
        mnemonic: &Mnemonic,
    ) -> WalletResult<ChainKeyMaterial> {
        let material = deriver.derive_from_mnemonic(mnemonic)?;
        if !material
            .chain
            .validate_address(&material.address, self.network)
        {
            return Err(WalletError::derivation(
                material.chain,
                format!("Derived address has unexpected format: {}", material.address),
            ));
        }
        tracing::debug!(chain = %material.chain, address = %material.address, "chain derived");
        Ok(material)
    }

    /// 同步派生全部四条链
    pub fn derive_all(&self, mnemonic: &Mnemonic) -> WalletResult<Vec<ChainKeyMaterial>> {
        self.iter()
            .map(|deriver| self.derive_checked(deriver, mnemonic))
            .collect()
    }
}
