//! 钱包凭证：地址与私钥生成、私钥哈希与校验
//!
//! The "private key" is a bearer secret: random bytes from the OS CSPRNG,
//! hex-encoded, stored only as an unsalted SHA-256 hex digest.

use std::fmt;

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("address size must be at least 1 byte")]
    EmptyAddress,
    #[error("secret size ({secret} bytes) must be larger than address size ({address} bytes)")]
    WeakSecret { address: usize, secret: usize },
}

/// 私钥包装器（使用Zeroize保护）
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: String) -> Self {
        Self(secret)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialAuthority {
    address_bytes: usize,
    secret_bytes: usize,
}

impl CredentialAuthority {
    pub const DEFAULT_ADDRESS_BYTES: usize = 16;
    pub const DEFAULT_SECRET_BYTES: usize = 32;

    pub fn new(address_bytes: usize, secret_bytes: usize) -> Result<Self, CredentialError> {
        if address_bytes == 0 {
            return Err(CredentialError::EmptyAddress);
        }
        if secret_bytes <= address_bytes {
            return Err(CredentialError::WeakSecret {
                address: address_bytes,
                secret: secret_bytes,
            });
        }
        Ok(Self {
            address_bytes,
            secret_bytes,
        })
    }

    /// 生成钱包地址（`address_bytes` 个随机字节的十六进制）
    pub fn generate_address(&self) -> String {
        random_hex(self.address_bytes)
    }

    /// 生成私钥，只在创建钱包时返回给调用方
    pub fn generate_secret(&self) -> Secret {
        Secret(random_hex(self.secret_bytes))
    }

    pub fn hash_secret(secret: &str) -> String {
        hex::encode(Sha256::digest(secret.as_bytes()))
    }

    /// Recomputes the digest and compares it in constant time.
    pub fn verify_secret(secret: &str, digest: &str) -> bool {
        let computed = Self::hash_secret(secret);
        computed.as_bytes().ct_eq(digest.as_bytes()).into()
    }
}

impl Default for CredentialAuthority {
    fn default() -> Self {
        Self {
            address_bytes: Self::DEFAULT_ADDRESS_BYTES,
            secret_bytes: Self::DEFAULT_SECRET_BYTES,
        }
    }
}

fn random_hex(len: usize) -> String {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    let encoded = hex::encode(&buf);
    buf.zeroize();
    encoded
}
