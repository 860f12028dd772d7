//! `ton_proof` challenges.
//!
//! A challenge is 16 bytes rendered as 32 hex chars: 8 random bytes
//! followed by the big-endian unix expiry.  The wallet signs it as part of
//! the `ton-proof-item-v2` message; [`verify`] checks both the signature
//! and the expiry.

use std::time::Duration;

use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use sha2::{Digest, Sha256};

use wl_domain::error::{Error, Result};
use wl_domain::wallet::{ProofDomain, TonProof, WalletInfo};

const PROOF_PREFIX: &[u8] = b"ton-proof-item-v2/";
const CONNECT_PREFIX: &[u8] = b"ton-connect";
const MIN_PAYLOAD_LEN: usize = 32;

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Fresh challenge valid for `ttl` from now.
pub fn generate_payload(ttl: Duration) -> String {
    generate_payload_at(unix_now(), ttl)
}

pub fn generate_payload_at(now: u64, ttl: Duration) -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes[..8]);
    bytes[8..].copy_from_slice(&(now + ttl.as_secs()).to_be_bytes());
    hex::encode(bytes)
}

/// Expiry encoded in a challenge, or `None` if it is malformed.
pub fn payload_expiry(payload: &str) -> Option<u64> {
    let hex_ts = payload.get(16..32)?;
    u64::from_str_radix(hex_ts, 16).ok()
}

/// The 32-byte digest a wallet signs for `payload`.
fn signing_digest(address: &str, domain: &ProofDomain, timestamp: u64, payload: &str) -> Option<[u8; 32]> {
    let (wc, hash) = address.split_once(':')?;
    let wc: i32 = wc.parse().ok()?;
    let hash = hex::decode(hash).ok()?;
    if hash.len() != 32 {
        return None;
    }

    let mut message = Vec::with_capacity(PROOF_PREFIX.len() + 48 + domain.value.len() + payload.len());
    message.extend_from_slice(PROOF_PREFIX);
    message.extend_from_slice(&wc.to_le_bytes());
    message.extend_from_slice(&hash);
    message.extend_from_slice(&domain.length_bytes.to_le_bytes());
    message.extend_from_slice(domain.value.as_bytes());
    message.extend_from_slice(&timestamp.to_le_bytes());
    message.extend_from_slice(payload.as_bytes());

    let mut outer = Sha256::new();
    outer.update([0xff, 0xff]);
    outer.update(CONNECT_PREFIX);
    outer.update(Sha256::digest(&message));
    Some(outer.finalize().into())
}

/// Signatures arrive base64-encoded per protocol; some wallets send hex.
fn decode_signature(raw: &str) -> Option<Signature> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(raw)
        .ok()
        .filter(|b| b.len() == Signature::BYTE_SIZE)
        .or_else(|| hex::decode(raw).ok())?;
    Signature::from_slice(&bytes).ok()
}

fn decode_public_key(raw: &str) -> Option<VerifyingKey> {
    let bytes: [u8; 32] = hex::decode(raw).ok()?.try_into().ok()?;
    VerifyingKey::from_bytes(&bytes).ok()
}

/// Check the wallet's `ton_proof` against the challenge we issued.
pub fn verify(payload: &str, wallet: &WalletInfo, now: u64) -> bool {
    if payload.len() < MIN_PAYLOAD_LEN {
        return false;
    }
    let Some(proof) = wallet.ton_proof.as_ref() else {
        return false;
    };
    let Some(public_key) = wallet.account.public_key.as_deref().and_then(decode_public_key) else {
        tracing::debug!(address = %wallet.account.address, "proof: missing or invalid public key");
        return false;
    };
    let Some(digest) = signing_digest(&wallet.account.address, &proof.domain, proof.timestamp, payload) else {
        tracing::debug!(address = %wallet.account.address, "proof: unparseable raw address");
        return false;
    };
    let Some(signature) = decode_signature(&proof.signature) else {
        return false;
    };
    if public_key.verify(&digest, &signature).is_err() {
        tracing::debug!(address = %wallet.account.address, "proof: signature mismatch");
        return false;
    }
    match payload_expiry(payload) {
        Some(expiry) => now <= expiry,
        None => false,
    }
}

/// Produce the `ton_proof` item a wallet holding `key` would return.
pub fn sign(key: &SigningKey, address: &str, domain: &str, timestamp: u64, payload: &str) -> Result<TonProof> {
    let domain = ProofDomain {
        length_bytes: domain.len() as u32,
        value: domain.to_string(),
    };
    let digest = signing_digest(address, &domain, timestamp, payload)
        .ok_or_else(|| Error::Other(format!("invalid raw address: {address}")))?;
    let signature = key.sign(&digest);
    Ok(TonProof {
        timestamp,
        domain,
        payload: payload.to_string(),
        signature: base64::engine::general_purpose::STANDARD.encode(signature.to_bytes()),
    })
}
