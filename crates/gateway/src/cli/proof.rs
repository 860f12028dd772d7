//! `walletlink proof`: generate, answer and check `ton_proof` challenges.

use std::io::Read;
use std::time::Duration;

use anyhow::Context;

use wl_bridge::{proof, ConnectRequest, SimulatedWallet};
use wl_domain::wallet::WalletInfo;

pub fn generate(ttl_secs: u64) {
    let payload = proof::generate_payload(Duration::from_secs(ttl_secs));
    println!("{payload}");
    if let Some(expiry) = proof::payload_expiry(&payload) {
        eprintln!("expires at {expiry} (unix)");
    }
}

pub fn simulate(payload: &str, domain: &str) -> anyhow::Result<()> {
    let wallet = SimulatedWallet::new("simulated", rand::random());
    let request = ConnectRequest {
        manifest_url: String::new(),
        proof_payload: Some(payload.to_string()),
    };
    let info = wallet.answer(&request, domain, proof::unix_now())?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Returns whether the proof is valid.
pub fn check(payload: &str, wallet_path: &str) -> anyhow::Result<bool> {
    let raw = if wallet_path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading wallet info from stdin")?;
        buf
    } else {
        std::fs::read_to_string(wallet_path).with_context(|| format!("reading {wallet_path}"))?
    };
    let info: WalletInfo = serde_json::from_str(&raw).context("parsing wallet info")?;

    let now = proof::unix_now();
    let valid = proof::verify(payload, &info, now);
    if valid {
        println!("proof OK for {}", info.account.address);
    } else {
        println!("proof INVALID for {}", info.account.address);
        match proof::payload_expiry(payload) {
            Some(expiry) if now > expiry => println!("  challenge expired {}s ago", now - expiry),
            None => println!("  challenge is malformed"),
            _ => {}
        }
    }
    Ok(valid)
}
