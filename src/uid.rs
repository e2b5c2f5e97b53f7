use rand::RngCore;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Generate a synthetic id for a record that carries none of its own.
///
/// Hashes the current time together with 16 random bytes so ids stay unique
/// across instances and restarts. The `local-` prefix keeps generated ids
/// visually distinct from backend-assigned ones.
pub fn local_item_id() -> String {
    let mut data = Vec::with_capacity(8 + 16);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    data.extend_from_slice(&timestamp.to_be_bytes());

    let mut random_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut random_bytes);
    data.extend_from_slice(&random_bytes);

    let hash = Sha256::digest(&data);
    format!("local-{}", hex::encode(&hash[..9]))
}
