// src/miner/difficulty.rs
//! Conversion between pool compact targets and 64-bit difficulties

use crate::utils::error::MinerError;

/// Converts a little-endian compact target into a difficulty.
///
/// 4-byte "short" targets divide `u32::MAX`, 8-byte "mid" targets divide
/// `u64::MAX`. Any other width, or a target of zero, is rejected.
pub fn target_to_difficulty(target: &[u8]) -> Result<u64, MinerError> {
    match target.len() {
        4 => {
            let raw = u32::from_le_bytes([target[0], target[1], target[2], target[3]]);
            if raw == 0 {
                return Err(MinerError::InputError("target is zero".into()));
            }
            Ok(u32::MAX as u64 / raw as u64)
        }
        8 => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(target);
            let raw = u64::from_le_bytes(bytes);
            if raw == 0 {
                return Err(MinerError::InputError("target is zero".into()));
            }
            Ok(u64::MAX / raw)
        }
        n => Err(MinerError::UnsupportedTarget(n)),
    }
}

/// Checks a 32-byte hash against a difficulty.
///
/// The last eight bytes of the hash, read little-endian, multiplied by the
/// difficulty must fit in 64 bits.
pub fn meets_difficulty(hash: &[u8; 32], difficulty: u64) -> bool {
    let mut high = [0u8; 8];
    high.copy_from_slice(&hash[24..32]);
    let high = u64::from_le_bytes(high) as u128;
    (high * difficulty as u128) >> 64 == 0
}
