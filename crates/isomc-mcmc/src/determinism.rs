use std::hash::Hasher;

use isomc_core::{derive_substream_seed, RngHandle};
use siphasher::sip::SipHasher13;

use crate::config::SeedPolicy;

/// Master seed after folding in the optional policy label.
pub fn effective_master_seed(policy: &SeedPolicy) -> u64 {
    match &policy.label {
        Some(label) => {
            let mut hasher = SipHasher13::new_with_keys(0, 0);
            hasher.write(label.as_bytes());
            derive_substream_seed(policy.master_seed, hasher.finish())
        }
        None => policy.master_seed,
    }
}

/// Derives the deterministic seed used by a block.
pub fn block_seed(policy: &SeedPolicy, block_id: u32) -> u64 {
    derive_substream_seed(effective_master_seed(policy), u64::from(block_id))
}

/// RNG owned by a single block; independent of scheduling across threads.
pub fn block_rng(policy: &SeedPolicy, block_id: u32) -> RngHandle {
    RngHandle::from_seed(block_seed(policy, block_id))
}
