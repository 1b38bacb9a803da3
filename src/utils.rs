//! Utility functions for id generation

use crate::error::{Result, WorkflowError};
use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> Result<String> {
    let hrp = bech32::Hrp::parse(hrp)
        .map_err(|e| WorkflowError::InvalidInput(format!("bad id prefix '{hrp}': {e}")))?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| WorkflowError::Encode(e.to_string()))?;
    Ok(encode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_prefixed_unique_ids() {
        let a = new_uuid_to_bech32("doc_").unwrap();
        let b = new_uuid_to_bech32("doc_").unwrap();

        assert!(a.starts_with("doc_1"));
        assert_ne!(a, b);
    }

    #[test]
    fn empty_prefix_is_rejected() {
        assert!(new_uuid_to_bech32("").is_err());
    }
}
