//! Utility functions for identifiers

use bech32::Bech32m;
use uuid7::uuid7;

/// Human-readable prefix of request codes.
pub const REQUEST_CODE_HRP: &str = "mcr";

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// A fresh, externally stable request code.
pub fn new_request_code() -> anyhow::Result<String> {
    new_uuid_to_bech32(REQUEST_CODE_HRP)
}
