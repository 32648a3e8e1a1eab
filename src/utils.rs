//! # Utility Functions
//!
//! Common helpers for addresses, URLs and amounts used throughout the dashboard.

use crate::error::{DaoError, DaoResult};

/// Address formatting and validation utilities
pub mod address {
    use super::*;
    use regex::Regex;
    use std::sync::OnceLock;

    const ADDRESS_DISPLAY_PREFIX: usize = 6;
    const ADDRESS_DISPLAY_SUFFIX: usize = 4;

    static ENS_NAME: OnceLock<Regex> = OnceLock::new();

    /// Format an address for display with ellipsis in the middle
    ///
    /// # Returns
    /// Formatted address string like "0x98df...085d"
    pub fn format_short(address: &str) -> String {
        if address.len() <= ADDRESS_DISPLAY_PREFIX + ADDRESS_DISPLAY_SUFFIX + 3 {
            address.to_string()
        } else {
            format!(
                "{}...{}",
                &address[..ADDRESS_DISPLAY_PREFIX],
                &address[address.len() - ADDRESS_DISPLAY_SUFFIX..]
            )
        }
    }

    /// `0x` followed by 20 hex-encoded bytes
    pub fn is_valid_address(address: &str) -> bool {
        match address.strip_prefix("0x").or_else(|| address.strip_prefix("0X")) {
            Some(hex_part) if hex_part.len() == 40 => hex::decode(hex_part).is_ok(),
            _ => false,
        }
    }

    /// Validate an address, returning it unchanged
    pub fn validate(address: &str) -> DaoResult<&str> {
        if is_valid_address(address) {
            Ok(address)
        } else {
            Err(DaoError::InvalidAddress {
                address: address.to_string(),
            })
        }
    }

    /// Addresses compare case-insensitively (checksum casing is cosmetic)
    pub fn addresses_equal(first: &str, second: &str) -> bool {
        first.eq_ignore_ascii_case(second)
    }

    /// Human-readable names resolvable through ENS (`mycompany.aragonid.eth`)
    pub fn is_valid_ens_name(name: &str) -> bool {
        let re = ENS_NAME.get_or_init(|| {
            Regex::new(r"^([\w-]+\.)+(?:eth|test|xyz)$").expect("static ENS pattern")
        });
        re.is_match(name)
    }
}

/// URL helpers for locating app content
pub mod url {
    pub fn append_trailing_slash(url: &str) -> String {
        if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{}/", url)
        }
    }

    pub fn remove_starting_slash(path: &str) -> &str {
        path.strip_prefix('/').unwrap_or(path)
    }

    pub fn is_http_url(location: &str) -> bool {
        location.starts_with("http://") || location.starts_with("https://")
    }

    /// Resolve `to` against `from` the way a browser resolves a relative link.
    ///
    /// `from` is treated as a path: everything after its last `/` is dropped
    /// before `to` is appended, then `.` and `..` segments are collapsed.
    pub fn resolve_pathname(to: &str, from: &str) -> String {
        let is_to_abs = to.starts_with('/');
        let is_from_abs = from.starts_with('/');
        let must_end_abs = is_to_abs || is_from_abs;

        let mut parts: Vec<&str> = if is_to_abs {
            to.split('/').collect()
        } else {
            let mut base: Vec<&str> = from.split('/').collect();
            base.pop();
            base.extend(to.split('/'));
            base
        };

        if parts.is_empty() {
            return "/".to_string();
        }

        let has_trailing_slash = matches!(parts.last(), Some(&"") | Some(&".") | Some(&".."));

        let mut up = 0usize;
        let mut i = parts.len();
        while i > 0 {
            i -= 1;
            match parts[i] {
                "." => {
                    parts.remove(i);
                }
                ".." => {
                    parts.remove(i);
                    up += 1;
                }
                _ if up > 0 => {
                    parts.remove(i);
                    up -= 1;
                }
                _ => {}
            }
        }

        if !must_end_abs {
            for _ in 0..up {
                parts.insert(0, "..");
            }
        }

        if must_end_abs && parts.first().map_or(true, |first| !first.is_empty()) {
            parts.insert(0, "");
        }

        let mut result = parts.join("/");
        if has_trailing_slash && !result.ends_with('/') {
            result.push('/');
        }
        result
    }
}

/// Amount formatting utilities
pub mod amount {
    const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

    /// Format a wei amount as ETH with four decimals
    pub fn format_wei(wei: u128) -> String {
        let whole = wei / WEI_PER_ETH;
        let fraction = (wei % WEI_PER_ETH) / 100_000_000_000_000;
        format!("{}.{:04} ETH", whole, fraction)
    }

    /// Convert gwei to wei
    pub const fn gwei_to_wei(gwei: u64) -> u128 {
        gwei as u128 * 1_000_000_000
    }
}
