//! Identity resolution for Waybill commands.
//!
//! Every command that writes a session or an event needs to know who is
//! acting. Rather than requiring `--as` on every invocation, identity is
//! resolved through a chain:
//!
//! 1. `--as <identity>` — explicit per-command override
//! 2. `WAYBILL_IDENTITY` env var — process/session level
//! 3. `~/.waybill/config.toml` — global default for single-courier setups

use std::env;

use crate::config::Config;

/// Error message shown when identity cannot be resolved.
pub const IDENTITY_REQUIRED: &str = "identity required: pass --as <identity>, \
    set WAYBILL_IDENTITY, or add `identity = \"...\"` to ~/.waybill/config.toml";

/// Resolve the acting identity from the tiered resolution chain.
pub fn resolve(explicit: Option<&str>, config: &Config) -> Result<String, String> {
    // 1. Explicit --as flag.
    if let Some(id) = explicit {
        return Ok(id.to_string());
    }

    // 2. WAYBILL_IDENTITY environment variable.
    if let Ok(id) = env::var("WAYBILL_IDENTITY")
        && !id.is_empty()
    {
        return Ok(id);
    }

    // 3. Configured default.
    if let Some(id) = &config.identity
        && !id.is_empty()
    {
        return Ok(id.clone());
    }

    Err(IDENTITY_REQUIRED.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flag_wins() {
        let config = Config {
            identity: Some("configured".into()),
            ..Config::default()
        };
        let id = resolve(Some("explicit"), &config).unwrap();
        assert_eq!(id, "explicit");
    }

    #[test]
    fn config_default_used_last() {
        let config = Config {
            identity: Some("configured".into()),
            ..Config::default()
        };
        // Env var handling is not exercised here — tests share a process.
        let id = resolve(None, &config).unwrap();
        assert_eq!(id, "configured");
    }

    #[test]
    fn unresolvable_identity_is_an_error() {
        let err = resolve(None, &Config::default()).unwrap_err();
        assert_eq!(err, IDENTITY_REQUIRED);
    }
}
