//! Engine configuration, passed explicitly into the manager
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Refuse a new request while an equivalent one is still pending.
    pub ensure_requests_are_unique: bool,
    /// Minutes after which a pending request can no longer be checked. `None` never expires.
    pub request_expiration_in_minutes: Option<u64>,
    /// Actor kinds allowed to make requests. Empty allows everyone.
    pub whitelisted_makers: Vec<String>,
    /// Actor kinds allowed to check requests. Empty allows everyone.
    pub whitelisted_checkers: Vec<String>,
    /// Contacts of actors allowed to check their own requests.
    pub whitelisted_contacts: Vec<String>,
    pub db_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ensure_requests_are_unique: true,
            request_expiration_in_minutes: None,
            whitelisted_makers: vec![],
            whitelisted_checkers: vec![],
            whitelisted_contacts: vec![],
            db_path: PathBuf::from("maker_checker.db"),
        }
    }
}

impl Config {
    /// Read configuration from the environment, loading a `.env` file first if present.
    pub fn from_env() -> anyhow::Result<Config> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let ensure_requests_are_unique = match std::env::var("MAKER_CHECKER_ENSURE_UNIQUE") {
            Ok(value) => parse_bool(&value).ok_or_else(|| {
                anyhow::anyhow!("MAKER_CHECKER_ENSURE_UNIQUE must be a boolean, got {value:?}")
            })?,
            Err(_) => defaults.ensure_requests_are_unique,
        };

        let request_expiration_in_minutes =
            match std::env::var("MAKER_CHECKER_REQUEST_EXPIRATION_MINUTES") {
                Ok(value) => parse_minutes(&value)?,
                Err(_) => None,
            };

        Ok(Config {
            ensure_requests_are_unique,
            request_expiration_in_minutes,
            whitelisted_makers: list_var("MAKER_CHECKER_WHITELISTED_MAKERS"),
            whitelisted_checkers: list_var("MAKER_CHECKER_WHITELISTED_CHECKERS"),
            whitelisted_contacts: list_var("MAKER_CHECKER_WHITELISTED_EMAILS"),
            db_path: std::env::var("MAKER_CHECKER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
        })
    }

    pub fn can_make(&self, actor_kind: &str) -> bool {
        self.whitelisted_makers.is_empty()
            || self.whitelisted_makers.iter().any(|kind| kind == actor_kind)
    }

    pub fn can_check(&self, actor_kind: &str) -> bool {
        self.whitelisted_checkers.is_empty()
            || self.whitelisted_checkers.iter().any(|kind| kind == actor_kind)
    }

    pub fn is_dual_role(&self, contact: &str) -> bool {
        self.whitelisted_contacts.iter().any(|allowed| allowed == contact)
    }
}

fn list_var(name: &str) -> Vec<String> {
    split_list(&std::env::var(name).unwrap_or_default())
}

/// Comma separated list, trimmed, with empty entries dropped.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_minutes(raw: &str) -> anyhow::Result<Option<u64>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let minutes = raw.trim().parse().map_err(|_| {
        anyhow::anyhow!(
            "MAKER_CHECKER_REQUEST_EXPIRATION_MINUTES must be a whole number of minutes, got {raw:?}"
        )
    })?;
    Ok(Some(minutes))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
