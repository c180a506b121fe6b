//! Harness configuration.
//!
//! Defaults can be overridden through environment variables so a whole test run
//! can be made deterministic without touching test code:
//!
//! * `HTTP_HARNESS_SCRIPT_NAME` - application entry path (default `/index.php`)
//! * `HTTP_HARNESS_SEED` - seed for the nonce and fixture generators
//! * `HTTP_HARNESS_NONCE_MAX` - upper bound (inclusive) of the per-test nonce

pub const DEFAULT_SCRIPT_NAME: &str = "/index.php";
pub const DEFAULT_NONCE_MAX: u32 = 100_000_000;

pub const SCRIPT_NAME_VAR: &str = "HTTP_HARNESS_SCRIPT_NAME";
pub const SEED_VAR: &str = "HTTP_HARNESS_SEED";
pub const NONCE_MAX_VAR: &str = "HTTP_HARNESS_NONCE_MAX";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub script_name: String,
    pub seed: Option<u64>,
    pub nonce_max: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            script_name: DEFAULT_SCRIPT_NAME.to_string(),
            seed: None,
            nonce_max: DEFAULT_NONCE_MAX,
        }
    }
}

impl HarnessConfig {
    /// Build a config from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup. Unparseable values are
    /// logged and ignored.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(script_name) = lookup(SCRIPT_NAME_VAR) {
            config.script_name = script_name;
        }
        if let Some(seed) = parse_var(&lookup, SEED_VAR) {
            config.seed = Some(seed);
        }
        if let Some(nonce_max) = parse_var(&lookup, NONCE_MAX_VAR) {
            config.nonce_max = nonce_max;
        }

        log::trace!("from_lookup: {config:?}");

        config
    }

    #[must_use]
    pub fn with_script_name(mut self, script_name: impl Into<String>) -> Self {
        self.script_name = script_name.into();
        self
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub const fn with_nonce_max(mut self, nonce_max: u32) -> Self {
        self.nonce_max = nonce_max;
        self
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = lookup(name)?;
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::warn!("Ignoring invalid {name}='{value}': {e}");
            None
        }
    }
}
