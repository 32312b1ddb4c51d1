use std::env;
use std::time::Duration;

use tracing::warn;

pub const FILTER_DEBOUNCE_ENV: &str = "TIDEPOOL_FILTER_DEBOUNCE_MS";
pub const RANGE_DEBOUNCE_ENV: &str = "TIDEPOOL_RANGE_DEBOUNCE_MS";
pub const MAX_RANGE_COUNT_ENV: &str = "TIDEPOOL_MAX_RANGE_COUNT";

const DEFAULT_FILTER_DEBOUNCE: Duration = Duration::from_millis(500);
const DEFAULT_RANGE_DEBOUNCE: Duration = Duration::from_millis(200);
const DEFAULT_MIN_RANGE_COUNT: usize = 500;
const DEFAULT_ITEM_LABEL_PATH: &str = "label";

/// Connector tunables.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// How long filter input must stay unchanged before it is re-evaluated.
    pub filter_debounce: Duration,
    /// Coalescing window for outbound range requests while the active range
    /// is still being extended.
    pub range_debounce: Duration,
    /// Cap on the item count spanned by the active range. `None` derives the
    /// cap from the page size.
    pub max_range_count: Option<usize>,
    /// Item field holding the display label used for client-side filtering.
    pub item_label_path: String,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            filter_debounce: DEFAULT_FILTER_DEBOUNCE,
            range_debounce: DEFAULT_RANGE_DEBOUNCE,
            max_range_count: None,
            item_label_path: DEFAULT_ITEM_LABEL_PATH.to_owned(),
        }
    }
}

impl ConnectorConfig {
    /// Loads the default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = parse_env_u64(FILTER_DEBOUNCE_ENV) {
            config.filter_debounce = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_env_u64(RANGE_DEBOUNCE_ENV) {
            config.range_debounce = Duration::from_millis(ms);
        }
        if let Some(count) = parse_env_u64(MAX_RANGE_COUNT_ENV) {
            config.max_range_count = Some(count as usize);
        }
        config
    }

    /// The active-range item budget for a widget with the given page size.
    pub fn max_range_count_for(&self, page_size: usize) -> usize {
        self.max_range_count
            .unwrap_or_else(|| (page_size * 2).max(DEFAULT_MIN_RANGE_COUNT))
    }
}

fn parse_env_u64(name: &str) -> Option<u64> {
    let value = env::var(name).ok()?;
    match value.trim().parse::<u64>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(target = "connector::config", name, value, "ignoring invalid override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{LazyLock, Mutex};

    // Mutex to ensure environment variable tests don't run in parallel
    static ENV_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    #[test]
    fn default_config() {
        let config = ConnectorConfig::default();
        assert_eq!(config.filter_debounce, Duration::from_millis(500));
        assert_eq!(config.range_debounce, Duration::from_millis(200));
        assert_eq!(config.item_label_path, "label");
    }

    #[test]
    fn range_budget_follows_the_page_size() {
        let config = ConnectorConfig::default();
        assert_eq!(config.max_range_count_for(50), 500);
        assert_eq!(config.max_range_count_for(400), 800);
        let pinned = ConnectorConfig {
            max_range_count: Some(120),
            ..ConnectorConfig::default()
        };
        assert_eq!(pinned.max_range_count_for(50), 120);
    }

    #[test]
    fn env_overrides_are_applied() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            env::set_var(FILTER_DEBOUNCE_ENV, "50");
            env::set_var(RANGE_DEBOUNCE_ENV, "20");
            env::set_var(MAX_RANGE_COUNT_ENV, "100");
        }
        let config = ConnectorConfig::from_env();
        assert_eq!(config.filter_debounce, Duration::from_millis(50));
        assert_eq!(config.range_debounce, Duration::from_millis(20));
        assert_eq!(config.max_range_count, Some(100));
        unsafe {
            env::remove_var(FILTER_DEBOUNCE_ENV);
            env::remove_var(RANGE_DEBOUNCE_ENV);
            env::remove_var(MAX_RANGE_COUNT_ENV);
        }
    }

    #[test]
    fn invalid_override_falls_back_to_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            env::set_var(FILTER_DEBOUNCE_ENV, "fast");
        }
        let config = ConnectorConfig::from_env();
        assert_eq!(config.filter_debounce, Duration::from_millis(500));
        unsafe {
            env::remove_var(FILTER_DEBOUNCE_ENV);
        }
    }
}
