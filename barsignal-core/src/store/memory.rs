//! In-process implementations of the cache and bar-source ports.

use std::collections::{HashMap, VecDeque};

use parking_lot::{Mutex, RwLock};

use crate::domain::{Bar, SecurityType, StrategyInstanceKey};
use crate::ports::{BarSource, KeyValueCache, StoreError};

/// `KeyValueCache` backed by a mutex-guarded map. Compare-and-swap is atomic
/// with respect to every other operation on the same cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        if entries.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        match new {
            Some(v) => {
                entries.insert(key.to_string(), v.to_string());
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(true)
    }
}

/// Rolling per-contract bar buffers, capped at `capacity` bars each.
#[derive(Debug)]
pub struct MemoryBarSource {
    capacity: usize,
    series: RwLock<HashMap<(String, SecurityType), VecDeque<Bar>>>,
}

impl MemoryBarSource {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "bar capacity must be >= 1");
        Self {
            capacity,
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Append `bar` to the contract's buffer, evicting the oldest when full.
    pub fn push(&self, symbol: &str, security_type: SecurityType, bar: Bar) {
        let mut series = self.series.write();
        let buf = series
            .entry((symbol.to_string(), security_type))
            .or_default();
        if buf.len() == self.capacity {
            buf.pop_front();
        }
        buf.push_back(bar);
    }

    pub fn len(&self, symbol: &str, security_type: SecurityType) -> usize {
        self.series
            .read()
            .get(&(symbol.to_string(), security_type))
            .map_or(0, VecDeque::len)
    }

    /// Every buffered bar for the contract, oldest first.
    pub fn snapshot(&self, symbol: &str, security_type: SecurityType) -> Vec<Bar> {
        self.series
            .read()
            .get(&(symbol.to_string(), security_type))
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl BarSource for MemoryBarSource {
    fn bar_window(
        &self,
        key: &StrategyInstanceKey,
        min_bars: usize,
    ) -> Result<Option<Vec<Bar>>, StoreError> {
        let series = self.series.read();
        let Some(buf) = series.get(&(key.symbol.clone(), key.security_type)) else {
            return Ok(None);
        };
        if buf.is_empty() || buf.len() < min_bars {
            return Ok(None);
        }
        Ok(Some(buf.iter().cloned().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn cas_on_absent_key() {
        let cache = MemoryCache::new();
        assert!(cache.compare_and_swap("k", None, Some("v1")).unwrap());
        assert!(!cache.compare_and_swap("k", None, Some("v2")).unwrap());
        assert_eq!(cache.get("k").unwrap().as_deref(), Some("v1"));
    }

    #[test]
    fn cas_delete() {
        let cache = MemoryCache::new();
        cache.set("k", "v").unwrap();
        assert!(!cache.compare_and_swap("k", Some("x"), None).unwrap());
        assert!(cache.compare_and_swap("k", Some("v"), None).unwrap());
        assert!(cache.is_empty());
    }

    #[test]
    fn bar_source_caps_and_windows() {
        let source = MemoryBarSource::new(3);
        for bar in make_bars(&[1.0, 2.0, 3.0, 4.0]) {
            source.push("ES", SecurityType::Future, bar);
        }
        assert_eq!(source.len("ES", SecurityType::Future), 3);

        let key = StrategyInstanceKey::new("A", "ES", SecurityType::Future, "b");
        let window = source.bar_window(&key, 3).unwrap().unwrap();
        let vwaps: Vec<f64> = window.iter().map(|b| b.vwap).collect();
        assert_eq!(vwaps, vec![2.0, 3.0, 4.0]);
        assert!(source.bar_window(&key, 4).unwrap().is_none());
        assert_eq!(source.snapshot("ES", SecurityType::Future), window);
        assert!(source.snapshot("NQ", SecurityType::Future).is_empty());
    }

    #[test]
    fn bar_source_unknown_contract_is_absent() {
        let source = MemoryBarSource::new(3);
        let key = StrategyInstanceKey::new("A", "NQ", SecurityType::Future, "b");
        assert!(source.bar_window(&key, 1).unwrap().is_none());
    }
}
