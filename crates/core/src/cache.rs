use chrono::{DateTime, Duration, Utc};

/// A value fetched from a slow collaborator, remembered for `ttl`.
///
/// Callers own the cache and pass it by reference; freshness is checked
/// against the `now` they supply, so refreshes happen only where a caller
/// asks for them.
#[derive(Debug, Clone)]
pub struct TimedCache<T> {
    value: Option<T>,
    fetched_at: Option<DateTime<Utc>>,
    ttl: Duration,
}

impl<T> TimedCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            value: None,
            fetched_at: None,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.value, self.fetched_at) {
            (Some(_), Some(at)) => now >= at && now - at < self.ttl,
            _ => false,
        }
    }

    /// The cached value if it is still fresh at `now`.
    pub fn get(&self, now: DateTime<Utc>) -> Option<&T> {
        if self.is_fresh(now) {
            self.value.as_ref()
        } else {
            None
        }
    }

    pub fn refresh(&mut self, value: T, now: DateTime<Utc>) -> &T {
        self.fetched_at = Some(now);
        self.value.insert(value)
    }

    pub fn invalidate(&mut self) {
        self.value = None;
        self.fetched_at = None;
    }

    /// Returns the fresh value, or loads, stores and returns a new one.
    pub fn get_or_refresh<E>(
        &mut self,
        now: DateTime<Utc>,
        load: impl FnOnce() -> Result<T, E>,
    ) -> Result<&T, E> {
        let fresh = self.is_fresh(now);
        let value = match self.value.take() {
            Some(v) if fresh => v,
            _ => {
                self.fetched_at = None;
                let v = load()?;
                self.fetched_at = Some(now);
                v
            }
        };
        Ok(self.value.insert(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_750_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn empty_cache_is_stale() {
        let cache: TimedCache<u32> = TimedCache::new(Duration::seconds(60));
        assert!(!cache.is_fresh(at(0)));
        assert!(cache.get(at(0)).is_none());
    }

    #[test]
    fn value_expires_after_ttl() {
        let mut cache = TimedCache::new(Duration::seconds(60));
        cache.refresh(vec![1, 2, 3], at(0));
        assert_eq!(cache.get(at(59)), Some(&vec![1, 2, 3]));
        assert!(cache.get(at(60)).is_none());
    }

    #[test]
    fn get_or_refresh_loads_once_while_fresh() {
        let mut cache = TimedCache::new(Duration::seconds(60));
        let mut loads = 0;
        for t in [0, 10, 20] {
            let v = cache
                .get_or_refresh::<()>(at(t), || {
                    loads += 1;
                    Ok(42)
                })
                .unwrap();
            assert_eq!(*v, 42);
        }
        assert_eq!(loads, 1);
        cache.get_or_refresh::<()>(at(120), || Ok(7)).unwrap();
        assert_eq!(cache.get(at(121)), Some(&7));
    }

    #[test]
    fn failed_load_keeps_cache_empty() {
        let mut cache: TimedCache<u32> = TimedCache::new(Duration::seconds(60));
        let r = cache.get_or_refresh(at(0), || Err("down"));
        assert_eq!(r, Err("down"));
        assert!(cache.fetched_at().is_none());
    }

    #[test]
    fn invalidate_forces_reload() {
        let mut cache = TimedCache::new(Duration::seconds(60));
        cache.refresh(1, at(0));
        cache.invalidate();
        assert!(!cache.is_fresh(at(1)));
    }
}
