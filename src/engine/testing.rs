//! In-memory pooling engine for unit tests

use std::any::Any;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::engine::error::{PoolError, PoolResult};
use crate::engine::traits::{PoolEngine, PoolHandle};
use crate::engine::types::PoolSettings;

/// Counts opens and closes, with injectable latency and failures
pub struct MockEngine {
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
    open_delay: Mutex<Option<Duration>>,
    fail_opens: AtomicBool,
    panic_next_open: AtomicBool,
    failing_closes: Arc<Mutex<HashSet<String>>>,
    drivers: Option<Vec<&'static str>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            opens: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            open_delay: Mutex::new(None),
            fail_opens: AtomicBool::new(false),
            panic_next_open: AtomicBool::new(false),
            failing_closes: Arc::new(Mutex::new(HashSet::new())),
            drivers: None,
        }
    }

    pub fn with_drivers(mut self, drivers: &[&'static str]) -> Self {
        self.drivers = Some(drivers.to_vec());
        self
    }

    pub fn with_open_delay(self, delay: Duration) -> Self {
        *self.open_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn fail_opens(&self, fail: bool) {
        self.fail_opens.store(fail, Ordering::SeqCst);
    }

    /// The next `open` panics instead of returning
    pub fn panic_on_next_open(&self) {
        self.panic_next_open.store(true, Ordering::SeqCst);
    }

    /// Pools for `url` fail to close until `allow_close_for` is called
    pub fn fail_close_for(&self, url: &str) {
        self.failing_closes.lock().unwrap().insert(url.to_string());
    }

    pub fn allow_close_for(&self, url: &str) {
        self.failing_closes.lock().unwrap().remove(url);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PoolEngine for MockEngine {
    fn engine_id(&self) -> &'static str {
        "mock"
    }

    fn supports(&self, driver_id: &str) -> bool {
        match &self.drivers {
            Some(drivers) => drivers.iter().any(|d| *d == driver_id),
            None => true,
        }
    }

    async fn open(&self, settings: &PoolSettings) -> PoolResult<Box<dyn PoolHandle>> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let delay = *self.open_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.panic_next_open.swap(false, Ordering::SeqCst) {
            panic!("engine crashed while opening {}", settings.url);
        }

        if self.fail_opens.load(Ordering::SeqCst) {
            return Err(PoolError::engine("connection refused"));
        }

        Ok(Box::new(MockPool {
            url: settings.url.clone(),
            closed: AtomicBool::new(false),
            failing_closes: Arc::clone(&self.failing_closes),
            closes: Arc::clone(&self.closes),
        }))
    }
}

pub struct MockPool {
    url: String,
    closed: AtomicBool,
    failing_closes: Arc<Mutex<HashSet<String>>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl PoolHandle for MockPool {
    async fn close(&self) -> PoolResult<()> {
        if self.failing_closes.lock().unwrap().contains(&self.url) {
            return Err(PoolError::engine("close timed out"));
        }
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn validate(&self) -> PoolResult<()> {
        if self.is_closed() {
            return Err(PoolError::engine("pool is closed"));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
