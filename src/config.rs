use crate::error::{Error, Result};
use crate::executor::{PanicStrategy, Priority};
use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_CORE_THREADS: usize = 4;
pub const DEFAULT_MAX_THREADS: usize = 4;
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::ZERO;
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;
pub const DEFAULT_REQUEUE_INTERVAL: Duration = Duration::from_secs(5);

/// Orders two priorities; `Greater` means the first one is dequeued earlier.
pub type PriorityComparator = fn(Priority, Priority) -> Ordering;

/// Higher priority values run first.
pub fn highest_first(a: Priority, b: Priority) -> Ordering {
    a.cmp(&b)
}

/// Lower priority values run first.
pub fn lowest_first(a: Priority, b: Priority) -> Ordering {
    b.cmp(&a)
}

/// How a pool's admission queue orders pending tasks.
#[derive(Clone, Copy)]
pub enum QueueOrder {
    Fifo,
    /// Ordered by the comparator; equal priorities keep submission order.
    Priority(PriorityComparator),
}

impl QueueOrder {
    /// Priority ordering with the highest priority dequeued first.
    pub fn priority() -> Self {
        QueueOrder::Priority(highest_first)
    }

    pub fn is_priority(&self) -> bool {
        matches!(self, QueueOrder::Priority(_))
    }
}

impl Default for QueueOrder {
    fn default() -> Self {
        QueueOrder::Fifo
    }
}

impl fmt::Debug for QueueOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueOrder::Fifo => f.write_str("Fifo"),
            QueueOrder::Priority(_) => f.write_str("Priority"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub core_threads: usize,
    pub max_threads: usize,
    pub keep_alive: Duration,
    pub order: QueueOrder,
    pub queue_capacity: usize,
    pub panic_strategy: PanicStrategy,
    pub stack_size: Option<usize>,
    /// Worker threads are named `{prefix}-{pool}-{n}`.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            core_threads: DEFAULT_CORE_THREADS,
            max_threads: DEFAULT_MAX_THREADS,
            keep_alive: DEFAULT_KEEP_ALIVE,
            order: QueueOrder::Fifo,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            panic_strategy: PanicStrategy::default(),
            stack_size: None,
            thread_name_prefix: "spillway".to_string(),
        }
    }
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_threads == 0 {
            return Err(Error::config("max_threads must be > 0"));
        }

        if self.core_threads > self.max_threads {
            return Err(Error::config(format!(
                "core_threads ({}) must not exceed max_threads ({})",
                self.core_threads, self.max_threads
            )));
        }

        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be > 0"));
        }

        if let Some(0) = self.stack_size {
            return Err(Error::config("stack_size must be > 0"));
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    pub fn core_threads(mut self, n: usize) -> Self {
        self.config.core_threads = n;
        self
    }

    pub fn max_threads(mut self, n: usize) -> Self {
        self.config.max_threads = n;
        self
    }

    /// Sets core and max to the same value.
    pub fn fixed_threads(self, n: usize) -> Self {
        self.core_threads(n).max_threads(n)
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    pub fn order(mut self, order: QueueOrder) -> Self {
        self.config.order = order;
        self
    }

    pub fn priority_mode(mut self, enabled: bool) -> Self {
        self.config.order = if enabled {
            QueueOrder::priority()
        } else {
            QueueOrder::Fifo
        };
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn build(self) -> Result<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Period of the shared requeue tick.
    pub requeue_interval: Duration,
    pub scheduler_thread_name: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            requeue_interval: DEFAULT_REQUEUE_INTERVAL,
            scheduler_thread_name: "spillway-requeue".to_string(),
        }
    }
}

impl RegistryConfig {
    pub fn builder() -> RegistryConfigBuilder {
        RegistryConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.requeue_interval.is_zero() {
            return Err(Error::config("requeue_interval must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RegistryConfigBuilder {
    config: RegistryConfig,
}

impl RegistryConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RegistryConfig::default(),
        }
    }

    pub fn requeue_interval(mut self, interval: Duration) -> Self {
        self.config.requeue_interval = interval;
        self
    }

    pub fn scheduler_thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.scheduler_thread_name = name.into();
        self
    }

    pub fn build(self) -> Result<RegistryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.core_threads, 4);
        assert_eq!(config.max_threads, 4);
        assert_eq!(config.keep_alive, Duration::ZERO);
        assert_eq!(config.queue_capacity, 16);
        assert!(!config.order.is_priority());
        assert!(config.validate().is_ok());

        assert_eq!(RegistryConfig::default().requeue_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_rejects_bad_sizing() {
        let err = PoolConfig::builder().max_threads(0).core_threads(0).build();
        assert!(err.unwrap_err().is_config());

        let err = PoolConfig::builder().core_threads(3).max_threads(2).build();
        assert!(err.is_err());

        let err = PoolConfig::builder().queue_capacity(0).build();
        assert!(err.is_err());

        let err = RegistryConfig::builder()
            .requeue_interval(Duration::ZERO)
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn test_builder_accepts_zero_core() {
        let config = PoolConfig::builder()
            .core_threads(0)
            .max_threads(2)
            .keep_alive(Duration::from_millis(50))
            .priority_mode(true)
            .build()
            .unwrap();

        assert_eq!(config.core_threads, 0);
        assert!(config.order.is_priority());
    }

    #[test]
    fn test_comparators() {
        assert_eq!(highest_first(Priority::HIGH, Priority::LOW), Ordering::Greater);
        assert_eq!(lowest_first(Priority::HIGH, Priority::LOW), Ordering::Less);
    }
}
