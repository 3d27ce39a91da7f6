pub use crate::config::{PoolConfig, PoolConfigBuilder, QueueOrder, RegistryConfig};
pub use crate::error::{Error, Result};
pub use crate::executor::{interrupted, ManagedPool, PanicStrategy, Priority, Task, TaskId};
pub use crate::registry::Registry;
pub use crate::telemetry::MetricsSnapshot;
