// Pool Engine Module
// Descriptor-keyed pool construction, vendor tuning and lifecycle

pub mod datasource;
pub mod drivers;
pub mod error;
pub mod factory;
pub mod lifecycle;
pub mod profile;
pub mod registry;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use datasource::DataSource;
pub use error::{CloseFailure, PoolError, PoolResult, ShutdownError};
pub use factory::PoolFactory;
pub use lifecycle::{Lifecycle, LifecycleState};
pub use profile::{ConnectionChecker, ExceptionSorter, VendorProfile};
pub use registry::PoolRegistry;
pub use traits::{PoolEngine, PoolHandle};
pub use types::*;
