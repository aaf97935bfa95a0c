pub mod errors;
pub mod events;
pub mod id;

pub use errors::{CanopyError, ConfigError, StoreError};
pub use events::EventBus;
pub use id::{new_id, SessionId};

pub type Result<T> = std::result::Result<T, CanopyError>;
