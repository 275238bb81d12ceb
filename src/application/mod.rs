// Application layer: use cases and orchestration over the repository.

pub mod error;
mod locks;
pub mod notifier;
pub mod reporting;
pub mod service;

pub use error::*;
pub use locks::ClientLocks;
pub use notifier::{DisabledNotifier, Notifier, NotifyError, WebhookNotifier};
pub use reporting::*;
pub use service::*;
