//! kubestrap database bootstrap
//!
//! Runs out of process, long after `kubestrap deploy` has exited: the stack
//! subscribes this handler to the database's lifecycle notifications. On the
//! "instance started" event it fetches the database password, the TLS trust
//! bundle and the init script, then runs the script with `psql`.
//!
//! All of it is driven by [`BootstrapHandler::handle`], which never panics
//! and always returns a [`BootstrapResult`].

pub mod downloads;
pub mod error;
pub mod event;
pub mod handler;
pub mod psql;
pub mod settings;

pub use error::{BootstrapError, BootstrapErrorKind, Result};
pub use event::{EventClass, INSTANCE_STARTED_EVENT_ID, classify};
pub use handler::{BootstrapHandler, BootstrapResult, BootstrapState};
pub use psql::SqlClient;
pub use settings::{BootstrapSettings, SettingsError};
