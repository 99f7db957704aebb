//! Game-of-the-week resolution and announcement dispatch.
//!
//! A week seed (`YYYYWW`) is looked up in the schedule, its title matched against the catalog,
//! the game's metadata record validated, and the announcement composed and sent to the
//! ConvertKit mailing list and any configured chat webhooks.

pub mod catalog;
pub mod channels;
pub mod compose;
pub mod config;
pub mod content;
pub mod dispatch;
pub mod error;
pub mod highlight;
pub mod mail;
pub mod readiness;
pub mod schedule;
pub mod secret;
pub mod transport;
pub mod week;

/// Convenience re-exports for the binary and embedders.
pub mod prelude {
    pub use crate::config::{EnvSnapshot, Settings};
    pub use crate::dispatch::{
        needs_secret, plan_sub_runs, ChannelOutcome, DispatchPlan, Dispatcher, RunFlags, RunReport,
        SubRunReport,
    };
    pub use crate::error::DispatchError;
    pub use crate::mail::probe_credentials;
    pub use crate::readiness::{check_week, schedule_status, Readiness};
    pub use crate::secret::{check_secret, CredentialShapeWarning, Secret};
    pub use crate::transport::{HttpTransport, Transport};
    pub use crate::week::WeekSeed;
}
