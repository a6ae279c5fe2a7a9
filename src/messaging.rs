//! Chat platform transports.

pub mod teams;
pub mod traits;

pub use teams::TeamsAdapter;
pub use traits::{Transport, TransportDyn};
