pub mod presence;
pub mod router;

pub use presence::{JoinOutcome, PresenceRegistry};
pub use router::{Outbound, SessionRouter};

/// Transport assigned id, lives as long as one socket
pub type ConnectionId = uuid::Uuid;
