pub mod document;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod identity;
pub mod messages;
pub mod page;
pub mod ready;

pub use document::*;
pub use diagnostics::*;
pub use error::*;
pub use health::*;
pub use identity::*;
pub use messages::*;
pub use page::*;
pub use ready::*;
