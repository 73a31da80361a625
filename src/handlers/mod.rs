pub mod health;
pub mod diagnostics;
pub mod page_access;
pub mod page_content;
pub mod page_create;
pub mod page_get;
pub mod page_versions;

pub use health::*;
pub use diagnostics::*;
pub use page_access::*;
pub use page_content::*;
pub use page_create::*;
pub use page_get::*;
pub use page_versions::*;
