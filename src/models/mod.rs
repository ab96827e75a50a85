pub mod action;
pub mod event;
pub mod requests;
pub mod responses;
pub mod session;
pub mod target;

pub use action::*;
pub use event::*;
pub use requests::*;
pub use responses::*;
pub use session::*;
pub use target::*;
