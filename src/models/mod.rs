pub mod conversation;
pub mod events;
pub mod hiring;
pub mod message;
pub mod room;
pub mod token;
pub mod user;

pub use conversation::*;
pub use events::*;
pub use hiring::*;
pub use message::*;
pub use room::*;
pub use token::*;
pub use user::*;
