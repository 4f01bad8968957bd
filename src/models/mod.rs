pub mod chat;
pub mod donation;
pub mod enums;
pub mod notification;
pub mod request;
pub mod response;
pub mod user;
pub mod verification;

pub use chat::*;
pub use donation::*;
pub use enums::*;
pub use notification::*;
pub use request::*;
pub use response::*;
pub use user::*;
pub use verification::*;
