pub mod error;
pub mod manager;
pub mod model;
pub mod store;

pub use error::RoomError;
pub use manager::{RoomManager, RoomPolicy};
