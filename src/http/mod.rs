mod error;
pub mod routes;

pub use routes::{router, AppState};
