pub mod auth;
pub mod market;
pub mod trading;

pub use auth::*;
pub use market::*;
pub use trading::*;
