// handlers/public/auth/mod.rs - Token acquisition endpoints

pub mod login;   // POST /auth/login/:company
pub mod refresh; // POST /auth/refresh
pub mod utils;

pub use login::login;
pub use refresh::refresh;
