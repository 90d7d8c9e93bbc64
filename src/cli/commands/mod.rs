pub mod company;
pub mod migrate;
pub mod sync;
pub mod user;
