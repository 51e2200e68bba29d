pub mod communication;
pub mod disposition;
pub mod log;
pub mod office;
pub mod personal;
pub mod role;
pub mod user;
