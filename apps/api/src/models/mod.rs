pub mod audit;
pub mod diagnosis;
pub mod patient;
pub mod user;
