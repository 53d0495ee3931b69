pub mod cafeteria;
pub mod menu;
pub mod user;
