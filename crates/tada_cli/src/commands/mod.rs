pub mod data;
pub mod lists;
pub mod reports;
pub mod settings;
pub mod tasks;
