pub mod docs;
pub mod settings;
pub mod types;
