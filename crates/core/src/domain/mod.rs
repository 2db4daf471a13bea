pub mod catalog;
pub mod quote;
pub mod room;
pub mod version;
