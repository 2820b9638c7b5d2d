pub mod csv;
pub mod script;
