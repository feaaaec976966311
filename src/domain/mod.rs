pub mod earnings;
pub mod models;
pub mod optimizer;
