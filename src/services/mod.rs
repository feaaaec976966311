pub mod credit_reports;
pub mod earnings;
pub mod errors;
pub mod optimization;
pub mod products;
