pub mod fact_store;
pub mod value;
