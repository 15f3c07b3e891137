pub mod product;
pub mod run;
pub mod stats;
