#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod model;
pub mod types;

#[path = "../transform/mod.rs"]
pub mod transform;

#[path = "../interval/mod.rs"]
pub mod interval;

#[path = "../evaluate/mod.rs"]
pub mod evaluate;

// Cohort file reading and result writing
#[path = "../cohort/mod.rs"]
pub mod cohort;
