pub mod config;
pub mod controller;
pub mod crd;

pub use crate::controller::{execute, prepare, Error, Method, PreparedJob, SubmittedJob};
