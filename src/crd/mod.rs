//! Typed model of the k6 load-test resources submitted by this tool

pub mod job;
