//! Shared test fakes and end-to-end pipeline tests.

pub mod fakes;

mod pipeline;
