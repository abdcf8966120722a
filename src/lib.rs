// Library crate for the taxi emissions pipeline stages

pub mod pipeline;
