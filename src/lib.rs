pub mod anonymizer;
pub mod catalog;
pub mod config;
pub mod driver;
pub mod harvest;
pub mod model;
pub mod normalizer;
pub mod pagination;
pub mod parser;
pub mod pipeline;
pub mod resolver;
pub mod storage;
pub mod utils;
