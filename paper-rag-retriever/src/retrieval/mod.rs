pub mod chunking_strategy;
pub mod context;
pub mod corpus_index;
pub mod flat_index;
pub mod indexing_engine;
pub mod retriever;
