//! Word2vec query-latency benchmark library
//!
//! Trains a word-vector model over a text corpus, then measures the
//! steady-state latency of repeated distance + analogy query pairs
//! against the loaded model, reporting min/max/mean/median per batch.

pub mod bench;
pub mod config;
pub mod monitor;
pub mod phrases;
pub mod stats;
pub mod timer;
pub mod word2vec;
