pub mod anchoring;
pub mod database;
pub mod ipfs;
pub mod proof_store;
pub mod webhook;
