pub mod evidence;
pub mod fingerprint;
pub mod graph;
pub mod policy;
pub mod resolver;
pub mod scoring;
pub mod tags;
pub mod text;
pub mod time_serde;
