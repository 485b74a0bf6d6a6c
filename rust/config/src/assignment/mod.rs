pub mod assignment_policy;
pub mod config;
pub mod rendezvous_hash;
