pub mod agents;
pub mod chat;
pub mod records;
pub mod workbenches;
