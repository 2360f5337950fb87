pub mod import;
pub mod learn;
pub mod map;
pub mod search;
pub mod status;
