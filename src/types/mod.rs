pub(crate) mod af;
pub(crate) mod prefix;
pub(crate) mod stats;

pub mod errors;
pub mod match_options;
