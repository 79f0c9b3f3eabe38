/// Root signature module - binding layout built from shader reflection

pub mod root_signature;

pub use root_signature::*;
