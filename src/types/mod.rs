pub mod snapshot;
pub mod variable;
