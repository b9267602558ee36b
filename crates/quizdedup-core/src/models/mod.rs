pub mod kinds;
pub mod record;

pub use kinds::*;
pub use record::*;
