pub mod lenient;
pub mod photo;
pub mod record;
pub mod summary;

pub use photo::*;
pub use record::*;
pub use summary::*;
