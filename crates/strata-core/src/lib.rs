pub mod caster;
pub use caster::Caster;

pub mod driver;
pub use driver::Connection;

mod error;
pub use error::{
    Error, ExecutionErrorCode, InstanceErrorKind, IntoError, StructureErrorKind,
};

mod property_bag;
pub use property_bag::PropertyBag;

pub mod stmt;

/// A Result type alias that uses Strata's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;
