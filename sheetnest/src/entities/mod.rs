mod part;
mod placement;
mod result;
mod sheet;

#[doc(inline)]
pub use part::Part;
#[doc(inline)]
pub use part::UnitItem;
#[doc(inline)]
pub use part::expand_units;
#[doc(inline)]
pub use part::validate_parts;
#[doc(inline)]
pub use placement::Placement;
#[doc(inline)]
pub use placement::Rotation;
#[doc(inline)]
pub use result::NestingProgress;
#[doc(inline)]
pub use result::NestingResult;
#[doc(inline)]
pub use result::UnplacedPart;
#[doc(inline)]
pub use sheet::Sheet;
