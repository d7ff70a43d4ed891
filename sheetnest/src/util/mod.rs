/// Checks on the state of a layout, used in `debug_assert!()` blocks
pub mod assertions;
