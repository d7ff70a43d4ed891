/// External (serializable) representations of nesting instances and solutions
pub mod ext_repr;

/// All logic for drawing nesting results as SVG
pub mod svg;
