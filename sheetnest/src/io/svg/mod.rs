mod result_to_svg;
pub mod svg_util;

#[doc(inline)]
pub use result_to_svg::result_to_svg;
#[doc(inline)]
pub use svg_util::SvgDrawOptions;
#[doc(inline)]
pub use svg_util::SvgTheme;
