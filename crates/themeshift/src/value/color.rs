//! Color-bearing recognition.
//!
//! Two independent, permissive signals decide whether something carries
//! color (or swappable imagery):
//!
//! - [`is_color_property`]: the property (or variable) name belongs to a fixed
//!   vocabulary (`color`, `background*`, `border*`, `*shadow*`, ...).
//! - [`is_color_value`]: the value contains a named color, a hex color, a
//!   functional color, a gradient, `url()` or `image-set()`.
//!
//! [`is_color_bearing`] ORs the two. `border: 1px` therefore counts, because
//! `border` is in the vocabulary even though `1px` is not a color.

use cssparser::{Parser, ParserInput, Token};

/// CSS named colors plus the special keywords `transparent` and `currentcolor`.
pub const NAMED_COLORS: &[&str] = &[
    "aliceblue", "antiquewhite", "aqua", "aquamarine", "azure", "beige", "bisque", "black",
    "blanchedalmond", "blue", "blueviolet", "brown", "burlywood", "cadetblue", "chartreuse",
    "chocolate", "coral", "cornflowerblue", "cornsilk", "crimson", "currentcolor", "cyan",
    "darkblue", "darkcyan", "darkgoldenrod", "darkgray", "darkgreen", "darkgrey", "darkkhaki",
    "darkmagenta", "darkolivegreen", "darkorange", "darkorchid", "darkred", "darksalmon",
    "darkseagreen", "darkslateblue", "darkslategray", "darkslategrey", "darkturquoise",
    "darkviolet", "deeppink", "deepskyblue", "dimgray", "dimgrey", "dodgerblue", "firebrick",
    "floralwhite", "forestgreen", "fuchsia", "gainsboro", "ghostwhite", "gold", "goldenrod",
    "gray", "green", "greenyellow", "grey", "honeydew", "hotpink", "indianred", "indigo",
    "ivory", "khaki", "lavender", "lavenderblush", "lawngreen", "lemonchiffon", "lightblue",
    "lightcoral", "lightcyan", "lightgoldenrodyellow", "lightgray", "lightgreen", "lightgrey",
    "lightpink", "lightsalmon", "lightseagreen", "lightskyblue", "lightslategray",
    "lightslategrey", "lightsteelblue", "lightyellow", "lime", "limegreen", "linen", "magenta",
    "maroon", "mediumaquamarine", "mediumblue", "mediumorchid", "mediumpurple",
    "mediumseagreen", "mediumslateblue", "mediumspringgreen", "mediumturquoise",
    "mediumvioletred", "midnightblue", "mintcream", "mistyrose", "moccasin", "navajowhite",
    "navy", "oldlace", "olive", "olivedrab", "orange", "orangered", "orchid", "palegoldenrod",
    "palegreen", "paleturquoise", "palevioletred", "papayawhip", "peachpuff", "peru", "pink",
    "plum", "powderblue", "purple", "rebeccapurple", "red", "rosybrown", "royalblue",
    "saddlebrown", "salmon", "sandybrown", "seagreen", "seashell", "sienna", "silver",
    "skyblue", "slateblue", "slategray", "slategrey", "snow", "springgreen", "steelblue", "tan",
    "teal", "thistle", "tomato", "transparent", "turquoise", "violet", "wheat", "white",
    "whitesmoke", "yellow", "yellowgreen",
];

/// Functions producing a color or an image.
const COLOR_FUNCTIONS: &[&str] = &[
    "rgb", "rgba", "hsl", "hsla", "hwb", "lab", "lch", "oklab", "oklch", "color",
    "color-mix", "light-dark", "linear-gradient", "radial-gradient", "conic-gradient",
    "repeating-linear-gradient", "repeating-radial-gradient", "repeating-conic-gradient",
    "url", "image", "image-set", "-webkit-image-set", "cross-fade", "element",
    // preprocessor color helpers
    "darken", "lighten", "saturate", "desaturate", "fade", "fadein", "fadeout", "mix",
    "tint", "shade", "spin", "adjust-hue", "transparentize", "opacify",
];

/// Prefixes of properties that implicitly carry color.
const COLOR_PROPERTY_PREFIXES: &[&str] = &[
    "background", "border", "outline", "text-decoration", "text-emphasis", "column-rule",
    "fill", "stroke", "caret", "accent", "scrollbar", "list-style-image", "mask",
    "flood", "lighting", "stop",
];

/// Returns true if `name` (a property or a variable name with its sigil)
/// implicitly carries color semantics.
pub fn is_color_property(name: &str) -> bool {
    let name = name.trim_start_matches(['$', '@', '-']).to_ascii_lowercase();
    if name == "color" || name.ends_with("-color") || name.contains("shadow") {
        return true;
    }
    COLOR_PROPERTY_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Returns true if `value` contains a color or an image reference.
///
/// Values the tokenizer rejects are treated as not color-bearing.
pub fn is_color_value(value: &str) -> bool {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    contains_color(&mut parser)
}

/// OR of [`is_color_property`] and [`is_color_value`].
pub fn is_color_bearing(name: Option<&str>, value: &str) -> bool {
    name.is_some_and(is_color_property) || is_color_value(value)
}

/// Returns true for a CSS named color keyword.
pub fn is_named_color(ident: &str) -> bool {
    let lower = ident.to_ascii_lowercase();
    NAMED_COLORS.binary_search(&lower.as_str()).is_ok()
}

fn contains_color(input: &mut Parser<'_, '_>) -> bool {
    loop {
        let token = match input.next() {
            Ok(token) => token.clone(),
            Err(_) => return false,
        };
        let found = match token {
            Token::Ident(ref ident) => is_named_color(ident),
            Token::Hash(ref hex) | Token::IDHash(ref hex) => is_hex_color(hex),
            Token::UnquotedUrl(_) => true,
            Token::Function(ref name) => {
                let lower = name.to_ascii_lowercase();
                COLOR_FUNCTIONS.contains(&lower.as_str()) || nested_contains_color(input)
            }
            Token::ParenthesisBlock | Token::SquareBracketBlock | Token::CurlyBracketBlock => {
                nested_contains_color(input)
            }
            _ => false,
        };
        if found {
            return true;
        }
    }
}

fn nested_contains_color(input: &mut Parser<'_, '_>) -> bool {
    input
        .parse_nested_block(|input| {
            let found = contains_color(input);
            // the nested parser must be drained before it can be closed
            while input.next().is_ok() {}
            Ok::<_, cssparser::ParseError<'_, ()>>(found)
        })
        .unwrap_or(false)
}

fn is_hex_color(hex: &str) -> bool {
    matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_colors_sorted_for_binary_search() {
        let mut sorted = NAMED_COLORS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, NAMED_COLORS);
    }

    #[test]
    fn test_color_properties() {
        for name in [
            "color",
            "background",
            "background-image",
            "border-top",
            "box-shadow",
            "text-shadow",
            "outline-color",
            "text-decoration-color",
            "text-emphasis",
            "fill",
            "$link-color",
            "--shadow-elevated",
        ] {
            assert!(is_color_property(name), "{name} should be color-bearing");
        }
        for name in ["width", "margin", "font-size", "$spacing", "animation"] {
            assert!(!is_color_property(name), "{name} should not be color-bearing");
        }
    }

    #[test]
    fn test_color_values() {
        for value in [
            "red",
            "#fff",
            "#a1b2c3d4",
            "rgba(0, 0, 0, .5)",
            "1px solid Crimson",
            "hsl(120deg 50% 50%)",
            "linear-gradient(to right, a, b)",
            "url(./bg.png)",
            "url(\"./bg.png\")",
            "image-set(\"a.png\" 1x)",
            "0 0 2px transparent",
            "calc(1px) currentColor",
        ] {
            assert!(is_color_value(value), "{value} should be color-bearing");
        }
        for value in ["1px", "bold", "10px 20px", "#zz", "none", "ease-in 2s"] {
            assert!(!is_color_value(value), "{value} should not be color-bearing");
        }
    }

    #[test]
    fn test_color_bearing_is_or_of_both_signals() {
        // Name alone is enough.
        assert!(is_color_bearing(Some("border"), "1px"));
        // Value alone is enough.
        assert!(is_color_bearing(Some("--brand"), "#123456"));
        assert!(is_color_bearing(None, "blue"));
        // Neither.
        assert!(!is_color_bearing(Some("width"), "1px"));
        assert!(!is_color_bearing(None, "1px"));
    }
}
