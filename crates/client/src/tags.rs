//! Tag colors
//!
//! A tag always gets the same palette entry, on every page and across
//! sessions. FNV-1a keeps the mapping stable across builds.

/// Background and text classes for one tag chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagColor {
    pub background: &'static str,
    pub text: &'static str,
}

pub const TAG_PALETTE: [TagColor; 6] = [
    TagColor { background: "bg-blue-100", text: "text-blue-700" },
    TagColor { background: "bg-purple-100", text: "text-purple-700" },
    TagColor { background: "bg-green-100", text: "text-green-700" },
    TagColor { background: "bg-orange-100", text: "text-orange-700" },
    TagColor { background: "bg-pink-100", text: "text-pink-700" },
    TagColor { background: "bg-teal-100", text: "text-teal-700" },
];

fn fnv1a(input: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    input.bytes().fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}

/// Palette entry for a tag; case and surrounding whitespace are ignored
pub fn tag_color(tag: &str) -> TagColor {
    let key = tag.trim().to_lowercase();
    let index = (fnv1a(&key) % TAG_PALETTE.len() as u64) as usize;
    TAG_PALETTE[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_tag_same_color() {
        assert_eq!(tag_color("Machine Learning"), tag_color("Machine Learning"));
        assert_eq!(tag_color("NLP"), tag_color("  nlp "));
    }

    #[test]
    fn test_colors_come_from_palette() {
        for tag in ["NLP", "ML", "Computer Vision", "Biology", ""] {
            assert!(TAG_PALETTE.contains(&tag_color(tag)));
        }
    }

    #[test]
    fn test_known_hash_values() {
        // Reference FNV-1a vectors
        assert_eq!(fnv1a(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a("a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_palette_is_spread() {
        let tags = ["nlp", "ml", "vision", "biology", "physics", "robotics", "graphs", "security"];
        let distinct: std::collections::HashSet<_> = tags.iter().map(|t| tag_color(t)).collect();
        assert!(distinct.len() > 1);
    }
}
