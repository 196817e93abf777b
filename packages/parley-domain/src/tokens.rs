const CHARS_PER_TOKEN: usize = 4;

/// Rough token count: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u32 {
	let chars = text.chars().count();

	chars.div_ceil(CHARS_PER_TOKEN) as u32
}
