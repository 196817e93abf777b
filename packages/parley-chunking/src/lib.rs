//! Sentence-respecting text chunker.
//!
//! Text is segmented at sentence boundaries (Unicode sentence segmentation, which breaks after
//! terminal punctuation). Sentences accumulate into a chunk until the next one would push the chunk
//! past `target_chars`, provided the chunk already holds at least `min_chars`. A sentence longer
//! than `target_chars` is hard-split on word boundaries first.
//!
//! Chunks are trimmed and adjacent sentences inside a chunk are joined by one space, so
//! [`reconstruct`] returns the original text with inter-sentence whitespace runs collapsed.

use parley_domain::{Chunk, IndexedText, MessageMetadata};
use unicode_segmentation::UnicodeSegmentation;

#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	pub target_chars: usize,
	pub min_chars: usize,
}
impl Default for ChunkingConfig {
	fn default() -> Self {
		Self { target_chars: 512, min_chars: 100 }
	}
}

/// Splits `text` into chunks that carry the message's metadata.
///
/// Indices are assigned in creation order and every chunk gets the final count as
/// `total_chunks`. Blank input yields no chunks.
pub fn chunk(
	text: &str,
	message_id: &str,
	metadata: &MessageMetadata,
	cfg: &ChunkingConfig,
) -> Vec<Chunk> {
	let pieces = split_text(text, cfg);
	let total_chunks = pieces.len() as u32;

	pieces
		.into_iter()
		.enumerate()
		.map(|(idx, content)| Chunk {
			content,
			message_id: message_id.to_string(),
			chunk_index: idx as u32,
			total_chunks,
			channel_id: metadata.channel_id.clone(),
			user_id: metadata.user_id.clone(),
			timestamp: metadata.created_at,
			reply_to_id: metadata.reply_to_id.clone(),
		})
		.collect()
}

/// Reassembles chunk text in `chunk_index` order, joined by single spaces.
///
/// The sort is stable and duplicates are kept.
pub fn reconstruct<T>(chunks: &[T]) -> String
where
	T: IndexedText,
{
	let mut ordered: Vec<&T> = chunks.iter().collect();

	ordered.sort_by_key(|chunk| chunk.chunk_index());

	ordered.iter().map(|chunk| chunk.text()).collect::<Vec<_>>().join(" ")
}

pub fn split_text(text: &str, cfg: &ChunkingConfig) -> Vec<String> {
	let target = cfg.target_chars.max(1);
	let mut chunks = Vec::new();
	let mut current = String::new();
	let mut current_chars = 0_usize;

	for sentence in text.split_sentence_bounds() {
		let sentence = sentence.trim();

		if sentence.is_empty() {
			continue;
		}

		let pieces = if char_len(sentence) > target {
			hard_split(sentence, target)
		} else {
			vec![sentence.to_string()]
		};

		for piece in pieces {
			let piece_chars = char_len(&piece);

			if current_chars > 0
				&& current_chars + 1 + piece_chars > target
				&& current_chars >= cfg.min_chars
			{
				chunks.push(std::mem::take(&mut current));

				current_chars = 0;
			}
			if current_chars > 0 {
				current.push(' ');

				current_chars += 1;
			}

			current.push_str(&piece);

			current_chars += piece_chars;
		}
	}

	if !current.is_empty() {
		chunks.push(current);
	}

	chunks
}

/// Splits an oversized sentence between words. Whitespace inside a piece is kept as written; the
/// gap at a piece boundary is dropped.
fn hard_split(sentence: &str, target: usize) -> Vec<String> {
	let mut pieces = Vec::new();
	let mut current = String::new();
	let mut current_chars = 0_usize;

	for (gap, word) in words_with_gaps(sentence) {
		let word_chars = char_len(word);

		if word_chars > target {
			if !current.is_empty() {
				pieces.push(std::mem::take(&mut current));

				current_chars = 0;
			}

			pieces.extend(split_long_word(word, target));

			continue;
		}

		let gap_chars = char_len(gap);

		if current_chars > 0 && current_chars + gap_chars + word_chars > target {
			pieces.push(std::mem::take(&mut current));

			current_chars = 0;
		}
		if current_chars > 0 {
			current.push_str(gap);

			current_chars += gap_chars;
		}

		current.push_str(word);

		current_chars += word_chars;
	}

	if !current.is_empty() {
		pieces.push(current);
	}

	pieces
}

/// Pairs every word with the whitespace run in front of it.
fn words_with_gaps(text: &str) -> Vec<(&str, &str)> {
	let mut out = Vec::new();
	let mut gap_start = 0;
	let mut word_start = None;

	for (idx, ch) in text.char_indices() {
		match (ch.is_whitespace(), word_start) {
			(false, None) => word_start = Some(idx),
			(true, Some(start)) => {
				out.push((&text[gap_start..start], &text[start..idx]));

				gap_start = idx;
				word_start = None;
			},
			_ => {},
		}
	}

	if let Some(start) = word_start {
		out.push((&text[gap_start..start], &text[start..]));
	}

	out
}

// Last resort for a single token longer than the target; splits on char boundaries.
fn split_long_word(word: &str, target: usize) -> Vec<String> {
	let chars: Vec<char> = word.chars().collect();

	chars.chunks(target).map(|part| part.iter().collect()).collect()
}

fn char_len(text: &str) -> usize {
	text.chars().count()
}
