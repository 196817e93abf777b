//! Four-signal relevance model over grouped chunk candidates.
//!
//! `final = raw * time_boost * channel * thread`, where `time_boost` is the recency decay raised to
//! the thread or solo exponent. All inputs come from [`parley_config::Ranking`].

use std::{
	cmp::Ordering,
	collections::{HashMap, HashSet},
};

use time::OffsetDateTime;

use parley_config::Ranking;
use parley_domain::CandidateMatch;

use super::RankedMessage;

struct MessageGroup {
	message_id: String,
	chunks: Vec<CandidateMatch>,
}
impl MessageGroup {
	/// Keeps the higher-scoring copy when the same chunk index shows up twice.
	fn add(&mut self, candidate: CandidateMatch) {
		let slot = self
			.chunks
			.iter_mut()
			.find(|chunk| chunk.metadata.chunk_index == candidate.metadata.chunk_index);

		match slot {
			Some(existing) =>
				if candidate.raw_score > existing.raw_score {
					*existing = candidate;
				},
			None => self.chunks.push(candidate),
		}
	}

	fn raw_score(&self) -> f32 {
		self.chunks.iter().map(|chunk| chunk.raw_score).fold(f32::NEG_INFINITY, f32::max)
	}
}

/// Groups, filters, scores, and orders candidates. No truncation happens here.
///
/// `boosted_channel` is the single channel the caller scoped to, if any. `now` anchors the
/// recency decay; timestamps in the future decay as if they were current.
pub fn rank_candidates(
	candidates: Vec<CandidateMatch>,
	boosted_channel: Option<&str>,
	min_score: f32,
	cfg: &Ranking,
	now: OffsetDateTime,
) -> Vec<RankedMessage> {
	let participants = thread_participants(&candidates);
	let mut groups: Vec<MessageGroup> = Vec::new();
	let mut by_message: HashMap<String, usize> = HashMap::new();

	for candidate in candidates {
		let message_id = candidate.message_key().to_string();
		let idx = *by_message.entry(message_id.clone()).or_insert_with(|| {
			groups.push(MessageGroup { message_id, chunks: Vec::new() });

			groups.len() - 1
		});

		groups[idx].add(candidate);
	}

	groups.retain(|group| group.raw_score() >= min_score);

	let mut thread_sizes: HashMap<String, usize> = HashMap::new();

	for group in &groups {
		*thread_sizes.entry(thread_key(group)).or_default() += 1;
	}

	let mut scored: Vec<RankedMessage> = groups
		.into_iter()
		.filter_map(|group| {
			let threaded = thread_sizes.get(&thread_key(&group)).copied().unwrap_or(0) > 1;

			score_group(group, threaded, &participants, boosted_channel, cfg, now)
		})
		.collect();

	// A total pre-order keeps the epsilon pass below independent of candidate order.
	scored.sort_by(|a, b| {
		cmp_f32_desc(a.final_score, b.final_score).then_with(|| a.message_id.cmp(&b.message_id))
	});

	order_with_recency_ties(scored, cfg.tie_epsilon)
}

/// Exponential recency decay in `(0, 1]`.
pub fn time_score(timestamp: OffsetDateTime, now: OffsetDateTime, decay_per_hour: f32) -> f32 {
	let hours = ((now - timestamp).as_seconds_f64() / 3_600.0).max(0.0);

	(-f64::from(decay_per_hour) * hours).exp() as f32
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

fn thread_participants(candidates: &[CandidateMatch]) -> HashSet<String> {
	let mut participants = HashSet::new();

	for candidate in candidates {
		if let Some(parent) = candidate.metadata.reply_to_id.as_deref() {
			participants.insert(candidate.message_key().to_string());
			participants.insert(parent.to_string());
		}
	}

	participants
}

fn thread_key(group: &MessageGroup) -> String {
	group
		.chunks
		.first()
		.and_then(|chunk| chunk.metadata.reply_to_id.clone())
		.unwrap_or_else(|| group.message_id.clone())
}

fn score_group(
	mut group: MessageGroup,
	threaded: bool,
	participants: &HashSet<String>,
	boosted_channel: Option<&str>,
	cfg: &Ranking,
	now: OffsetDateTime,
) -> Option<RankedMessage> {
	let raw_score = group.raw_score();

	group.chunks.sort_by_key(|chunk| chunk.metadata.chunk_index);

	let content = parley_chunking::reconstruct(&group.chunks);
	let head = group.chunks.first()?.metadata.clone();
	let time_score = time_score(head.timestamp, now, cfg.decay_per_hour);
	let channel_score =
		if boosted_channel == Some(head.channel_id.as_str()) { cfg.channel_boost } else { 1.0 };
	let (time_boost, thread_score) = if threaded {
		(time_score.powf(cfg.thread_time_exponent), cfg.thread_boost)
	} else {
		(time_score.powf(cfg.solo_time_exponent), 1.0)
	};
	let final_score = raw_score * time_boost * channel_score * thread_score;
	let in_thread = participants.contains(&group.message_id);

	Some(RankedMessage {
		message_id: group.message_id,
		channel_id: head.channel_id,
		user_id: head.user_id,
		content,
		raw_score,
		time_score,
		channel_score,
		thread_score,
		final_score,
		timestamp: head.timestamp,
		reply_to_id: head.reply_to_id,
		in_thread,
		parent_context: None,
	})
}

/// Stable insertion pass: an item moves ahead of anything it outranks, where scores less than
/// `epsilon` apart are ordered by recency and then by message id.
fn order_with_recency_ties(scored: Vec<RankedMessage>, epsilon: f32) -> Vec<RankedMessage> {
	let mut ordered: Vec<RankedMessage> = Vec::with_capacity(scored.len());

	for item in scored {
		let position = ordered
			.iter()
			.position(|placed| ranks_before(&item, placed, epsilon))
			.unwrap_or(ordered.len());

		ordered.insert(position, item);
	}

	ordered
}

fn ranks_before(a: &RankedMessage, b: &RankedMessage, epsilon: f32) -> bool {
	if (a.final_score - b.final_score).abs() < epsilon {
		return match b.timestamp.cmp(&a.timestamp) {
			Ordering::Less => true,
			Ordering::Greater => false,
			Ordering::Equal => a.message_id < b.message_id,
		};
	}

	cmp_f32_desc(a.final_score, b.final_score) == Ordering::Less
}
