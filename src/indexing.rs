//! (tile, round, channel) index lists used to drive the per-image stages.

use std::collections::BTreeSet;

use crate::model::BasicInfo;

/// Which images to include. Defaults select every sequencing round and
/// channel and keep bad triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    pub include_seq_rounds: bool,
    pub include_seq_channels: bool,
    pub include_anchor_round: bool,
    pub include_anchor_channel: bool,
    pub include_dapi_seq: bool,
    pub include_dapi_anchor: bool,
    pub include_bad_trc: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            include_seq_rounds: true,
            include_seq_channels: true,
            include_anchor_round: false,
            include_anchor_channel: false,
            include_dapi_seq: false,
            include_dapi_anchor: false,
            include_bad_trc: true,
        }
    }
}

impl IndexOptions {
    pub fn anchor_only() -> Self {
        Self {
            include_seq_rounds: false,
            include_seq_channels: false,
            include_anchor_round: true,
            include_anchor_channel: true,
            ..Self::default()
        }
    }
}

/// Sorted unique `[tile, round, channel]` triples.
///
/// Options naming something the experiment lacks (no anchor, no DAPI) add
/// nothing.
pub fn create(basic: &BasicInfo, opts: IndexOptions) -> Vec<[usize; 3]> {
    let seq_rounds = &basic.use_rounds;
    let seq_channels = &basic.use_channels;
    let anchor_round = basic.anchor_round.filter(|_| basic.use_anchor);

    let mut rounds: Vec<usize> = Vec::new();
    if opts.include_seq_rounds {
        rounds.extend(seq_rounds.iter().copied());
    }
    if opts.include_anchor_round {
        rounds.extend(anchor_round);
    }

    let mut channels: Vec<usize> = seq_channels.clone();
    if opts.include_dapi_seq || opts.include_dapi_anchor {
        channels.extend(basic.dapi_channel);
    }
    if opts.include_anchor_channel {
        channels.extend(basic.anchor_channel);
    }

    let mut out = BTreeSet::new();
    for &t in &basic.use_tiles {
        for &r in &rounds {
            for &c in &channels {
                let including = if seq_rounds.contains(&r) {
                    (opts.include_seq_channels && seq_channels.contains(&c))
                        || (opts.include_dapi_seq && Some(c) == basic.dapi_channel)
                } else if Some(r) == anchor_round {
                    (opts.include_dapi_anchor && Some(c) == basic.dapi_channel)
                        || (opts.include_anchor_channel && Some(c) == basic.anchor_channel)
                } else {
                    false
                };
                if including {
                    out.insert([t, r, c]);
                }
            }
        }
    }

    out.into_iter()
        .filter(|&[t, r, c]| opts.include_bad_trc || !basic.is_bad_trc(t, r, c))
        .collect()
}

/// Drops the channel, keeping sorted unique `[tile, round]` pairs.
pub fn project_tile_round(indices: &[[usize; 3]]) -> Vec<[usize; 2]> {
    let set: BTreeSet<[usize; 2]> = indices.iter().map(|&[t, r, _]| [t, r]).collect();
    set.into_iter().collect()
}

pub fn project_tile(indices: &[[usize; 3]]) -> Vec<usize> {
    let set: BTreeSet<usize> = indices.iter().map(|trc| trc[0]).collect();
    set.into_iter().collect()
}

/// Sorted channels present for `tile` and `round`.
pub fn find_channels_for(indices: &[[usize; 3]], tile: usize, round: usize) -> Vec<usize> {
    let set: BTreeSet<usize> = indices
        .iter()
        .filter(|&&[t, r, _]| t == tile && r == round)
        .map(|trc| trc[2])
        .collect();
    set.into_iter().collect()
}

/// `[round, channel]` pairs of `tile`, sorted by round then channel.
pub fn images_for_tile(indices: &[[usize; 3]], tile: usize) -> Vec<[usize; 2]> {
    project_tile_round(indices)
        .into_iter()
        .filter(|&[t, _]| t == tile)
        .flat_map(|[_, r]| {
            find_channels_for(indices, tile, r)
                .into_iter()
                .map(move |c| [r, c])
        })
        .collect()
}

#[cfg(test)]
#[path = "../tests/src_inline/indexing.rs"]
mod tests;
