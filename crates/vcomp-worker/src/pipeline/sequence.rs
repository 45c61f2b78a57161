//! Ordering and clip-count validation.

use std::collections::HashSet;

use vcomp_models::{ClipRequest, ClipSpec};

use crate::error::SequencingError;

/// Minimum number of clips in a composition.
pub const MIN_CLIPS: usize = 2;

/// Validate submitted clips before any work starts.
///
/// Returns the sequence index of each request, in submission order.
pub fn validate_requests(requests: &[ClipRequest]) -> Result<Vec<u32>, SequencingError> {
    let mut seen = HashSet::with_capacity(requests.len());
    let mut indices = Vec::with_capacity(requests.len());

    for (position, request) in requests.iter().enumerate() {
        let index = request
            .sequence_index
            .ok_or(SequencingError::MissingIndex { position })?;
        if !seen.insert(index) {
            return Err(SequencingError::DuplicateIndex(index));
        }
        indices.push(index);
    }

    if indices.len() < MIN_CLIPS {
        return Err(SequencingError::InsufficientClips {
            count: indices.len(),
        });
    }

    Ok(indices)
}

/// Order ready clips by ascending sequence index.
///
/// Ties are rejected rather than resolved.
pub fn sequence(mut clips: Vec<ClipSpec>) -> Result<Vec<ClipSpec>, SequencingError> {
    if clips.len() < MIN_CLIPS {
        return Err(SequencingError::InsufficientClips { count: clips.len() });
    }

    clips.sort_by_key(|clip| clip.sequence_index);

    if let Some(pair) = clips
        .windows(2)
        .find(|pair| pair[0].sequence_index == pair[1].sequence_index)
    {
        return Err(SequencingError::DuplicateIndex(pair[0].sequence_index));
    }

    Ok(clips)
}
