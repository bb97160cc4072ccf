//! Sequence coverage over an unordered arrival set: which sequences never
//! arrived, and how many arrived more than once.
use crate::record::Packet;

/// Sequences strictly inside the observed range that never arrived, in
/// ascending order.
///
/// Works on a sorted copy of the observed sequence numbers, so the arrival
/// order of `packets` is irrelevant. Duplicates neither create nor suppress
/// gaps, and an empty or single-packet input has none. Nothing below the
/// smallest or above the largest observed sequence is ever reported.
pub fn missing_sequences(packets: &[Packet]) -> Vec<i32> {
    if packets.is_empty() {
        return Vec::new();
    }
    let mut seqs: Vec<i32> = packets.iter().map(|p| p.sequence).collect();
    seqs.sort_unstable();
    let mut missing = Vec::new();
    let mut expected = seqs[0];
    for seq in seqs {
        if seq > expected {
            missing.extend(expected..seq);
        }
        expected = seq.saturating_add(1);
    }
    missing
}

/// Number of packets sharing a sequence with an earlier arrival. A sequence
/// seen n times contributes n - 1, so a duplicate-free set scores zero.
pub fn duplicate_count(packets: &[Packet]) -> usize {
    let mut seqs: Vec<i32> = packets.iter().map(|p| p.sequence).collect();
    seqs.sort_unstable();
    seqs.windows(2).filter(|w| w[0] == w[1]).count()
}
