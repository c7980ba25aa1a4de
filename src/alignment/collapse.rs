/// Compact label sequence encoded by a per-frame path.
///
/// Consecutive duplicates are merged first and blanks dropped afterwards, so
/// `a _ a` yields `[a, a]` while `a a` yields `[a]`.
pub fn collapse(frames: &[u32], blank_id: u32) -> Vec<u32> {
    let mut out = Vec::with_capacity(frames.len());
    let mut prev: Option<u32> = None;
    for &label in frames {
        if prev != Some(label) && label != blank_id {
            out.push(label);
        }
        prev = Some(label);
    }
    out
}
