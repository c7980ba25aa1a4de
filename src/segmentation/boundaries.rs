/// Frame indices at which an utterance may be cut.
///
/// `recognized` covers the valid frames only, and its length is the
/// utterance's valid length. A separator frame becomes a boundary only when it
/// is itself recognized and every frame since the previous separator was
/// recognized too; the previous separator is added with it. The list always
/// starts at `0` and ends at the last valid frame.
pub fn detect_boundaries(recognized: &[bool], aligned: &[u32], word_sep_id: u32) -> Vec<usize> {
    let len = recognized.len();
    let mut boundaries = vec![0usize];
    let mut start_space: Option<usize> = None;
    let mut all_word_well_recognized = true;

    for (t, &ok) in recognized.iter().enumerate() {
        if !ok {
            all_word_well_recognized = false;
            continue;
        }
        if aligned.get(t) != Some(&word_sep_id) {
            continue;
        }
        if all_word_well_recognized {
            if let Some(space) = start_space {
                if boundaries.last() != Some(&space) {
                    boundaries.push(space);
                }
            }
            if t > 0 {
                boundaries.push(t);
            }
        }
        start_space = Some(t);
        all_word_well_recognized = true;
    }

    if let Some(last_valid) = len.checked_sub(1) {
        if boundaries.last() != Some(&last_valid) {
            boundaries.push(last_valid);
        }
    }
    boundaries
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEP: u32 = 9;

    #[test]
    fn fully_recognized_without_separator_spans_whole_utterance() {
        let aligned = [1, 1, 0, 2, 2, 0];
        let boundaries = detect_boundaries(&[true; 6], &aligned, SEP);
        assert_eq!(boundaries, vec![0, 5]);
    }

    #[test]
    fn recognized_separator_adds_boundary() {
        //             0  1  2  3    4  5  6
        let aligned = [1, 1, 0, SEP, 2, 2, 0];
        let boundaries = detect_boundaries(&[true; 7], &aligned, SEP);
        assert_eq!(boundaries, vec![0, 3, 6]);
    }

    #[test]
    fn previous_separator_is_added_with_the_next_one() {
        //             0  1    2  3  4    5  6
        let aligned = [1, SEP, 2, 0, SEP, 3, 0];
        let mut recognized = [true; 7];
        // the first word is broken, so separator 1 is not a boundary itself
        recognized[0] = false;
        let boundaries = detect_boundaries(&recognized, &aligned, SEP);
        assert_eq!(boundaries, vec![0, 1, 4, 6]);
    }

    #[test]
    fn misrecognized_word_contributes_no_internal_boundary() {
        //             0  1  2    3  4  5
        let aligned = [1, 0, SEP, 2, 2, 0];
        let mut recognized = [true; 6];
        recognized[1] = false;
        let boundaries = detect_boundaries(&recognized, &aligned, SEP);
        assert_eq!(boundaries, vec![0, 5]);
    }

    #[test]
    fn unrecognized_separator_is_not_a_boundary() {
        let aligned = [1, SEP, 2, 0];
        let recognized = [true, false, true, true];
        assert_eq!(detect_boundaries(&recognized, &aligned, SEP), vec![0, 3]);
    }

    #[test]
    fn consecutive_separators_do_not_duplicate() {
        //             0  1    2    3  4
        let aligned = [1, SEP, SEP, 2, 0];
        let boundaries = detect_boundaries(&[true; 5], &aligned, SEP);
        assert_eq!(boundaries, vec![0, 1, 2, 4]);
        assert!(boundaries.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn leading_separator_is_not_pushed_twice() {
        let aligned = [SEP, 1, 0, SEP, 2];
        let boundaries = detect_boundaries(&[true; 5], &aligned, SEP);
        assert_eq!(boundaries, vec![0, 3, 4]);
    }

    #[test]
    fn separator_on_last_frame_is_not_duplicated() {
        let aligned = [1, 0, SEP];
        let boundaries = detect_boundaries(&[true; 3], &aligned, SEP);
        assert_eq!(boundaries, vec![0, 2]);
    }

    #[test]
    fn empty_and_single_frame_utterances() {
        assert_eq!(detect_boundaries(&[], &[], SEP), vec![0]);
        assert_eq!(detect_boundaries(&[true], &[1], SEP), vec![0]);
    }

    #[test]
    fn scan_is_deterministic() {
        let aligned = [1, SEP, 2, 2, SEP, 0, 3, SEP, 4, 0];
        let recognized = [true, true, true, false, true, true, true, true, true, true];
        let first = detect_boundaries(&recognized, &aligned, SEP);
        let second = detect_boundaries(&recognized, &aligned, SEP);
        assert_eq!(first, second);
    }
}
