use crate::MAX_DECODED_SAMPLES;

/// One run of identical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run<T> {
    pub value: T,
    pub length: usize,
}

/// Collapses `seq` into maximal runs; adjacent runs never share a value.
pub fn run_encode<T: Copy + PartialEq>(seq: &[T]) -> Vec<Run<T>> {
    let mut runs: Vec<Run<T>> = Vec::new();
    for &value in seq {
        match runs.last_mut() {
            Some(run) if run.value == value => run.length += 1,
            _ => runs.push(Run { value, length: 1 }),
        }
    }
    runs
}

/// Expands runs back into the flat sequence.
///
/// Callers decoding untrusted runs should bound [`total_length`] first; the
/// up-front reservation is capped but the output is not.
pub fn run_decode<T: Copy>(runs: &[Run<T>]) -> Vec<T> {
    let total = total_length(runs).unwrap_or(0);
    let mut out = Vec::with_capacity(total.min(MAX_DECODED_SAMPLES));
    for run in runs {
        out.extend(std::iter::repeat(run.value).take(run.length));
    }
    out
}

/// Sum of all run lengths, `None` on overflow.
pub fn total_length<T>(runs: &[Run<T>]) -> Option<usize> {
    runs.iter().try_fold(0usize, |acc, r| acc.checked_add(r.length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert!(run_encode::<u8>(&[]).is_empty());
        assert!(run_decode::<u8>(&[]).is_empty());
    }

    #[test]
    fn test_runs_are_maximal() {
        let seq = [3u8, 3, 3, 1, 2, 2, 3];
        let runs = run_encode(&seq);
        assert_eq!(
            runs,
            vec![
                Run { value: 3, length: 3 },
                Run { value: 1, length: 1 },
                Run { value: 2, length: 2 },
                Run { value: 3, length: 1 },
            ]
        );
        assert!(runs.windows(2).all(|w| w[0].value != w[1].value));
        assert_eq!(total_length(&runs), Some(seq.len()));
    }

    #[test]
    fn test_inverse_on_varied_sequences() {
        // xorshift keeps the sequences deterministic
        let mut state = 0x2545_f491u32;
        for len in [1usize, 2, 17, 256, 1000] {
            let seq: Vec<u16> = (0..len)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    (state % 4) as u16
                })
                .collect();
            assert_eq!(run_decode(&run_encode(&seq)), seq);
        }
    }

    #[test]
    fn test_overflowing_total() {
        let runs = [Run { value: 0u8, length: usize::MAX }, Run { value: 1, length: 1 }];
        assert_eq!(total_length(&runs), None);
    }
}
