//! Turning per-position class scores into text.

use super::{ScoreMatrix, CHARSET};

/// Class with the highest score at each position.
///
/// Ties go to the lowest class index.
pub fn greedy_indices(scores: &ScoreMatrix) -> Vec<usize> {
    (0..scores.positions())
        .map(|pos| {
            let mut best = 0;
            let mut best_score = f32::NEG_INFINITY;
            for (idx, &score) in scores.row(pos).iter().enumerate() {
                if score > best_score {
                    best_score = score;
                    best = idx;
                }
            }
            best
        })
        .collect()
}

/// Drop repeats of the previous index and the blank class, then map to text.
pub fn ctc_collapse(indices: &[usize]) -> String {
    let mut out = String::new();
    let mut prev: Option<usize> = None;
    for &idx in indices {
        if prev == Some(idx) {
            continue;
        }
        prev = Some(idx);
        if idx == 0 {
            continue;
        }
        if let Some(&c) = CHARSET.get(idx) {
            out.push(c);
        }
    }
    out
}

/// Class index of a charset character.
pub fn char_index(c: char) -> Option<usize> {
    CHARSET.iter().position(|&x| x == c)
}

/// Whether a decode is worth keeping without a beam search.
pub fn is_plausible(text: &str) -> bool {
    text.chars().filter(|c| !c.is_whitespace()).count() >= 3
        && text.chars().any(|c| c.is_ascii_digit())
}

/// Partial decode path.
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    pub indices: Vec<usize>,
    pub score: f32,
}

impl Beam {
    pub fn text(&self) -> String {
        ctc_collapse(&self.indices)
    }
}

fn top_classes(row: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = row.iter().copied().enumerate().collect();
    // Stable sort keeps the lower index first on ties.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(k);
    ranked
}

/// Beam search over positions, ranked best first.
///
/// Each beam is extended with the `top_k` classes of the next position,
/// scored by summing raw class scores, and the pool is cut to `width`.
pub fn beam_search(scores: &ScoreMatrix, width: usize, top_k: usize) -> Vec<Beam> {
    let width = width.max(1);
    let top_k = top_k.max(1);
    let mut beams = vec![Beam {
        indices: Vec::with_capacity(scores.positions()),
        score: 0.0,
    }];

    for pos in 0..scores.positions() {
        let candidates = top_classes(scores.row(pos), top_k);
        let mut next = Vec::with_capacity(beams.len() * candidates.len());
        for beam in &beams {
            for &(class, score) in &candidates {
                let mut indices = beam.indices.clone();
                indices.push(class);
                next.push(Beam {
                    indices,
                    score: beam.score + score,
                });
            }
        }
        next.sort_by(|a, b| b.score.total_cmp(&a.score));
        next.truncate(width);
        beams = next;
    }

    beams
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices_of(text: &str) -> Vec<usize> {
        text.chars().map(|c| char_index(c).unwrap()).collect()
    }

    #[test]
    fn test_collapse_removes_repeats_and_blanks() {
        // '1','1','1','+','+',blank,'2','='
        let seq = [2, 2, 2, 11, 11, 0, 3, 14];
        assert_eq!(ctc_collapse(&seq), "1+2=");
    }

    #[test]
    fn test_repeat_run_then_new_class() {
        for k in 1..=6 {
            let mut seq = vec![8; k];
            seq.push(5);
            assert_eq!(ctc_collapse(&seq), "74", "run of {k}");
        }
    }

    #[test]
    fn test_collapse_is_idempotent_on_collapsed_input() {
        for text in ["12+7=", "9-4=", "3*5", "8"] {
            let once = ctc_collapse(&indices_of(text));
            assert_eq!(once, text);
            let twice = ctc_collapse(&indices_of(&once));
            assert_eq!(twice, once);
        }
    }

    #[test]
    fn test_blank_separates_repeats() {
        // A blank between two equal classes keeps both.
        assert_eq!(ctc_collapse(&[4, 0, 4]), "33");
        assert_eq!(ctc_collapse(&[0, 0, 0]), "");
    }

    #[test]
    fn test_greedy_ties_pick_first() {
        let scores = ScoreMatrix::new(2, 3, vec![0.5, 0.5, 0.1, 0.0, 0.2, 0.2]).unwrap();
        assert_eq!(greedy_indices(&scores), vec![0, 1]);
    }

    #[test]
    fn test_plausibility() {
        assert!(is_plausible("3+4="));
        assert!(!is_plausible("3+"));
        assert!(!is_plausible("+-="));
    }

    #[test]
    fn test_beam_search_best_matches_greedy() {
        let mut data = vec![0.0; 4 * 15];
        for (pos, class) in [4usize, 11, 5, 14].iter().enumerate() {
            data[pos * 15 + class] = 5.0;
            data[pos * 15 + (class + 1) % 15] = 1.0;
        }
        let scores = ScoreMatrix::new(4, 15, data).unwrap();
        let beams = beam_search(&scores, 30, 3);

        assert_eq!(beams.len(), 30);
        assert_eq!(beams[0].indices, greedy_indices(&scores));
        assert_eq!(beams[0].text(), "3+4=");
        assert!(beams.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
