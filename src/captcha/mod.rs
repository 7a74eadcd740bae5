//! On-device recognition of the CAS arithmetic captcha.
//!
//! The pipeline is: decode and resize the bitmap, run a fixed-shape
//! classifier that scores 15 classes at each of 8 positions, take the best
//! path (falling back to a beam search when it looks wrong), collapse it
//! CTC-style and evaluate the resulting expression.

pub mod decode;
pub mod expr;
pub mod preprocess;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use decode::{beam_search, ctc_collapse, greedy_indices, is_plausible, Beam};
pub use expr::evaluate;
pub use preprocess::{preprocess, InputTensor};

#[cfg(feature = "onnx")]
pub use onnx::OnnxCaptchaModel;

use crate::error::CaptchaError;

/// Class labels; index 0 is the blank.
pub const CHARSET: [char; 15] = [
    ' ', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '+', '-', '*', '=',
];

/// Sequence positions emitted by the model.
pub const POSITIONS: usize = 8;

/// Per-position class scores, stored position-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    positions: usize,
    classes: usize,
    data: Vec<f32>,
}

impl ScoreMatrix {
    /// Build from `positions x classes` scores.
    pub fn new(positions: usize, classes: usize, data: Vec<f32>) -> Result<Self, CaptchaError> {
        if positions == 0 || classes == 0 || data.len() != positions * classes {
            return Err(CaptchaError::InferenceFailed(format!(
                "expected {}x{} scores, got {}",
                positions,
                classes,
                data.len()
            )));
        }
        Ok(Self {
            positions,
            classes,
            data,
        })
    }

    /// Build from the model's `[classes, positions]` output.
    pub fn from_class_major(
        classes: usize,
        positions: usize,
        data: &[f32],
    ) -> Result<Self, CaptchaError> {
        if data.len() != positions * classes {
            return Err(CaptchaError::InferenceFailed(format!(
                "expected {}x{} scores, got {}",
                classes,
                positions,
                data.len()
            )));
        }
        let mut transposed = Vec::with_capacity(data.len());
        for pos in 0..positions {
            for class in 0..classes {
                transposed.push(data[class * positions + pos]);
            }
        }
        Self::new(positions, classes, transposed)
    }

    pub fn positions(&self) -> usize {
        self.positions
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Scores of every class at `pos`.
    pub fn row(&self, pos: usize) -> &[f32] {
        &self.data[pos * self.classes..(pos + 1) * self.classes]
    }
}

/// Fixed-shape classifier behind the decoder.
pub trait CaptchaModel {
    fn infer(&mut self, input: &InputTensor) -> Result<ScoreMatrix, CaptchaError>;
}

/// Anything that can turn a captcha bitmap into the answer to type.
pub trait CaptchaRecognizer {
    fn recognize(&mut self, image: &[u8]) -> Result<String, CaptchaError>;
}

/// Full recognition pipeline around a [`CaptchaModel`].
pub struct CaptchaDecoder<M> {
    model: M,
    beam_width: usize,
    beam_top_k: usize,
}

impl<M: CaptchaModel> CaptchaDecoder<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            beam_width: 30,
            beam_top_k: 4,
        }
    }

    pub fn with_beam(mut self, width: usize, top_k: usize) -> Self {
        self.beam_width = width;
        self.beam_top_k = top_k;
        self
    }

    /// Decode model scores into the captcha answer.
    ///
    /// An implausible best path is replaced by the best *plausible* beam, not
    /// the top-scoring one, which under score-sum ranking is the greedy path
    /// itself. If the result is not arithmetic, lower-ranked beams get one
    /// more try before the raw text is returned.
    pub fn decode_scores(&self, scores: &ScoreMatrix) -> Result<String, CaptchaError> {
        let mut text = ctc_collapse(&greedy_indices(scores));
        tracing::debug!("Greedy captcha decode: {:?}", text);

        let mut beams = None;
        if !is_plausible(&text) {
            let ranked = beam_search(scores, self.beam_width, self.beam_top_k);
            let best = ranked
                .iter()
                .find(|b| is_plausible(&b.text()))
                .or_else(|| ranked.first());
            if let Some(best) = best {
                text = best.text();
                tracing::debug!("Beam search captcha decode: {:?}", text);
            }
            beams = Some(ranked);
        }

        if let Some(value) = evaluate(&text) {
            return Ok(value);
        }

        // Second chance: the best plausible beam that evaluates.
        let ranked =
            beams.unwrap_or_else(|| beam_search(scores, self.beam_width, self.beam_top_k));
        let second = ranked
            .iter()
            .map(Beam::text)
            .filter(|t| is_plausible(t))
            .find_map(|t| evaluate(&t));
        if let Some(value) = second {
            tracing::debug!("Captcha evaluated from a lower-ranked beam");
            return Ok(value);
        }

        if text.trim().is_empty() {
            return Err(CaptchaError::InferenceFailed("decoded an empty captcha".into()));
        }
        Ok(text)
    }
}

impl<M: CaptchaModel> CaptchaRecognizer for CaptchaDecoder<M> {
    fn recognize(&mut self, image: &[u8]) -> Result<String, CaptchaError> {
        let input = preprocess(image)?;
        let scores = self.model.infer(&input)?;
        self.decode_scores(&scores)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::captcha::decode::char_index;

    /// Model that ignores its input and returns canned scores.
    pub(crate) struct FixedModel(pub ScoreMatrix);

    impl CaptchaModel for FixedModel {
        fn infer(&mut self, input: &InputTensor) -> Result<ScoreMatrix, CaptchaError> {
            assert_eq!(input.shape(), [1, 3, 42, 130]);
            Ok(self.0.clone())
        }
    }

    /// Scores whose best path spells `text`, padded with blanks.
    pub(crate) fn scores_for(text: &str) -> ScoreMatrix {
        let mut data = vec![0.0; POSITIONS * CHARSET.len()];
        let mut classes: Vec<usize> = text.chars().filter_map(char_index).collect();
        classes.resize(POSITIONS, 0);
        for (pos, class) in classes.into_iter().enumerate() {
            data[pos * CHARSET.len() + class] = 10.0;
        }
        ScoreMatrix::new(POSITIONS, CHARSET.len(), data).unwrap()
    }

    pub(crate) fn blank_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(130, 42, image::Rgb([240, 240, 240]));
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_from_class_major_transposes() {
        // 2 classes x 3 positions
        let scores = ScoreMatrix::from_class_major(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(scores.positions(), 3);
        assert_eq!(scores.row(0), &[1.0, 4.0]);
        assert_eq!(scores.row(2), &[3.0, 6.0]);
    }

    #[test]
    fn test_score_matrix_rejects_bad_length() {
        assert!(ScoreMatrix::new(8, 15, vec![0.0; 10]).is_err());
    }

    #[test]
    fn test_recognize_evaluates_expression() {
        let mut decoder = CaptchaDecoder::new(FixedModel(scores_for("3+4=7")));
        assert_eq!(decoder.recognize(&blank_png()).unwrap(), "7");
    }

    #[test]
    fn test_beam_fallback_recovers_expression() {
        // Blanks narrowly beat '3' and '+', so the best path is just "4".
        let n = CHARSET.len();
        let mut data = vec![0.0; POSITIONS * n];
        data[0] = 5.0;
        data[char_index('3').unwrap()] = 4.9;
        data[n] = 5.0;
        data[n + char_index('+').unwrap()] = 4.9;
        data[2 * n + char_index('4').unwrap()] = 10.0;
        for pos in 3..POSITIONS {
            data[pos * n] = 10.0;
        }
        let scores = ScoreMatrix::new(POSITIONS, n, data).unwrap();
        let decoder = CaptchaDecoder::new(FixedModel(scores.clone()));

        assert_eq!(ctc_collapse(&greedy_indices(&scores)), "4");
        assert_eq!(decoder.decode_scores(&scores).unwrap(), "7");
    }

    #[test]
    fn test_non_arithmetic_text_returned_raw() {
        // Digits are never in the top-k, so no beam can evaluate.
        let n = CHARSET.len();
        let mut data = vec![0.0; POSITIONS * n];
        for pos in 0..POSITIONS {
            for d in 1..=10 {
                data[pos * n + d] = -100.0;
            }
        }
        for (pos, c) in "+-*".chars().enumerate() {
            data[pos * n + char_index(c).unwrap()] = 10.0;
        }
        for pos in 3..POSITIONS {
            data[pos * n] = 10.0;
        }
        let scores = ScoreMatrix::new(POSITIONS, n, data).unwrap();
        let decoder = CaptchaDecoder::new(FixedModel(scores.clone()));

        assert_eq!(decoder.decode_scores(&scores).unwrap(), "+-*");
    }

    #[test]
    fn test_empty_decode_is_an_error() {
        let decoder = CaptchaDecoder::new(FixedModel(scores_for("")));
        let mut zeros = vec![0.0; POSITIONS * CHARSET.len()];
        for pos in 0..POSITIONS {
            zeros[pos * CHARSET.len()] = 1.0;
        }
        let scores = ScoreMatrix::new(POSITIONS, CHARSET.len(), zeros).unwrap();
        assert!(matches!(
            decoder.decode_scores(&scores),
            Err(CaptchaError::InferenceFailed(_))
        ));
    }
}
