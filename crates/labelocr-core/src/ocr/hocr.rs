//! Word confidences from Tesseract hOCR output.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WORD_CONFIDENCE: Regex =
        Regex::new(r"class=['\x22]ocrx_word['\x22][^>]*?x_wconf\s+(-?\d+(?:\.\d+)?)").unwrap();
}

/// Per-word confidences (0 - 100) in document order.
///
/// Values are returned as reported, including zero or negative sentinels;
/// filtering is the caller's decision.
pub fn word_confidences(hocr: &str) -> Vec<f64> {
    WORD_CONFIDENCE
        .captures_iter(hocr)
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_word_confidences() {
        let hocr = r#"
  <div class='ocr_page' id='page_1' title='image ""; bbox 0 0 640 480; ppageno 0'>
   <span class='ocr_line' id='line_1_1' title="bbox 36 92 580 116; baseline 0 -6; x_size 24">
    <span class='ocrx_word' id='word_1_1' title='bbox 36 92 96 116; x_wconf 93'>Amul</span>
    <span class='ocrx_word' id='word_1_2' title='bbox 104 92 180 116; x_wconf 88'>Taaza</span>
    <span class='ocrx_word' id='word_1_3' title='bbox 190 92 200 116; x_wconf 0'> </span>
   </span>
  </div>"#;

        assert_eq!(word_confidences(hocr), vec![93.0, 88.0, 0.0]);
    }

    #[test]
    fn test_no_words() {
        assert!(word_confidences("<div class='ocr_page'></div>").is_empty());
    }
}
