/// Raw installer output beyond this is elided from diagnostics.
pub const MAX_RAW_OUTPUT_BYTES: usize = 64 * 1024;
const TRUNCATION_MARKER: &str = "[... output truncated ...]";

/// Raw output framed for a failure report, capped at [`MAX_RAW_OUTPUT_BYTES`].
pub fn raw_output_block(output: &str) -> String {
    let mut block = String::from("############## Raw output ##############\n");
    let body = truncate_string(output, MAX_RAW_OUTPUT_BYTES);
    let truncated = body.len() < output.len();
    block.push_str(&body);
    if !body.is_empty() && !body.ends_with('\n') {
        block.push('\n');
    }
    if truncated {
        block.push_str(TRUNCATION_MARKER);
        block.push('\n');
    }
    block.push_str("############## End raw output ##############");
    block
}

pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_string("h\u{e9}llo", 2), "h");
        assert_eq!(truncate_string("abc", 10), "abc");
    }

    #[test]
    fn raw_block_frames_and_caps_output() {
        assert_eq!(
            raw_output_block("line"),
            "############## Raw output ##############\nline\n############## End raw output ##############"
        );
        let huge = "x".repeat(MAX_RAW_OUTPUT_BYTES + 10);
        let block = raw_output_block(&huge);
        assert!(block.contains(TRUNCATION_MARKER));
        assert!(block.len() < huge.len() + 200);
    }
}
