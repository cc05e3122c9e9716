//! Extracts `choices[0].message.content` from a chat completion response.
//!
//! Well-formed JSON goes through serde. Bodies that are not valid JSON (cut off,
//! trailing garbage) fall back to [`scan_content`], a minimal token scan that
//! only understands this one fixed response schema. It is not a JSON parser: it
//! ignores array indices and nesting, and only unescapes `\"`, `\\`, `\n`, `\r`
//! and `\t` (other escape sequences are kept verbatim).

use crate::errors::ParseError;
use log::debug;
use serde::Deserialize;
use serde_json::error::Category;

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Parse a response body into the translated text. The result is never empty.
pub fn parse_completion(body: &[u8]) -> Result<String, ParseError> {
    match serde_json::from_slice::<ChatCompletionResponse>(body) {
        Ok(response) => {
            let choice = response
                .choices
                .into_iter()
                .next()
                .ok_or(ParseError::MissingKey("choices"))?;
            let message = choice.message.ok_or(ParseError::MissingKey("message"))?;
            let content = message.content.ok_or(ParseError::MissingKey("content"))?;
            if content.is_empty() {
                return Err(ParseError::EmptyContent);
            }
            Ok(content)
        }
        Err(e) if matches!(e.classify(), Category::Syntax | Category::Eof) => {
            debug!("Response is not valid JSON ({}), scanning for content", e);
            scan_content(body)
        }
        Err(e) => Err(ParseError::Schema(e.to_string())),
    }
}

/// Locate `"choices"`, then `"message"` after it, then `"content"` after that, and
/// return the quoted string value following the next `:`.
pub fn scan_content(body: &[u8]) -> Result<String, ParseError> {
    let choices = find(body, b"\"choices\"", 0).ok_or(ParseError::MissingKey("choices"))?;
    let message = find(body, b"\"message\"", choices).ok_or(ParseError::MissingKey("message"))?;
    let content = find(body, b"\"content\"", message).ok_or(ParseError::MissingKey("content"))?;
    let colon = find(body, b":", content).ok_or(ParseError::MissingKey("content"))?;
    let open = find(body, b"\"", colon).ok_or(ParseError::UnterminatedString)?;

    let mut out = Vec::new();
    let mut i = open + 1;
    loop {
        match body.get(i) {
            None => return Err(ParseError::UnterminatedString),
            Some(b'"') => break,
            Some(b'\\') => {
                let escaped = *body.get(i + 1).ok_or(ParseError::UnterminatedString)?;
                match escaped {
                    b'"' => out.push(b'"'),
                    b'\\' => out.push(b'\\'),
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    other => out.extend_from_slice(&[b'\\', other]),
                }
                i += 2;
            }
            Some(&byte) => {
                out.push(byte);
                i += 1;
            }
        }
    }

    if out.is_empty() {
        return Err(ParseError::EmptyContent);
    }
    String::from_utf8(out).map_err(|_| ParseError::InvalidUtf8)
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content() {
        let body = br#"{"choices":[{"message":{"content":"GetObject"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "GetObject");
    }

    #[test]
    fn missing_content_is_a_parse_failure() {
        let body = br#"{"choices":[{"message":{"role":"assistant"}}]}"#;
        assert_eq!(
            parse_completion(body),
            Err(ParseError::MissingKey("content"))
        );
    }

    #[test]
    fn error_payload_has_no_choices() {
        let body = br#"{"error":{"message":"Invalid API-key provided."}}"#;
        assert_eq!(
            parse_completion(body),
            Err(ParseError::MissingKey("choices"))
        );
    }

    #[test]
    fn escaped_newline_becomes_real_newline() {
        let body = br#"{"choices":[{"message":{"content":"line1\nline2"}}]}"#;
        let text = parse_completion(body).unwrap();
        assert_eq!(text, "line1\nline2");
        assert!(!text.contains("\\n"));
    }

    #[test]
    fn full_upstream_shape_with_unicode() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"你好，世界"},"finish_reason":"stop","index":0}],"object":"chat.completion","usage":{"prompt_tokens":92,"completion_tokens":3,"total_tokens":95},"model":"qwen-plus"}"#;
        assert_eq!(parse_completion(body.as_bytes()).unwrap(), "你好，世界");
    }

    #[test]
    fn empty_content_is_rejected() {
        let body = br#"{"choices":[{"message":{"content":""}}]}"#;
        assert_eq!(parse_completion(body), Err(ParseError::EmptyContent));
    }

    #[test]
    fn wrong_content_type_is_schema_error() {
        let body = br#"{"choices":[{"message":{"content":42}}]}"#;
        assert!(matches!(parse_completion(body), Err(ParseError::Schema(_))));
    }

    #[test]
    fn trailing_garbage_falls_back_to_scan() {
        let body = br#"{"choices":[{"message":{"content":"Say \"hi\"\tnow"}}]} data: [DONE]"#;
        assert_eq!(parse_completion(body).unwrap(), "Say \"hi\"\tnow");
    }

    #[test]
    fn truncated_body_is_unterminated() {
        let body = br#"{"choices":[{"message":{"content":"Hello wor"#;
        assert_eq!(parse_completion(body), Err(ParseError::UnterminatedString));
    }

    #[test]
    fn scan_requires_keys_in_order() {
        assert_eq!(
            scan_content(br#"{"content":"x","choices":[{"message":{}}]"#),
            Err(ParseError::MissingKey("content"))
        );
        assert_eq!(
            scan_content(br#"{"message":{"content":"x"}}"#),
            Err(ParseError::MissingKey("choices"))
        );
    }

    #[test]
    fn scan_keeps_escaped_backslash_before_quote() {
        let body = br#"{"choices":[{"message":{"content":"C:\\"}}"#;
        assert_eq!(scan_content(body).unwrap(), "C:\\");
    }

    #[test]
    fn scan_rejects_invalid_utf8() {
        let mut body = br#"{"choices":[{"message":{"content":""#.to_vec();
        body.extend_from_slice(&[0xff, 0xfe]);
        body.extend_from_slice(br#""}}]"#);
        assert_eq!(scan_content(&body), Err(ParseError::InvalidUtf8));
    }
}
