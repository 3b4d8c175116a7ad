//! Incremental detokenizer.

use tokenizers::Tokenizer;

use crate::engine::EngineError;

/// Turns a growing token sequence into text fragments.
///
/// Decoding one token at a time would split multi-byte characters and drop
/// the spaces some tokenizers attach to the following token, so fragments
/// are emitted only once the decoded text ends on an alphanumeric
/// character. Special tokens are skipped.
///
/// <https://github.com/huggingface/text-generation-inference/blob/5ba53d44a18983a4de32d122f4cb46f4a17d9ef6/server/text_generation_server/models/model.py#L68>
pub struct TokenDecoder<'t> {
    tokenizer: &'t Tokenizer,
    tokens: Vec<u32>,
    prev_index: usize,
    current_index: usize,
}

impl<'t> TokenDecoder<'t> {
    pub fn new(tokenizer: &'t Tokenizer) -> Self {
        Self {
            tokenizer,
            tokens: Vec::new(),
            prev_index: 0,
            current_index: 0,
        }
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, EngineError> {
        self.tokenizer
            .decode(tokens, true)
            .map_err(|e| EngineError::DecodeFailed {
                source: anyhow::anyhow!("cannot decode: {e}"),
            })
    }

    /// Push one token; returns the newly completed fragment, if any.
    pub fn next_token(&mut self, token: u32) -> Result<Option<String>, EngineError> {
        let prev_text = if self.tokens.is_empty() {
            String::new()
        } else {
            self.decode(&self.tokens[self.prev_index..self.current_index])?
        };

        self.tokens.push(token);
        let text = self.decode(&self.tokens[self.prev_index..])?;
        let ends_on_word = text.chars().last().is_some_and(char::is_alphanumeric);
        if text.len() > prev_text.len() && ends_on_word {
            let fragment = text.get(prev_text.len()..).unwrap_or_default().to_owned();
            self.prev_index = self.current_index;
            self.current_index = self.tokens.len();
            Ok(Some(fragment))
        } else {
            Ok(None)
        }
    }

    /// Flush whatever text is still held back.
    pub fn decode_rest(&self) -> Result<Option<String>, EngineError> {
        let prev_text = self.decode(&self.tokens[self.prev_index..self.current_index])?;
        let text = self.decode(&self.tokens[self.prev_index..])?;
        if text.len() > prev_text.len() {
            Ok(text.get(prev_text.len()..).map(str::to_owned))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
pub(crate) fn word_level_tokenizer() -> Tokenizer {
    use std::str::FromStr;

    let json = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            {"id": 3, "content": "</s>", "single_word": false, "lstrip": false,
             "rstrip": false, "normalized": false, "special": true}
        ],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {"hello": 0, "world": 1, "!": 2, "</s>": 3, "[UNK]": 4},
            "unk_token": "[UNK]"
        }
    }"#;
    Tokenizer::from_str(json).expect("valid tokenizer json")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn emits_fragments_on_word_boundaries() {
        let tokenizer = word_level_tokenizer();
        let mut decoder = TokenDecoder::new(&tokenizer);

        assert_eq!(decoder.next_token(0).unwrap().as_deref(), Some("hello"));
        assert_eq!(decoder.next_token(1).unwrap().as_deref(), Some(" world"));
        // Punctuation is held back until more text arrives or the stream ends.
        assert_eq!(decoder.next_token(2).unwrap(), None);
        assert_eq!(decoder.decode_rest().unwrap().as_deref(), Some(" !"));
    }

    #[test]
    fn special_tokens_are_skipped() {
        let tokenizer = word_level_tokenizer();
        let mut decoder = TokenDecoder::new(&tokenizer);

        assert_eq!(decoder.next_token(0).unwrap().as_deref(), Some("hello"));
        assert_eq!(decoder.next_token(3).unwrap(), None);
        assert_eq!(decoder.decode_rest().unwrap(), None);
    }

    #[test]
    fn rest_of_empty_stream_is_none() {
        let tokenizer = word_level_tokenizer();
        let decoder = TokenDecoder::new(&tokenizer);
        assert_eq!(decoder.decode_rest().unwrap(), None);
    }
}
