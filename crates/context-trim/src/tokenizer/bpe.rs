use tiktoken_rs::CoreBPE;

use super::{TokenId, Tokenizer, TokenizerError};

/// Byte-pair-encoding tokenizer backed by `tiktoken-rs`.
///
/// Special-token markers in the input are encoded as ordinary text. Decoding
/// a sequence that starts or ends inside a multi-byte character replaces the
/// partial bytes with U+FFFD.
pub struct BpeTokenizer {
    model: String,
    bpe: CoreBPE,
}

impl BpeTokenizer {
    /// Resolve the encoding used by `model` (e.g. "gpt-4" -> cl100k_base).
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|_| TokenizerError::UnsupportedModel(model.to_string()))?;
        tracing::debug!(model, "Loaded BPE encoding");
        Ok(Self {
            model: model.to_string(),
            bpe,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for BpeTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BpeTokenizer")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl Tokenizer for BpeTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError> {
        Ok(self
            .bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|rank| rank as TokenId)
            .collect())
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError> {
        let ranks: Vec<_> = tokens.iter().map(|&id| id as _).collect();
        let bytes = self.bpe._decode_native(&ranks);
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{count_tokens, trim_messages};
    use crate::message::Message;

    #[test]
    fn resolves_known_model() {
        let tokenizer = BpeTokenizer::for_model("gpt-4").unwrap();
        assert_eq!(tokenizer.model(), "gpt-4");

        let text = "Hello, world! This is a test.";
        let tokens = tokenizer.encode(text).unwrap();
        assert!(!tokens.is_empty());
        assert!(tokens.len() < text.len());
        assert_eq!(tokenizer.decode(&tokens).unwrap(), text);
    }

    #[test]
    fn split_emoji_decodes_lossily() {
        let tokenizer = BpeTokenizer::for_model("gpt-4").unwrap();
        let tokens = tokenizer.encode("😀😀😀 hello").unwrap();

        let tail = tokenizer.decode(&tokens[1..]).unwrap();

        assert!(tail.ends_with(" hello"));
    }

    #[test]
    fn trims_through_split_emoji_within_budget() {
        let tokenizer = BpeTokenizer::for_model("gpt-4").unwrap();
        let messages = vec![Message::system("Be brief."), Message::user("😀😀😀 hello")];
        let total = count_tokens(&messages, &tokenizer).unwrap();

        for budget in 1..total {
            let trimmed = trim_messages(messages.clone(), budget, &tokenizer).unwrap();
            let used = count_tokens(&trimmed, &tokenizer).unwrap();

            assert!(used <= budget, "budget {budget} produced {used} tokens");
            assert_eq!(trimmed.last().map(|m| m.role.as_str()), Some("user"));
        }
    }

    #[test]
    fn rejects_unknown_model() {
        let result = BpeTokenizer::for_model("definitely-not-a-model");
        assert!(matches!(result, Err(TokenizerError::UnsupportedModel(_))));
    }
}
