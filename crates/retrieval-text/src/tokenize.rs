//! Bilingual (English/Hebrew) tokenizer shared by indexing and querying.
//!
//! Text is lowercased and split on whitespace and a fixed punctuation class.
//! Hebrew passes through untouched: no case folding applies and nothing is
//! stemmed. Stop words from either language are dropped in one pass so mixed
//! text needs no language detection.
use std::collections::HashSet;
use std::str::CharIndices;
use std::sync::OnceLock;

use tantivy::tokenizer::{LowerCaser, StopWordFilter, TextAnalyzer, Token, TokenStream, Tokenizer};

const PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}', '\'', '"'];

pub const ENGLISH_STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

pub const HEBREW_STOP_WORDS: &[&str] = &[
	"של","את","על","עם","זה","זו","זאת","הוא","היא","הם","הן","אני","אתה","אנחנו","יש","אין","לא","כן","גם","או","אבל","כי","אם","מה","מי","איך","למה","כמו","רק","כל","עוד","אז","שם","פה","היה","הייתה","להיות","אל","מן","בין","אחרי","לפני","כדי","יותר","מאוד","אשר","אותו","אותה",
];

fn is_separator(c: char) -> bool {
	c.is_whitespace() || PUNCTUATION.contains(&c)
}

/// Splits on whitespace and the punctuation class, keeping every other
/// character (letters, digits, hyphens, Hebrew) inside the token.
#[derive(Clone, Default)]
pub struct PunctuationTokenizer {
	token: Token,
}

pub struct PunctuationTokenStream<'a> {
	text: &'a str,
	chars: CharIndices<'a>,
	token: &'a mut Token,
}

impl Tokenizer for PunctuationTokenizer {
	type TokenStream<'a> = PunctuationTokenStream<'a>;

	fn token_stream<'a>(&'a mut self, text: &'a str) -> PunctuationTokenStream<'a> {
		self.token.reset();
		PunctuationTokenStream { text, chars: text.char_indices(), token: &mut self.token }
	}
}

impl PunctuationTokenStream<'_> {
	fn search_token_end(&mut self) -> usize {
		(&mut self.chars)
			.find(|(_, c)| is_separator(*c))
			.map(|(offset, _)| offset)
			.unwrap_or(self.text.len())
	}
}

impl TokenStream for PunctuationTokenStream<'_> {
	fn advance(&mut self) -> bool {
		self.token.text.clear();
		self.token.position = self.token.position.wrapping_add(1);
		while let Some((offset_from, c)) = self.chars.next() {
			if !is_separator(c) {
				let offset_to = self.search_token_end();
				self.token.offset_from = offset_from;
				self.token.offset_to = offset_to;
				self.token.text.push_str(&self.text[offset_from..offset_to]);
				return true;
			}
		}
		false
	}

	fn token(&self) -> &Token {
		self.token
	}

	fn token_mut(&mut self) -> &mut Token {
		self.token
	}
}

fn stop_words() -> &'static HashSet<&'static str> {
	static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
	WORDS.get_or_init(|| ENGLISH_STOP_WORDS.iter().chain(HEBREW_STOP_WORDS).copied().collect())
}

fn plain_analyzer() -> TextAnalyzer {
	static ANALYZER: OnceLock<TextAnalyzer> = OnceLock::new();
	ANALYZER
		.get_or_init(|| TextAnalyzer::builder(PunctuationTokenizer::default()).filter(LowerCaser).build())
		.clone()
}

fn prepare_analyzer() -> TextAnalyzer {
	static ANALYZER: OnceLock<TextAnalyzer> = OnceLock::new();
	ANALYZER
		.get_or_init(|| {
			TextAnalyzer::builder(PunctuationTokenizer::default())
				.filter(LowerCaser)
				.filter(StopWordFilter::remove(stop_words().iter().map(|s| s.to_string())))
				.build()
		})
		.clone()
}

fn collect(mut analyzer: TextAnalyzer, text: &str) -> Vec<String> {
	let mut tokens = Vec::new();
	let mut stream = analyzer.token_stream(text);
	while stream.advance() {
		tokens.push(stream.token().text.clone());
	}
	tokens
}

/// Lowercase and split `text`; empty tokens never appear.
pub fn tokenize(text: &str) -> Vec<String> {
	collect(plain_analyzer(), text)
}

pub fn is_stop_word(token: &str) -> bool {
	stop_words().contains(token)
}

/// Drop tokens found in either language's stop list.
pub fn remove_stop_words(tokens: Vec<String>) -> Vec<String> {
	tokens.into_iter().filter(|t| !is_stop_word(t)).collect()
}

/// `remove_stop_words(tokenize(text))` in a single analyzer pass. Both the
/// index build and every query go through this function.
pub fn prepare(text: &str) -> Vec<String> {
	collect(prepare_analyzer(), text)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lowercases_and_splits_on_punctuation() {
		assert_eq!(
			tokenize("  Hello, World! (JWT) [auth] {x} 'q' \"z\"; a:b?  "),
			vec!["hello", "world", "jwt", "auth", "x", "q", "z", "a", "b"]
		);
	}

	#[test]
	fn keeps_characters_outside_the_punctuation_class() {
		assert_eq!(tokenize("e-mail node_js v1/v2"), vec!["e-mail", "node_js", "v1/v2"]);
	}

	#[test]
	fn hebrew_passes_through() {
		assert_eq!(tokenize("מה זה Embeddings?"), vec!["מה", "זה", "embeddings"]);
	}

	#[test]
	fn empty_and_punctuation_only_yield_nothing() {
		assert!(tokenize("").is_empty());
		assert!(tokenize(" .,;:!? ").is_empty());
		assert!(prepare("the and of").is_empty());
	}

	#[test]
	fn stop_words_removed_from_both_languages() {
		assert_eq!(prepare("What is the RAG של המערכת"), vec!["rag", "המערכת"]);
	}

	#[test]
	fn prepare_equals_composition() {
		for text in [
			"authentication with JWT tokens",
			"JWT tokens for secure authentication",
			"Embeddings הם ייצוג וקטורי של טקסט שמאפשר לבצע חיפוש סמנטי",
			"The code for RAG implementation uses OpenAI embeddings and Claude API",
			"",
		] {
			assert_eq!(prepare(text), remove_stop_words(tokenize(text)), "text: {text}");
		}
	}
}
