//! Camel-case word lexer.
//!
//! A new word starts at every uppercase letter, so `AuthorNameActive` lexes
//! as `Author`, `Name`, `Active`. Lowercase text before the first uppercase
//! letter forms its own word.

use crate::token::{Span, Word};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn read_word(&mut self) -> Option<Word<'a>> {
        let start = self.position;
        self.bump()?;
        while let Some(c) = self.peek() {
            if c.is_uppercase() {
                break;
            }
            self.bump();
        }
        Some(Word {
            text: &self.input[start..self.position],
            span: Span::new(start, self.position),
        })
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Word<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_word()
    }
}

/// Collects the words of `input`.
pub fn split_words(input: &str) -> Vec<Word<'_>> {
    Lexer::new(input).collect()
}
