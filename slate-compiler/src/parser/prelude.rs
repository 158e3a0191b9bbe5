use tracing::trace;

use crate::lexer::{is_word_joiner, Keyword, Token, TokenKind};

/// Turn a statement-leading identifier into a keyword token when its first word is
/// one.
///
/// `while element nr` scans as a single identifier because ordinary names may span
/// several words. At statement position the leading `while` is reclassified in
/// place and the remainder `element nr` is spliced in right after it as its own
/// identifier. A token that is exactly a keyword is reclassified directly.
pub(crate) fn reclassify(tokens: &mut Vec<Token>, index: usize) {
    let Some(token) = tokens.get_mut(index) else {
        return;
    };
    if token.kind != TokenKind::Identifier {
        return;
    }

    if let Some(keyword) = Keyword::from_word(&token.lexeme) {
        token.kind = TokenKind::Keyword(keyword);
        trace!(%keyword, line = token.line, "reclassified statement keyword");
        return;
    }

    let Some((split, joiner)) = token
        .lexeme
        .char_indices()
        .find(|(_, ch)| is_word_joiner(*ch))
    else {
        return;
    };
    let Some(keyword) = Keyword::from_word(&token.lexeme[..split]) else {
        return;
    };

    let remainder = token.lexeme[split + joiner.len_utf8()..].to_string();
    let line = token.line;
    let column = token.column + token.lexeme[..split].chars().count() + 1;
    token.kind = TokenKind::Keyword(keyword);
    token.lexeme.truncate(split);
    trace!(%keyword, line, remainder = %remainder, "split statement keyword");

    tokens.insert(
        index + 1,
        Token::new(TokenKind::Identifier, remainder, line, column),
    );
}
