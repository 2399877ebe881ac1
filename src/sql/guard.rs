//! Query-only enforcement for statements written by the model.

use thiserror::Error;

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "DELETE", "UPDATE", "INSERT", "DROP", "ALTER", "CREATE", "TRUNCATE", "REPLACE", "EXEC",
    "ATTACH", "DETACH", "WRITE", "INTO",
];

const ALLOWED_LEADING: &[&str] = &["SELECT", "WITH", "EXPLAIN"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("query is empty")]
    Empty,
    #[error("only a single statement may be executed")]
    MultipleStatements,
    #[error("only SELECT, WITH, EXPLAIN or PRAGMA table_info statements are allowed, got '{0}'")]
    NotAQuery(String),
    #[error("statement contains forbidden keyword '{0}'; the database is read-only")]
    ForbiddenKeyword(String),
    #[error("unterminated quote or comment")]
    Unterminated,
}

/// Rejects anything that is not a single read-only statement.
pub fn check_read_only(query: &str) -> Result<(), GuardError> {
    let code = strip_literals_and_comments(query)?;

    let statements: Vec<&str> = code
        .split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .collect();
    let statement = match statements.as_slice() {
        [] => return Err(GuardError::Empty),
        [single] => *single,
        _ => return Err(GuardError::MultipleStatements),
    };

    let mut words = statement
        .split(|c: char| !is_word_char(c))
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_uppercase);

    let leading = words.next().unwrap_or_default();
    if leading == "PRAGMA" {
        // table_info is the only pragma that neither writes nor changes connection state
        return match words.next().as_deref() {
            Some("TABLE_INFO") => Ok(()),
            _ => Err(GuardError::NotAQuery(leading)),
        };
    }
    if !ALLOWED_LEADING.contains(&leading.as_str()) {
        return Err(GuardError::NotAQuery(leading));
    }

    match words.find(|word| FORBIDDEN_KEYWORDS.contains(&word.as_str())) {
        Some(keyword) => Err(GuardError::ForbiddenKeyword(keyword)),
        None => Ok(()),
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Blanks out string literals, quoted identifiers and comments so keywords
/// inside them are not mistaken for statements.
///
/// Knows standard `'..'` strings, Postgres `E'..'` and `$tag$..$tag$` strings,
/// and `".."`, `` `..` `` and `[..]` identifiers.
fn strip_literals_and_comments(query: &str) -> Result<String, GuardError> {
    let chars: Vec<char> = query.chars().collect();
    let mut out = String::with_capacity(query.len());
    let mut at = 0;

    while at < chars.len() {
        let c = chars[at];
        let next = chars.get(at + 1).copied();
        let follows_word = at > 0 && is_word_char(chars[at - 1]);

        at = match c {
            '\'' => {
                // E'..' only when the E is a standalone prefix, not the end of a word
                let backslash_escapes = at > 0
                    && matches!(chars[at - 1], 'e' | 'E')
                    && (at < 2 || !is_word_char(chars[at - 2]));
                out.push(' ');
                skip_quoted(&chars, at + 1, c, backslash_escapes).ok_or(GuardError::Unterminated)?
            }
            '"' | '`' => {
                out.push(' ');
                skip_quoted(&chars, at + 1, c, false).ok_or(GuardError::Unterminated)?
            }
            '[' => {
                out.push(' ');
                skip_past(&chars, at + 1, &[']']).ok_or(GuardError::Unterminated)?
            }
            '-' if next == Some('-') => {
                out.push('\n');
                skip_past(&chars, at + 2, &['\n']).unwrap_or(chars.len())
            }
            '/' if next == Some('*') => {
                out.push(' ');
                skip_past(&chars, at + 2, &['*', '/']).ok_or(GuardError::Unterminated)?
            }
            '$' if !follows_word => match dollar_tag(&chars, at) {
                Some(tag) => {
                    out.push(' ');
                    skip_past(&chars, at + tag.len(), tag).ok_or(GuardError::Unterminated)?
                }
                None => {
                    out.push(c);
                    at + 1
                }
            },
            other => {
                out.push(other);
                at + 1
            }
        };
    }

    Ok(out)
}

/// Index just past the closing `quote`; a doubled quote is an escaped quote.
fn skip_quoted(chars: &[char], mut at: usize, quote: char, backslash_escapes: bool) -> Option<usize> {
    while at < chars.len() {
        let c = chars[at];
        if backslash_escapes && c == '\\' {
            at += 2;
            continue;
        }
        if c == quote {
            if chars.get(at + 1) == Some(&quote) {
                at += 2;
                continue;
            }
            return Some(at + 1);
        }
        at += 1;
    }
    None
}

/// Index just past the first `terminator` at or after `start`.
fn skip_past(chars: &[char], start: usize, terminator: &[char]) -> Option<usize> {
    (start..chars.len())
        .find(|&at| chars[at..].starts_with(terminator))
        .map(|at| at + terminator.len())
}

/// The `$tag$` opener starting at `start`, both dollar signs included.
/// `$1` style parameters are not tags.
fn dollar_tag(chars: &[char], start: usize) -> Option<&[char]> {
    let mut end = start + 1;
    while end < chars.len() && is_word_char(chars[end]) {
        end += 1;
    }
    if chars.get(end) != Some(&'$') {
        return None;
    }
    let tag = &chars[start..=end];
    if tag[1].is_ascii_digit() {
        return None;
    }
    Some(tag)
}

#[cfg(test)]
mod tests {
    use super::{GuardError, check_read_only};

    #[test]
    fn plain_selects_pass() {
        assert_eq!(check_read_only("SELECT Name FROM Artist LIMIT 5"), Ok(()));
        assert_eq!(check_read_only("  select count(*) from Track;  "), Ok(()));
        assert_eq!(
            check_read_only("WITH t AS (SELECT 1 AS x) SELECT x FROM t"),
            Ok(())
        );
    }

    #[test]
    fn write_statements_are_rejected() {
        assert_eq!(
            check_read_only("DELETE FROM Track WHERE TrackId = 100"),
            Err(GuardError::NotAQuery("DELETE".to_string()))
        );
        assert_eq!(
            check_read_only("WITH gone AS (DELETE FROM Genre RETURNING *) SELECT * FROM gone"),
            Err(GuardError::ForbiddenKeyword("DELETE".to_string()))
        );
    }

    #[test]
    fn stacked_statements_are_rejected() {
        assert_eq!(
            check_read_only("SELECT 1; DROP TABLE Album"),
            Err(GuardError::MultipleStatements)
        );
    }

    #[test]
    fn keywords_inside_literals_and_comments_are_ignored() {
        assert_eq!(
            check_read_only("SELECT * FROM Track WHERE Name = 'Update; Delete it'"),
            Ok(())
        );
        assert_eq!(
            check_read_only("SELECT \"Insert\" FROM x -- drop later\n"),
            Ok(())
        );
        assert_eq!(check_read_only("SELECT 1 /* create; alter */"), Ok(()));
        assert_eq!(check_read_only("SELECT 'it''s; fine'"), Ok(()));
    }

    #[test]
    fn keyword_must_be_a_whole_word() {
        assert_eq!(
            check_read_only("SELECT LastUpdated, CreatedBy FROM Customer"),
            Ok(())
        );
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(check_read_only("   ;  "), Err(GuardError::Empty));
        assert_eq!(check_read_only("-- only a comment"), Err(GuardError::Empty));
    }

    #[test]
    fn bracket_identifiers_cannot_hide_a_second_statement() {
        assert_eq!(
            check_read_only("SELECT 1 AS [a'b]; DROP TABLE Artist; --'"),
            Err(GuardError::MultipleStatements)
        );
        assert_eq!(check_read_only("SELECT [Update] FROM [Order Details]"), Ok(()));
    }

    #[test]
    fn postgres_escape_and_dollar_strings_are_skipped_as_literals() {
        assert_eq!(
            check_read_only(r"SELECT E'it\'s'; DROP TABLE Album; --'"),
            Err(GuardError::MultipleStatements)
        );
        assert_eq!(
            check_read_only("SELECT $$'$$; DROP TABLE Album; --'"),
            Err(GuardError::MultipleStatements)
        );
        assert_eq!(check_read_only("SELECT $tag$ drop; it $tag$ AS note"), Ok(()));
        assert_eq!(check_read_only("SELECT Name FROM Artist WHERE ArtistId = $1"), Ok(()));
        assert_eq!(check_read_only(r"SELECT E'a\\' AS slash"), Ok(()));
    }

    #[test]
    fn select_into_is_rejected() {
        assert_eq!(
            check_read_only("SELECT * INTO ArtistBackup FROM Artist"),
            Err(GuardError::ForbiddenKeyword("INTO".to_string()))
        );
    }

    #[test]
    fn unterminated_literals_are_rejected() {
        assert_eq!(
            check_read_only("SELECT 'abc; DROP TABLE Artist"),
            Err(GuardError::Unterminated)
        );
        assert_eq!(
            check_read_only("SELECT 1 /* DROP TABLE Artist"),
            Err(GuardError::Unterminated)
        );
        assert_eq!(
            check_read_only("SELECT [Name FROM Artist"),
            Err(GuardError::Unterminated)
        );
    }

    #[test]
    fn only_the_table_info_pragma_is_allowed() {
        assert_eq!(check_read_only("PRAGMA table_info(Artist)"), Ok(()));
        assert_eq!(check_read_only("pragma Table_Info('Album');"), Ok(()));
        assert_eq!(
            check_read_only("PRAGMA query_only = OFF"),
            Err(GuardError::NotAQuery("PRAGMA".to_string()))
        );
        assert_eq!(
            check_read_only("PRAGMA writable_schema = ON"),
            Err(GuardError::NotAQuery("PRAGMA".to_string()))
        );
    }
}
