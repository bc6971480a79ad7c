//! Name normalisation and alias generation.

use rand::Rng;

/// Convert a declared type name into its default SQL name.
///
/// Every uppercase character after the first is prefixed with `_`, then the
/// whole name is lowercased: `TestTest` → `test_test`, `Test_Test` →
/// `test__test`, `Test` → `test`.
pub fn normalise_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Lowercase base-26 encoding of `n` (`0` → `a`).
pub(crate) fn encode_alias(mut n: u32) -> String {
    let mut out = String::new();
    loop {
        out.push(char::from(b'a' + (n % 26) as u8));
        n /= 26;
        if n == 0 {
            break;
        }
    }
    out
}

/// PostgreSQL keywords that cannot stand as a bare table alias.
const RESERVED_WORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric",
    "authorization", "binary", "both", "case", "cast", "check", "collate", "collation",
    "column", "concurrently", "constraint", "create", "cross", "default", "deferrable",
    "desc", "distinct", "do", "else", "end", "except", "false", "fetch", "for", "foreign",
    "freeze", "from", "full", "grant", "group", "having", "ilike", "in", "initially",
    "inner", "intersect", "into", "is", "isnull", "join", "lateral", "leading", "left",
    "like", "limit", "localtime", "natural", "not", "notnull", "null", "offset", "on",
    "only", "or", "order", "outer", "overlaps", "placing", "primary", "references",
    "returning", "right", "select", "similar", "some", "symmetric", "table",
    "tablesample", "then", "to", "trailing", "true", "union", "unique", "user", "using",
    "variadic", "verbose", "when", "where", "window", "with",
];

pub(crate) fn is_reserved_word(word: &str) -> bool {
    RESERVED_WORDS.contains(&word)
}

/// Random table alias for join sources. Never a reserved keyword.
pub fn generate_alias() -> String {
    let mut rng = rand::thread_rng();
    loop {
        let alias = encode_alias(rng.r#gen::<u32>());
        if !is_reserved_word(&alias) {
            return alias;
        }
    }
}
