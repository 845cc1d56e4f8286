//! Secret placeholder substitution.
//!
//! Queries reference instance secrets as `${__qs.<key>}`. A secret value that
//! happens to look like another placeholder is never expanded again.

use std::collections::BTreeMap;

const TOKEN_PREFIX: &str = "${__qs.";
const TOKEN_SUFFIX: &str = "}";

/// Returns the placeholder token for a secret key.
pub fn placeholder(key: &str) -> String {
    format!("{}{}{}", TOKEN_PREFIX, key, TOKEN_SUFFIX)
}

/// Replaces every placeholder whose key is present in `fields`. Tokens for
/// unknown keys are left as they are.
///
/// The input is scanned once from left to right and substituted values are
/// copied to the output without being scanned, so the result does not depend
/// on the order keys are visited in.
pub fn replace_secrets(input: &str, fields: &BTreeMap<String, String>) -> String {
    if fields.is_empty() || !input.contains(TOKEN_PREFIX) {
        return input.to_string();
    }
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find(TOKEN_PREFIX) {
        output.push_str(&rest[..start]);
        let after_prefix = &rest[start + TOKEN_PREFIX.len()..];
        match after_prefix.find(TOKEN_SUFFIX) {
            Some(end) => {
                let key = &after_prefix[..end];
                let token_len = TOKEN_PREFIX.len() + end + TOKEN_SUFFIX.len();
                match fields.get(key) {
                    Some(value) => output.push_str(value),
                    None => output.push_str(&rest[start..start + token_len]),
                }
                rest = &rest[start + token_len..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}

/// Puts placeholders back in place of secret values, for log output.
/// Longer values go first so a value containing another is masked whole.
pub fn redact_secrets(input: &str, fields: &BTreeMap<String, String>) -> String {
    let mut entries: Vec<(&String, &String)> = fields
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .collect();
    entries.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

    let mut output = input.to_string();
    for (key, value) in entries {
        output = output.replace(value.as_str(), &placeholder(key));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn replaces_every_occurrence() {
        let secrets = fields(&[("token", "s3cr3t")]);
        let out = replace_secrets("a=${__qs.token}&b=${__qs.token}", &secrets);
        assert_eq!(out, "a=s3cr3t&b=s3cr3t");
    }

    #[test]
    fn leaves_unknown_tokens_untouched() {
        let secrets = fields(&[("token", "s3cr3t")]);
        let out = replace_secrets("${__qs.other}/${__qs.token}", &secrets);
        assert_eq!(out, "${__qs.other}/s3cr3t");
    }

    #[test]
    fn no_placeholders_is_identity() {
        let secrets = fields(&[("token", "s3cr3t")]);
        assert_eq!(replace_secrets("plain text {}", &secrets), "plain text {}");
        assert_eq!(replace_secrets("${__qs.token}", &BTreeMap::new()), "${__qs.token}");
    }

    #[test]
    fn inserted_values_are_not_expanded_again() {
        let secrets = fields(&[("a", "${__qs.b}"), ("b", "${__qs.a}")]);
        assert_eq!(replace_secrets("${__qs.a}", &secrets), "${__qs.b}");
        assert_eq!(replace_secrets("${__qs.b}", &secrets), "${__qs.a}");

        let secrets = fields(&[("a", "x"), ("b", "${__qs.a}")]);
        assert_eq!(replace_secrets("${__qs.b}-${__qs.a}", &secrets), "${__qs.a}-x");
    }

    #[test]
    fn unterminated_token_is_kept() {
        let secrets = fields(&[("token", "s3cr3t")]);
        let out = replace_secrets("${__qs.token}/${__qs.tok", &secrets);
        assert_eq!(out, "s3cr3t/${__qs.tok");
    }

    #[test]
    fn handles_adjacent_tokens_and_unicode() {
        let secrets = fields(&[("a", "ä"), ("b", "β")]);
        let out = replace_secrets("→${__qs.a}${__qs.b}←", &secrets);
        assert_eq!(out, "→äβ←");
    }

    #[test]
    fn redaction_masks_values() {
        let secrets = fields(&[("key", "abc"), ("long", "abcdef")]);
        let out = redact_secrets("https://x/?k=abcdef&j=abc", &secrets);
        assert_eq!(out, "https://x/?k=${__qs.long}&j=${__qs.key}");
    }

    #[test]
    fn redaction_ignores_empty_values() {
        let secrets = fields(&[("empty", "")]);
        assert_eq!(redact_secrets("unchanged", &secrets), "unchanged");
    }
}
