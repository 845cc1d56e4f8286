use crate::query::KeyValue;
use crate::secrets::replace_secrets;
use std::collections::BTreeMap;
use url::Url;
use url::form_urlencoded;

/// Builds the outbound URL for a remote query.
///
/// `base` and `path` are joined verbatim before secrets are substituted. If
/// the result does not parse as an absolute URL it is returned unchanged and
/// the params are dropped; the request builder then reports the bad URI.
///
/// Params overwrite existing query values by key. The query string is
/// re-encoded with keys in lexicographic order, so input order is not kept.
pub fn build_query_url(
    base: &str,
    path: &str,
    params: &[KeyValue],
    secure_fields: &BTreeMap<String, String>,
) -> String {
    let raw = replace_secrets(&format!("{}{}", base, path), secure_fields);
    let mut url = match Url::parse(&raw) {
        Ok(url) => url,
        Err(_) => return raw,
    };

    let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url.query_pairs() {
        values
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    for param in params {
        let value = replace_secrets(&param.value, secure_fields);
        values.insert(param.key.clone(), vec![value]);
    }

    let encoded = encode_query(&values);
    if encoded.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(&encoded));
    }
    url.to_string()
}

fn encode_query(values: &BTreeMap<String, Vec<String>>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, entries) in values {
        for value in entries {
            serializer.append_pair(key, value);
        }
    }
    serializer.finish()
}
