use std::borrow::Cow;

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let nee = needle.as_bytes();
    if nee.is_empty() {
        return Some(0);
    }
    if nee.len() > hay.len() {
        return None;
    }

    for i in 0..=hay.len() - nee.len() {
        let mut matches = true;
        for j in 0..nee.len() {
            let a = hay[i + j].to_ascii_lowercase();
            let b = nee[j].to_ascii_lowercase();
            if a != b {
                matches = false;
                break;
            }
        }
        if matches {
            return Some(i);
        }
    }
    None
}

fn is_token_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '~' | '+' | '/' | '=')
}

// Replaces the token run following each occurrence of `marker`.
fn redact_after(text: String, marker: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    loop {
        let Some(idx) = find_ascii_case_insensitive(rest, marker) else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..idx + marker.len()]);
        rest = &rest[idx + marker.len()..];

        let mut consumed = 0;
        for ch in rest.chars() {
            if is_token_char(ch) {
                consumed += ch.len_utf8();
            } else {
                break;
            }
        }
        if consumed > 0 {
            out.push_str("REDACTED");
        }
        rest = &rest[consumed..];
    }
    out
}

pub fn redact_secrets(input: &str) -> Cow<'_, str> {
    let mut value = input.to_string();
    for marker in ["Bearer ", "refreshToken=", "\"refreshToken\":\""] {
        if find_ascii_case_insensitive(&value, marker).is_some() {
            value = redact_after(value, marker);
        }
    }

    if value == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_secrets_redacts_bearer_token() {
        let input = "error sending request: Authorization: Bearer eyJhbGci.abc-123\n";
        let out = redact_secrets(input).to_string();
        assert_eq!(
            out,
            "error sending request: Authorization: Bearer REDACTED\n"
        );
        assert!(!out.contains("eyJhbGci"));
    }

    #[test]
    fn redact_secrets_redacts_refresh_token_values() {
        let input = r#"body was {"refreshToken":"r1-secret"} with refreshToken=r2-secret trailing"#;
        let out = redact_secrets(input).to_string();
        assert!(out.contains(r#""refreshToken":"REDACTED""#));
        assert!(out.contains("refreshToken=REDACTED"));
        assert!(!out.contains("secret"));
    }

    #[test]
    fn redact_secrets_leaves_clean_text_borrowed() {
        let input = "connection refused";
        assert!(matches!(redact_secrets(input), Cow::Borrowed(_)));
    }
}
