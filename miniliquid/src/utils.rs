use std::collections::BTreeMap;
use std::fmt;

/// Helper to HTML escape a string when formatting.
pub struct HtmlEscape<'a>(pub &'a str);

impl<'a> fmt::Display for HtmlEscape<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut start = 0;
        for (i, b) in self.0.bytes().enumerate() {
            let quote = match b {
                b'<' => "&lt;",
                b'>' => "&gt;",
                b'&' => "&amp;",
                b'"' => "&quot;",
                b'\'' => "&#x27;",
                b'/' => "&#x2f;",
                _ => continue,
            };
            if start < i {
                ok!(f.write_str(&self.0[start..i]));
            }
            ok!(f.write_str(quote));
            start = i + 1;
        }
        if start < self.0.len() {
            f.write_str(&self.0[start..])
        } else {
            Ok(())
        }
    }
}

/// Helper to escape a string for embedding into a JavaScript string literal.
///
/// Line and paragraph separators, NUL, tabs and newlines are written as
/// escape sequences, `</` becomes `<\/` and quotes, backslashes and
/// backticks are prefixed with a backslash.  Carriage returns are folded
/// into `\n` whether or not a line feed follows.
pub struct JsEscape<'a>(pub &'a str);

impl<'a> fmt::Display for JsEscape<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        let mut start = 0;
        let mut chars = s.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            let (replacement, consumed) = match c {
                '\u{2028}' => ("\\u2028", c.len_utf8()),
                '\u{2029}' => ("\\u2029", c.len_utf8()),
                '\0' => ("\\u0000", 1),
                '\t' => ("\\t", 1),
                '\n' => ("\\n", 1),
                '\r' => match chars.peek() {
                    Some((_, '\n')) => {
                        chars.next();
                        ("\\n", 2)
                    }
                    _ => ("\\n", 1),
                },
                '"' => ("\\\"", 1),
                '\'' => ("\\'", 1),
                '\\' => ("\\\\", 1),
                '`' => ("\\`", 1),
                '<' if s[i..].starts_with("</") => {
                    chars.next();
                    ("<\\/", 2)
                }
                _ => continue,
            };
            if start < i {
                ok!(f.write_str(&s[start..i]));
            }
            ok!(f.write_str(replacement));
            start = i + consumed;
        }
        if start < s.len() {
            f.write_str(&s[start..])
        } else {
            Ok(())
        }
    }
}

/// Debug formats only the keys of a map.
pub struct BTreeMapKeysDebug<'a, K: fmt::Debug, V>(pub &'a BTreeMap<K, V>);

impl<'a, K: fmt::Debug, V> fmt::Debug for BTreeMapKeysDebug<'a, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.keys()).finish()
    }
}

#[test]
fn test_html_escape() {
    let input = "<>&\"'/";
    let output = HtmlEscape(input).to_string();
    assert_eq!(output, "&lt;&gt;&amp;&quot;&#x27;&#x2f;");
}

#[test]
fn test_js_escape() {
    assert_eq!(
        JsEscape("say \"hi\"\\\tthere\n</script>").to_string(),
        "say \\\"hi\\\"\\\\\\tthere\\n<\\/script>"
    );
    assert_eq!(JsEscape("a\r\nb\rc").to_string(), "a\\nb\\nc");
    assert_eq!(JsEscape("\u{2028}\u{2029}\0").to_string(), "\\u2028\\u2029\\u0000");
    assert_eq!(JsEscape("`it's`").to_string(), "\\`it\\'s\\`");
    assert_eq!(JsEscape("a < b, ä").to_string(), "a < b, ä");
}
