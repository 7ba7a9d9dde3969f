/// Replaces positional placeholders (`{0}`, `{1}`, ...) in a URL template
///
/// Placeholders without a matching argument are left untouched.
pub fn fill_template(template: &str, arguments: &[&str]) -> String {
    arguments
        .iter()
        .enumerate()
        .fold(template.to_owned(), |url, (index, argument)| {
            url.replace(&format!("{{{}}}", index), argument)
        })
}

#[cfg(test)]
mod does {
    use super::*;

    #[test]
    fn fill_positional_placeholders() {
        let url = fill_template(
            "https://example.com/{1}/{0}?key={2}&again={0}",
            &["38.855652", "-94.799712", "secret"],
        );

        assert_eq!(
            url,
            "https://example.com/-94.799712/38.855652?key=secret&again=38.855652"
        );
    }

    #[test]
    fn leave_unmatched_placeholders() {
        assert_eq!(fill_template("/{0}/{1}", &["a"]), "/a/{1}");
    }
}
