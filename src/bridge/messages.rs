//! Failure message templates shared with generated code
//!
//! Templates are NUL-terminated statics so their addresses can be published;
//! `%.200s` is replaced by the offending name, cut to 200 characters.

use std::ffi::CStr;

pub static NAME_ERROR_MSG: &CStr = c"name '%.200s' is not defined";
pub static GLOBAL_NAME_ERROR_MSG: &CStr = c"global name '%.200s' is not defined";
pub static UNBOUNDLOCAL_ERROR_MSG: &CStr = c"local variable '%.200s' referenced before assignment";
pub static UNBOUNDFREE_ERROR_MSG: &CStr =
    c"free variable '%.200s' referenced before assignment in enclosing scope";

/// Published templates by bridge name
pub fn all() -> [(&'static str, &'static CStr); 4] {
    [
        ("name_error_msg", NAME_ERROR_MSG),
        ("global_name_error_msg", GLOBAL_NAME_ERROR_MSG),
        ("unboundlocal_error_msg", UNBOUNDLOCAL_ERROR_MSG),
        ("unboundfree_error_msg", UNBOUNDFREE_ERROR_MSG),
    ]
}

/// Longest name a message will quote, in characters
pub const NAME_LIMIT: usize = 200;

/// `name` cut to at most [`NAME_LIMIT`] characters
pub fn clip_name(name: &str) -> &str {
    match name.char_indices().nth(NAME_LIMIT) {
        Some((end, _)) => &name[..end],
        None => name,
    }
}

/// Fill a template with `name`
pub fn format_name(template: &CStr, name: &str) -> String {
    template
        .to_string_lossy()
        .replacen("%.200s", clip_name(name), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_name() {
        assert_eq!(
            format_name(GLOBAL_NAME_ERROR_MSG, "spam"),
            "global name 'spam' is not defined"
        );
        assert_eq!(
            format_name(UNBOUNDLOCAL_ERROR_MSG, "x"),
            "local variable 'x' referenced before assignment"
        );
    }

    #[test]
    fn test_long_names_are_truncated() {
        let long = "n".repeat(300);
        let message = format_name(NAME_ERROR_MSG, &long);
        assert_eq!(message.len(), "name '' is not defined".len() + 200);
    }

    #[test]
    fn test_clip_name_counts_characters() {
        let wide = "\u{e9}".repeat(250);
        assert_eq!(clip_name(&wide).chars().count(), NAME_LIMIT);
        assert_eq!(clip_name("short"), "short");
    }
}
