//! Text rendering for `Debug`/`Display` output and log fields.
//!
//! Keeps diagnostics readable: fully qualified type names are trimmed
//! to their last path segments and scope chains render as arrows.

use std::fmt::Display;

/// Renders a chain of scope labels, outermost first.
///
/// # Examples
/// ```
/// use podi_support::rendering::render_path;
///
/// assert_eq!(render_path(&["#0", "#4", "#9"]), "#0 → #4 → #9");
/// ```
pub fn render_path<D: Display>(segments: &[D]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push_str(" → ");
        }
        out.push_str(&segment.to_string());
    }
    out
}

/// Trims every path prefix from a type name, generics included.
///
/// ```
/// use podi_support::rendering::trim_type_name;
///
/// assert_eq!(trim_type_name("app::repo::UserRepo"), "UserRepo");
/// assert_eq!(
///     trim_type_name("alloc::sync::Arc<app::db::Pool>"),
///     "Arc<Pool>"
/// );
/// ```
pub fn trim_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;

    for (i, ch) in full.char_indices() {
        match ch {
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                out.push_str(last_segment(&full[segment_start..i]));
                out.push(ch);
                segment_start = i + ch.len_utf8();
            }
            _ => {}
        }
    }
    out.push_str(last_segment(&full[segment_start..]));
    out
}

/// Short, human-readable name of `T`.
///
/// ```
/// use podi_support::rendering::short_type_name;
///
/// assert_eq!(short_type_name::<Vec<String>>(), "Vec<String>");
/// ```
pub fn short_type_name<T: ?Sized>() -> String {
    trim_type_name(std::any::type_name::<T>())
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path() {
        let segments: [&str; 0] = [];
        assert_eq!(render_path(&segments), "");
    }

    #[test]
    fn single_segment_path() {
        assert_eq!(render_path(&[7u64]), "7");
    }

    #[test]
    fn trims_plain_path() {
        assert_eq!(trim_type_name("my_app::services::Mailer"), "Mailer");
    }

    #[test]
    fn trims_nested_generics() {
        assert_eq!(
            trim_type_name("core::option::Option<alloc::sync::Arc<dyn my_app::Logger>>"),
            "Option<Arc<dyn Logger>>"
        );
    }

    #[test]
    fn trims_tuples_and_references() {
        assert_eq!(
            trim_type_name("(alloc::string::String, &my_app::Config)"),
            "(String, &Config)"
        );
    }

    #[test]
    fn leaves_bare_names_alone() {
        assert_eq!(trim_type_name("u32"), "u32");
    }
}
