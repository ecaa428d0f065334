// Output generation module

pub mod hub;
pub mod pyliteral;
pub mod scaffold;
pub mod templates;

pub use hub::*;
pub use pyliteral::*;
pub use scaffold::*;
pub use templates::*;

use std::path::{Component, Path};

/// Relative forward-slash path from directory `from` to `to`.
///
/// Both paths should be absolute (or share the same base).
pub fn relative_path(from: &Path, to: &Path) -> String {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = std::iter::repeat("..".to_string())
        .take(from.len() - common)
        .collect();
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}
