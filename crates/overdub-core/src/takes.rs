//! Take naming for re-recorded documents.
//!
//! Recording over a document that is currently playing back must not splice
//! the new keystrokes into the old session. The new recording instead targets
//! a sibling name derived from the original, so both takes stay intact and
//! can be layered on later playback.

/// Derives the successor take name.
///
/// `Foo` becomes `Foo-Take2` and `Foo-Take2` becomes `Foo-Take3`; an existing
/// `-Take<n>` suffix is continued rather than stacked.
pub fn next_take_name(name: &str) -> String {
    match split_take_suffix(name) {
        Some((base, number)) => format!("{base}-Take{}", number + 1),
        None => format!("{name}-Take2"),
    }
}

/// First successor of `name` for which `taken` returns false.
pub fn free_take_name(name: &str, mut taken: impl FnMut(&str) -> bool) -> String {
    let mut candidate = next_take_name(name);
    while taken(&candidate) {
        candidate = next_take_name(&candidate);
    }
    candidate
}

fn split_take_suffix(name: &str) -> Option<(&str, u64)> {
    let (base, suffix) = name.rsplit_once("-Take")?;
    if suffix.is_empty() || !suffix.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    Some((base, suffix.parse().ok()?))
}
