//! Cross-origin isolation header policy.
//!
//! Shared-memory threads in the browser are only unlocked when all three
//! headers are present on the response at once; a partial set provides no
//! isolation at all. The table is therefore exposed only as a whole - no
//! API hands out a subset.

/// Header name/value pairs required jointly for `SharedArrayBuffer`
/// backed wasm threads.
pub const ISOLATION_HEADERS: [(&str, &str); 3] = [
    ("Cross-Origin-Resource-Policy", "cross-origin"),
    ("Cross-Origin-Opener-Policy", "same-origin"),
    ("Cross-Origin-Embedder-Policy", "require-corp"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_is_exactly_three_headers() {
        assert_eq!(ISOLATION_HEADERS.len(), 3);
        let names: Vec<_> = ISOLATION_HEADERS.iter().map(|(n, _)| *n).collect();
        assert!(names.contains(&"Cross-Origin-Resource-Policy"));
        assert!(names.contains(&"Cross-Origin-Opener-Policy"));
        assert!(names.contains(&"Cross-Origin-Embedder-Policy"));
    }
}
