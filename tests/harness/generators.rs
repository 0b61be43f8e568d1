// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for attack simulation.

/// Generate a pool of valid file names.
pub fn generate_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("target_{i}.log")).collect()
}

/// Generate a payload of `len` bytes tagged with `index`.
pub fn generate_payload(index: usize, len: usize) -> Vec<u8> {
    let tag = format!("[{index}]");
    tag.bytes().cycle().take(len).collect()
}

/// File names with path structure: separators, dot components, NUL.
pub fn generate_escaping_names() -> Vec<&'static str> {
    vec![
        "../secret",
        "..",
        ".",
        "../../etc/passwd",
        "..\\secret",
        "/etc/passwd",
        "data/../x",
        "./x",
        "x/",
        "x\0.txt",
        "x.txt/.",
    ]
}

/// File names attempting to leave the storage root, including encoded and
/// control-character variants that are single path components.
pub fn generate_traversal_names() -> Vec<&'static str> {
    let mut names = generate_escaping_names();
    names.extend(["%2e%2e%2fsecret", "..%2fsecret", "x.txt\n", "\nx.txt"]);
    names
}

/// All strings of length 1..=`max_len` over `alphabet`.
pub fn enumerate_names(alphabet: &[char], max_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut frontier = vec![String::new()];
    for _ in 0..max_len {
        let mut next = Vec::with_capacity(frontier.len() * alphabet.len());
        for prefix in &frontier {
            for c in alphabet {
                let mut name = prefix.clone();
                name.push(*c);
                next.push(name);
            }
        }
        out.extend(next.iter().cloned());
        frontier = next;
    }
    out
}

/// Reference classifier for file names, written without regular expressions.
///
/// A name is one or more segments of `[A-Za-z0-9_]`, joined by single dots.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumerate_names() {
        let names = enumerate_names(&['a', '.'], 2);
        assert_eq!(names, vec!["a", ".", "aa", "a.", ".a", ".."]);
    }

    #[test]
    fn test_reference_classifier() {
        assert!(is_valid_name("a.b_c.0"));
        assert!(!is_valid_name("a..b"));
        assert!(!is_valid_name(".a"));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn test_payload_length() {
        assert_eq!(generate_payload(7, 10), b"[7][7][7][".to_vec());
    }
}
