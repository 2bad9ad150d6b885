const MAX_STEM_LEN: usize = 80;

/// Windows-safe file stem for a group (worksheet) name.
pub fn safe_file_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        // Collapse runs of underscores.
        if c == '_' && stem.ends_with('_') {
            continue;
        }
        stem.push(c);
    }

    let mut stem: String = stem
        .trim_matches(&['_', ' ', '.'][..])
        .chars()
        .take(MAX_STEM_LEN)
        .collect();
    if stem.is_empty() {
        stem.push_str("group");
    }
    if is_reserved_windows_name(&stem) {
        stem.push('_');
    }
    stem
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}')
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
