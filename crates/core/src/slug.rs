/// Normalizes a board title into a snake_case fragment that is safe to embed in a file name.
///
/// Words break on any non-alphanumeric character and on case boundaries, so `"CPU Usage"`,
/// `"cpu-usage"` and `"CpuUsage"` all become `cpu_usage`. Titles without a single alphanumeric
/// character map to `untitled`.
pub fn slug(title: &str) -> String {
    let chars: Vec<char> = title.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            flush(&mut words, &mut current);
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            // "dashBoard" and the "S" in "HTTPServer"
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower) {
                flush(&mut words, &mut current);
            }
        }
        current.extend(c.to_lowercase());
    }
    flush(&mut words, &mut current);

    if words.is_empty() {
        return "untitled".to_owned();
    }
    words.join("_")
}

fn flush(words: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}
