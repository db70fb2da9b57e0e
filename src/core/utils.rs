/// Очищает имя файла перед отправкой во внешний сервис.
///
/// Оставляет только буквенно-цифровые символы, `.`, `_`, `-` и пробел,
/// затем обрезает пробелы по краям. Если ничего не осталось, возвращает
/// `"upload.bin"`.
///
/// # Example
///
/// ```
/// use cybertutor::core::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("report<2024>.pdf"), "report2024.pdf");
/// assert_eq!(sanitize_filename("  ../etc/passwd "), "..etcpasswd");
/// ```
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | ' '))
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Обрезает строку до `max_chars` символов (по границе символа, не байта).
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Группирует разряды пробелом: `3861493` → `3 861 493`.
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

/// Форматирует размер в байтах для пользователя: `512 B`, `1.5 KB`, `20.0 MB`.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}
