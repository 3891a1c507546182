/// Formats a number with `,` thousands separators and a fixed number of
/// decimals, e.g. `1234567.891` with 2 decimals -> `1,234,567.89`.
pub fn format_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 4);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    let negative = value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0');
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// `$1,234.56` style amount.
pub fn format_currency(value: f64, decimals: usize) -> String {
    if value < 0.0 {
        format!("-${}", format_thousands(-value, decimals))
    } else {
        format!("${}", format_thousands(value, decimals))
    }
}

/// Share of `part` in `total` as a percentage; zero when `total` is zero.
pub fn percent_of(part: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        part / total * 100.0
    }
}

/// File-name fragment for a property or key: spaces and colons become `_`.
pub fn file_safe(name: &str) -> String {
    name.replace([' ', ':'], "_")
}
