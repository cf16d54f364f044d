//! Number-format parsing and rendering (§4.7), ported from the stylesheet
//! format engine this crate's Go original borrowed from `tealeg/xlsx`.
//!
//! The engine is split into two passes: [`parse_full_number_format_string`]
//! breaks a format code into up to four sections (positive/negative/zero/
//! text) and classifies each as general, time, or numeric-with-prefix-
//! suffix; [`ParsedNumFormat::numeric`], [`ParsedNumFormat::text`] and
//! [`ParsedNumFormat::parse_time`] render a raw cell value through the
//! parsed sections. Malformed format codes fall back to `general` rather
//! than failing the whole sheet read — see [`ParsedNumFormat::parse_encountered_error`].

use crate::error::XlsxError;

pub const BUILTIN_NUM_FORMATS_COUNT: i64 = 163;

/// Sparse table of predefined number-format codes, indexed by `numFmtId`.
/// Ids with no entry here are either blank (never used by Excel) or come
/// from the stylesheet's own custom `numFmts` table instead.
pub fn builtin_num_format(id: i64) -> Option<&'static str> {
    Some(match id {
        0 => "general",
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00e+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm am/pm",
        19 => "h:mm:ss am/pm",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[red](#,##0.00)",
        41 => r#"_(* #,##0_);_(* \(#,##0\);_(* "-"_);_(@_)"#,
        42 => r#"_("$"* #,##0_);_("$* \(#,##0\);_("$"* "-"_);_(@_)"#,
        43 => r#"_(* #,##0.00_);_(* \(#,##0.00\);_(* "-"??_);_(@_)"#,
        44 => r#"_("$"* #,##0.00_);_("$"* \(#,##0.00\);_("$"* "-"??_);_(@_)"#,
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0e+0",
        49 => "@",
        _ => return None,
    })
}

#[derive(Debug, Clone, Default)]
pub struct FormatOptions {
    pub full_format_string: String,
    pub reduced_format_string: String,
    pub prefix: String,
    pub suffix: String,
    pub is_time_format: bool,
    pub show_percent: bool,
}

fn general_options() -> FormatOptions {
    FormatOptions {
        full_format_string: "general".into(),
        reduced_format_string: "general".into(),
        ..Default::default()
    }
}

#[derive(Debug, Clone)]
pub struct ParsedNumFormat {
    pub num_fmt: String,
    pub positive_format: FormatOptions,
    pub negative_format: FormatOptions,
    pub zero_format: FormatOptions,
    pub text_format: FormatOptions,
    pub parse_encountered_error: Option<XlsxError>,
    pub is_time_format: bool,
    pub negative_format_expects_positive: bool,
}

/// Parse a full (possibly multi-section) number format string. Never fails:
/// a malformed section falls back to `general` and the error is recorded in
/// `parse_encountered_error` for the caller to surface as a warning.
pub fn parse_full_number_format_string(num_fmt: &str) -> ParsedNumFormat {
    let mut parse_error = None;
    let mut options: Vec<FormatOptions> = match split_format(num_fmt) {
        Ok(sections) => sections
            .into_iter()
            .map(|section| match parse_number_format_section(&section) {
                Ok(opt) => opt,
                Err(err) => {
                    parse_error = Some(err);
                    general_options()
                }
            })
            .collect(),
        Err(err) => {
            parse_error = Some(err);
            vec![general_options()]
        }
    };

    if options.len() > 4 {
        options = vec![general_options()];
        parse_error = Some(XlsxError::ManySections);
    }

    let is_time_format = options[0].is_time_format;
    let (positive, negative, zero, text, negative_expects_positive) = match options.len() {
        1 => {
            let text = if options[0].full_format_string.contains('@') {
                options[0].clone()
            } else {
                parse_number_format_section("general").unwrap_or_else(|_| general_options())
            };
            (options[0].clone(), options[0].clone(), options[0].clone(), text, false)
        }
        2 => {
            let text = parse_number_format_section("general").unwrap_or_else(|_| general_options());
            (options[0].clone(), options[1].clone(), options[0].clone(), text, true)
        }
        3 => {
            let text = parse_number_format_section("general").unwrap_or_else(|_| general_options());
            (options[0].clone(), options[1].clone(), options[2].clone(), text, true)
        }
        _ => (options[0].clone(), options[1].clone(), options[2].clone(), options[3].clone(), true),
    };

    ParsedNumFormat {
        num_fmt: num_fmt.to_string(),
        positive_format: positive,
        negative_format: negative,
        zero_format: zero,
        text_format: text,
        parse_encountered_error: parse_error,
        is_time_format,
        negative_format_expects_positive: negative_expects_positive,
    }
}

/// Split on unescaped, unquoted `;`. `\` escapes the next byte; `"..."`
/// literals are passed through verbatim.
fn split_format(format: &str) -> Result<Vec<String>, XlsxError> {
    let bytes = format.as_bytes();
    let mut result = Vec::new();
    let mut prev = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b';' => {
                result.push(format[prev..i].to_string());
                prev = i + 1;
            }
            b'\\' => i += 1,
            b'"' => {
                let rest = &format[i + 1..];
                match rest.find('"') {
                    Some(end) => i += end + 1,
                    None => return Err(XlsxError::DoubleQuote),
                }
            }
            _ => {}
        }
        i += 1;
    }
    result.push(format[prev..].to_string());
    Ok(result)
}

fn parse_number_format_section(full_format: &str) -> Result<FormatOptions, XlsxError> {
    let reduced = full_format.trim();

    if compare_format_string(reduced, "general") {
        return Ok(general_options());
    }

    if is_time_format(reduced) {
        return Ok(FormatOptions {
            is_time_format: true,
            full_format_string: full_format.to_string(),
            reduced_format_string: reduced.to_string(),
            ..Default::default()
        });
    }

    let (prefix, rest, show_percent1) = parse_literals(reduced)?;
    let (reduced_format, suffix_format) = split_format_and_suffix_format(&rest);
    let (suffix, remaining, show_percent2) = parse_literals(&suffix_format)?;
    if !remaining.is_empty() {
        return Err(XlsxError::InvalidFormat);
    }

    Ok(FormatOptions {
        full_format_string: full_format.to_string(),
        is_time_format: false,
        reduced_format_string: reduced_format,
        prefix,
        suffix,
        show_percent: show_percent1 || show_percent2,
    })
}

fn compare_format_string(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let norm = |s: &str| {
        if s.is_empty() || s.eq_ignore_ascii_case("general") {
            "general".to_string()
        } else {
            s.to_string()
        }
    };
    norm(a) == norm(b)
}

const TIME_FORMAT_CHARACTERS: &[&str] = &[
    "M", "D", "Y", "YY", "YYYY", "MM", "yyyy", "m", "d", "yy", "h", "m", "AM/PM", "A/P", "am/pm",
    "a/p", "r", "g", "e", "b1", "b2", "[hh]", "[h]", "[mm]", "[m]", "s.0000", "s.000", "s.00",
    "s.0", "s", "[ss].0000", "[ss].000", "[ss].00", "[ss].0", "[ss]", "[s].0000", "[s].000",
    "[s].00", "[s].0", "[s]", "上", "午", "下",
];

fn is_time_format(format: &str) -> bool {
    let runes: Vec<char> = format.chars().collect();
    let mut found = false;
    let mut i = 0usize;
    while i < runes.len() {
        let rest = &runes[i..];
        match rest[0] {
            '\\' | '_' => {
                if rest.len() > 1 {
                    i += 1;
                }
            }
            '*' => {}
            '"' => match skip_to_rune(rest, '"') {
                Some(end) => i += end,
                None => return false,
            },
            '$' | '-' | '+' | '/' | '(' | ')' | ':' | '!' | '^' | '&' | '\'' | '~' | '{' | '}'
            | '<' | '>' | '=' | ' ' | ',' => {}
            _ => {
                let rest_str: String = rest.iter().collect();
                if let Some(special) = TIME_FORMAT_CHARACTERS
                    .iter()
                    .find(|special| rest_str.starts_with(*special))
                {
                    found = true;
                    i += special.chars().count() - 1;
                    i += 1;
                    continue;
                }
                if rest[0] == '[' {
                    match skip_to_rune(rest, ']') {
                        Some(end) => {
                            i += end;
                            i += 1;
                            continue;
                        }
                        None => return false,
                    }
                }
                return false;
            }
        }
        i += 1;
    }
    found
}

fn skip_to_rune(runes: &[char], target: char) -> Option<usize> {
    runes.iter().skip(1).position(|&c| c == target).map(|p| p + 1)
}

const FORMATTING_CHARACTERS: &[&str] =
    &["0/", "#/", "?/", "E-", "E+", "e-", "e+", "0", "#", "?", ".", ",", "@", "*"];

/// Consume a literal prefix (escapes, quoted text, `%`, currency brackets)
/// from `format`, returning `(literal_text, remaining_format, show_percent)`.
fn parse_literals(format: &str) -> Result<(String, String, bool), XlsxError> {
    let bytes = format.as_bytes();
    let mut prefix = String::new();
    let mut show_percent = false;
    let mut i = 0usize;
    while i < bytes.len() {
        let rest = &format[i..];
        match bytes[i] {
            b'\\' => {
                if rest.len() > 1 {
                    prefix.push(rest.as_bytes()[1] as char);
                    i += 1;
                }
            }
            b'_' => {
                if rest.len() > 1 {
                    i += 1;
                }
            }
            b'*' => {}
            b'"' => match rest[1..].find('"') {
                Some(end) => {
                    prefix.push_str(&rest[1..1 + end]);
                    i += end + 1;
                }
                None => return Err(XlsxError::DoubleQuote),
            },
            b'%' => {
                show_percent = true;
                prefix.push('%');
            }
            b'[' => {
                let bracket_index = rest.find(']').ok_or(XlsxError::InvalidBrackets)?;
                if rest.len() > 2 && rest.as_bytes()[1] == b'$' {
                    let dash_index = rest.find('-');
                    match dash_index {
                        Some(d) if d < bracket_index => prefix.push_str(&rest[2..d]),
                        _ => return Err(XlsxError::InvalidCurrency),
                    }
                }
                if rest.as_bytes()[1] == b'=' || rest.as_bytes()[1] == b'>' || rest.as_bytes()[1] == b'<' {
                    return Err(XlsxError::UnsupportedCharacters);
                }
                i += bracket_index;
            }
            b'$' | b'-' | b'+' | b'/' | b'(' | b')' | b':' | b'!' | b'^' | b'&' | b'\'' | b'~'
            | b'{' | b'}' | b'<' | b'>' | b'=' | b' ' => {
                prefix.push(bytes[i] as char);
            }
            _ => {
                if FORMATTING_CHARACTERS.iter().any(|special| rest.starts_with(special)) {
                    return Ok((prefix, rest.to_string(), show_percent));
                }
                return Err(XlsxError::UnsupportedCharacters);
            }
        }
        i += 1;
    }
    Ok((prefix, String::new(), show_percent))
}

fn split_format_and_suffix_format(format: &str) -> (String, String) {
    let mut i = 0usize;
    while i < format.len() {
        let rest = &format[i..];
        match FORMATTING_CHARACTERS.iter().find(|special| rest.starts_with(*special)) {
            Some(special) => i += special.len(),
            None => break,
        }
    }
    (format[..i].to_string(), format[i..].to_string())
}

impl ParsedNumFormat {
    /// Render a string-typed (`t="str"`/inline) cell value.
    pub fn text(&self, value: &str) -> Result<String, XlsxError> {
        match self.text_format.reduced_format_string.as_str() {
            "general" => Ok(value.to_string()),
            "@" => Ok(format!("{}{}{}", self.text_format.prefix, value, self.text_format.suffix)),
            "" => Ok(format!("{}{}", self.text_format.prefix, self.text_format.suffix)),
            _ => Err(XlsxError::InvalidFormat),
        }
    }

    /// Render a numeric cell value through the positive/negative/zero
    /// section selected by its sign.
    pub fn numeric(&self, value: &str, _date1904: bool) -> Result<String, XlsxError> {
        let raw = value.trim();
        if raw.is_empty() {
            return Ok(String::new());
        }

        if self.is_time_format {
            return self.parse_time(raw, _date1904);
        }

        let mut float_val: f64 = raw.parse()?;
        let number_format = if float_val > 0.0 {
            &self.positive_format
        } else if float_val < 0.0 {
            if self.negative_format_expects_positive {
                float_val = float_val.abs();
            }
            &self.negative_format
        } else {
            &self.zero_format
        };

        if number_format.show_percent {
            float_val *= 100.0;
        }

        let formatted_num = match number_format.reduced_format_string.as_str() {
            "general" => return Ok(general_numeric_scientific(value, true).unwrap_or_else(|_| raw.to_string())),
            "@" => value.to_string(),
            "0" | "#,##0" => format!("{float_val:.0}"),
            "0.0" | "#,##0.0" => format!("{float_val:.1}"),
            "0.00" | "#,##0.00" => format!("{float_val:.2}"),
            "0.000" | "#,##0.000" => format!("{float_val:.3}"),
            "0.0000" | "#,##0.0000" => format!("{float_val:.4}"),
            "0.00e+00" | "##0.0e+0" => go_format_e(float_val),
            "" => String::new(),
            other => {
                let zero_count = other.matches('0').count();
                if zero_count == other.len() && zero_count > raw.len() {
                    return Ok(format!("{}{}", &other[..zero_count - raw.len()], raw));
                }
                return Ok(raw.to_string());
            }
        };
        Ok(format!("{}{}{}", number_format.prefix, formatted_num, number_format.suffix))
    }

    /// Render a time/date-typed cell value using the positive section's
    /// full format string as a `strftime`-like template.
    pub fn parse_time(&self, value: &str, date1904: bool) -> Result<String, XlsxError> {
        let serial: f64 = value.parse()?;
        let ts = crate::date::excel_serial_to_timestamp(serial, date1904);

        let mut format = self.positive_format.full_format_string.clone();
        if is_12_hour_time(&format) {
            replace_first(&mut format, "hh", "{h12pad}");
            replace_first(&mut format, "h", "{h12}");
        } else {
            replace_first(&mut format, "hh", "{h24pad}");
            replace_first(&mut format, "h", "{h24}");
        }
        for (xltime, token) in time_replacement_tokens() {
            replace_first(&mut format, xltime, token);
        }

        if ts.format("%H").to_string().parse::<u32>().unwrap_or(0) < 1 {
            replace_first(&mut format, "]:", "]");
            replace_first(&mut format, "{h12pad!}", "");
            replace_first(&mut format, "{h12!}", "");
            replace_first(&mut format, "{h24!}", "");
        } else {
            replace_first(&mut format, "{h12!}", "{h12}");
            replace_first(&mut format, "{h24!}", "{h24}");
        }

        Ok(render_time_tokens(&format, &ts))
    }
}

fn replace_first(haystack: &mut String, from: &str, to: &str) {
    if let Some(pos) = haystack.find(from) {
        haystack.replace_range(pos..pos + from.len(), to);
    }
}

/// Ordered table mapping the original format's bracketed-hour markers to
/// tokens that survive the unconditional-vs-conditional hour substitution,
/// mirroring the Go original's two-pass `[h]`/`[hh]` stripping for
/// midnight-hour values.
fn time_replacement_tokens() -> Vec<(&'static str, &'static str)> {
    vec![
        ("YYYY", "{y4}"),
        ("yyyy", "{y4}"),
        ("YY", "{y2}"),
        ("yy", "{y2}"),
        ("MMMM", "{monthfull}"),
        ("mmmm", "{monthfull}"),
        ("DDDD", "{weekdayfull}"),
        ("dddd", "{weekdayfull}"),
        ("[hh]", "{h12pad!}"),
        ("[h]", "{h12!}"),
        ("DD", "{d2}"),
        ("dd", "{d2}"),
        ("D", "{d1}"),
        ("d", "{d1}"),
        ("MMM", "{monabbr}"),
        ("mmm", "{monabbr}"),
        ("MMSS", "{minsec4}"),
        ("mmss", "{minsec4}"),
        ("SS", "{sec2}"),
        ("ss", "{sec2}"),
        ("MM:", "{min2}:"),
        ("mm:", "{min2}:"),
        (":MM", ":{min2}"),
        (":mm", ":{min2}"),
        ("MM", "{mon2}"),
        ("mm", "{mon2}"),
        ("AM/PM", "{ampm}"),
        ("am/pm", "{ampm}"),
        ("M/", "{mon1}/"),
        ("m/", "{mon1}/"),
    ]
}

fn render_time_tokens(format: &str, ts: &chrono::NaiveDateTime) -> String {
    use chrono::Datelike;
    use chrono::Timelike;

    let mut out = format.to_string();
    let h12 = {
        let h = ts.hour() % 12;
        if h == 0 { 12 } else { h }
    };
    let replacements: &[(&str, String)] = &[
        ("{y4}", format!("{:04}", ts.year())),
        ("{y2}", format!("{:02}", ts.year() % 100)),
        ("{monthfull}", ts.format("%B").to_string()),
        ("{weekdayfull}", ts.format("%A").to_string()),
        ("{d2}", format!("{:02}", ts.day())),
        ("{d1}", ts.day().to_string()),
        ("{monabbr}", ts.format("%b").to_string()),
        ("{minsec4}", format!("{:02}{:02}", ts.minute(), ts.second())),
        ("{sec2}", format!("{:02}", ts.second())),
        ("{min2}", format!("{:02}", ts.minute())),
        ("{mon2}", format!("{:02}", ts.month())),
        ("{mon1}", ts.month().to_string()),
        ("{ampm}", if ts.hour() < 12 { "am".to_string() } else { "pm".to_string() }),
        ("{h12pad}", format!("{h12:02}")),
        ("{h12}", h12.to_string()),
        ("{h24pad}", format!("{:02}", ts.hour())),
        ("{h24}", ts.hour().to_string()),
        ("{h12pad!}", format!("{h12:02}")),
        ("{h12!}", h12.to_string()),
        ("{h24!}", ts.hour().to_string()),
    ];
    for (token, value) in replacements {
        out = out.replace(token, value);
    }
    out
}

fn is_12_hour_time(format: &str) -> bool {
    format.contains("am/pm")
        || format.contains("AM/PM")
        || format.contains("a/p")
        || format.contains("A/P")
}

const MAX_NON_SCIENTIFIC_NUMBER: f64 = 1e11;
const MIN_NON_SCIENTIFIC_NUMBER: f64 = 1e-9;

fn general_numeric_scientific(value: &str, allow_scientific: bool) -> Result<String, XlsxError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    let f: f64 = trimmed.parse()?;
    if allow_scientific {
        let abs_f = f.abs();
        if (abs_f > 0.0 && abs_f < MIN_NON_SCIENTIFIC_NUMBER) || abs_f >= MAX_NON_SCIENTIFIC_NUMBER {
            return Ok(format_scientific_trimmed(f));
        }
    }
    Ok(format!("{f}"))
}

fn format_scientific_trimmed(f: f64) -> String {
    let s = format!("{f:e}");
    match s.split_once('e') {
        Some((mantissa, exp_str)) => {
            let exp: i32 = exp_str.parse().unwrap_or(0);
            format!("{}E{}{:02}", mantissa, if exp >= 0 { "+" } else { "-" }, exp.abs())
        }
        None => s,
    }
}

fn go_format_e(f: f64) -> String {
    let s = format!("{f:.6e}");
    match s.split_once('e') {
        Some((mantissa, exp_str)) => {
            let exp: i32 = exp_str.parse().unwrap_or(0);
            format!("{}e{}{:02}", mantissa, if exp >= 0 { "+" } else { "-" }, exp.abs())
        }
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_format_passes_through() {
        let p = parse_full_number_format_string("general");
        assert_eq!(p.numeric("3.14", false).unwrap(), "3.14");
    }

    #[test]
    fn two_digit_fixed_format() {
        let p = parse_full_number_format_string("0.00");
        assert_eq!(p.numeric("3.14159", false).unwrap(), "3.14");
        assert_eq!(p.numeric("-3.14159", false).unwrap(), "3.14");
    }

    #[test]
    fn percent_format_multiplies_by_a_hundred() {
        let p = parse_full_number_format_string("0%");
        assert_eq!(p.numeric("0.5", false).unwrap(), "50%");
    }

    #[test]
    fn negative_parenthesized_section_selected_for_negatives() {
        let p = parse_full_number_format_string("#,##0;(#,##0)");
        assert!(p.negative_format_expects_positive);
        assert_eq!(p.numeric("-7", false).unwrap(), "7");
    }

    #[test]
    fn too_many_sections_falls_back_to_general() {
        let p = parse_full_number_format_string("a;b;c;d;e");
        assert!(p.parse_encountered_error.is_some());
        assert_eq!(p.numeric("9", false).unwrap(), "9");
    }

    #[test]
    fn split_format_respects_quoted_semicolons() {
        let sections = split_format(r#"0"a;b";0"#).unwrap();
        assert_eq!(sections, vec![r#"0"a;b""#, "0"]);
    }

    #[test]
    fn time_format_is_detected() {
        assert!(is_time_format("yyyy-mm-dd"));
        assert!(!is_time_format("#,##0.00"));
    }

    #[test]
    fn time_value_renders_date_parts() {
        let p = parse_full_number_format_string("yyyy-mm-dd");
        // 2 == 1900-01-01 under the 1900 epoch's pseudo day count
        assert_eq!(p.numeric("2", false).unwrap(), "1900-01-01");
    }

    #[test]
    fn twelve_hour_clock_is_detected() {
        assert!(is_12_hour_time("h:mm am/pm"));
        assert!(!is_12_hour_time("hh:mm:ss"));
    }

    #[test]
    fn currency_bracket_prefix_is_extracted() {
        let opts = parse_number_format_section(r#"[$$-409]#,##0.00"#).unwrap();
        assert_eq!(opts.prefix, "$");
    }
}
