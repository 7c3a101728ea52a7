//! `printf`-style formatting for interpolated variables
//!
//! `~%03d,§count~` formats `§count` with `%03d`. Supported conversions are
//! `d i u x X o f F e E g G s`, with the `- + space 0 #` flags, width and
//! precision.

use crate::value::VarValue;

#[derive(Debug, Default, Clone, Copy)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: usize,
    precision: Option<usize>,
    conversion: char,
}

fn parse_spec(spec: &str) -> Option<Spec> {
    let mut chars = spec.strip_prefix('%')?.chars().peekable();
    let mut out = Spec::default();

    while let Some(&c) = chars.peek() {
        match c {
            '-' => out.left = true,
            '+' => out.plus = true,
            ' ' => out.space = true,
            '0' => out.zero = true,
            '#' => out.alt = true,
            _ => break,
        }
        chars.next();
    }
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        out.width = out.width * 10 + d as usize;
        chars.next();
    }
    if chars.peek() == Some(&'.') {
        chars.next();
        let mut precision = 0;
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            precision = precision * 10 + d as usize;
            chars.next();
        }
        out.precision = Some(precision);
    }
    // length modifiers carry no meaning here
    while matches!(chars.peek(), Some('l' | 'h' | 'z' | 'j' | 't' | 'L')) {
        chars.next();
    }
    out.conversion = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some(out)
}

/// Format a value; an unusable spec falls back to the plain text form
pub fn format_value(spec: &str, value: &VarValue) -> String {
    let Some(spec) = parse_spec(spec) else {
        return value.as_text();
    };

    let (sign, body) = match spec.conversion {
        'd' | 'i' | 'u' => split_sign(value.as_int().to_string(), spec),
        'x' => radix(value.as_int(), spec, |n| format!("{:x}", n), "0x"),
        'X' => radix(value.as_int(), spec, |n| format!("{:X}", n), "0X"),
        'o' => radix(value.as_int(), spec, |n| format!("{:o}", n), "0"),
        'f' | 'F' => {
            let precision = spec.precision.unwrap_or(6);
            split_sign(format!("{:.*}", precision, value.as_float()), spec)
        }
        'e' | 'E' => {
            let precision = spec.precision.unwrap_or(6);
            let text = exponent(value.as_float(), precision, spec.conversion == 'E');
            split_sign(text, spec)
        }
        'g' | 'G' => split_sign(general(value.as_float(), spec), spec),
        's' => {
            let mut text = value.as_text();
            if let Some(precision) = spec.precision {
                text = text.chars().take(precision).collect();
            }
            return pad(String::new(), text, spec, false);
        }
        _ => return value.as_text(),
    };

    pad(sign, body, spec, true)
}

fn split_sign(text: String, spec: Spec) -> (String, String) {
    match text.strip_prefix('-') {
        Some(rest) => ("-".to_string(), rest.to_string()),
        None if spec.plus => ("+".to_string(), text),
        None if spec.space => (" ".to_string(), text),
        None => (String::new(), text),
    }
}

fn radix(n: i64, spec: Spec, digits: impl Fn(u64) -> String, prefix: &str) -> (String, String) {
    let body = digits(n as u64);
    if spec.alt && n != 0 {
        (prefix.to_string(), body)
    } else {
        (String::new(), body)
    }
}

/// C style exponent form: `1.500000e+02`
fn exponent(value: f64, precision: usize, upper: bool) -> String {
    let text = format!("{:.*e}", precision, value);
    let (mantissa, exp) = match text.split_once('e') {
        Some(parts) => parts,
        None => return text,
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{}{}{}{:02}", mantissa, e, sign, exp.abs())
}

fn general(value: f64, spec: Spec) -> String {
    let upper = spec.conversion == 'G';
    let precision = match spec.precision {
        Some(0) => 1,
        Some(p) => p,
        None => 6,
    };
    if value == 0.0 {
        return if spec.alt {
            format!("{:.*}", precision.saturating_sub(1), 0.0)
        } else {
            "0".to_string()
        };
    }

    let scientific = format!("{:.*e}", precision - 1, value);
    let exp: i32 = scientific
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);

    let text = if exp < -4 || exp >= precision as i32 {
        exponent(value, precision - 1, upper)
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        format!("{:.*}", decimals, value)
    };

    if spec.alt {
        text
    } else {
        strip_zeros(&text)
    }
}

fn strip_zeros(text: &str) -> String {
    let (number, exp) = match text.find(['e', 'E']) {
        Some(i) => (&text[..i], &text[i..]),
        None => (text, ""),
    };
    let number = if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    };
    format!("{}{}", number, exp)
}

fn pad(sign: String, body: String, spec: Spec, numeric: bool) -> String {
    let len = sign.chars().count() + body.chars().count();
    if len >= spec.width {
        return sign + &body;
    }
    let fill = spec.width - len;
    if spec.left {
        format!("{}{}{}", sign, body, " ".repeat(fill))
    } else if spec.zero && numeric {
        format!("{}{}{}", sign, "0".repeat(fill), body)
    } else {
        format!("{}{}{}", " ".repeat(fill), sign, body)
    }
}
