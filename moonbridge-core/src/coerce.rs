//! 标量转换辅助函数（Lua 5.4 语义）
//!
//! 这些函数不需要引擎实例，[`crate::Value`] 的标量转换都经过这里。

/// 数字字符串解析结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Numeral {
    Integer(i64),
    Float(f64),
}

/// 按 Lua 规则解析数字字符串（允许首尾空白、十六进制整数与十六进制浮点数）
pub fn parse_numeral(s: &str) -> Option<Numeral> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        return match parse_hex(hex)? {
            Numeral::Integer(i) if negative => Some(Numeral::Integer(i.wrapping_neg())),
            Numeral::Float(f) if negative => Some(Numeral::Float(-f)),
            n => Some(n),
        };
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Numeral::Integer(i));
    }
    // Rust 接受 "inf"/"nan"，Lua 不接受
    if body.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    s.parse::<f64>().ok().map(Numeral::Float)
}

/// 十六进制数字：`H+`、`H*.H*` 与可选的二进制指数 `p[+-]D+`
fn parse_hex(hex: &str) -> Option<Numeral> {
    let (mantissa, exponent) = match hex.find(['p', 'P']) {
        Some(pos) => (&hex[..pos], Some(&hex[pos + 1..])),
        None => (hex, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (mantissa, None),
    };
    if int_part.is_empty() && frac_part.map_or(true, str::is_empty) {
        return None;
    }

    if frac_part.is_none() && exponent.is_none() {
        // 十六进制整数按补码回绕
        let mut acc: i64 = 0;
        for c in int_part.chars() {
            let digit = c.to_digit(16)? as i64;
            acc = acc.wrapping_mul(16).wrapping_add(digit);
        }
        return Some(Numeral::Integer(acc));
    }

    let mut value = 0.0f64;
    let mut scale: i32 = 0;
    for c in int_part.chars() {
        value = value * 16.0 + c.to_digit(16)? as f64;
    }
    for c in frac_part.unwrap_or("").chars() {
        value = value * 16.0 + c.to_digit(16)? as f64;
        scale = scale.saturating_sub(4);
    }
    if let Some(exp) = exponent {
        let (sign, digits) = match exp.strip_prefix('-') {
            Some(digits) => (-1, digits),
            None => (1, exp.strip_prefix('+').unwrap_or(exp)),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let magnitude = digits
            .bytes()
            .fold(0i32, |acc, b| acc.saturating_mul(10).saturating_add((b - b'0') as i32));
        scale = scale.saturating_add(sign * magnitude);
    }
    if value == 0.0 {
        return Some(Numeral::Float(0.0));
    }
    Some(Numeral::Float(value * 2f64.powi(scale)))
}

/// 浮点数无小数部分且在范围内时转换为整数
pub fn float_to_integer(f: f64) -> Option<i64> {
    if f.is_finite() && f >= -9.223_372_036_854_775_808e18 && f < 9.223_372_036_854_775_808e18 {
        let i = f as i64;
        if i as f64 == f {
            return Some(i);
        }
    }
    None
}

/// 整数与浮点数的数学相等
pub fn int_float_eq(i: i64, f: f64) -> bool {
    float_to_integer(f) == Some(i)
}

pub fn str_to_number(s: &str) -> Option<f64> {
    match parse_numeral(s)? {
        Numeral::Integer(i) => Some(i as f64),
        Numeral::Float(f) => Some(f),
    }
}

pub fn str_to_integer(s: &str) -> Option<i64> {
    match parse_numeral(s)? {
        Numeral::Integer(i) => Some(i),
        Numeral::Float(f) => float_to_integer(f),
    }
}

/// 按 `%.14g` 格式化浮点数，整数值追加 `.0`（与 `tostring` 一致）
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return if f.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if f.is_infinite() {
        return if f < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    let text = format_g14(f);
    if text.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
        format!("{}.0", text)
    } else {
        text
    }
}

fn format_g14(f: f64) -> String {
    const PRECISION: i32 = 14;
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if exp < -4 || exp >= PRECISION {
        let mantissa = trim_fraction(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, f)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeral() {
        assert_eq!(parse_numeral(" 42 "), Some(Numeral::Integer(42)));
        assert_eq!(parse_numeral("0x1F"), Some(Numeral::Integer(31)));
        assert_eq!(parse_numeral("-0x10"), Some(Numeral::Integer(-16)));
        assert_eq!(parse_numeral("2.5"), Some(Numeral::Float(2.5)));
        assert_eq!(parse_numeral("1e3"), Some(Numeral::Float(1000.0)));
        assert_eq!(parse_numeral("0x1p4"), Some(Numeral::Float(16.0)));
        assert_eq!(parse_numeral("0x.8"), Some(Numeral::Float(0.5)));
        assert_eq!(parse_numeral("-0xA.8P-1"), Some(Numeral::Float(-5.25)));
        assert_eq!(parse_numeral("0x1p"), None);
        assert_eq!(parse_numeral("0x."), None);
        assert_eq!(parse_numeral("0xg"), None);
        assert_eq!(parse_numeral("inf"), None);
        assert_eq!(parse_numeral("abc"), None);
        assert_eq!(parse_numeral(""), None);
    }

    #[test]
    fn test_float_to_integer() {
        assert_eq!(float_to_integer(3.0), Some(3));
        assert_eq!(float_to_integer(3.5), None);
        assert_eq!(float_to_integer(f64::NAN), None);
        assert_eq!(float_to_integer(1e300), None);
        assert!(int_float_eq(2, 2.0));
        assert!(!int_float_eq(2, 2.1));
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(84.0), "84.0");
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(-2.25), "-2.25");
        assert_eq!(format_float(1e15), "1e+15");
        assert_eq!(format_float(1e-5), "1e-05");
        assert_eq!(format_float(0.1 + 0.2), "0.3");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn test_string_to_numbers() {
        assert_eq!(str_to_number("10"), Some(10.0));
        assert_eq!(str_to_integer("10.0"), Some(10));
        assert_eq!(str_to_integer("10.5"), None);
    }
}
