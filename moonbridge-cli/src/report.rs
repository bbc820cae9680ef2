//! 错误输出
//!
//! 打印桥接错误，并在可定位到行号时显示源码上下文。

use moonbridge_api::BridgeError;

/// 上下文行数
const CONTEXT_LINES: usize = 3;

/// 打印错误，可用时附带源码上下文
pub fn print_error_with_source(e: &BridgeError, source: Option<&str>) {
    eprintln!("❌ {}", e.to_report());

    if let (Some(line), Some(source)) = (e.line(), source) {
        eprintln!();
        eprint!("{}", source_context(source, line));
    }
}

/// 以 JSON 打印错误报告（工具集成）
pub fn print_error_json(e: &BridgeError) {
    eprintln!("{}", e.to_report().to_json());
}

/// 错误行附近的源码片段
pub fn source_context(source: &str, error_line: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    if error_line == 0 || error_line > lines.len() {
        return String::new();
    }

    let start = error_line.saturating_sub(CONTEXT_LINES).max(1);
    let end = (error_line + CONTEXT_LINES).min(lines.len());
    let width = end.to_string().len();
    let separator = " ".repeat(width + 1);

    let mut out = String::new();
    for line_no in start..=end {
        let marker = if line_no == error_line { '>' } else { ' ' };
        out.push_str(&format!("{}{:>width$} | {}\n", marker, line_no, lines[line_no - 1], width = width));
    }
    out.push_str(&format!("{}|--\n", separator));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_context_marks_error_line() {
        let source = "a = 1\nb = 2\nc = nil + 1\nd = 4";
        let ctx = source_context(source, 3);
        let marked: Vec<&str> = ctx.lines().filter(|l| l.starts_with('>')).collect();
        assert_eq!(marked, vec![">3 | c = nil + 1"]);
        assert!(ctx.contains(" 1 | a = 1"));
        assert!(ctx.ends_with("|--\n"));
    }

    #[test]
    fn test_source_context_out_of_range() {
        assert_eq!(source_context("x = 1", 0), "");
        assert_eq!(source_context("x = 1", 7), "");
    }

    #[test]
    fn test_source_context_window() {
        let source = (1..=20).map(|i| format!("line{}", i)).collect::<Vec<_>>().join("\n");
        let ctx = source_context(&source, 10);
        assert_eq!(ctx.lines().count(), 2 * CONTEXT_LINES + 2);
        assert!(ctx.contains(">10 | line10"));
        assert!(!ctx.contains("line6\n"));
    }
}
