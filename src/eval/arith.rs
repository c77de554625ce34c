use crate::eval::NumberFormat;

/// One element of the flat arithmetic token list. The list always alternates
/// operands and operators, starting and ending with an operand (possibly
/// empty, which counts as zero). Reduction splices computed values back in
/// as `Value` so intermediates keep full precision; rendering happens once,
/// at the end.
#[derive(Debug, PartialEq)]
enum Token {
    Operand(String),
    Value(f64),
    Op(char),
}

/// Whether `input` contains an unescaped `+ - * /`.
pub(crate) fn contains_operator(input: &str) -> bool {
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                chars.next();
            }
            '+' | '-' | '*' | '/' => return true,
            _ => {}
        }
    }
    false
}

/// Collapses historical sign artifacts before tokenization: an unescaped
/// `--` drops out entirely and `-+` becomes a single `-`.
pub(crate) fn collapse_signs(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                out.push(ch);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '-' => match chars.peek() {
                Some('-') => {
                    chars.next();
                }
                Some('+') => {
                    chars.next();
                    out.push('-');
                }
                _ => out.push('-'),
            },
            _ => out.push(ch),
        }
    }
    out
}

/// Reduces a flat arithmetic string to a single rendered number: `*` and `/`
/// first, then `+` and `-`, each pass restarting from the head of the token
/// list after a splice.
pub(crate) fn evaluate(input: &str, format: &NumberFormat) -> String {
    let mut tokens = tokenize(input);
    reduce(&mut tokens, &['*', '/'], format);
    reduce(&mut tokens, &['+', '-'], format);
    match tokens.as_slice() {
        [Token::Operand(text)] => format_number(parse_number(text, format), format),
        [Token::Value(value)] => format_number(*value, format),
        _ => input.to_owned(),
    }
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut operand = String::new();
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        match ch {
            // an escaped character belongs to the operand, backslash included
            '\\' => {
                operand.push(ch);
                if let Some(next) = chars.next() {
                    operand.push(next);
                }
            }
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Operand(std::mem::take(&mut operand)));
                tokens.push(Token::Op(ch));
            }
            _ => operand.push(ch),
        }
    }
    tokens.push(Token::Operand(operand));
    tokens
}

fn reduce(tokens: &mut Vec<Token>, ops: &[char], format: &NumberFormat) {
    loop {
        let found = tokens
            .iter()
            .position(|token| matches!(token, Token::Op(c) if ops.contains(c)));
        let at = match found {
            Some(at) if at > 0 && at + 1 < tokens.len() => at,
            _ => return,
        };
        let op = match tokens[at] {
            Token::Op(c) => c,
            _ => return,
        };
        let left = operand_value(&tokens[at - 1], format);
        let right = operand_value(&tokens[at + 1], format);
        tokens[at - 1] = Token::Value(apply(op, left, right));
        tokens.drain(at..=at + 1);
    }
}

fn operand_value(token: &Token, format: &NumberFormat) -> f64 {
    match token {
        Token::Operand(text) => parse_number(text, format),
        Token::Value(value) => *value,
        Token::Op(_) => 0.0,
    }
}

fn apply(op: char, left: f64, right: f64) -> f64 {
    match op {
        '+' => left + right,
        '-' => left - right,
        '*' => left * right,
        // dividing by zero leaves the accumulator at zero; callers rely on
        // `=5/0` rendering as `0`
        '/' => {
            if right == 0.0 {
                0.0
            } else {
                left / right
            }
        }
        _ => right,
    }
}

/// Parses an operand honoring the configured separators; anything that does
/// not parse (including the empty string) counts as zero.
pub(crate) fn parse_number(text: &str, format: &NumberFormat) -> f64 {
    let mut cleaned = String::with_capacity(text.len());
    for ch in text.trim().chars() {
        if Some(ch) == format.thousand_sep {
            continue;
        }
        if ch == format.decimal_sep {
            cleaned.push('.');
        } else {
            cleaned.push(ch);
        }
    }
    cleaned.parse().unwrap_or(0.0)
}

/// Renders a number with the configured separators and digit count, then
/// trims trailing fractional zeros so integral values print bare.
pub(crate) fn format_number(value: f64, format: &NumberFormat) -> String {
    let rendered = format!("{:.*}", format.digits, value);
    let unsigned = rendered.trim_start_matches('-');
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (unsigned, ""),
    };
    let frac = frac_part.trim_end_matches('0');

    let mut out = String::with_capacity(rendered.len() + int_part.len() / 3);
    if rendered.starts_with('-') && (int_part.chars().any(|c| c != '0') || !frac.is_empty()) {
        out.push('-');
    }
    match format.thousand_sep {
        Some(sep) => {
            let count = int_part.chars().count();
            for (i, ch) in int_part.chars().enumerate() {
                if i > 0 && (count - i) % 3 == 0 {
                    out.push(sep);
                }
                out.push(ch);
            }
        }
        None => out.push_str(int_part),
    }
    if !frac.is_empty() {
        out.push(format.decimal_sep);
        out.push_str(frac);
    }
    out
}
