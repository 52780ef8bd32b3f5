//! Value-sequence notation compiler
//!
//! Turns compact notation like `"1 2-3x4 1x2"` into the explicit list of
//! values a series will replay, one per scrape.
//!
//! Tokens are separated by a single space and concatenated left to right:
//!
//! | Token   | Expands to                                    |
//! |---------|-----------------------------------------------|
//! | `N`     | `N`                                           |
//! | `A+BxC` | `A`, then `C` more values, each previous + `B` |
//! | `A-BxC` | same as `A+(-B)xC`                            |
//! | `AxC`   | same as `A+0xC` (`A` repeated `C + 1` times)  |

use crate::error::SequenceError;

/// Upper bound on the number of values a single sequence may expand to
pub const MAX_SEQUENCE_LEN: usize = 1_000_000;

/// Compile a sequence string into its explicit list of values
///
/// # Errors
///
/// Returns [`SequenceError`] when the text is empty, contains an empty
/// token, a token that does not match one of the shapes above, a malformed
/// number or repeat count, or when the expansion is too long or overflows.
///
/// # Examples
///
/// ```
/// use any_exporter::recipe::sequence::compile;
///
/// assert_eq!(compile("1+2x3").unwrap(), vec![1.0, 3.0, 5.0, 7.0]);
/// assert_eq!(compile("3x2 0").unwrap(), vec![3.0, 3.0, 3.0, 0.0]);
/// ```
pub fn compile(text: &str) -> Result<Vec<f64>, SequenceError> {
    compile_with_limit(text, MAX_SEQUENCE_LEN)
}

/// Compile a sequence that may expand to at most `limit` values
///
/// # Errors
///
/// Same as [`compile`]; [`SequenceError::TooLong`] reports `limit`.
pub fn compile_with_limit(text: &str, limit: usize) -> Result<Vec<f64>, SequenceError> {
    if text.is_empty() {
        return Err(SequenceError::Empty);
    }

    let mut values = Vec::new();
    for (position, token) in text.split(' ').enumerate() {
        if token.is_empty() {
            return Err(SequenceError::EmptyToken { position });
        }
        expand_token(token, &mut values, limit)?;
    }

    Ok(values)
}

/// Append the values of one token to `out`
fn expand_token(token: &str, out: &mut Vec<f64>, limit: usize) -> Result<(), SequenceError> {
    let Some((head, count)) = token.split_once('x') else {
        let value = parse_number(token)?;
        return push_value(out, value, token, limit);
    };

    if count.contains('x') {
        return Err(SequenceError::InvalidToken {
            token: token.to_string(),
            reason: "more than one 'x'",
        });
    }

    let (start, step) = split_progression(token, head)?;
    let repeat = parse_repeat_count(count, limit)?;

    if out.len().saturating_add(repeat).saturating_add(1) > limit {
        return Err(SequenceError::TooLong { limit });
    }

    push_value(out, start, token, limit)?;
    let mut current = start;
    for _ in 0..repeat {
        current += step;
        push_value(out, current, token, limit)?;
    }
    Ok(())
}

/// Split the part before `x` into its start value and signed step
///
/// A leading `-` belongs to the start value; the first `+` or `-` after it
/// is the operator. Without an operator the step is zero.
fn split_progression(token: &str, head: &str) -> Result<(f64, f64), SequenceError> {
    let sign_len = usize::from(head.starts_with('-'));
    let operator = head[sign_len..]
        .find(['+', '-'])
        .map(|offset| offset + sign_len);

    let Some(op_index) = operator else {
        return Ok((parse_number(head)?, 0.0));
    };

    let start = &head[..op_index];
    let magnitude = &head[op_index + 1..];
    if magnitude.starts_with(['+', '-']) {
        return Err(SequenceError::InvalidToken {
            token: token.to_string(),
            reason: "step must not carry its own sign",
        });
    }

    let start = parse_number(start)?;
    let magnitude = parse_number(magnitude)?;
    let step = if head.as_bytes()[op_index] == b'-' {
        -magnitude
    } else {
        magnitude
    };
    Ok((start, step))
}

/// Parse a decimal literal: optional `-`, digits, optional `.` fraction
fn parse_number(literal: &str) -> Result<f64, SequenceError> {
    let invalid = || SequenceError::InvalidNumber {
        literal: literal.to_string(),
    };

    let unsigned = literal.strip_prefix('-').unwrap_or(literal);
    let well_formed = unsigned.bytes().any(|b| b.is_ascii_digit())
        && unsigned.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && unsigned.bytes().filter(|&b| b == b'.').count() <= 1;
    if !well_formed {
        return Err(invalid());
    }

    literal.parse::<f64>().map_err(|_| invalid())
}

fn parse_repeat_count(literal: &str, limit: usize) -> Result<usize, SequenceError> {
    if literal.is_empty() || !literal.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SequenceError::InvalidRepeatCount {
            literal: literal.to_string(),
        });
    }
    // All-digit strings only fail to parse on overflow, which is "too long" anyway
    literal
        .parse::<usize>()
        .map_err(|_| SequenceError::TooLong { limit })
}

fn push_value(
    out: &mut Vec<f64>,
    value: f64,
    token: &str,
    limit: usize,
) -> Result<(), SequenceError> {
    if !value.is_finite() {
        return Err(SequenceError::NonFinite {
            token: token.to_string(),
        });
    }
    if out.len() >= limit {
        return Err(SequenceError::TooLong { limit });
    }
    out.push(value);
    Ok(())
}
