use std::collections::BTreeSet;
use std::str::FromStr;

use pep440_rs::Version;

use lockex_normalize::ExtraName;

use crate::condition::StringSet;
use crate::cursor::Cursor;
use crate::python::{bump, version_range};
use crate::{
    Condition, MarkerExpression, MarkerOperator, MarkerParseError, MarkerValue,
    MarkerValueString,
};

/// ```text
/// marker_op     = version_cmp | (wsp* 'in') | (wsp* 'not' wsp+ 'in')
/// ```
fn parse_marker_operator(cursor: &mut Cursor) -> Result<MarkerOperator, MarkerParseError> {
    let (start, len) =
        cursor.take_while(|char| !char.is_whitespace() && char != '\'' && char != '"');
    let operator = cursor.slice(start, len);
    if operator == "not" {
        // 'not' wsp+ 'in'
        match cursor.next() {
            None => {
                return Err(MarkerParseError {
                    message: "Expected whitespace after 'not', found end of input".to_string(),
                    start: cursor.pos(),
                    len: 1,
                    input: cursor.to_string(),
                });
            }
            Some((_, whitespace)) if whitespace.is_whitespace() => {}
            Some((pos, other)) => {
                return Err(MarkerParseError {
                    message: format!("Expected whitespace after 'not', found '{other}'"),
                    start: pos,
                    len: other.len_utf8(),
                    input: cursor.to_string(),
                });
            }
        }
        cursor.eat_whitespace();
        cursor.next_expect_char('i', cursor.pos())?;
        cursor.next_expect_char('n', cursor.pos())?;
        return Ok(MarkerOperator::NotIn);
    }
    MarkerOperator::from_str(operator).map_err(|_| MarkerParseError {
        message: format!(
            "Expected a valid marker operator (such as '>=' or 'not in'), found '{operator}'"
        ),
        start,
        len,
        input: cursor.to_string(),
    })
}

/// Either a single or double quoted string or one of the environment marker names.
fn parse_marker_value(cursor: &mut Cursor) -> Result<MarkerValue, MarkerParseError> {
    match cursor.peek() {
        None => Err(MarkerParseError {
            message: "Expected marker value, found end of marker".to_string(),
            start: cursor.pos(),
            len: 1,
            input: cursor.to_string(),
        }),
        Some((start_pos, quotation_mark @ ('"' | '\''))) => {
            cursor.next();
            let (start, len) = cursor.take_while(|c| c != quotation_mark);
            let value = cursor.slice(start, len).to_string();
            cursor.next_expect_char(quotation_mark, start_pos)?;
            Ok(MarkerValue::QuotedString(value))
        }
        Some(_) => {
            let (start, len) = cursor.take_while(|char| {
                !char.is_whitespace() && !['>', '=', '<', '!', '~', ')'].contains(&char)
            });
            let key = cursor.slice(start, len);
            MarkerValue::from_str(key).map_err(|_| MarkerParseError {
                message: format!("Expected a valid marker name, found '{key}'"),
                start,
                len,
                input: cursor.to_string(),
            })
        }
    }
}

/// ```text
/// marker_var:l marker_op:o marker_var:r
/// ```
fn parse_marker_key_op_value(cursor: &mut Cursor) -> Result<Condition, MarkerParseError> {
    cursor.eat_whitespace();
    let start = cursor.pos();
    let l_value = parse_marker_value(cursor)?;
    cursor.eat_whitespace();
    let operator = parse_marker_operator(cursor)?;
    cursor.eat_whitespace();
    let r_value = parse_marker_value(cursor)?;
    let len = cursor.pos() - start;

    lower_expression(l_value, operator, r_value).map_err(|message| MarkerParseError {
        message,
        start,
        len,
        input: cursor.to_string(),
    })
}

/// Turn a single comparison into a condition.
///
/// Python version comparisons become version ranges, string equality becomes a value set and
/// extra comparisons become extra literals. Everything else is kept as an opaque expression.
fn lower_expression(
    l_value: MarkerValue,
    operator: MarkerOperator,
    r_value: MarkerValue,
) -> Result<Condition, String> {
    match (l_value, r_value) {
        (MarkerValue::MarkerEnvVersion(key), MarkerValue::QuotedString(value)) => {
            Ok(Condition::python(version_range(key, operator, &value)?))
        }
        (MarkerValue::QuotedString(value), MarkerValue::MarkerEnvVersion(key)) => {
            match operator.invert() {
                Some(operator) => Ok(Condition::python(version_range(key, operator, &value)?)),
                None => Ok(opaque(
                    MarkerValue::QuotedString(value),
                    operator,
                    MarkerValue::MarkerEnvVersion(key),
                )),
            }
        }
        (MarkerValue::MarkerEnvString(key), MarkerValue::QuotedString(value)) => {
            lower_string(key, operator, value)
        }
        (MarkerValue::QuotedString(value), MarkerValue::MarkerEnvString(key)) => {
            match operator.invert() {
                Some(operator) => lower_string(key, operator, value),
                None => Ok(opaque(
                    MarkerValue::QuotedString(value),
                    operator,
                    MarkerValue::MarkerEnvString(key),
                )),
            }
        }
        (MarkerValue::Extra, MarkerValue::QuotedString(value))
        | (MarkerValue::QuotedString(value), MarkerValue::Extra) => {
            let name = ExtraName::from_str(&value).map_err(|err| err.to_string())?;
            match operator {
                MarkerOperator::Equal => Ok(Condition::extra(name, true)),
                MarkerOperator::NotEqual => Ok(Condition::extra(name, false)),
                _ => Err(format!(
                    "The extra marker only supports `==` and `!=`, found `{operator}`"
                )),
            }
        }
        (MarkerValue::Extra, _) | (_, MarkerValue::Extra) => {
            Err("The extra marker must be compared to a quoted string".to_string())
        }
        (l_value, r_value) => lower_opaque(l_value, operator, r_value),
    }
}

fn lower_string(
    key: MarkerValueString,
    operator: MarkerOperator,
    value: String,
) -> Result<Condition, String> {
    match operator {
        MarkerOperator::Equal => Ok(Condition::string(key, StringSet::In(BTreeSet::from([value])))),
        MarkerOperator::NotEqual => Ok(Condition::string(
            key,
            StringSet::NotIn(BTreeSet::from([value])),
        )),
        _ => lower_opaque(
            MarkerValue::MarkerEnvString(key),
            operator,
            MarkerValue::QuotedString(value),
        ),
    }
}

/// `~=` is split into `>=` and `<` so that every opaque expression has a negation.
fn lower_opaque(
    l_value: MarkerValue,
    operator: MarkerOperator,
    r_value: MarkerValue,
) -> Result<Condition, String> {
    if operator != MarkerOperator::TildeEqual {
        return Ok(opaque(l_value, operator, r_value));
    }
    let MarkerValue::QuotedString(value) = &r_value else {
        return Err(format!(
            "The `~=` operator requires a version on the right-hand side, found `{r_value}`"
        ));
    };
    let version = Version::from_str(value)
        .map_err(|err| format!("Expected PEP 440 version, found `{value}`: {err}"))?;
    let release = version.release();
    if release.len() < 2 {
        return Err(format!(
            "The `~=` operator requires at least two release segments, found `{version}`"
        ));
    }
    let upper = bump(&release[..release.len() - 1]);
    Ok(
        opaque(l_value.clone(), MarkerOperator::GreaterEqual, r_value).and(&opaque(
            l_value,
            MarkerOperator::LessThan,
            MarkerValue::QuotedString(upper.to_string()),
        )),
    )
}

fn opaque(l_value: MarkerValue, operator: MarkerOperator, r_value: MarkerValue) -> Condition {
    Condition::expression(MarkerExpression::new(l_value, operator, r_value), true)
}

/// ```text
/// marker_expr   = marker_var:l marker_op:o marker_var:r -> (o, l, r)
///               | wsp* '(' marker:m wsp* ')' -> m
/// ```
fn parse_marker_expr(cursor: &mut Cursor) -> Result<Condition, MarkerParseError> {
    cursor.eat_whitespace();
    if let Some(start_pos) = cursor.eat_char('(') {
        let marker = parse_marker_or(cursor)?;
        cursor.eat_whitespace();
        cursor.next_expect_char(')', start_pos)?;
        Ok(marker)
    } else {
        parse_marker_key_op_value(cursor)
    }
}

/// ```text
/// marker_and    = marker_expr:l wsp* 'and' marker_expr:r -> ('and', l, r)
///               | marker_expr:m -> m
/// ```
fn parse_marker_and(cursor: &mut Cursor) -> Result<Condition, MarkerParseError> {
    parse_marker_op(cursor, "and", Condition::and, parse_marker_expr)
}

/// ```text
/// marker_or     = marker_and:l wsp* 'or' marker_and:r -> ('or', l, r)
///               | marker_and:m -> m
/// ```
fn parse_marker_or(cursor: &mut Cursor) -> Result<Condition, MarkerParseError> {
    parse_marker_op(cursor, "or", Condition::or, parse_marker_and)
}

/// Parses both `marker_and` and `marker_or`.
fn parse_marker_op(
    cursor: &mut Cursor,
    op: &str,
    combine: fn(&Condition, &Condition) -> Condition,
    parse_inner: fn(&mut Cursor) -> Result<Condition, MarkerParseError>,
) -> Result<Condition, MarkerParseError> {
    let mut condition = parse_inner(cursor)?;
    loop {
        cursor.eat_whitespace();
        let (start, len) = cursor.peek_while(|c| !c.is_whitespace() && c != '(');
        if cursor.slice(start, len) != op {
            return Ok(condition);
        }
        cursor.take_while(|c| !c.is_whitespace() && c != '(');
        let next = parse_inner(cursor)?;
        condition = combine(&condition, &next);
    }
}

/// ```text
/// marker        = marker_or
/// ```
pub(crate) fn parse_markers(markers: &str) -> Result<Condition, MarkerParseError> {
    let mut cursor = Cursor::new(markers);
    cursor.eat_whitespace();
    if cursor.peek().is_none() {
        return Ok(Condition::always());
    }
    let condition = parse_marker_or(&mut cursor)?;
    cursor.eat_whitespace();
    if let Some((pos, unexpected)) = cursor.next() {
        return Err(MarkerParseError {
            message: format!("Unexpected character '{unexpected}', expected 'and', 'or' or end of input"),
            start: pos,
            len: cursor.remaining() + unexpected.len_utf8(),
            input: cursor.to_string(),
        });
    }
    Ok(condition)
}
