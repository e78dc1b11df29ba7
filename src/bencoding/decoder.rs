use std::{
    collections::BTreeMap,
    io::{Error, ErrorKind, Result},
    ops::Range,
};

use crate::bencoding::value::Value;

/// Incremental bencoding parser. Bytes are pushed in as they arrive (the
/// parser implements [`std::io::Write`]), and the decoded value is taken out
/// with [`Parser::result`] once the input is exhausted.
///
/// While decoding, the parser records the raw byte span of the top-level
/// `info` dictionary. The info hash must be computed over exactly the bytes
/// that appeared in the original file, never over a re-encoding, so the span
/// is the only interoperable input for it.
#[derive(Debug)]
pub struct Parser {
    state: State,
    stack: Vec<StackState>,
    position: usize,
    info_start: Option<usize>,
    info_span: Option<Range<usize>>,
}

#[derive(Debug)]
enum State {
    Ready,
    Integer(Option<i64>, i64),
    StringLength(usize),
    StringContents(Vec<u8>, usize),
    Done(Value),
}

#[derive(Debug)]
enum StackState {
    List(Vec<Value>),
    Dictionary(Option<String>, BTreeMap<String, Value>),
}

impl StackState {
    fn new_list() -> Self {
        Self::List(Vec::new())
    }

    fn new_dictionary() -> Self {
        Self::Dictionary(None, BTreeMap::new())
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: State::Ready,
            stack: Vec::new(),
            position: 0,
            info_start: None,
            info_span: None,
        }
    }

    fn consume(&mut self, byte: u8) -> Result<()> {
        match (&mut self.state, byte) {
            // Integer
            (State::Ready, b'i') => {
                self.state = State::Integer(None, 1);
            }
            (State::Integer(None, sign), b'-') if *sign == 1 => {
                *sign = -1;
            }
            (State::Integer(Some(0), _), b'0'..=b'9') => {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "leading zeros not allowed",
                ));
            }
            (State::Integer(integer, _), b'0'..=b'9') => {
                let digit = (byte - b'0') as i64;
                *integer = Some(integer.unwrap_or(0) * 10 + digit);
            }
            (&mut State::Integer(Some(integer), sign), b'e') => {
                if integer == 0 && sign == -1 {
                    return Err(Error::new(ErrorKind::InvalidInput, "minus zero not allowed"));
                }
                self.emit(Value::Integer(integer * sign))?;
            }

            // List
            (State::Ready, b'l') => {
                self.stack.push(StackState::new_list());
            }

            // Dictionary
            (State::Ready, b'd') => {
                self.stack.push(StackState::new_dictionary());
            }

            // String
            (State::Ready, b'0'..=b'9') => {
                let digit = (byte - b'0') as usize;
                self.state = State::StringLength(digit);
            }
            (State::StringLength(length), b'0'..=b'9') => {
                let digit = (byte - b'0') as usize;
                *length = *length * 10 + digit;
            }
            (&mut State::StringLength(length), b':') => {
                if length == 0 {
                    self.emit(Value::String(Vec::new()))?;
                } else {
                    self.state = State::StringContents(Vec::with_capacity(length), length);
                }
            }
            (State::StringContents(bytes, length), _) => {
                bytes.push(byte);
                if bytes.len() == *length {
                    let string = std::mem::take(bytes);
                    self.emit(Value::String(string))?;
                }
            }

            // End collection
            (_, b'e') => match self.stack.pop() {
                Some(StackState::List(list)) => {
                    self.emit(Value::List(list))?;
                }
                Some(StackState::Dictionary(_, entries)) => {
                    self.emit(Value::Dictionary(entries))?;
                }
                None => {
                    return Err(Error::new(ErrorKind::InvalidInput, "nothing to close"));
                }
            },

            // Ignore trailing whitespace
            (State::Done(_), b'\n' | b'\r' | b' ') => return Ok(()),

            // Unexpected input
            _ => {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    format!("unexpected byte: 0x{byte:02x}, parser state: {self:?}"),
                ));
            }
        }
        self.position += 1;
        Ok(())
    }

    fn emit(&mut self, value: Value) -> Result<()> {
        let depth = self.stack.len();
        match (self.stack.last_mut(), value) {
            (Some(StackState::List(list)), value) => {
                list.push(value);
                self.state = State::Ready;
            }
            (Some(StackState::Dictionary(key @ None, _)), Value::String(string)) => {
                let string = String::from_utf8(string).map_err(|_| {
                    Error::new(
                        ErrorKind::InvalidInput,
                        "dictionary key should be valid utf8",
                    )
                })?;
                if depth == 1 && string == "info" {
                    // The value starts right after the key's last byte
                    self.info_start = Some(self.position + 1);
                }
                *key = Some(string);
                self.state = State::Ready;
            }
            (Some(StackState::Dictionary(None, _)), _) => {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "only string keys are allowed in dictionaries",
                ));
            }
            (Some(StackState::Dictionary(key, entries)), value) => {
                let key = key.take().expect("key must be present");
                if depth == 1 && key == "info" {
                    if let Some(start) = self.info_start.take() {
                        self.info_span = Some(start..self.position + 1);
                    }
                }
                entries.insert(key, value);
                self.state = State::Ready;
            }
            (None, value) => {
                self.state = State::Done(value);
            }
        }
        Ok(())
    }

    pub fn result(self) -> Result<Value> {
        match self.state {
            State::Done(value) => Ok(value),
            _ => Err(Error::new(ErrorKind::UnexpectedEof, "incomplete")),
        }
    }

    /// Raw byte range of the top-level `info` dictionary, if the input had one.
    pub fn info_span(&self) -> Option<Range<usize>> {
        self.info_span.clone()
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl std::io::Write for Parser {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        for byte in buf {
            self.consume(*byte)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn decode(input: &[u8]) -> Result<Value> {
        let mut parser = Parser::new();
        parser.write_all(input)?;
        parser.result()
    }

    #[test]
    fn parse_error() {
        assert!(decode(b"foo").is_err());
    }

    #[test]
    fn string() {
        assert_eq!(decode(b"3:foo").unwrap(), Value::string("foo"));
    }

    #[test]
    fn empty_string() {
        assert_eq!(decode(b"0:").unwrap(), Value::string(""));
    }

    #[test]
    fn truncated_string() {
        assert!(decode(b"3:fo").is_err());
    }

    #[test]
    fn positive_integer() {
        assert_eq!(decode(b"i3e").unwrap(), Value::Integer(3));
    }

    #[test]
    fn multi_digit_integer() {
        assert_eq!(decode(b"i42e").unwrap(), Value::Integer(42));
    }

    #[test]
    fn negative_integer() {
        assert_eq!(decode(b"i-1e").unwrap(), Value::Integer(-1));
    }

    #[test]
    fn zero() {
        assert_eq!(decode(b"i0e").unwrap(), Value::Integer(0));
    }

    #[test]
    fn fail_for_minus_zero() {
        assert!(decode(b"i-0e").is_err());
    }

    #[test]
    fn fail_for_leading_zero() {
        assert!(decode(b"i03e").is_err());
    }

    #[test]
    fn fail_for_unterminated_integer() {
        assert!(decode(b"i42").is_err());
    }

    #[test]
    fn empty_list() {
        assert_eq!(decode(b"le").unwrap(), Value::list());
    }

    #[test]
    fn non_empty_list() {
        assert_eq!(
            decode(b"li1ei2ei3ee").unwrap(),
            Value::list()
                .with_value(Value::Integer(1))
                .with_value(Value::Integer(2))
                .with_value(Value::Integer(3))
        );
    }

    #[test]
    fn nested_list() {
        assert_eq!(
            decode(b"li1eli2ei3eee").unwrap(),
            Value::list().with_value(Value::Integer(1)).with_value(
                Value::list()
                    .with_value(Value::Integer(2))
                    .with_value(Value::Integer(3))
            )
        );
    }

    #[test]
    fn heterogeneous_list() {
        assert_eq!(
            decode(b"l3:fooi42ee").unwrap(),
            Value::list()
                .with_value(Value::string("foo"))
                .with_value(Value::Integer(42))
        );
    }

    #[test]
    fn fail_for_unterminated_list() {
        assert!(decode(b"li1e").is_err());
    }

    #[test]
    fn empty_dictionary() {
        assert_eq!(decode(b"de").unwrap(), Value::dictionary());
    }

    #[test]
    fn non_empty_dictionary() {
        assert_eq!(
            decode(b"d3:cow3:moo4:spam4:eggse").unwrap(),
            Value::dictionary()
                .with_entry("cow", Value::string("moo"))
                .with_entry("spam", Value::string("eggs"))
        );
    }

    #[test]
    fn fail_for_non_string_keys() {
        assert!(decode(b"di1ei2ee").is_err());
    }

    #[test]
    fn deeply_nested_structure() {
        assert_eq!(
            decode(b"d3:food3:barl3:bazee3:quxi42ee").unwrap(),
            Value::dictionary()
                .with_entry(
                    "foo",
                    Value::dictionary()
                        .with_entry("bar", Value::list().with_value(Value::string("baz")))
                )
                .with_entry("qux", Value::Integer(42))
        );
    }

    #[test]
    fn ignore_trailing_whitespace() {
        assert_eq!(decode(b"i42e \n").unwrap(), Value::Integer(42));
    }

    #[test]
    fn fail_for_trailing_garbage() {
        assert!(decode(b"i42ei1e").is_err());
    }

    #[test]
    fn info_span_covers_raw_bytes() {
        let input = b"d8:announce3:url4:infod6:lengthi5e4:name3:fooee";
        let mut parser = Parser::new();
        parser.write_all(input).unwrap();

        let span = parser.info_span().expect("no info span recorded");
        assert_eq!(&input[span], b"d6:lengthi5e4:name3:fooe");
    }

    #[test]
    fn info_span_preserves_original_key_order() {
        // Keys in the file are deliberately unsorted, so re-encoding the
        // decoded dictionary would produce different bytes than the file
        let input = b"d4:infod1:b1:x1:a1:yee";
        let mut parser = Parser::new();
        parser.write_all(input).unwrap();

        let span = parser.info_span().expect("no info span recorded");
        let raw = &input[span];
        assert_eq!(raw, b"d1:b1:x1:a1:ye");

        let mut value = parser.result().unwrap();
        let info = value.remove_entry("info").unwrap();
        let mut re_encoded = Vec::new();
        info.encode(&mut re_encoded).unwrap();
        assert_ne!(re_encoded, raw);
    }

    #[test]
    fn no_info_span_without_info_entry() {
        let input = b"d8:announce3:urle";
        let mut parser = Parser::new();
        parser.write_all(input).unwrap();

        assert_eq!(parser.info_span(), None);
    }

    #[test]
    fn nested_info_key_is_not_tracked() {
        let input = b"d5:outerd4:infoi1eee";
        let mut parser = Parser::new();
        parser.write_all(input).unwrap();

        assert_eq!(parser.info_span(), None);
    }
}
