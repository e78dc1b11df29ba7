use std::io::{Result, Write};

use crate::bencoding::value::Value;

impl Value {
    pub fn encode(&self, dest: &mut impl Write) -> Result<()> {
        match self {
            Self::String(string) => encode_string(string, dest),
            Self::Integer(integer) => write!(dest, "i{}e", integer),
            Self::List(values) => {
                write!(dest, "l")?;
                for value in values {
                    value.encode(dest)?;
                }
                write!(dest, "e")
            }
            Self::Dictionary(entries) => {
                write!(dest, "d")?;
                for (key, value) in entries {
                    encode_string(key.as_bytes(), dest)?;
                    value.encode(dest)?;
                }
                write!(dest, "e")
            }
        }
    }
}

fn encode_string(string: &[u8], dest: &mut impl Write) -> Result<()> {
    write!(dest, "{}:", string.len())?;
    dest.write_all(string)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::bencoding::Parser;

    use super::*;

    fn encode(value: &Value) -> Vec<u8> {
        let mut buffer = Vec::new();
        value.encode(&mut buffer).expect("unable to encode");
        buffer
    }

    #[test]
    fn integer() {
        assert_eq!(encode(&Value::Integer(42)), b"i42e");
    }

    #[test]
    fn negative_integer() {
        assert_eq!(encode(&Value::Integer(-42)), b"i-42e");
    }

    #[test]
    fn string() {
        assert_eq!(encode(&Value::string("foo")), b"3:foo");
    }

    #[test]
    fn list() {
        let value = Value::list()
            .with_value(Value::string("foo"))
            .with_value(Value::string("bar"));

        assert_eq!(encode(&value), b"l3:foo3:bare");
    }

    #[test]
    fn dictionary() {
        let value = Value::dictionary()
            .with_entry("foo", Value::Integer(1))
            .with_entry("bar", Value::Integer(2));

        // Dictionary keys are sorted
        assert_eq!(encode(&value), b"d3:bari2e3:fooi1ee");
    }

    #[test]
    fn decoded_values_round_trip() {
        let inputs: [&[u8]; 4] = [
            b"i42e",
            b"l4:spam4:eggse",
            b"d3:cow3:moo4:spam4:eggse",
            b"d3:food3:barl3:bazee3:quxi42ee",
        ];
        for input in inputs {
            let mut parser = Parser::new();
            parser.write_all(input).unwrap();
            let value = parser.result().unwrap();

            assert_eq!(encode(&value), input);
        }
    }
}
