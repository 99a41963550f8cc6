use bytes::Buf;

use super::{
    Field, Message, MessageType, ThriftError, TType, Value, MAX_DEPTH, MAX_LENGTH, VERSION_1,
    VERSION_MASK,
};

/// Decodes one message from the front of `data`.
///
/// Returns the message and the number of bytes it occupied, so a caller
/// reading from a stream can keep any trailing bytes.
///
/// # Errors
///
/// Returns [`ThriftError::Incomplete`] when `data` holds only a prefix of a
/// message, and the other variants when the bytes cannot be a valid message.
pub fn decode_message(data: &[u8]) -> Result<(Message, usize), ThriftError> {
    let mut reader = Reader { data, total: data.len() };

    let header = reader.u32()?;
    if header & VERSION_MASK != VERSION_1 {
        return Err(ThriftError::BadVersion(header));
    }
    // Low byte of the header word.
    let kind = MessageType::from_byte((header & 0xff) as u8)?;
    let name = String::from_utf8(reader.binary()?).map_err(|_| ThriftError::InvalidUtf8)?;
    let seqid = reader.i32()?;
    let body = reader.fields(0)?;

    let consumed = reader.total - reader.data.remaining();
    Ok((Message { name, kind, seqid, body }, consumed))
}

struct Reader<'a> {
    data: &'a [u8],
    total: usize,
}

impl Reader<'_> {
    fn need(&self, n: usize) -> Result<(), ThriftError> {
        if self.data.remaining() < n {
            let have = self.total - self.data.remaining();
            return Err(ThriftError::Incomplete { needed: have + n, have: self.total });
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, ThriftError> {
        self.need(1)?;
        Ok(self.data.get_u8())
    }

    fn i16(&mut self) -> Result<i16, ThriftError> {
        self.need(2)?;
        Ok(self.data.get_i16())
    }

    fn i32(&mut self) -> Result<i32, ThriftError> {
        self.need(4)?;
        Ok(self.data.get_i32())
    }

    fn u32(&mut self) -> Result<u32, ThriftError> {
        self.need(4)?;
        Ok(self.data.get_u32())
    }

    fn length(&mut self) -> Result<usize, ThriftError> {
        let raw = self.i32()?;
        match usize::try_from(raw) {
            Ok(len) if len <= MAX_LENGTH => Ok(len),
            _ => Err(ThriftError::InvalidLength(i64::from(raw))),
        }
    }

    fn binary(&mut self) -> Result<Vec<u8>, ThriftError> {
        let len = self.length()?;
        self.need(len)?;
        let bytes = self.data[..len].to_vec();
        self.data.advance(len);
        Ok(bytes)
    }

    fn ttype(&mut self) -> Result<TType, ThriftError> {
        TType::from_byte(self.u8()?)
    }

    fn fields(&mut self, depth: usize) -> Result<Vec<Field>, ThriftError> {
        let mut fields = Vec::new();
        loop {
            let ty = self.ttype()?;
            if ty == TType::Stop {
                return Ok(fields);
            }
            let id = self.i16()?;
            let value = self.value(ty, depth + 1)?;
            fields.push(Field { id, value });
        }
    }

    fn elements(&mut self, ty: TType, depth: usize) -> Result<Vec<Value>, ThriftError> {
        let len = self.length()?;
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(self.value(ty, depth + 1)?);
        }
        Ok(items)
    }

    fn value(&mut self, ty: TType, depth: usize) -> Result<Value, ThriftError> {
        if depth > MAX_DEPTH {
            return Err(ThriftError::TooDeep);
        }
        Ok(match ty {
            TType::Stop => return Err(ThriftError::UnknownType(TType::Stop as u8)),
            TType::Bool => Value::Bool(self.u8()? != 0),
            TType::Byte => {
                self.need(1)?;
                Value::Byte(self.data.get_i8())
            }
            TType::I16 => Value::I16(self.i16()?),
            TType::I32 => Value::I32(self.i32()?),
            TType::I64 => {
                self.need(8)?;
                Value::I64(self.data.get_i64())
            }
            TType::Double => {
                self.need(8)?;
                Value::Double(self.data.get_f64())
            }
            TType::String => Value::Binary(self.binary()?),
            TType::Struct => Value::Struct(self.fields(depth)?),
            TType::List => {
                let elem = self.ttype()?;
                Value::List(elem, self.elements(elem, depth)?)
            }
            TType::Set => {
                let elem = self.ttype()?;
                Value::Set(elem, self.elements(elem, depth)?)
            }
            TType::Map => {
                let key = self.ttype()?;
                let val = self.ttype()?;
                let len = self.length()?;
                let mut pairs = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    let k = self.value(key, depth + 1)?;
                    let v = self.value(val, depth + 1)?;
                    pairs.push((k, v));
                }
                Value::Map(key, val, pairs)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::thrift::encode_message;

    fn encoded(message: &Message) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_message(message, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn decodes_get_methods_reply_with_trailing_bytes() {
        let reply = Message::reply(
            "get_methods",
            3,
            vec![Field::new(0, Value::string_list(&["getattr", "fsync"]))],
        );
        let mut bytes = encoded(&reply);
        let len = bytes.len();
        bytes.extend_from_slice(&[0x80, 0x01]);

        let (decoded, consumed) = decode_message(&bytes).unwrap();
        assert_eq!(consumed, len);
        assert_eq!(decoded, reply);
        match decoded.field(0) {
            Some(Value::List(TType::String, items)) => {
                let names: Vec<_> = items.iter().filter_map(Value::as_str).collect();
                assert_eq!(names, ["getattr", "fsync"]);
            }
            other => panic!("unexpected field: {other:?}"),
        }
    }

    #[test]
    fn every_prefix_is_incomplete() {
        let reply = Message::reply("clear_all_faults", 1, vec![]);
        let bytes = encoded(&reply);
        for cut in 0..bytes.len() {
            assert!(
                matches!(decode_message(&bytes[..cut]), Err(ThriftError::Incomplete { .. })),
                "prefix of {cut} bytes"
            );
        }
    }

    #[test]
    fn nested_unknown_fields_are_carried() {
        let reply = Message::reply(
            "set_fault",
            2,
            vec![Field::new(
                5,
                Value::Struct(vec![
                    Field::new(1, Value::Map(TType::I32, TType::Double, vec![(Value::I32(1), Value::Double(0.5))])),
                    Field::new(2, Value::Set(TType::I64, vec![Value::I64(-9)])),
                    Field::new(3, Value::Byte(-1)),
                    Field::new(4, Value::I16(300)),
                ]),
            )],
        );
        let (decoded, _) = decode_message(&encoded(&reply)).unwrap();
        assert_eq!(decoded, reply);
    }

    #[test]
    fn rejects_non_strict_header() {
        let mut bytes = encoded(&Message::reply("x", 1, vec![]));
        bytes[0] = 0x00;
        assert!(matches!(decode_message(&bytes), Err(ThriftError::BadVersion(_))));
    }

    #[test]
    fn rejects_negative_length() {
        let mut bytes = vec![0x80, 0x01, 0x00, 0x02];
        bytes.extend_from_slice(&(-4_i32).to_be_bytes());
        assert_eq!(decode_message(&bytes), Err(ThriftError::InvalidLength(-4)));
    }
}
