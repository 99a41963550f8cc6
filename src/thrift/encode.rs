use bytes::{BufMut, BytesMut};

use super::{Field, Message, ThriftError, TType, Value, MAX_LENGTH, VERSION_1};

/// Appends `message` to `buf` in strict binary form.
///
/// # Errors
///
/// Returns [`ThriftError::InvalidLength`] when a string or container exceeds
/// [`MAX_LENGTH`](super::MAX_LENGTH).
pub fn encode_message(message: &Message, buf: &mut BytesMut) -> Result<(), ThriftError> {
    buf.put_u32(VERSION_1 | u32::from(message.kind as u8));
    put_binary(buf, message.name.as_bytes())?;
    buf.put_i32(message.seqid);
    put_struct(buf, &message.body)
}

fn put_length(buf: &mut BytesMut, len: usize) -> Result<(), ThriftError> {
    if len > MAX_LENGTH {
        return Err(ThriftError::InvalidLength(i64::try_from(len).unwrap_or(i64::MAX)));
    }
    // MAX_LENGTH fits in an i32.
    buf.put_i32(i32::try_from(len).unwrap_or(i32::MAX));
    Ok(())
}

fn put_binary(buf: &mut BytesMut, bytes: &[u8]) -> Result<(), ThriftError> {
    put_length(buf, bytes.len())?;
    buf.put_slice(bytes);
    Ok(())
}

fn put_struct(buf: &mut BytesMut, fields: &[Field]) -> Result<(), ThriftError> {
    for field in fields {
        buf.put_u8(field.value.ttype() as u8);
        buf.put_i16(field.id);
        put_value(buf, &field.value)?;
    }
    buf.put_u8(TType::Stop as u8);
    Ok(())
}

fn put_value(buf: &mut BytesMut, value: &Value) -> Result<(), ThriftError> {
    match value {
        Value::Bool(v) => buf.put_u8(u8::from(*v)),
        Value::Byte(v) => buf.put_i8(*v),
        Value::I16(v) => buf.put_i16(*v),
        Value::I32(v) => buf.put_i32(*v),
        Value::I64(v) => buf.put_i64(*v),
        Value::Double(v) => buf.put_f64(*v),
        Value::Binary(bytes) => put_binary(buf, bytes)?,
        Value::Struct(fields) => put_struct(buf, fields)?,
        Value::List(elem, items) | Value::Set(elem, items) => {
            buf.put_u8(*elem as u8);
            put_length(buf, items.len())?;
            for item in items {
                put_value(buf, item)?;
            }
        }
        Value::Map(key, val, pairs) => {
            buf.put_u8(*key as u8);
            buf.put_u8(*val as u8);
            put_length(buf, pairs.len())?;
            for (k, v) in pairs {
                put_value(buf, k)?;
                put_value(buf, v)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_fault_call_bytes() {
        let message = Message::call("clear_fault", 7, vec![Field::new(1, Value::string("fsync"))]);
        let mut buf = BytesMut::new();
        encode_message(&message, &mut buf).unwrap();

        let mut expected = vec![0x80, 0x01, 0x00, 0x01];
        expected.extend_from_slice(&11_i32.to_be_bytes());
        expected.extend_from_slice(b"clear_fault");
        expected.extend_from_slice(&7_i32.to_be_bytes());
        expected.push(11);
        expected.extend_from_slice(&1_i16.to_be_bytes());
        expected.extend_from_slice(&5_i32.to_be_bytes());
        expected.extend_from_slice(b"fsync");
        expected.push(0);
        assert_eq!(&buf[..], &expected[..]);
    }

    #[test]
    fn string_list_has_element_header() {
        let message = Message::call(
            "set_fault",
            1,
            vec![Field::new(1, Value::string_list(&["open", "read"]))],
        );
        let mut buf = BytesMut::new();
        encode_message(&message, &mut buf).unwrap();
        // header(4) + name(4 + 9) + seqid(4) = 21, then field header
        assert_eq!(buf[21], TType::List as u8);
        assert_eq!(&buf[22..24], &1_i16.to_be_bytes());
        assert_eq!(buf[24], TType::String as u8);
        assert_eq!(&buf[25..29], &2_i32.to_be_bytes());
    }
}
