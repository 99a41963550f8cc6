//! Live fault service adapter: Thrift binary protocol over a plain TCP stream.

use std::io;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

use crate::fault::error::FaultError;
use crate::fault::spec::FaultParams;
use crate::ports::faults::{Endpoint, FaultConnector, FaultFuture, FaultService};
use crate::thrift::{
    decode_message, encode_message, ApplicationException, Field, Message, MessageType, TType,
    ThriftError, Value,
};

/// Default bound on establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Opens Thrift connections to the fault service.
#[derive(Debug, Clone)]
pub struct ThriftConnector {
    connect_timeout: Duration,
}

impl ThriftConnector {
    /// Creates a connector that gives up on connecting after `connect_timeout`.
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for ThriftConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl FaultConnector for ThriftConnector {
    fn connect<'a>(&'a self, endpoint: &'a Endpoint) -> FaultFuture<'a, Box<dyn FaultService>> {
        Box::pin(async move {
            let connecting = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
            let stream = tokio::time::timeout(self.connect_timeout, connecting)
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connecting to {endpoint} timed out after {:?}", self.connect_timeout),
                    )
                })??;
            stream.set_nodelay(true)?;
            debug!(%endpoint, "connected");
            Ok(Box::new(ThriftFaultService::new(stream)) as Box<dyn FaultService>)
        })
    }
}

/// One Thrift connection to the fault service.
pub struct ThriftFaultService {
    stream: TcpStream,
    seqid: i32,
    inbound: BytesMut,
}

impl ThriftFaultService {
    /// Wraps a connected stream.
    #[must_use]
    pub fn new(stream: TcpStream) -> Self {
        Self { stream, seqid: 0, inbound: BytesMut::with_capacity(4096) }
    }

    /// Sends one call and returns the fields of its result struct.
    #[instrument(skip(self, args))]
    async fn call(&mut self, name: &'static str, args: Vec<Field>) -> Result<Vec<Field>, FaultError> {
        self.seqid = self.seqid.wrapping_add(1);
        let mut outbound = BytesMut::new();
        encode_message(&Message::call(name, self.seqid, args), &mut outbound)?;
        self.stream.write_all(&outbound).await?;
        self.stream.flush().await?;

        let reply = self.read_message().await?;
        check_reply(name, self.seqid, reply)
    }

    async fn read_message(&mut self) -> Result<Message, FaultError> {
        loop {
            match decode_message(&self.inbound) {
                Ok((message, consumed)) => {
                    self.inbound.advance(consumed);
                    return Ok(message);
                }
                Err(ThriftError::Incomplete { .. }) => {}
                Err(err) => return Err(err.into()),
            }
            if self.stream.read_buf(&mut self.inbound).await? == 0 {
                return Err(FaultError::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "fault service closed the connection mid-reply",
                )));
            }
        }
    }
}

/// Validates a reply against the call it answers.
fn check_reply(name: &str, seqid: i32, reply: Message) -> Result<Vec<Field>, FaultError> {
    match reply.kind {
        MessageType::Reply => {}
        MessageType::Exception => {
            let exception = ApplicationException::from_fields(&reply.body);
            return Err(FaultError::Protocol(format!("{name}: {exception}")));
        }
        other => {
            return Err(FaultError::Protocol(format!("{name}: unexpected {other:?} message in reply")));
        }
    }
    if reply.name != name {
        return Err(FaultError::Protocol(format!(
            "reply names method {:?}, expected {name:?}",
            reply.name
        )));
    }
    if reply.seqid != seqid {
        return Err(FaultError::Protocol(format!(
            "{name}: reply sequence id {} does not match call {seqid}",
            reply.seqid
        )));
    }
    Ok(reply.body)
}

/// Result of a method declared `void`: no fields at all.
fn expect_void(name: &str, fields: &[Field]) -> Result<(), FaultError> {
    match fields.first() {
        None => Ok(()),
        Some(field) => Err(FaultError::Protocol(format!(
            "{name}: unexpected result field {} of type {:?}",
            field.id,
            field.value.ttype()
        ))),
    }
}

/// Result of `get_methods`: a `list<string>` in field 0.
fn expect_names(fields: &[Field]) -> Result<Vec<String>, FaultError> {
    let mut names = None;
    for field in fields {
        match (field.id, &field.value) {
            (0, Value::List(TType::String, items)) => {
                let decoded = items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            FaultError::Protocol("get_methods: operation name is not UTF-8".into())
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                names = Some(decoded);
            }
            (id, value) => {
                return Err(FaultError::Protocol(format!(
                    "get_methods: unexpected result field {id} of type {:?}",
                    value.ttype()
                )));
            }
        }
    }
    names.ok_or_else(|| FaultError::Protocol("get_methods: reply has no result".into()))
}

/// Argument struct of `set_fault`.
///
/// # Errors
///
/// Returns [`FaultError::InvalidSpec`] when the delay does not fit the wire field.
pub fn set_fault_args(methods: &[String], params: &FaultParams) -> Result<Vec<Field>, FaultError> {
    let mut args = vec![Field::new(1, Value::string_list(methods))];
    args.extend(param_fields(2, params)?);
    Ok(args)
}

/// Argument struct of `set_all_fault`.
///
/// # Errors
///
/// Returns [`FaultError::InvalidSpec`] when the delay does not fit the wire field.
pub fn set_all_fault_args(params: &FaultParams) -> Result<Vec<Field>, FaultError> {
    param_fields(1, params)
}

/// The shared parameter tuple, numbered from `first`:
/// random, err_no, probability, regexp, kill_caller, delay_us, auto_delay.
fn param_fields(first: i16, params: &FaultParams) -> Result<Vec<Field>, FaultError> {
    let values = [
        Value::Bool(params.random),
        Value::I32(params.error_number),
        Value::I32(params.probability.to_wire()),
        Value::string(params.victim_pattern.clone()),
        Value::Bool(params.kill_caller),
        Value::I32(params.delay_wire()?),
        // auto_delay is reserved by the service.
        Value::Bool(false),
    ];
    Ok(values.into_iter().zip(first..).map(|(value, id)| Field::new(id, value)).collect())
}

impl FaultService for ThriftFaultService {
    fn get_methods(&mut self) -> FaultFuture<'_, Vec<String>> {
        Box::pin(async move {
            let fields = self.call("get_methods", Vec::new()).await?;
            expect_names(&fields)
        })
    }

    fn clear_all_faults(&mut self) -> FaultFuture<'_, ()> {
        Box::pin(async move {
            let fields = self.call("clear_all_faults", Vec::new()).await?;
            expect_void("clear_all_faults", &fields)
        })
    }

    fn clear_fault<'a>(&'a mut self, method: &'a str) -> FaultFuture<'a, ()> {
        Box::pin(async move {
            let args = vec![Field::new(1, Value::string(method))];
            let fields = self.call("clear_fault", args).await?;
            expect_void("clear_fault", &fields)
        })
    }

    fn set_fault<'a>(
        &'a mut self,
        methods: &'a [String],
        params: &'a FaultParams,
    ) -> FaultFuture<'a, ()> {
        Box::pin(async move {
            let args = set_fault_args(methods, params)?;
            let fields = self.call("set_fault", args).await?;
            expect_void("set_fault", &fields)
        })
    }

    fn set_all_fault<'a>(&'a mut self, params: &'a FaultParams) -> FaultFuture<'a, ()> {
        Box::pin(async move {
            let args = set_all_fault_args(params)?;
            let fields = self.call("set_all_fault", args).await?;
            expect_void("set_all_fault", &fields)
        })
    }

    fn close(&mut self) -> FaultFuture<'_, ()> {
        Box::pin(async move {
            match self.stream.shutdown().await {
                Ok(()) => Ok(()),
                // Already torn down by the peer.
                Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
                Err(err) => Err(err.into()),
            }
        })
    }
}
